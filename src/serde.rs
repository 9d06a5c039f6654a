use std::fmt;

use serde::{
    de::{self, DeserializeOwned, SeqAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};

/// Encode an arbitrary serializable value into a vec.
pub fn encode<T: Serialize + ?Sized>(val: &T) -> Vec<u8> {
    rmp_serde::encode::to_vec(val).expect("failed to encode value")
}

/// Encode an arbitrary serializable value with a leading tag byte.
///
/// The protocol executor uses this tag to route a message to its waitpoint.
pub fn encode_with_tag<T: Serialize + ?Sized>(tag: u8, val: &T) -> Vec<u8> {
    let mut out = vec![tag];
    rmp_serde::encode::write(&mut out, val).expect("failed to encode value");
    out
}

/// Decode an arbitrary value from a slice of bytes.
pub fn decode<T: DeserializeOwned>(input: &[u8]) -> Result<T, rmp_serde::decode::Error> {
    rmp_serde::decode::from_slice(input)
}

/// An owned byte buffer, which accepts both native byte strings and sequences.
///
/// `Vec<u8>` only deserializes from sequences, while binary formats hand
/// us byte strings.
pub struct ByteBuf(pub Vec<u8>);

struct ByteBufVisitor;

impl<'de> Visitor<'de> for ByteBufVisitor {
    type Value = ByteBuf;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a byte string")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(ByteBuf(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(ByteBuf(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(b) = seq.next_element()? {
            out.push(b);
        }
        Ok(ByteBuf(out))
    }
}

impl<'de> Deserialize<'de> for ByteBuf {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_byte_buf(ByteBufVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tag_is_prepended() {
        let tagged = encode_with_tag(7, &(1u32, "x"));
        assert_eq!(tagged[0], 7);
        assert_eq!(&tagged[1..], &encode(&(1u32, "x"))[..]);

        let back: (u32, String) = decode(&tagged[1..]).unwrap();
        assert_eq!(back, (1, "x".to_string()));
    }

    #[test]
    fn test_byte_buf_accepts_binary() {
        struct Raw<'a>(&'a [u8]);
        impl Serialize for Raw<'_> {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_bytes(self.0)
            }
        }

        let data = encode(&Raw(&[1, 2, 3]));
        let buf: ByteBuf = decode(&data).unwrap();
        assert_eq!(buf.0, vec![1, 2, 3]);
    }
}
