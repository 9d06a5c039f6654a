//! A stable binary encoding for opaque algebraic elements.
//!
//! Every element is written as a record:
//! ```text
//! i32 byte_length (big endian) | i32 field_tag (big endian) | raw bytes
//! ```
//! The tag tells the reader which group the raw bytes should be reconstructed
//! into. Composite values, like commitments or aggregate keys, are just the
//! concatenation of their records.
//!
//! For transports which want text, like JSON, the concatenated bytes are
//! carried as a single base64 string. The [impl_wire_serde] macro hooks
//! this up to serde, picking raw bytes or base64 depending on the format.
use base64::{engine::general_purpose::STANDARD, Engine};
use bls12_381::{G1Affine, G2Affine};
use k256::AffinePoint;
use num_bigint::BigInt;
use thiserror::Error;

use crate::compat;

/// Identifies which algebraic structure a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTag {
    G1 = 0,
    G2 = 1,
    /// Reserved for target group elements, which we never transmit.
    Gt = 2,
    Zr = 3,
    /// A compressed secp256k1 point.
    Point = 4,
    /// A signed big endian integer.
    Int = 5,
    /// Opaque bytes.
    Bytes = 6,
}

impl TryFrom<i32> for FieldTag {
    type Error = WireError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::G1),
            1 => Ok(Self::G2),
            2 => Ok(Self::Gt),
            3 => Ok(Self::Zr),
            4 => Ok(Self::Point),
            5 => Ok(Self::Int),
            6 => Ok(Self::Bytes),
            x => Err(WireError::UnknownTag(x)),
        }
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("input ended in the middle of a record")]
    Truncated,
    #[error("record has a negative length")]
    NegativeLength,
    #[error("unknown field tag {0}")]
    UnknownTag(i32),
    #[error("expected a {expected:?} record, found {found:?}")]
    UnexpectedTag { expected: FieldTag, found: FieldTag },
    #[error("record does not hold a valid {0:?} element")]
    InvalidElement(FieldTag),
    #[error("{0} unexpected bytes after the last record")]
    TrailingBytes(usize),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Accumulates records into a buffer.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, tag: FieldTag, raw: &[u8]) {
        // Records are bounded by the sizes of the elements we encode, far below i32::MAX.
        self.buf.extend_from_slice(&(raw.len() as i32).to_be_bytes());
        self.buf.extend_from_slice(&(tag as i32).to_be_bytes());
        self.buf.extend_from_slice(raw);
    }

    pub fn g1(&mut self, x: &G1Affine) {
        self.record(FieldTag::G1, &x.to_compressed());
    }

    pub fn g2(&mut self, x: &G2Affine) {
        self.record(FieldTag::G2, &x.to_compressed());
    }

    pub fn zr(&mut self, x: &bls12_381::Scalar) {
        self.record(FieldTag::Zr, &x.to_bytes());
    }

    pub fn point(&mut self, x: &AffinePoint) {
        self.record(FieldTag::Point, &compat::point_to_bytes(x));
    }

    pub fn int(&mut self, x: &BigInt) {
        self.record(FieldTag::Int, &x.to_signed_bytes_be());
    }

    pub fn bytes(&mut self, x: &[u8]) {
        self.record(FieldTag::Bytes, x);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads records back out of a buffer, in order.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take_i32(&mut self) -> Result<i32, WireError> {
        if self.data.len() < 4 {
            return Err(WireError::Truncated);
        }
        let (head, rest) = self.data.split_at(4);
        self.data = rest;
        let mut out = [0u8; 4];
        out.copy_from_slice(head);
        Ok(i32::from_be_bytes(out))
    }

    fn record(&mut self, expected: FieldTag) -> Result<&'a [u8], WireError> {
        let len = self.take_i32()?;
        let len = usize::try_from(len).map_err(|_| WireError::NegativeLength)?;
        let found = FieldTag::try_from(self.take_i32()?)?;
        if found != expected {
            return Err(WireError::UnexpectedTag { expected, found });
        }
        if self.data.len() < len {
            return Err(WireError::Truncated);
        }
        let (raw, rest) = self.data.split_at(len);
        self.data = rest;
        Ok(raw)
    }

    fn fixed<const N: usize>(&mut self, tag: FieldTag) -> Result<[u8; N], WireError> {
        let raw = self.record(tag)?;
        raw.try_into().map_err(|_| WireError::InvalidElement(tag))
    }

    pub fn g1(&mut self) -> Result<G1Affine, WireError> {
        let raw = self.fixed::<48>(FieldTag::G1)?;
        Option::from(G1Affine::from_compressed(&raw)).ok_or(WireError::InvalidElement(FieldTag::G1))
    }

    pub fn g2(&mut self) -> Result<G2Affine, WireError> {
        let raw = self.fixed::<96>(FieldTag::G2)?;
        Option::from(G2Affine::from_compressed(&raw)).ok_or(WireError::InvalidElement(FieldTag::G2))
    }

    pub fn zr(&mut self) -> Result<bls12_381::Scalar, WireError> {
        let raw = self.fixed::<32>(FieldTag::Zr)?;
        Option::from(bls12_381::Scalar::from_bytes(&raw))
            .ok_or(WireError::InvalidElement(FieldTag::Zr))
    }

    pub fn point(&mut self) -> Result<AffinePoint, WireError> {
        let raw = self.record(FieldTag::Point)?;
        compat::point_from_bytes(raw).ok_or(WireError::InvalidElement(FieldTag::Point))
    }

    pub fn int(&mut self) -> Result<BigInt, WireError> {
        Ok(BigInt::from_signed_bytes_be(self.record(FieldTag::Int)?))
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, WireError> {
        Ok(self.record(FieldTag::Bytes)?.to_vec())
    }

    /// Check that every byte was consumed.
    pub fn finish(self) -> Result<(), WireError> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(WireError::TrailingBytes(self.data.len()))
        }
    }
}

/// A value with a canonical encoding as a sequence of records.
pub trait WireFormat: Sized {
    fn write_to(&self, w: &mut Writer);

    fn read_from(r: &mut Reader<'_>) -> Result<Self, WireError>;

    fn to_wire(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.write_to(&mut w);
        w.finish()
    }

    fn from_wire(bytes: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(bytes);
        let out = Self::read_from(&mut r)?;
        r.finish()?;
        Ok(out)
    }

    fn to_base64(&self) -> String {
        STANDARD.encode(self.to_wire())
    }

    fn from_base64(data: &str) -> Result<Self, WireError> {
        Self::from_wire(&STANDARD.decode(data)?)
    }
}

/// Implement serde for a [WireFormat] type.
///
/// Human readable formats get a base64 string, binary formats get raw bytes.
macro_rules! impl_wire_serde {
    ($t:ty) => {
        impl ::serde::Serialize for $t {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                use $crate::wire::WireFormat;
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_base64())
                } else {
                    serializer.serialize_bytes(&self.to_wire())
                }
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $t {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                use $crate::wire::WireFormat;
                if deserializer.is_human_readable() {
                    let data = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                    Self::from_base64(&data).map_err(::serde::de::Error::custom)
                } else {
                    let data = <$crate::serde::ByteBuf as ::serde::Deserialize>::deserialize(deserializer)?;
                    Self::from_wire(&data.0).map_err(::serde::de::Error::custom)
                }
            }
        }
    };
}

pub(crate) use impl_wire_serde;

#[cfg(test)]
mod test {
    use bls12_381::{G1Projective, G2Projective};
    use ff::Field;
    use k256::{ProjectivePoint, Scalar};
    use rand_core::OsRng;

    use super::*;

    #[test]
    fn test_records_come_back_in_order() -> Result<(), WireError> {
        let g1 = G1Affine::from(G1Projective::generator() * bls12_381::Scalar::random(&mut OsRng));
        let g2 = G2Affine::from(G2Projective::generator() * bls12_381::Scalar::random(&mut OsRng));
        let zr = bls12_381::Scalar::random(&mut OsRng);
        let point = (ProjectivePoint::GENERATOR * <Scalar as Field>::random(&mut OsRng)).to_affine();
        let int = BigInt::from(-123456789i64);

        let mut w = Writer::new();
        w.g1(&g1);
        w.g2(&g2);
        w.zr(&zr);
        w.point(&point);
        w.int(&int);
        w.bytes(b"opaque");
        let data = w.finish();

        let mut r = Reader::new(&data);
        assert_eq!(r.g1()?, g1);
        assert_eq!(r.g2()?, g2);
        assert_eq!(r.zr()?, zr);
        assert_eq!(r.point()?, point);
        assert_eq!(r.int()?, int);
        assert_eq!(r.bytes()?, b"opaque".to_vec());
        r.finish()
    }

    #[test]
    fn test_record_layout() {
        let mut w = Writer::new();
        w.bytes(&[0xAB, 0xCD]);
        assert_eq!(w.finish(), vec![0, 0, 0, 2, 0, 0, 0, 6, 0xAB, 0xCD]);
    }

    #[test]
    fn test_tag_mismatch_is_rejected() {
        let mut w = Writer::new();
        w.int(&BigInt::from(7u32));
        let data = w.finish();

        let mut r = Reader::new(&data);
        assert!(matches!(
            r.bytes(),
            Err(WireError::UnexpectedTag {
                expected: FieldTag::Bytes,
                found: FieldTag::Int
            })
        ));
    }

    #[test]
    fn test_truncation_and_trailing_bytes() {
        let mut w = Writer::new();
        w.bytes(b"abcdef");
        let data = w.finish();

        assert!(matches!(
            Reader::new(&data[..data.len() - 1]).bytes(),
            Err(WireError::Truncated)
        ));

        let mut padded = data.clone();
        padded.push(0);
        let mut r = Reader::new(&padded);
        assert!(r.bytes().is_ok());
        assert!(matches!(r.finish(), Err(WireError::TrailingBytes(1))));
    }

    #[test]
    fn test_unknown_and_reserved_tags() {
        let data = [0, 0, 0, 0, 0, 0, 0, 9];
        assert!(matches!(
            Reader::new(&data).bytes(),
            Err(WireError::UnknownTag(9))
        ));

        let data = [0, 0, 0, 0, 0, 0, 0, 2];
        assert!(matches!(
            Reader::new(&data).g2(),
            Err(WireError::UnexpectedTag {
                found: FieldTag::Gt,
                ..
            })
        ));
    }
}
