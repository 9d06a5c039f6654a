use ck_meow::Meow;
use sha3::{Digest, Keccak256};

/// The number of bytes produced by [hash_wide].
///
/// This is twice the size of any modulus we reduce into, so the bias from
/// reduction is negligible.
pub const WIDE_LEN: usize = 64;

/// Hash a list of byte strings under a domain separator.
///
/// Each part is framed by its length, so that different splits of the same
/// bytes never collide.
pub fn hash_wide(domain: &[u8], parts: &[&[u8]]) -> [u8; WIDE_LEN] {
    let mut meow = Meow::new(domain);

    meow.ad(&[], false);
    for part in parts {
        meow.ad(&(part.len() as u64).to_be_bytes(), true);
        meow.ad(part, true);
    }

    let mut out = [0u8; WIDE_LEN];
    meow.prf(&mut out, false);
    out
}

/// The 256 bit hash used for message digests and addresses.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_framing_separates_parts() {
        let a = hash_wide(b"test", &[&b"ab"[..], &b"c"[..]]);
        let b = hash_wide(b"test", &[&b"a"[..], &b"bc"[..]]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_domain_separation() {
        let a = hash_wide(b"domain a", &[&b"data"[..]]);
        let b = hash_wide(b"domain b", &[&b"data"[..]]);
        assert_ne!(a, b);
        assert_eq!(a, hash_wide(b"domain a", &[&b"data"[..]]));
    }

    #[test]
    fn test_keccak_known_answer() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
