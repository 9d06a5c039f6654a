//! Prime generation for the Paillier and auxiliary moduli.
//!
//! The primes themselves come from `glass_pumpkin`. This module only picks
//! pairs whose product has an exact size.
use glass_pumpkin::{prime, safe_prime};
use num_bigint::BigInt;
use rand_core::CryptoRngCore;

use crate::error::Error;

fn generate(rng: &mut impl CryptoRngCore, bits: u64, safe: bool) -> Result<BigInt, Error> {
    let bits = usize::try_from(bits)
        .map_err(|_| Error::Parameter(format!("cannot generate a {bits} bit prime")))?;
    let p = if safe {
        safe_prime::from_rng(bits, rng)
    } else {
        prime::from_rng(bits, rng)
    };
    p.map(BigInt::from)
        .map_err(|e| Error::Parameter(format!("prime generation failed: {e:?}")))
}

/// Two distinct primes of `bits / 2` bits, whose product has exactly `bits` bits.
///
/// With `safe` set, both are safe primes `p = 2p' + 1`, which is much slower.
pub fn prime_pair(
    rng: &mut impl CryptoRngCore,
    bits: u64,
    safe: bool,
) -> Result<(BigInt, BigInt), Error> {
    if bits < 32 || bits % 2 != 0 {
        return Err(Error::Parameter(format!(
            "modulus size must be even and at least 32, found {bits}"
        )));
    }
    loop {
        let p = generate(rng, bits / 2, safe)?;
        let q = generate(rng, bits / 2, safe)?;
        if p != q && (&p * &q).bits() == bits {
            return Ok((p, q));
        }
    }
}

#[cfg(test)]
mod test {
    use rand_core::OsRng;

    use super::*;

    fn is_safe_prime(p: &BigInt) -> bool {
        p.to_biguint().map_or(false, |p| safe_prime::check(&p))
    }

    #[test]
    fn test_pair_has_exact_length() -> Result<(), Error> {
        let (p, q) = prime_pair(&mut OsRng, 256, false)?;
        assert_ne!(p, q);
        assert_eq!((&p * &q).bits(), 256);
        assert!(prime::check(&p.to_biguint().ok_or(Error::MessageTooLarge)?));
        Ok(())
    }

    #[test]
    fn test_safe_pair() -> Result<(), Error> {
        let (p, q) = prime_pair(&mut OsRng, 128, true)?;
        assert!(is_safe_prime(&p));
        assert!(is_safe_prime(&q));
        assert!(!is_safe_prime(&BigInt::from(-23)));
        Ok(())
    }

    #[test]
    fn test_bad_sizes_are_rejected() {
        assert!(matches!(
            prime_pair(&mut OsRng, 31, false),
            Err(Error::Parameter(_))
        ));
        assert!(prime_pair(&mut OsRng, 16, false).is_err());
    }
}
