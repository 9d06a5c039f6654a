//! Big integer helpers shared by Paillier, the auxiliary modulus, and the proofs.
//!
//! Everything here works over signed [`BigInt`]s, since proof responses and
//! exponents can legitimately be negative.
use num_bigint::{BigInt, RandBigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use rand_core::CryptoRngCore;

use crate::error::Error;

/// Compute `base^exp mod m`, for any sign of `exp`.
///
/// A negative exponent first inverts the base, which returns `None`
/// if the base isn't a unit mod `m`.
pub fn pow_mod(base: &BigInt, exp: &BigInt, m: &BigInt) -> Option<BigInt> {
    if exp.is_negative() {
        let inv = base.modinv(m)?;
        Some(inv.modpow(&-exp, m))
    } else {
        Some(base.modpow(exp, m))
    }
}

/// Sample an integer uniformly in `[0, n)`.
pub fn sample_below(rng: &mut impl CryptoRngCore, n: &BigInt) -> BigInt {
    rng.gen_bigint_range(&BigInt::zero(), n)
}

/// Sample an integer uniformly from the units of `Z_n`.
pub fn sample_unit(rng: &mut impl CryptoRngCore, n: &BigInt) -> BigInt {
    loop {
        let x = rng.gen_bigint_range(&BigInt::one(), n);
        if x.gcd(n).is_one() {
            return x;
        }
    }
}

/// Check whether `x` lies in `(0, n)` and is coprime to `n`.
pub fn is_unit(x: &BigInt, n: &BigInt) -> bool {
    x.is_positive() && x < n && x.gcd(n).is_one()
}

/// The number of bytes needed for any non-negative integer below `n`.
pub fn byte_width(n: &BigInt) -> usize {
    ((n.bits() + 7) / 8) as usize
}

/// Serialize a non-negative integer as exactly `width` big endian bytes.
///
/// This fails if the integer is negative, or doesn't fit.
pub fn to_fixed_bytes(x: &BigInt, width: usize) -> Result<Vec<u8>, Error> {
    let (sign, bytes) = x.to_bytes_be();
    if sign == Sign::Minus || bytes.len() > width {
        return Err(Error::Parameter(format!(
            "integer does not fit in {width} bytes"
        )));
    }
    let mut out = vec![0u8; width - bytes.len()];
    out.extend_from_slice(&bytes);
    Ok(out)
}

/// Parse big endian bytes into a non-negative integer.
pub fn from_bytes(bytes: &[u8]) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, bytes)
}
