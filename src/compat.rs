//! Glue between secp256k1 (via `k256`) and the big integer world.
//!
//! The Paillier side of the protocol works over integers, while the curve side
//! works over scalars mod `q`, so we move values back and forth a lot.
use elliptic_curve::{
    bigint::Encoding,
    ops::Reduce,
    point::AffineCoordinates,
    sec1::{FromEncodedPoint, ToEncodedPoint},
    Curve, Field,
};
use k256::{AffinePoint, EncodedPoint, FieldBytes, Scalar, Secp256k1, U256};
use magikitten::Transcript;
use num_bigint::BigInt;
use num_integer::Integer;

use crate::crypto::keccak256;
use crate::math;

/// The name of the curve, used for domain separation.
pub const NAME: &[u8] = b"secp256k1";

/// The size of a serialized scalar, or x coordinate.
pub const SCALAR_LEN: usize = 32;

/// The order `q` of the curve, as an integer.
pub fn order() -> BigInt {
    math::from_bytes(&Secp256k1::ORDER.to_be_bytes())
}

/// Convert a scalar into the integer in `[0, q)` it represents.
pub fn scalar_to_int(x: &Scalar) -> BigInt {
    math::from_bytes(&x.to_bytes())
}

/// Convert an arbitrary integer into a scalar, reducing it mod `q`.
pub fn int_to_scalar(x: &BigInt) -> Scalar {
    let reduced = x.mod_floor(&order());
    let (_, bytes) = reduced.to_bytes_be();
    let mut repr = [0u8; SCALAR_LEN];
    repr[SCALAR_LEN - bytes.len()..].copy_from_slice(&bytes);
    <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(repr))
}

/// Get the x coordinate of a point, as a scalar.
pub fn x_coordinate(point: &AffinePoint) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&point.x())
}

/// Check whether the x coordinate of a point was reduced when turned into a scalar.
pub fn x_is_reduced(point: &AffinePoint) -> bool {
    math::from_bytes(&point.x()) >= order()
}

/// Hash an arbitrary message in order to produce a scalar.
///
/// This uses Keccak-256, and then reduces the digest mod `q`, exactly like
/// an `ecrecover` style verifier does with a 32 byte prehash.
pub fn scalar_hash(msg: &[u8]) -> Scalar {
    let digest = keccak256(msg);
    <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(digest))
}

/// Derive a fresh challenge scalar from a transcript, as an integer.
pub fn challenge(transcript: &mut Transcript, label: &'static [u8]) -> BigInt {
    scalar_to_int(&Scalar::random(&mut transcript.challenge(label)))
}

/// Marshal a point in compressed SEC1 form.
pub fn point_to_bytes(point: &AffinePoint) -> Vec<u8> {
    point.to_encoded_point(true).as_bytes().to_vec()
}

/// Unmarshal a point from SEC1 form, compressed or not.
pub fn point_from_bytes(bytes: &[u8]) -> Option<AffinePoint> {
    let encoded = EncodedPoint::from_bytes(bytes).ok()?;
    Option::from(AffinePoint::from_encoded_point(&encoded))
}

#[cfg(test)]
mod test {
    use k256::ProjectivePoint;
    use num_traits::One;
    use rand_core::OsRng;

    use super::*;

    #[test]
    fn test_scalar_int_conversion() {
        let x = Scalar::random(&mut OsRng);
        assert_eq!(int_to_scalar(&scalar_to_int(&x)), x);

        let q = order();
        assert_eq!(int_to_scalar(&(&q + BigInt::one())), Scalar::ONE);
        assert_eq!(int_to_scalar(&BigInt::from(-1i32)), -Scalar::ONE);
    }

    #[test]
    fn test_point_marshaling() {
        let point = (ProjectivePoint::GENERATOR * Scalar::random(&mut OsRng)).to_affine();
        let bytes = point_to_bytes(&point);
        assert_eq!(bytes.len(), 33);
        assert_eq!(point_from_bytes(&bytes), Some(point));
        assert_eq!(point_from_bytes(&bytes[1..]), None);
    }
}
