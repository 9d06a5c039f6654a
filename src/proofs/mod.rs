//! Zero knowledge proofs binding curve points to Paillier ciphertexts.
//!
//! All three proofs share the same structure: the prover commits to some
//! blinded values, derives a challenge `e` from the transcript, and answers
//! with responses mixing the blinders with `e` times the witness. The
//! verifier recomputes each commitment from the responses and the statement,
//! compares it to the published one, and finally re-derives `e`.
//!
//! Integer commitments use the auxiliary modulus `Ñ` from [crate::params::ZkSetup],
//! while ciphertext checks work mod `N^2`.
use k256::{AffinePoint, ProjectivePoint};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed};
use tracing::debug;

use crate::compat;
use crate::error::ProofKind;
use crate::paillier::EncryptionKey;
use crate::params::ZkSetup;

pub mod keygen;
pub mod zkpi1;
pub mod zkpi2;

/// The ranges blinding values are drawn from.
pub(crate) struct Bounds {
    /// The curve order.
    pub q: BigInt,
    pub q3: BigInt,
    pub q_n_tilde: BigInt,
    pub q3_n_tilde: BigInt,
    /// Honest responses `e * x + alpha` always lie below this.
    pub response: BigInt,
}

impl Bounds {
    pub fn new(zk: &ZkSetup) -> Self {
        let q = compat::order();
        let q3 = q.pow(3);
        let q_n_tilde = &q * &zk.n_tilde;
        let q3_n_tilde = &q3 * &zk.n_tilde;
        let response = &q3 << 1;
        Self {
            q,
            q3,
            q_n_tilde,
            q3_n_tilde,
            response,
        }
    }

    pub fn in_range(&self, s: &BigInt) -> bool {
        !s.is_negative() && s < &self.response
    }
}

/// Log a failed check, and pass the verdict through.
pub(crate) fn check(proof: ProofKind, name: &'static str, ok: bool) -> bool {
    if !ok {
        debug!(%proof, check = name, "proof check failed");
    }
    ok
}

/// Compute `Γ^m mod N^2`, with `Γ = N + 1`, for any integer `m`.
pub(crate) fn gamma_pow(ek: &EncryptionKey, m: &BigInt) -> BigInt {
    (BigInt::one() + m * ek.n()).mod_floor(ek.n_squared())
}

/// Compute `s * G - e * P`.
pub(crate) fn shifted_point(s: &BigInt, e: &BigInt, p: &AffinePoint) -> AffinePoint {
    (ProjectivePoint::GENERATOR * compat::int_to_scalar(s)
        - ProjectivePoint::from(*p) * compat::int_to_scalar(e))
    .to_affine()
}

/// Compute `s * G`.
pub(crate) fn base_point(s: &BigInt) -> AffinePoint {
    (ProjectivePoint::GENERATOR * compat::int_to_scalar(s)).to_affine()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::fixture;

    #[test]
    fn test_gamma_pow_matches_modpow() {
        let ek = &fixture().params.encryption_key;
        let gamma = ek.n() + BigInt::one();
        for m in [0i64, 1, 12345, -1, -999] {
            let m = BigInt::from(m);
            let expected = crate::math::pow_mod(&gamma, &m, ek.n_squared()).unwrap();
            assert_eq!(gamma_pow(ek, &m), expected);
        }
    }

    #[test]
    fn test_bounds() {
        let bounds = Bounds::new(&fixture().params.zk);
        assert!(bounds.in_range(&(&bounds.q3 + &bounds.q * &bounds.q)));
        assert!(!bounds.in_range(&bounds.response));
        assert!(!bounds.in_range(&BigInt::from(-1i32)));
    }
}
