//! Proves that a point and a ciphertext hide the same secret.
//!
//! Given `Y = x * G` and `w = Enc(x; r)`, this convinces the verifier that the
//! prover knows `x` and `r`, and that `x` is small, without revealing either.
use k256::AffinePoint;
use magikitten::Transcript;
use num_bigint::BigInt;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::{base_point, check, gamma_pow, shifted_point, Bounds};
use crate::compat;
use crate::error::ProofKind;
use crate::math;
use crate::paillier::Ciphertext;
use crate::params::ProtocolParameters;
use crate::serde::encode;

const STATEMENT_LABEL: &[u8] = b"keygen proof statement";
const COMMITMENT_LABEL: &[u8] = b"keygen proof commitment";
const CHALLENGE_LABEL: &[u8] = b"keygen proof challenge";

const KIND: ProofKind = ProofKind::KeyGen;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Statement<'a> {
    pub big_y: &'a AffinePoint,
    pub w: &'a Ciphertext,
}

#[derive(Clone, Copy)]
pub struct Witness<'a> {
    pub x: &'a BigInt,
    pub r: &'a BigInt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub(crate) z: BigInt,
    pub(crate) u1: AffinePoint,
    pub(crate) u2: Ciphertext,
    pub(crate) u3: BigInt,
    pub(crate) e: BigInt,
    pub(crate) s1: BigInt,
    pub(crate) s2: BigInt,
    pub(crate) s3: BigInt,
}

fn absorb_commitments(
    transcript: &mut Transcript,
    z: &BigInt,
    u1: &AffinePoint,
    u2: &Ciphertext,
    u3: &BigInt,
) -> BigInt {
    transcript.message(COMMITMENT_LABEL, &encode(&(z, u1, u2, u3)));
    compat::challenge(transcript, CHALLENGE_LABEL)
}

pub fn prove(
    rng: &mut impl CryptoRngCore,
    transcript: &mut Transcript,
    params: &ProtocolParameters,
    statement: Statement<'_>,
    witness: Witness<'_>,
) -> Proof {
    transcript.message(STATEMENT_LABEL, &encode(&statement));

    let ek = &params.encryption_key;
    let zk = &params.zk;
    let bounds = Bounds::new(zk);

    let alpha = math::sample_below(rng, &bounds.q3);
    let beta = math::sample_unit(rng, ek.n());
    let rho = math::sample_below(rng, &bounds.q_n_tilde);
    let gamma = math::sample_below(rng, &bounds.q3_n_tilde);

    let z = zk.commit(witness.x, &rho);
    let u1 = base_point(&alpha);
    let u2 = Ciphertext::from_int(
        (gamma_pow(ek, &alpha) * beta.modpow(ek.n(), ek.n_squared())) % ek.n_squared(),
    );
    let u3 = zk.commit(&alpha, &gamma);

    let e = absorb_commitments(transcript, &z, &u1, &u2, &u3);

    let s1 = &e * witness.x + &alpha;
    let s2 = (witness.r.modpow(&e, ek.n()) * &beta) % ek.n();
    let s3 = &e * &rho + &gamma;

    Proof {
        z,
        u1,
        u2,
        u3,
        e,
        s1,
        s2,
        s3,
    }
}

#[must_use]
pub fn verify(
    transcript: &mut Transcript,
    params: &ProtocolParameters,
    statement: Statement<'_>,
    proof: &Proof,
) -> bool {
    transcript.message(STATEMENT_LABEL, &encode(&statement));

    let ek = &params.encryption_key;
    let zk = &params.zk;
    let bounds = Bounds::new(zk);
    let neg_e = -&proof.e;

    if !check(KIND, "s1 range", bounds.in_range(&proof.s1)) {
        return false;
    }

    let u1 = shifted_point(&proof.s1, &proof.e, statement.big_y);
    if !check(KIND, "u1", u1 == proof.u1) {
        return false;
    }

    // Γ^s1 s2^N w^-e
    let u2 = math::is_unit(&proof.s2, ek.n())
        .then(|| math::pow_mod(statement.w.as_int(), &neg_e, ek.n_squared()))
        .flatten()
        .map(|w_e| {
            gamma_pow(ek, &proof.s1) * proof.s2.modpow(ek.n(), ek.n_squared()) * w_e
                % ek.n_squared()
        });
    if !check(KIND, "u2", u2.as_ref() == Some(proof.u2.as_int())) {
        return false;
    }

    // h1^s1 h2^s3 z^-e
    let u3 = zk
        .commit_signed(&proof.s1, &proof.s3)
        .zip(math::pow_mod(&proof.z, &neg_e, &zk.n_tilde))
        .map(|(a, b)| a * b % &zk.n_tilde);
    if !check(KIND, "u3", u3.as_ref() == Some(&proof.u3)) {
        return false;
    }

    let e = absorb_commitments(transcript, &proof.z, &proof.u1, &proof.u2, &proof.u3);
    check(KIND, "e", e == proof.e)
}

#[cfg(test)]
mod test {
    use num_traits::One;
    use rand_core::OsRng;

    use super::*;
    use crate::test::fixture;

    fn setup() -> (AffinePoint, Ciphertext, BigInt, BigInt) {
        let params = &fixture().params;
        let x = math::sample_below(&mut OsRng, &compat::order());
        let big_y = base_point(&x);
        let (w, r) = params.encryption_key.encrypt(&mut OsRng, &x).unwrap();
        (big_y, w, x, r)
    }

    #[test]
    fn test_valid_proof_verifies() {
        let params = &fixture().params;
        let (big_y, w, x, r) = setup();
        let statement = Statement { big_y: &big_y, w: &w };

        let transcript = Transcript::new(b"protocol");
        let proof = prove(
            &mut OsRng,
            &mut transcript.forked(b"party", &[1]),
            params,
            statement,
            Witness { x: &x, r: &r },
        );

        assert!(verify(
            &mut transcript.forked(b"party", &[1]),
            params,
            statement,
            &proof
        ));
        assert!(!verify(
            &mut transcript.forked(b"party", &[2]),
            params,
            statement,
            &proof
        ));
    }

    #[test]
    fn test_mutated_proofs_fail() {
        let params = &fixture().params;
        let (big_y, w, x, r) = setup();
        let statement = Statement { big_y: &big_y, w: &w };
        let transcript = Transcript::new(b"protocol");
        let proof = prove(
            &mut OsRng,
            &mut transcript.forked(b"party", &[1]),
            params,
            statement,
            Witness { x: &x, r: &r },
        );

        let one = BigInt::one();
        let mutations: Vec<Box<dyn Fn(&mut Proof)>> = vec![
            Box::new(|p| p.z += &one),
            Box::new(|p| p.u1 = base_point(&one)),
            Box::new(|p| p.u2 = Ciphertext::from_int(p.u2.as_int() + &one)),
            Box::new(|p| p.u3 += &one),
            Box::new(|p| p.e += &one),
            Box::new(|p| p.s1 += &one),
            Box::new(|p| p.s2 += &one),
            Box::new(|p| p.s3 += &one),
        ];
        for (i, mutate) in mutations.iter().enumerate() {
            let mut bad = proof.clone();
            mutate(&mut bad);
            assert!(
                !verify(&mut transcript.forked(b"party", &[1]), params, statement, &bad),
                "mutation {i} verified"
            );
        }
    }

    #[test]
    fn test_wrong_witness_fails() {
        let params = &fixture().params;
        let (big_y, w, x, r) = setup();
        let statement = Statement { big_y: &big_y, w: &w };
        let transcript = Transcript::new(b"protocol");

        let other = &x + BigInt::one();
        let proof = prove(
            &mut OsRng,
            &mut transcript.forked(b"party", &[1]),
            params,
            statement,
            Witness { x: &other, r: &r },
        );
        assert!(!verify(&mut transcript.forked(b"party", &[1]), params, statement, &proof));
    }
}
