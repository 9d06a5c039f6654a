//! Proves that a nonce point and a masked ciphertext use the same nonce.
//!
//! The statement is `(R, c1, w)` with `R = k * G` and
//! `w = c1^k * Enc(q * c; r)`, where the witness is `(k, c, r)`. The mask
//! `q * c` vanishes mod `q`, so it hides `k * ρ` without changing the signature.
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

const STATEMENT_LABEL: &[u8] = b"zkp-i2 statement";
const COMMITMENT_LABEL: &[u8] = b"zkp-i2 commitment";
const CHALLENGE_LABEL: &[u8] = b"zkp-i2 challenge";

const KIND: ProofKind = ProofKind::Zkpi2;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Statement<'a> {
    pub big_r: &'a AffinePoint,
    pub c1: &'a Ciphertext,
    pub w: &'a Ciphertext,
}

#[derive(Clone, Copy)]
pub struct Witness<'a> {
    pub k: &'a BigInt,
    pub c: &'a BigInt,
    pub r: &'a BigInt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub(crate) z1: BigInt,
    pub(crate) z2: BigInt,
    pub(crate) u1: AffinePoint,
    pub(crate) u3: BigInt,
    pub(crate) v1: BigInt,
    pub(crate) v3: BigInt,
    pub(crate) e: BigInt,
    pub(crate) s1: BigInt,
    pub(crate) s2: BigInt,
    pub(crate) t1: BigInt,
    pub(crate) t2: BigInt,
    pub(crate) t3: BigInt,
}

/// The values the prover commits to before the challenge.
#[derive(Serialize)]
struct Commitments<'a> {
    z1: &'a BigInt,
    z2: &'a BigInt,
    u1: &'a AffinePoint,
    u3: &'a BigInt,
    v1: &'a BigInt,
    v3: &'a BigInt,
}

impl<'a> From<&'a Proof> for Commitments<'a> {
    fn from(p: &'a Proof) -> Self {
        Self {
            z1: &p.z1,
            z2: &p.z2,
            u1: &p.u1,
            u3: &p.u3,
            v1: &p.v1,
            v3: &p.v3,
        }
    }
}

fn absorb_commitments(transcript: &mut Transcript, commitments: Commitments<'_>) -> BigInt {
    transcript.message(COMMITMENT_LABEL, &encode(&commitments));
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
    let nn = ek.n_squared();
    let zk = &params.zk;
    let bounds = Bounds::new(zk);

    let alpha = math::sample_below(rng, &bounds.q3);
    let delta = math::sample_below(rng, &bounds.q3);
    let rho1 = math::sample_below(rng, &bounds.q_n_tilde);
    let rho2 = math::sample_below(rng, &bounds.q_n_tilde);
    let gamma = math::sample_below(rng, &bounds.q3_n_tilde);
    let nu = math::sample_below(rng, &bounds.q3_n_tilde);
    let mu = math::sample_unit(rng, ek.n());

    let z1 = zk.commit(witness.k, &rho1);
    let z2 = zk.commit(witness.c, &rho2);
    let u1 = base_point(&alpha);
    let u3 = zk.commit(&alpha, &gamma);
    let v1 = statement.c1.as_int().modpow(&alpha, nn)
        * gamma_pow(ek, &(&bounds.q * &delta))
        * mu.modpow(ek.n(), nn)
        % nn;
    let v3 = zk.commit(&delta, &nu);

    let e = absorb_commitments(
        transcript,
        Commitments {
            z1: &z1,
            z2: &z2,
            u1: &u1,
            u3: &u3,
            v1: &v1,
            v3: &v3,
        },
    );

    let s1 = &e * witness.k + &alpha;
    let s2 = &e * &rho1 + &gamma;
    let t1 = &e * witness.c + &delta;
    let t2 = &e * &rho2 + &nu;
    let t3 = witness.r.modpow(&e, ek.n()) * &mu % ek.n();

    Proof {
        z1,
        z2,
        u1,
        u3,
        v1,
        v3,
        e,
        s1,
        s2,
        t1,
        t2,
        t3,
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
    let nn = ek.n_squared();
    let zk = &params.zk;
    let bounds = Bounds::new(zk);
    let neg_e = -&proof.e;

    if !check(KIND, "s1 range", bounds.in_range(&proof.s1))
        || !check(KIND, "t1 range", bounds.in_range(&proof.t1))
    {
        return false;
    }

    let u1 = shifted_point(&proof.s1, &proof.e, statement.big_r);
    if !check(KIND, "u1", u1 == proof.u1) {
        return false;
    }

    // h1^s1 h2^s2 z1^-e
    let u3 = zk
        .commit_signed(&proof.s1, &proof.s2)
        .zip(math::pow_mod(&proof.z1, &neg_e, &zk.n_tilde))
        .map(|(a, b)| a * b % &zk.n_tilde);
    if !check(KIND, "u3", u3.as_ref() == Some(&proof.u3)) {
        return false;
    }

    // c1^s1 Γ^(q t1) t3^N w^-e
    let v1 = math::is_unit(&proof.t3, ek.n())
        .then(|| math::pow_mod(statement.w.as_int(), &neg_e, nn))
        .flatten()
        .map(|w_e| {
            statement.c1.as_int().modpow(&proof.s1, nn)
                * gamma_pow(ek, &(&bounds.q * &proof.t1))
                * proof.t3.modpow(ek.n(), nn)
                * w_e
                % nn
        });
    if !check(KIND, "v1", v1.as_ref() == Some(&proof.v1)) {
        return false;
    }

    // h1^t1 h2^t2 z2^-e
    let v3 = zk
        .commit_signed(&proof.t1, &proof.t2)
        .zip(math::pow_mod(&proof.z2, &neg_e, &zk.n_tilde))
        .map(|(a, b)| a * b % &zk.n_tilde);
    if !check(KIND, "v3", v3.as_ref() == Some(&proof.v3)) {
        return false;
    }

    let e = absorb_commitments(transcript, Commitments::from(proof));
    check(KIND, "e", e == proof.e)
}

#[cfg(test)]
mod test {
    use num_traits::One;
    use rand_core::OsRng;

    use super::*;
    use crate::test::fixture;

    struct Setup {
        big_r: AffinePoint,
        c1: Ciphertext,
        w: Ciphertext,
        k: BigInt,
        c: BigInt,
        r: BigInt,
    }

    fn setup() -> Setup {
        let ek = &fixture().params.encryption_key;
        let q = compat::order();
        let (c1, _) = ek.encrypt(&mut OsRng, &math::sample_below(&mut OsRng, &q)).unwrap();
        let k = math::sample_below(&mut OsRng, &q);
        let c = math::sample_below(&mut OsRng, &q);
        let big_r = base_point(&k);
        let (mask, r) = ek.encrypt(&mut OsRng, &(&q * &c)).unwrap();
        let w = ek.add(&ek.mul(&c1, &k).unwrap(), &mask).unwrap();
        Setup {
            big_r,
            c1,
            w,
            k,
            c,
            r,
        }
    }

    fn prove_and_verify(s: &Setup, mutate: impl Fn(&mut Proof)) -> bool {
        let params = &fixture().params;
        let statement = Statement {
            big_r: &s.big_r,
            c1: &s.c1,
            w: &s.w,
        };
        let transcript = Transcript::new(b"protocol");
        let mut proof = prove(
            &mut OsRng,
            &mut transcript.forked(b"party", &[1]),
            params,
            statement,
            Witness {
                k: &s.k,
                c: &s.c,
                r: &s.r,
            },
        );
        mutate(&mut proof);
        verify(
            &mut transcript.forked(b"party", &[1]),
            params,
            statement,
            &proof,
        )
    }

    #[test]
    fn test_valid_proof_verifies() {
        assert!(prove_and_verify(&setup(), |_| {}));
    }

    #[test]
    fn test_mutated_proofs_fail() {
        let s = setup();
        let one = BigInt::one();
        assert!(!prove_and_verify(&s, |p| p.z1 += &one));
        assert!(!prove_and_verify(&s, |p| p.z2 += &one));
        assert!(!prove_and_verify(&s, |p| p.u1 = base_point(&one)));
        assert!(!prove_and_verify(&s, |p| p.u3 += &one));
        assert!(!prove_and_verify(&s, |p| p.v1 += &one));
        assert!(!prove_and_verify(&s, |p| p.v3 += &one));
        assert!(!prove_and_verify(&s, |p| p.e += &one));
        assert!(!prove_and_verify(&s, |p| p.s1 += &one));
        assert!(!prove_and_verify(&s, |p| p.s2 += &one));
        assert!(!prove_and_verify(&s, |p| p.t1 += &one));
        assert!(!prove_and_verify(&s, |p| p.t2 += &one));
        assert!(!prove_and_verify(&s, |p| p.t3 += &one));
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let mut s = setup();
        s.big_r = base_point(&(&s.k + BigInt::one()));
        assert!(!prove_and_verify(&s, |_| {}));
    }
}
