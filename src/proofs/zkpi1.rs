//! Proves that a pair of ciphertexts is consistent with one small secret.
//!
//! The statement is `(c1, c2, c3)` with `c2 = Enc(η; r)` and `c3 = c1^η`.
//! In signing, `c1` is the encrypted key, `c2` encrypts the party's share of
//! the nonce mask, and `c3` is the encrypted key scaled by that share.
use magikitten::Transcript;
use num_bigint::BigInt;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::{check, gamma_pow, Bounds};
use crate::compat;
use crate::error::ProofKind;
use crate::math;
use crate::paillier::Ciphertext;
use crate::params::ProtocolParameters;
use crate::serde::encode;

const STATEMENT_LABEL: &[u8] = b"zkp-i1 statement";
const COMMITMENT_LABEL: &[u8] = b"zkp-i1 commitment";
const CHALLENGE_LABEL: &[u8] = b"zkp-i1 challenge";

const KIND: ProofKind = ProofKind::Zkpi1;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Statement<'a> {
    pub c1: &'a Ciphertext,
    pub c2: &'a Ciphertext,
    pub c3: &'a Ciphertext,
}

#[derive(Clone, Copy)]
pub struct Witness<'a> {
    pub eta: &'a BigInt,
    pub r: &'a BigInt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub(crate) z: BigInt,
    pub(crate) u1: BigInt,
    pub(crate) u2: BigInt,
    pub(crate) v: BigInt,
    pub(crate) e: BigInt,
    pub(crate) s1: BigInt,
    pub(crate) s2: BigInt,
    pub(crate) s3: BigInt,
}

fn absorb_commitments(
    transcript: &mut Transcript,
    z: &BigInt,
    u1: &BigInt,
    u2: &BigInt,
    v: &BigInt,
) -> BigInt {
    transcript.message(COMMITMENT_LABEL, &encode(&(z, u1, u2, v)));
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
    let beta = math::sample_unit(rng, ek.n());
    let rho = math::sample_below(rng, &bounds.q_n_tilde);
    let gamma = math::sample_below(rng, &bounds.q3_n_tilde);

    let z = zk.commit(witness.eta, &rho);
    let u1 = gamma_pow(ek, &alpha) * beta.modpow(ek.n(), nn) % nn;
    let u2 = zk.commit(&alpha, &gamma);
    let v = statement.c1.as_int().modpow(&alpha, nn);

    let e = absorb_commitments(transcript, &z, &u1, &u2, &v);

    let s1 = &e * witness.eta + &alpha;
    let s2 = witness.r.modpow(&e, ek.n()) * &beta % ek.n();
    let s3 = &e * &rho + &gamma;

    Proof {
        z,
        u1,
        u2,
        v,
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
    let nn = ek.n_squared();
    let zk = &params.zk;
    let bounds = Bounds::new(zk);
    let neg_e = -&proof.e;

    if !check(KIND, "s1 range", bounds.in_range(&proof.s1)) {
        return false;
    }

    // Γ^s1 s2^N c2^-e
    let u1 = math::is_unit(&proof.s2, ek.n())
        .then(|| math::pow_mod(statement.c2.as_int(), &neg_e, nn))
        .flatten()
        .map(|c2_e| gamma_pow(ek, &proof.s1) * proof.s2.modpow(ek.n(), nn) * c2_e % nn);
    if !check(KIND, "u1", u1.as_ref() == Some(&proof.u1)) {
        return false;
    }

    // h1^s1 h2^s3 z^-e
    let u2 = zk
        .commit_signed(&proof.s1, &proof.s3)
        .zip(math::pow_mod(&proof.z, &neg_e, &zk.n_tilde))
        .map(|(a, b)| a * b % &zk.n_tilde);
    if !check(KIND, "u2", u2.as_ref() == Some(&proof.u2)) {
        return false;
    }

    // c1^s1 c3^-e
    let v = math::pow_mod(statement.c3.as_int(), &neg_e, nn)
        .map(|c3_e| statement.c1.as_int().modpow(&proof.s1, nn) * c3_e % nn);
    if !check(KIND, "v", v.as_ref() == Some(&proof.v)) {
        return false;
    }

    let e = absorb_commitments(transcript, &proof.z, &proof.u1, &proof.u2, &proof.v);
    check(KIND, "e", e == proof.e)
}
