//! Distributed signing, which we call Lock-Out.
//!
//! Signing never decrypts the aggregate key `EncX`. Instead, the parties
//! jointly build two ciphertexts, in two phases:
//!
//! 1. Each party samples `ρ_i` and publishes `u_i = Enc(ρ_i)` and
//!    `v_i = EncX * ρ_i`. Summing gives `u = Enc(ρ)` and `v = Enc(ρ x)`.
//! 2. Each party samples `k_i, c_i` and publishes `R_i = k_i * G` and
//!    `w_i = u * k_i + Enc(q c_i)`. Summing gives `R = k * G` and
//!    `w = Enc(k ρ + q c)`.
//!
//! Whoever holds the Paillier decryption key can then compute:
//! ```text
//! r = R.x
//! s = Dec(u * H + v * r) / Dec(w) = ρ (H + r x) / (k ρ) = (H + r x) / k
//! ```
//! which is an ordinary ECDSA signature under `Y`. The mask `q c` vanishes
//! mod `q`, and only hides `k ρ` from the decryptor.
use elliptic_curve::{ops::Invert, point::AffineCoordinates, scalar::IsHigh, Field};
use k256::{ecdsa::Signature, AffinePoint, ProjectivePoint, Scalar};
use magikitten::Transcript;
use rand_core::{CryptoRngCore, OsRng};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use subtle::ConditionallySelectable;
use tracing::{error, info, instrument, warn};

use crate::commitment::{self, Commitment, Open};
use crate::compat;
use crate::error::{Error, ProofKind};
use crate::keygen::AggregateKey;
use crate::math;
use crate::paillier::{Ciphertext, DecryptionKey, EncryptionKey};
use crate::params::ProtocolParameters;
use crate::participants::{ParticipantList, ParticipantMap};
use crate::proofs::{zkpi1, zkpi2};
use crate::protocol::internal::{make_protocol, Context, SharedChannel};
use crate::protocol::{InitializationError, Participant, Protocol, ProtocolError};
use crate::serde::encode;
use crate::session::SessionId;
use crate::wire::WireFormat;

const LABEL: &[u8] = b"notary-mpc v0.1.0 lock-out";
const ZKPI1_LABEL: &[u8] = b"zkp-i1";
const ZKPI2_LABEL: &[u8] = b"zkp-i2";

/// The size of a serialized [FullSignature].
pub const SIGNATURE_LEN: usize = 65;

/// Hash a message into the scalar that actually gets signed.
pub fn message_digest(message: &[u8]) -> Scalar {
    compat::scalar_hash(message)
}

/// Everything the parties need to agree on before signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRequest {
    pub session: SessionId,
    pub key: AggregateKey,
    pub digest: Scalar,
}

impl SigningRequest {
    pub fn new(session: SessionId, key: AggregateKey, message: &[u8]) -> Self {
        Self {
            session,
            key,
            digest: message_digest(message),
        }
    }

    /// The transcript every party of this signing session starts from.
    pub fn transcript(&self, participants: &ParticipantList) -> Transcript {
        let mut transcript = Transcript::new(LABEL);
        transcript.message(b"group", compat::NAME);
        transcript.message(b"session", self.session.as_bytes());
        transcript.message(b"participants", &encode(participants));
        transcript.message(b"key", &self.key.to_wire());
        transcript.message(b"digest", &self.digest.to_bytes());
        transcript
    }
}

/// A party's contribution to the first phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zkpi1Contribution {
    pub party: Participant,
    pub u_i: Ciphertext,
    pub v_i: Ciphertext,
    pub commitment: Commitment,
    pub open: Open,
    pub proof: zkpi1::Proof,
}

/// A party's contribution to the second phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zkpi2Contribution {
    pub party: Participant,
    pub big_r_i: AffinePoint,
    pub w_i: Ciphertext,
    pub commitment: Commitment,
    pub open: Open,
    pub proof: zkpi2::Proof,
}

/// The combined result of the first phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase1Output {
    pub u: Ciphertext,
    pub v: Ciphertext,
}

/// The combined result of the second phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase2Output {
    pub big_r: AffinePoint,
    pub w: Ciphertext,
}

fn check_open(
    party: Participant,
    open: &Open,
    expected: Result<Vec<Vec<u8>>, Error>,
    commitment: &Commitment,
    params: &ProtocolParameters,
) -> Result<(), Error> {
    let opens = expected.map_or(false, |secrets| secrets == open.secrets)
        && commitment::verify(commitment, open, &params.mpk);
    if !opens {
        error!(%party, "signing commitment failed to verify");
        return Err(Error::CommitmentVerificationFailed { party });
    }
    Ok(())
}

fn phase1_secrets(
    ek: &EncryptionKey,
    u_i: &Ciphertext,
    v_i: &Ciphertext,
) -> Result<Vec<Vec<u8>>, Error> {
    Ok(vec![ek.ciphertext_bytes(u_i)?, ek.ciphertext_bytes(v_i)?])
}

fn phase2_secrets(
    ek: &EncryptionKey,
    big_r_i: &AffinePoint,
    w_i: &Ciphertext,
) -> Result<Vec<Vec<u8>>, Error> {
    Ok(vec![compat::point_to_bytes(big_r_i), ek.ciphertext_bytes(w_i)?])
}

/// Create our contribution to the first phase.
pub fn phase1_contribution(
    rng: &mut impl CryptoRngCore,
    transcript: &Transcript,
    params: &ProtocolParameters,
    key: &AggregateKey,
    party: Participant,
) -> Result<Zkpi1Contribution, Error> {
    let ek = &params.encryption_key;
    let rho = math::sample_below(rng, &compat::order());
    let (u_i, r) = ek.encrypt(rng, &rho)?;
    let v_i = ek.mul(&key.enc_x, &rho)?;

    let (commitment, open) = commitment::commit(rng, &params.mpk, phase1_secrets(ek, &u_i, &v_i)?);

    let proof = zkpi1::prove(
        rng,
        &mut transcript.forked(ZKPI1_LABEL, &party.bytes()),
        params,
        zkpi1::Statement {
            c1: &key.enc_x,
            c2: &u_i,
            c3: &v_i,
        },
        zkpi1::Witness { eta: &rho, r: &r },
    );

    Ok(Zkpi1Contribution {
        party,
        u_i,
        v_i,
        commitment,
        open,
        proof,
    })
}

/// Check the commitment and proof of a first phase contribution.
pub fn verify_phase1(
    transcript: &Transcript,
    params: &ProtocolParameters,
    key: &AggregateKey,
    contribution: &Zkpi1Contribution,
) -> Result<(), Error> {
    let party = contribution.party;
    let ek = &params.encryption_key;
    check_open(
        party,
        &contribution.open,
        phase1_secrets(ek, &contribution.u_i, &contribution.v_i),
        &contribution.commitment,
        params,
    )?;

    let statement = zkpi1::Statement {
        c1: &key.enc_x,
        c2: &contribution.u_i,
        c3: &contribution.v_i,
    };
    if !zkpi1::verify(
        &mut transcript.forked(ZKPI1_LABEL, &party.bytes()),
        params,
        statement,
        &contribution.proof,
    ) {
        error!(%party, "zkp-i1 failed to verify");
        return Err(Error::ZkpVerificationFailed {
            party,
            proof: ProofKind::Zkpi1,
        });
    }
    Ok(())
}

/// Sum up every verified first phase contribution.
pub fn combine_phase1(
    params: &ProtocolParameters,
    contributions: &[Zkpi1Contribution],
) -> Result<Phase1Output, Error> {
    let ek = &params.encryption_key;
    let missing = Error::ThresholdNotMet {
        received: 0,
        expected: 1,
    };
    let u = ek.sum(contributions.iter().map(|c| &c.u_i))?;
    let v = ek.sum(contributions.iter().map(|c| &c.v_i))?;
    match (u, v) {
        (Some(u), Some(v)) => Ok(Phase1Output { u, v }),
        _ => Err(missing),
    }
}

/// Create our contribution to the second phase.
pub fn phase2_contribution(
    rng: &mut impl CryptoRngCore,
    transcript: &Transcript,
    params: &ProtocolParameters,
    phase1: &Phase1Output,
    party: Participant,
) -> Result<Zkpi2Contribution, Error> {
    let ek = &params.encryption_key;
    let q = compat::order();
    let k = math::sample_below(rng, &q);
    let c = math::sample_below(rng, &q);

    let big_r_i = (ProjectivePoint::GENERATOR * compat::int_to_scalar(&k)).to_affine();
    let (mask, r) = ek.encrypt(rng, &(&q * &c))?;
    let w_i = ek.add(&ek.mul(&phase1.u, &k)?, &mask)?;

    let (commitment, open) =
        commitment::commit(rng, &params.mpk, phase2_secrets(ek, &big_r_i, &w_i)?);

    let proof = zkpi2::prove(
        rng,
        &mut transcript.forked(ZKPI2_LABEL, &party.bytes()),
        params,
        zkpi2::Statement {
            big_r: &big_r_i,
            c1: &phase1.u,
            w: &w_i,
        },
        zkpi2::Witness {
            k: &k,
            c: &c,
            r: &r,
        },
    );

    Ok(Zkpi2Contribution {
        party,
        big_r_i,
        w_i,
        commitment,
        open,
        proof,
    })
}

/// Check the commitment and proof of a second phase contribution.
pub fn verify_phase2(
    transcript: &Transcript,
    params: &ProtocolParameters,
    phase1: &Phase1Output,
    contribution: &Zkpi2Contribution,
) -> Result<(), Error> {
    let party = contribution.party;
    let ek = &params.encryption_key;
    check_open(
        party,
        &contribution.open,
        phase2_secrets(ek, &contribution.big_r_i, &contribution.w_i),
        &contribution.commitment,
        params,
    )?;

    let statement = zkpi2::Statement {
        big_r: &contribution.big_r_i,
        c1: &phase1.u,
        w: &contribution.w_i,
    };
    if !zkpi2::verify(
        &mut transcript.forked(ZKPI2_LABEL, &party.bytes()),
        params,
        statement,
        &contribution.proof,
    ) {
        error!(%party, "zkp-i2 failed to verify");
        return Err(Error::ZkpVerificationFailed {
            party,
            proof: ProofKind::Zkpi2,
        });
    }
    Ok(())
}

/// Sum up every verified second phase contribution.
pub fn combine_phase2(
    params: &ProtocolParameters,
    contributions: &[Zkpi2Contribution],
) -> Result<Phase2Output, Error> {
    let w = params
        .encryption_key
        .sum(contributions.iter().map(|c| &c.w_i))?
        .ok_or(Error::ThresholdNotMet {
            received: 0,
            expected: 1,
        })?;
    let big_r = contributions
        .iter()
        .fold(ProjectivePoint::IDENTITY, |acc, c| {
            acc + ProjectivePoint::from(c.big_r_i)
        })
        .to_affine();
    Ok(Phase2Output { big_r, w })
}

/// Represents a signature with extra information, to support different variants of ECDSA.
///
/// Keeping the entire first point around lets us produce the recovery id,
/// which `ecrecover` style verifiers need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullSignature {
    /// This is the entire first point.
    pub big_r: AffinePoint,
    /// This is the second scalar, normalized to be in the lower range.
    pub s: Scalar,
}

impl FullSignature {
    /// The first scalar of the signature.
    pub fn r(&self) -> Scalar {
        compat::x_coordinate(&self.big_r)
    }

    #[must_use]
    pub fn verify(&self, public_key: &AffinePoint, msg_hash: &Scalar) -> bool {
        let r = self.r();
        let s_inv: Option<Scalar> = self.s.invert_vartime().into();
        let s_inv = match s_inv {
            Some(s_inv) if !bool::from(r.is_zero()) => s_inv,
            _ => return false,
        };
        let reproduced = (ProjectivePoint::GENERATOR * (*msg_hash * s_inv))
            + (ProjectivePoint::from(*public_key) * (r * s_inv));
        compat::x_coordinate(&reproduced.to_affine()) == r
    }

    /// Bit 0 is the parity of `R.y`, bit 1 is set if `R.x` was reduced mod `q`.
    pub fn recovery_id(&self) -> u8 {
        let y_odd = bool::from(self.big_r.y_is_odd());
        u8::from(y_odd) | (u8::from(compat::x_is_reduced(&self.big_r)) << 1)
    }

    /// Serialize as `r || s || recovery_id`.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..32].copy_from_slice(&self.r().to_bytes());
        out[32..64].copy_from_slice(&self.s.to_bytes());
        out[64] = self.recovery_id();
        out
    }

    /// The plain `(r, s)` signature.
    pub fn to_ecdsa(&self) -> Result<Signature, Error> {
        Signature::from_scalars(self.r(), self.s)
            .map_err(|_| Error::Parameter("signature scalars cannot be zero".to_string()))
    }
}

/// Turn the output of both phases into a signature, using the decryption key.
///
/// The result is normalized to a low `s`, and checked against the key before
/// being returned.
pub fn finalize(
    decryption_key: &DecryptionKey,
    request: &SigningRequest,
    phase1: &Phase1Output,
    phase2: &Phase2Output,
) -> Result<FullSignature, Error> {
    let ek = decryption_key.encryption_key();

    let mu = compat::int_to_scalar(&decryption_key.decrypt(&phase2.w)?);
    let r = compat::x_coordinate(&phase2.big_r);

    let hashed = ek.mul(&phase1.u, &compat::scalar_to_int(&request.digest))?;
    let keyed = ek.mul(&phase1.v, &compat::scalar_to_int(&r))?;
    let numerator = compat::int_to_scalar(&decryption_key.decrypt(&ek.add(&hashed, &keyed)?)?);

    let mu_inv: Option<Scalar> = mu.invert().into();
    let mu_inv = mu_inv.ok_or_else(|| {
        error!("nonce product is zero");
        Error::SignatureSelfCheckFailed
    })?;

    let mut s = numerator * mu_inv;
    let mut big_r = phase2.big_r;
    // Negating s corresponds to signing with -R instead, which flips the parity of R.y.
    let high = s.is_high();
    s.conditional_assign(&-s, high);
    big_r.conditional_assign(&-big_r, high);

    let sig = FullSignature { big_r, s };
    if !sig.verify(&request.key.big_y, &request.digest) {
        error!(session = %request.session, "assembled signature failed to verify");
        return Err(Error::SignatureSelfCheckFailed);
    }
    Ok(sig)
}

trait Contribution: Serialize + DeserializeOwned + Clone {
    fn party(&self) -> Participant;
    fn commitment(&self) -> &Commitment;
}

impl Contribution for Zkpi1Contribution {
    fn party(&self) -> Participant {
        self.party
    }

    fn commitment(&self) -> &Commitment {
        &self.commitment
    }
}

impl Contribution for Zkpi2Contribution {
    fn party(&self) -> Participant {
        self.party
    }

    fn commitment(&self) -> &Commitment {
        &self.commitment
    }
}

/// Commit to our contribution, then reveal it, collecting and checking everybody else's.
async fn exchange<T: Contribution>(
    chan: &mut SharedChannel,
    participants: &ParticipantList,
    me: Participant,
    mine: T,
    verify: impl Fn(&T) -> Result<(), Error>,
) -> Result<Vec<T>, ProtocolError> {
    let wait0 = chan.next_waitpoint();
    chan.send_many(wait0, mine.commitment()).await;

    let mut commitments = ParticipantMap::new(participants);
    commitments.put(me, *mine.commitment());
    while !commitments.full() {
        let (from, commitment): (_, Commitment) = chan.recv(wait0).await?;
        if !commitments.put(from, commitment) {
            warn!(%from, "ignoring repeated or unknown commitment");
        }
    }

    let wait1 = chan.next_waitpoint();
    chan.send_many(wait1, &mine).await;

    let mut contributions = ParticipantMap::new(participants);
    contributions.put(me, mine);
    while !contributions.full() {
        let (from, contribution): (_, T) = chan.recv(wait1).await?;
        if !participants.contains(from) || contributions.contains(from) {
            warn!(%from, "ignoring repeated or unknown contribution");
            continue;
        }
        if contribution.party() != from {
            return Err(ProtocolError::AssertionFailed(format!(
                "{from} sent a contribution labelled as {}",
                contribution.party()
            )));
        }
        if contribution.commitment() != &commitments[from] {
            error!(party = %from, "revealed commitment differs from the broadcast one");
            return Err(Error::CommitmentVerificationFailed { party: from }.into());
        }
        verify(&contribution)?;
        contributions.put(from, contribution);
    }

    contributions
        .into_vec_or_none()
        .ok_or_else(|| ProtocolError::AssertionFailed("missing contributions".to_string()))
}

#[instrument(skip_all, fields(party = %me, session = %request.session), err(Debug))]
async fn do_sign(
    mut chan: SharedChannel,
    params: &ProtocolParameters,
    participants: ParticipantList,
    me: Participant,
    request: SigningRequest,
    finalizer: Participant,
    decryption_key: Option<&DecryptionKey>,
) -> Result<FullSignature, ProtocolError> {
    let mut rng = OsRng;
    let transcript = request.transcript(&participants);

    let mine = phase1_contribution(&mut rng, &transcript, params, &request.key, me)?;
    let all = exchange(&mut chan, &participants, me, mine, |c| {
        verify_phase1(&transcript, params, &request.key, c)
    })
    .await?;
    let phase1 = combine_phase1(params, &all)?;

    let mine = phase2_contribution(&mut rng, &transcript, params, &phase1, me)?;
    let all = exchange(&mut chan, &participants, me, mine, |c| {
        verify_phase2(&transcript, params, &phase1, c)
    })
    .await?;
    let phase2 = combine_phase2(params, &all)?;

    let ours = decryption_key
        .map(|dk| finalize(dk, &request, &phase1, &phase2))
        .transpose()?;

    let wait_sig = chan.next_waitpoint();
    if me == finalizer {
        let sig = ours.ok_or_else(|| {
            ProtocolError::AssertionFailed("finalizer has no decryption key".to_string())
        })?;
        chan.send_many(wait_sig, &sig).await;
        info!("lock-out complete");
        return Ok(sig);
    }

    loop {
        let (from, sig): (_, FullSignature) = chan.recv(wait_sig).await?;
        if from != finalizer {
            warn!(%from, "ignoring signature from a party other than the finalizer");
            continue;
        }
        if !sig.verify(&request.key.big_y, &request.digest) {
            return Err(ProtocolError::AssertionFailed(format!(
                "signature from {from} failed to verify"
            )));
        }
        if ours.map_or(false, |ours| ours != sig) {
            return Err(ProtocolError::AssertionFailed(format!(
                "signature from {from} differs from ours"
            )));
        }
        info!("lock-out complete");
        return Ok(sig);
    }
}

/// Run the Lock-Out protocol as one of the participants.
///
/// The participants must be exactly the ones who ran Lock-In for this key.
/// The `finalizer` decrypts and broadcasts the signature, so it needs the
/// decryption key. Other parties holding the key compute the signature on
/// their own too, and check that it matches.
pub fn sign<'a>(
    params: &'a ProtocolParameters,
    participants: &[Participant],
    me: Participant,
    request: SigningRequest,
    finalizer: Participant,
    decryption_key: Option<&'a DecryptionKey>,
) -> Result<impl Protocol<Output = FullSignature> + 'a, InitializationError> {
    if participants.len() < 2 {
        return Err(InitializationError::BadParameters(format!(
            "participant count cannot be < 2, found: {}",
            participants.len()
        )));
    };
    let participants = ParticipantList::new(participants).ok_or_else(|| {
        InitializationError::BadParameters("participant list cannot contain duplicates".to_string())
    })?;
    if !participants.contains(me) || !participants.contains(finalizer) {
        return Err(InitializationError::BadParameters(
            "participant list must contain this participant and the finalizer".to_string(),
        ));
    }
    if me == finalizer && decryption_key.is_none() {
        return Err(InitializationError::BadParameters(
            "the finalizer needs the decryption key".to_string(),
        ));
    }
    if decryption_key.map_or(false, |dk| dk.encryption_key() != &params.encryption_key) {
        return Err(InitializationError::BadParameters(
            "decryption key does not match the parameters".to_string(),
        ));
    }
    params
        .validate()
        .map_err(|e| InitializationError::BadParameters(e.to_string()))?;
    params
        .encryption_key
        .validate(&request.key.enc_x)
        .map_err(|e| InitializationError::BadParameters(e.to_string()))?;

    let ctx = Context::new();
    let fut = do_sign(
        ctx.shared_channel(),
        params,
        participants,
        me,
        request,
        finalizer,
        decryption_key,
    );
    Ok(make_protocol(ctx, fut))
}

#[cfg(test)]
mod test {
    use k256::ecdsa::{RecoveryId, VerifyingKey};

    use super::*;
    use crate::test::{fixture, run_keygen};

    fn participants() -> Vec<Participant> {
        (0..3u32).map(Participant::from).collect()
    }

    fn request(message: &[u8]) -> Result<SigningRequest, ProtocolError> {
        let params = &fixture().params;
        let keygen = run_keygen(params, &participants())?;
        Ok(SigningRequest::new(
            SessionId::random(&mut OsRng),
            keygen[0].1.key.clone(),
            message,
        ))
    }

    /// Run both phases locally, as a single party holding every share would.
    fn local_phases(request: &SigningRequest) -> Result<(Phase1Output, Phase2Output), Error> {
        let params = &fixture().params;
        let list = ParticipantList::new(&participants()).expect("participants are distinct");
        let transcript = request.transcript(&list);

        let mut ones = Vec::new();
        for p in list.iter() {
            let c = phase1_contribution(&mut OsRng, &transcript, params, &request.key, p)?;
            verify_phase1(&transcript, params, &request.key, &c)?;
            ones.push(c);
        }
        let phase1 = combine_phase1(params, &ones)?;

        let mut twos = Vec::new();
        for p in list.iter() {
            let c = phase2_contribution(&mut OsRng, &transcript, params, &phase1, p)?;
            verify_phase2(&transcript, params, &phase1, &c)?;
            twos.push(c);
        }
        let phase2 = combine_phase2(params, &twos)?;
        Ok((phase1, phase2))
    }

    #[test]
    fn test_finalized_signature_recovers_the_key() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = fixture();
        let request = request(b"hello")?;
        let (phase1, phase2) = local_phases(&request)?;
        let sig = finalize(&fixture.decryption_key, &request, &phase1, &phase2)?;

        assert!(!bool::from(sig.s.is_high()));
        let ecdsa = sig.to_ecdsa()?;
        let recovered = VerifyingKey::recover_from_prehash(
            &request.digest.to_bytes(),
            &ecdsa,
            RecoveryId::from_byte(sig.recovery_id()).ok_or("bad recovery id")?,
        )
        .map_err(|_| "public key recovery failed")?;
        assert_eq!(recovered, request.key.verifying_key()?);
        Ok(())
    }

    #[test]
    fn test_tampered_phase1_proof_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let params = &fixture().params;
        let request = request(b"aaa")?;
        let list = ParticipantList::new(&participants()).ok_or("duplicate participants")?;
        let transcript = request.transcript(&list);

        let mut c = phase1_contribution(
            &mut OsRng,
            &transcript,
            params,
            &request.key,
            Participant::from(1u32),
        )?;
        c.proof.e += num_bigint::BigInt::from(1u32);
        assert!(matches!(
            verify_phase1(&transcript, params, &request.key, &c),
            Err(Error::ZkpVerificationFailed {
                proof: ProofKind::Zkpi1,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn test_commitment_must_match_revealed_values() -> Result<(), Box<dyn std::error::Error>> {
        let params = &fixture().params;
        let request = request(b"aaa")?;
        let (phase1, _) = local_phases(&request)?;
        let list = ParticipantList::new(&participants()).ok_or("duplicate participants")?;
        let transcript = request.transcript(&list);

        let mut c = phase2_contribution(
            &mut OsRng,
            &transcript,
            params,
            &phase1,
            Participant::from(2u32),
        )?;
        c.big_r_i = AffinePoint::GENERATOR;
        assert!(matches!(
            verify_phase2(&transcript, params, &phase1, &c),
            Err(Error::CommitmentVerificationFailed { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_signature_bytes() {
        let sig = FullSignature {
            big_r: AffinePoint::GENERATOR,
            s: Scalar::ONE,
        };
        let bytes = sig.to_bytes();
        assert_eq!(bytes[..32], compat::x_coordinate(&AffinePoint::GENERATOR).to_bytes()[..]);
        assert_eq!(bytes[32..64], Scalar::ONE.to_bytes()[..]);
        // The generator has an even y coordinate.
        assert_eq!(bytes[64], 0);
        let flipped = FullSignature {
            big_r: -AffinePoint::GENERATOR,
            ..sig
        };
        assert_eq!(flipped.recovery_id(), 1);
    }

    #[test]
    fn test_sign_rejects_bad_arguments() -> Result<(), ProtocolError> {
        let params = &fixture().params;
        let request = request(b"aaa")?;
        let ps = participants();
        assert!(sign(params, &ps, ps[0], request.clone(), ps[0], None).is_err());
        assert!(sign(
            params,
            &ps,
            ps[0],
            request,
            Participant::from(9u32),
            Some(&fixture().decryption_key)
        )
        .is_err());
        Ok(())
    }
}
