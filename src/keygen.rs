//! Distributed key generation, which we call Lock-In.
//!
//! Every party samples a secret `x_i`, and publishes `Y_i = x_i * G` along
//! with `Enc(x_i)` under the shared Paillier key. The aggregate key is then:
//! ```text
//! Y = Σ Y_i
//! EncX = Σ Enc(x_i)
//! ```
//! Nobody ever learns `x = Σ x_i`, and `EncX` is never decrypted. Signing
//! works directly on the encrypted key instead.
//!
//! Each contribution is committed to before anything is revealed, so that no
//! party can choose its share after seeing the others.
use elliptic_curve::{sec1::ToEncodedPoint, Field};
use k256::{ecdsa::VerifyingKey, AffinePoint, ProjectivePoint, Scalar};
use magikitten::Transcript;
use rand_core::{CryptoRngCore, OsRng};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::commitment::{self, Commitment, Open};
use crate::compat;
use crate::crypto::keccak256;
use crate::error::{Error, ProofKind};
use crate::paillier::{Ciphertext, EncryptionKey};
use crate::params::ProtocolParameters;
use crate::participants::{ParticipantList, ParticipantMap};
use crate::proofs::keygen as zkp;
use crate::protocol::internal::{make_protocol, Context, SharedChannel};
use crate::protocol::{InitializationError, Participant, Protocol, ProtocolError};
use crate::serde::encode;
use crate::session::SessionId;
use crate::wire::{impl_wire_serde, Reader, WireError, WireFormat, Writer};

const LABEL: &[u8] = b"notary-mpc v0.1.0 lock-in";
const PROOF_LABEL: &[u8] = b"keygen proof";

/// The size of an address derived from the aggregate key.
pub const ADDRESS_LEN: usize = 20;

/// The transcript every party of a Lock-In session starts from.
pub fn transcript(session: &SessionId, participants: &ParticipantList) -> Transcript {
    let mut transcript = Transcript::new(LABEL);
    transcript.message(b"group", compat::NAME);
    transcript.message(b"session", session.as_bytes());
    transcript.message(b"participants", &encode(participants));
    transcript
}

/// The public part of a single party's key share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShareContribution {
    pub party: Participant,
    pub enc_x: Ciphertext,
    pub big_y: AffinePoint,
    pub commitment: Commitment,
    pub open: Open,
    pub proof: zkp::Proof,
}

/// A party's share of the key, along with what it publishes about it.
#[derive(Clone)]
pub struct PartyKeyShare {
    pub x_i: Scalar,
    pub contribution: KeyShareContribution,
}

fn committed_secrets(
    ek: &EncryptionKey,
    enc_x: &Ciphertext,
    big_y: &AffinePoint,
) -> Result<Vec<Vec<u8>>, Error> {
    Ok(vec![ek.ciphertext_bytes(enc_x)?, compat::point_to_bytes(big_y)])
}

/// Generate a fresh share, with its commitment and proof.
pub fn generate_share(
    rng: &mut impl CryptoRngCore,
    transcript: &Transcript,
    params: &ProtocolParameters,
    party: Participant,
) -> Result<PartyKeyShare, Error> {
    let ek = &params.encryption_key;

    let x_i = Scalar::random(&mut *rng);
    let x = compat::scalar_to_int(&x_i);
    let big_y = (ProjectivePoint::GENERATOR * x_i).to_affine();
    let (enc_x, r) = ek.encrypt(rng, &x)?;

    let (commitment, open) =
        commitment::commit(rng, &params.mpk, committed_secrets(ek, &enc_x, &big_y)?);

    let proof = zkp::prove(
        rng,
        &mut transcript.forked(PROOF_LABEL, &party.bytes()),
        params,
        zkp::Statement {
            big_y: &big_y,
            w: &enc_x,
        },
        zkp::Witness { x: &x, r: &r },
    );

    Ok(PartyKeyShare {
        x_i,
        contribution: KeyShareContribution {
            party,
            enc_x,
            big_y,
            commitment,
            open,
            proof,
        },
    })
}

/// Check the commitment and the proof inside of a contribution.
///
/// Either failure identifies the contributing party as faulty.
pub fn verify_contribution(
    transcript: &Transcript,
    params: &ProtocolParameters,
    contribution: &KeyShareContribution,
) -> Result<(), Error> {
    let party = contribution.party;
    let ek = &params.encryption_key;

    let opens = committed_secrets(ek, &contribution.enc_x, &contribution.big_y)
        .map_or(false, |secrets| secrets == contribution.open.secrets)
        && commitment::verify(&contribution.commitment, &contribution.open, &params.mpk);
    if !opens {
        error!(%party, "key share commitment failed to verify");
        return Err(Error::CommitmentVerificationFailed { party });
    }

    let statement = zkp::Statement {
        big_y: &contribution.big_y,
        w: &contribution.enc_x,
    };
    if !zkp::verify(
        &mut transcript.forked(PROOF_LABEL, &party.bytes()),
        params,
        statement,
        &contribution.proof,
    ) {
        error!(%party, "key share proof failed to verify");
        return Err(Error::ZkpVerificationFailed {
            party,
            proof: ProofKind::KeyGen,
        });
    }
    Ok(())
}

/// The jointly generated key.
///
/// The private key is only ever present in encrypted form, as `enc_x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateKey {
    pub big_y: AffinePoint,
    pub enc_x: Ciphertext,
}

impl AggregateKey {
    /// The public key, in the form ECDSA verification expects.
    pub fn verifying_key(&self) -> Result<VerifyingKey, Error> {
        VerifyingKey::from_affine(self.big_y)
            .map_err(|_| Error::Parameter("aggregate key is the identity".to_string()))
    }

    /// The last 20 bytes of the Keccak-256 hash of the uncompressed public key.
    pub fn address(&self) -> [u8; ADDRESS_LEN] {
        let encoded = self.big_y.to_encoded_point(false);
        // Skip the SEC1 tag byte.
        let digest = keccak256(&encoded.as_bytes()[1..]);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[digest.len() - ADDRESS_LEN..]);
        out
    }
}

impl WireFormat for AggregateKey {
    fn write_to(&self, w: &mut Writer) {
        w.point(&self.big_y);
        w.int(self.enc_x.as_int());
    }

    fn read_from(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            big_y: r.point()?,
            enc_x: Ciphertext::from_int(r.int()?),
        })
    }
}

impl_wire_serde!(AggregateKey);

/// Combine every party's verified contribution into the aggregate key.
pub fn aggregate(
    params: &ProtocolParameters,
    contributions: &[KeyShareContribution],
) -> Result<AggregateKey, Error> {
    let enc_x = params
        .encryption_key
        .sum(contributions.iter().map(|c| &c.enc_x))?
        .ok_or(Error::ThresholdNotMet {
            received: 0,
            expected: 1,
        })?;
    let big_y = contributions
        .iter()
        .fold(ProjectivePoint::IDENTITY, |acc, c| acc + ProjectivePoint::from(c.big_y))
        .to_affine();
    Ok(AggregateKey { big_y, enc_x })
}

/// The output of the Lock-In protocol.
#[derive(Debug, Clone)]
pub struct KeygenOutput {
    pub private_share: Scalar,
    pub key: AggregateKey,
}

#[instrument(skip_all, fields(party = %me), err(Debug))]
async fn do_keygen(
    mut chan: SharedChannel,
    params: &ProtocolParameters,
    participants: ParticipantList,
    me: Participant,
    session: SessionId,
) -> Result<KeygenOutput, ProtocolError> {
    let mut rng = OsRng;
    let transcript = transcript(&session, &participants);

    let share = generate_share(&mut rng, &transcript, params, me)?;

    let wait0 = chan.next_waitpoint();
    chan.send_many(wait0, &share.contribution.commitment).await;

    let mut commitments = ParticipantMap::new(&participants);
    commitments.put(me, share.contribution.commitment);
    while !commitments.full() {
        let (from, commitment): (_, Commitment) = chan.recv(wait0).await?;
        if !commitments.put(from, commitment) {
            warn!(%from, "ignoring repeated or unknown commitment");
        }
    }

    let wait1 = chan.next_waitpoint();
    chan.send_many(wait1, &share.contribution).await;

    let mut contributions = ParticipantMap::new(&participants);
    contributions.put(me, share.contribution.clone());
    while !contributions.full() {
        let (from, contribution): (_, KeyShareContribution) = chan.recv(wait1).await?;
        if !participants.contains(from) || contributions.contains(from) {
            warn!(%from, "ignoring repeated or unknown contribution");
            continue;
        }
        if contribution.party != from {
            return Err(ProtocolError::AssertionFailed(format!(
                "{from} sent a contribution labelled as {}",
                contribution.party
            )));
        }
        if contribution.commitment != commitments[from] {
            error!(party = %from, "revealed commitment differs from the broadcast one");
            return Err(Error::CommitmentVerificationFailed { party: from }.into());
        }
        verify_contribution(&transcript, params, &contribution)?;
        contributions.put(from, contribution);
    }

    let contributions = contributions
        .into_vec_or_none()
        .ok_or_else(|| ProtocolError::AssertionFailed("missing contributions".to_string()))?;
    let key = aggregate(params, &contributions)?;
    info!(address = %hex::encode(key.address()), "lock-in complete");

    Ok(KeygenOutput {
        private_share: share.x_i,
        key,
    })
}

/// Run the Lock-In protocol as one of the participants.
///
/// Every participant must contribute, there's no threshold here.
pub fn keygen<'a>(
    params: &'a ProtocolParameters,
    participants: &[Participant],
    me: Participant,
    session: SessionId,
) -> Result<impl Protocol<Output = KeygenOutput> + 'a, InitializationError> {
    if participants.len() < 2 {
        return Err(InitializationError::BadParameters(format!(
            "participant count cannot be < 2, found: {}",
            participants.len()
        )));
    };
    let participants = ParticipantList::new(participants).ok_or_else(|| {
        InitializationError::BadParameters("participant list cannot contain duplicates".to_string())
    })?;
    if !participants.contains(me) {
        return Err(InitializationError::BadParameters(
            "participant list must contain this participant".to_string(),
        ));
    }
    params
        .validate()
        .map_err(|e| InitializationError::BadParameters(e.to_string()))?;

    let ctx = Context::new();
    let fut = do_keygen(ctx.shared_channel(), params, participants, me, session);
    Ok(make_protocol(ctx, fut))
}
