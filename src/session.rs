//! Sessions which collect contributions one at a time.
//!
//! These are the same protocols as [crate::keygen::keygen] and [crate::sign::sign],
//! but for callers who move contributions around themselves, for example a
//! service which receives them over some API. Every contribution is checked
//! as soon as it arrives, and the aggregate for a phase is only computed once
//! every participant has contributed.
//!
//! A failed commitment or proof check aborts the session for good.
use std::collections::BTreeMap;
use std::fmt;

use magikitten::Transcript;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Error;
use crate::keygen::{self, AggregateKey, KeyShareContribution};
use crate::paillier::DecryptionKey;
use crate::params::ProtocolParameters;
use crate::participants::ParticipantList;
use crate::protocol::Participant;
use crate::sign::{
    self, FullSignature, Phase1Output, Phase2Output, SigningRequest, Zkpi1Contribution,
    Zkpi2Contribution,
};

pub const SESSION_ID_LEN: usize = 32;

/// Identifies a single run of Lock-In or Lock-Out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId([u8; SESSION_ID_LEN]);

impl SessionId {
    pub fn random(rng: &mut impl CryptoRngCore) -> Self {
        let mut bytes = [0u8; SESSION_ID_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SESSION_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Where a session stands after accepting a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Waiting { received: usize, expected: usize },
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Collecting,
    Finalized,
    Aborted,
}

impl SessionState {
    fn ensure_collecting(self) -> Result<(), Error> {
        match self {
            SessionState::Collecting => Ok(()),
            SessionState::Finalized => Err(Error::SessionFinalized),
            SessionState::Aborted => Err(Error::SessionAborted),
        }
    }
}

fn participant_list(participants: &[Participant]) -> Result<ParticipantList, Error> {
    if participants.len() < 2 {
        return Err(Error::Parameter(format!(
            "participant count cannot be < 2, found: {}",
            participants.len()
        )));
    }
    ParticipantList::new(participants)
        .ok_or_else(|| Error::Parameter("participant list cannot contain duplicates".to_string()))
}

/// Check that a party may contribute to a phase, without changing anything.
fn admit<T>(
    participants: &ParticipantList,
    received: &BTreeMap<Participant, T>,
    party: Participant,
) -> Result<(), Error> {
    if !participants.contains(party) {
        warn!(%party, "contribution from an unknown party");
        return Err(Error::UnknownParty { party });
    }
    if received.contains_key(&party) {
        warn!(%party, "duplicate contribution");
        return Err(Error::DuplicateContribution { party });
    }
    Ok(())
}

fn progress<T>(participants: &ParticipantList, received: &BTreeMap<Participant, T>) -> Progress {
    if received.len() == participants.len() {
        Progress::Complete
    } else {
        Progress::Waiting {
            received: received.len(),
            expected: participants.len(),
        }
    }
}

/// A Lock-In session.
pub struct KeygenSession {
    id: SessionId,
    participants: ParticipantList,
    transcript: Transcript,
    contributions: BTreeMap<Participant, KeyShareContribution>,
    key: Option<AggregateKey>,
    state: SessionState,
}

impl KeygenSession {
    pub fn new(id: SessionId, participants: &[Participant]) -> Result<Self, Error> {
        let participants = participant_list(participants)?;
        let transcript = keygen::transcript(&id, &participants);
        Ok(Self {
            id,
            participants,
            transcript,
            contributions: BTreeMap::new(),
            key: None,
            state: SessionState::Collecting,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn participants(&self) -> &ParticipantList {
        &self.participants
    }

    /// The transcript contributions to this session must be proven against.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check and record a contribution.
    ///
    /// The last contribution finalizes the session, producing the aggregate key.
    pub fn add_contribution(
        &mut self,
        params: &ProtocolParameters,
        contribution: KeyShareContribution,
    ) -> Result<Progress, Error> {
        self.add_contribution_with(params, contribution, |_, _| Ok(()))
    }

    /// Like [Self::add_contribution], calling `persist` once the contribution is
    /// checked, with the aggregate key if it completes the session.
    ///
    /// If `persist` fails, the session is left exactly as it was.
    pub fn add_contribution_with(
        &mut self,
        params: &ProtocolParameters,
        contribution: KeyShareContribution,
        persist: impl FnOnce(&KeyShareContribution, Option<&AggregateKey>) -> Result<(), Error>,
    ) -> Result<Progress, Error> {
        self.state.ensure_collecting()?;
        admit(&self.participants, &self.contributions, contribution.party)?;

        if let Err(e) = keygen::verify_contribution(&self.transcript, params, &contribution) {
            if e.is_fatal() {
                self.state = SessionState::Aborted;
            }
            return Err(e);
        }

        let key = if self.contributions.len() + 1 == self.participants.len() {
            let mut all: Vec<_> = self.contributions.values().cloned().collect();
            all.push(contribution.clone());
            Some(keygen::aggregate(params, &all)?)
        } else {
            None
        };
        persist(&contribution, key.as_ref())?;

        self.contributions.insert(contribution.party, contribution);
        if let Some(key) = key {
            info!(session = %self.id, address = %hex::encode(key.address()), "lock-in complete");
            self.key = Some(key);
            self.state = SessionState::Finalized;
        }
        Ok(progress(&self.participants, &self.contributions))
    }

    /// The aggregate key, once every party has contributed.
    pub fn key(&self) -> Result<&AggregateKey, Error> {
        self.key.as_ref().ok_or(Error::ThresholdNotMet {
            received: self.contributions.len(),
            expected: self.participants.len(),
        })
    }
}

/// Which contributions a signing session is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningPhase {
    Zkpi1,
    Zkpi2,
    Finalize,
}

/// A Lock-Out session.
pub struct SigningSession {
    request: SigningRequest,
    participants: ParticipantList,
    transcript: Transcript,
    phase1: BTreeMap<Participant, Zkpi1Contribution>,
    phase1_output: Option<Phase1Output>,
    phase2: BTreeMap<Participant, Zkpi2Contribution>,
    phase2_output: Option<Phase2Output>,
    signature: Option<FullSignature>,
    state: SessionState,
}

impl SigningSession {
    /// Start signing, with the same participants as the Lock-In which produced the key.
    pub fn new(request: SigningRequest, participants: &[Participant]) -> Result<Self, Error> {
        let participants = participant_list(participants)?;
        let transcript = request.transcript(&participants);
        Ok(Self {
            request,
            participants,
            transcript,
            phase1: BTreeMap::new(),
            phase1_output: None,
            phase2: BTreeMap::new(),
            phase2_output: None,
            signature: None,
            state: SessionState::Collecting,
        })
    }

    pub fn request(&self) -> &SigningRequest {
        &self.request
    }

    pub fn participants(&self) -> &ParticipantList {
        &self.participants
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn phase(&self) -> SigningPhase {
        match (&self.phase1_output, &self.phase2_output) {
            (None, _) => SigningPhase::Zkpi1,
            (Some(_), None) => SigningPhase::Zkpi2,
            (Some(_), Some(_)) => SigningPhase::Finalize,
        }
    }

    /// The sums from the first phase, which second phase contributions build on.
    pub fn phase1_output(&self) -> Option<&Phase1Output> {
        self.phase1_output.as_ref()
    }

    pub fn signature(&self) -> Option<&FullSignature> {
        self.signature.as_ref()
    }

    fn fail(&mut self, e: Error) -> Error {
        if e.is_fatal() {
            self.state = SessionState::Aborted;
        }
        e
    }

    pub fn add_zkpi1(
        &mut self,
        params: &ProtocolParameters,
        contribution: Zkpi1Contribution,
    ) -> Result<Progress, Error> {
        self.add_zkpi1_with(params, contribution, |_| Ok(()))
    }

    /// Like [Self::add_zkpi1], calling `persist` once the contribution is checked.
    ///
    /// If `persist` fails, the session is left exactly as it was.
    pub fn add_zkpi1_with(
        &mut self,
        params: &ProtocolParameters,
        contribution: Zkpi1Contribution,
        persist: impl FnOnce(&Zkpi1Contribution) -> Result<(), Error>,
    ) -> Result<Progress, Error> {
        self.state.ensure_collecting()?;
        if self.phase() != SigningPhase::Zkpi1 {
            return Err(Error::UnexpectedPhase);
        }
        admit(&self.participants, &self.phase1, contribution.party)?;

        sign::verify_phase1(&self.transcript, params, &self.request.key, &contribution)
            .map_err(|e| self.fail(e))?;

        let output = if self.phase1.len() + 1 == self.participants.len() {
            let mut all: Vec<_> = self.phase1.values().cloned().collect();
            all.push(contribution.clone());
            Some(sign::combine_phase1(params, &all)?)
        } else {
            None
        };
        persist(&contribution)?;

        self.phase1.insert(contribution.party, contribution);
        if output.is_some() {
            self.phase1_output = output;
        }
        Ok(progress(&self.participants, &self.phase1))
    }

    pub fn add_zkpi2(
        &mut self,
        params: &ProtocolParameters,
        contribution: Zkpi2Contribution,
    ) -> Result<Progress, Error> {
        self.add_zkpi2_with(params, contribution, |_| Ok(()))
    }

    /// Like [Self::add_zkpi2], calling `persist` once the contribution is checked.
    ///
    /// If `persist` fails, the session is left exactly as it was.
    pub fn add_zkpi2_with(
        &mut self,
        params: &ProtocolParameters,
        contribution: Zkpi2Contribution,
        persist: impl FnOnce(&Zkpi2Contribution) -> Result<(), Error>,
    ) -> Result<Progress, Error> {
        self.state.ensure_collecting()?;
        let phase1 = match (&self.phase1_output, self.phase()) {
            (Some(phase1), SigningPhase::Zkpi2) => phase1,
            _ => return Err(Error::UnexpectedPhase),
        };
        admit(&self.participants, &self.phase2, contribution.party)?;

        let verified = sign::verify_phase2(&self.transcript, params, phase1, &contribution);
        verified.map_err(|e| self.fail(e))?;

        let output = if self.phase2.len() + 1 == self.participants.len() {
            let mut all: Vec<_> = self.phase2.values().cloned().collect();
            all.push(contribution.clone());
            Some(sign::combine_phase2(params, &all)?)
        } else {
            None
        };
        persist(&contribution)?;

        self.phase2.insert(contribution.party, contribution);
        if output.is_some() {
            self.phase2_output = output;
        }
        Ok(progress(&self.participants, &self.phase2))
    }

    /// Decrypt the gathered ciphertexts into a signature.
    ///
    /// This succeeds at most once.
    pub fn finalize(
        &mut self,
        params: &ProtocolParameters,
        decryption_key: &DecryptionKey,
    ) -> Result<FullSignature, Error> {
        self.finalize_with(params, decryption_key, |_| Ok(()))
    }

    /// Like [Self::finalize], calling `persist` with the signature before the
    /// session is marked as finalized.
    ///
    /// If `persist` fails, the session stays open, and finalizing can be retried.
    pub fn finalize_with(
        &mut self,
        params: &ProtocolParameters,
        decryption_key: &DecryptionKey,
        persist: impl FnOnce(&FullSignature) -> Result<(), Error>,
    ) -> Result<FullSignature, Error> {
        self.state.ensure_collecting()?;
        if decryption_key.encryption_key() != &params.encryption_key {
            return Err(Error::Parameter(
                "decryption key does not match the parameters".to_string(),
            ));
        }
        let (phase1, phase2) = match (&self.phase1_output, &self.phase2_output) {
            (Some(phase1), Some(phase2)) => (phase1, phase2),
            (None, _) => {
                return Err(Error::ThresholdNotMet {
                    received: self.phase1.len(),
                    expected: self.participants.len(),
                })
            }
            (Some(_), None) => {
                return Err(Error::ThresholdNotMet {
                    received: self.phase2.len(),
                    expected: self.participants.len(),
                })
            }
        };

        match sign::finalize(decryption_key, &self.request, phase1, phase2) {
            Ok(sig) => {
                persist(&sig)?;
                info!(session = %self.request.session, "lock-out complete");
                self.signature = Some(sig);
                self.state = SessionState::Finalized;
                Ok(sig)
            }
            Err(Error::SignatureSelfCheckFailed) => {
                self.state = SessionState::Aborted;
                Err(Error::SignatureSelfCheckFailed)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use num_bigint::BigInt;
    use rand_core::OsRng;

    use super::*;
    use crate::error::ProofKind;
    use crate::test::fixture;

    fn participants() -> Vec<Participant> {
        (0..3u32).map(Participant::from).collect()
    }

    fn finished_keygen() -> Result<KeygenSession, Error> {
        let params = &fixture().params;
        let mut session = KeygenSession::new(SessionId::random(&mut OsRng), &participants())?;
        for p in participants() {
            let share = keygen::generate_share(&mut OsRng, session.transcript(), params, p)?;
            session.add_contribution(params, share.contribution)?;
        }
        Ok(session)
    }

    #[test]
    fn test_session_id_display() {
        let id = SessionId::from_bytes([0xab; SESSION_ID_LEN]);
        assert_eq!(id.to_string(), "ab".repeat(SESSION_ID_LEN));
    }

    #[test]
    fn test_keygen_session_rejects_bad_contributions() -> Result<(), Error> {
        let params = &fixture().params;
        let ps = participants();
        let mut session = KeygenSession::new(SessionId::random(&mut OsRng), &ps)?;

        let share = keygen::generate_share(&mut OsRng, session.transcript(), params, ps[0])?;
        assert_eq!(
            session.add_contribution(params, share.contribution.clone())?,
            Progress::Waiting {
                received: 1,
                expected: 3
            }
        );
        assert!(matches!(
            session.add_contribution(params, share.contribution),
            Err(Error::DuplicateContribution { .. })
        ));

        let stranger = Participant::from(7u32);
        let share = keygen::generate_share(&mut OsRng, session.transcript(), params, stranger)?;
        assert!(matches!(
            session.add_contribution(params, share.contribution),
            Err(Error::UnknownParty { .. })
        ));
        assert!(matches!(session.key(), Err(Error::ThresholdNotMet { .. })));
        assert_eq!(session.state(), SessionState::Collecting);
        Ok(())
    }

    #[test]
    fn test_keygen_session_aborts_on_bad_proof() -> Result<(), Error> {
        let params = &fixture().params;
        let ps = participants();
        let mut session = KeygenSession::new(SessionId::random(&mut OsRng), &ps)?;

        // Proven against another session's transcript.
        let other = KeygenSession::new(SessionId::random(&mut OsRng), &ps)?;
        let share = keygen::generate_share(&mut OsRng, other.transcript(), params, ps[1])?;
        assert!(matches!(
            session.add_contribution(params, share.contribution),
            Err(Error::ZkpVerificationFailed {
                proof: ProofKind::KeyGen,
                ..
            })
        ));
        assert_eq!(session.state(), SessionState::Aborted);

        let share = keygen::generate_share(&mut OsRng, session.transcript(), params, ps[0])?;
        assert!(matches!(
            session.add_contribution(params, share.contribution),
            Err(Error::SessionAborted)
        ));
        Ok(())
    }

    #[test]
    fn test_finished_keygen_rejects_contributions() -> Result<(), Error> {
        let params = &fixture().params;
        let mut session = finished_keygen()?;
        assert_eq!(session.state(), SessionState::Finalized);
        assert!(session.key().is_ok());

        let share =
            keygen::generate_share(&mut OsRng, session.transcript(), params, participants()[0])?;
        assert!(matches!(
            session.add_contribution(params, share.contribution),
            Err(Error::SessionFinalized)
        ));
        Ok(())
    }

    #[test]
    fn test_signing_session() -> Result<(), Error> {
        let fixture = fixture();
        let params = &fixture.params;
        let key = finished_keygen()?.key()?.clone();
        let request = SigningRequest::new(SessionId::random(&mut OsRng), key, b"aaa");
        let mut session = SigningSession::new(request, &participants())?;

        assert!(matches!(
            session.finalize(params, &fixture.decryption_key),
            Err(Error::ThresholdNotMet {
                received: 0,
                expected: 3
            })
        ));

        for p in participants() {
            assert_eq!(session.phase(), SigningPhase::Zkpi1);
            let c = sign::phase1_contribution(
                &mut OsRng,
                session.transcript(),
                params,
                &session.request().key,
                p,
            )?;
            session.add_zkpi1(params, c)?;
        }

        let phase1 = session.phase1_output().cloned().ok_or(Error::UnexpectedPhase)?;
        for p in participants() {
            assert_eq!(session.phase(), SigningPhase::Zkpi2);
            let c = sign::phase2_contribution(&mut OsRng, session.transcript(), params, &phase1, p)?;
            session.add_zkpi2(params, c)?;
        }

        assert_eq!(session.phase(), SigningPhase::Finalize);
        let sig = session.finalize(params, &fixture.decryption_key)?;
        assert!(sig.verify(&session.request().key.big_y, &session.request().digest));
        assert_eq!(session.signature(), Some(&sig));
        assert!(matches!(
            session.finalize(params, &fixture.decryption_key),
            Err(Error::SessionFinalized)
        ));
        Ok(())
    }

    #[test]
    fn test_signing_session_phases_are_ordered() -> Result<(), Error> {
        let params = &fixture().params;
        let key = finished_keygen()?.key()?.clone();
        let request = SigningRequest::new(SessionId::random(&mut OsRng), key, b"aaa");
        let mut session = SigningSession::new(request, &participants())?;

        let phase1 = Phase1Output {
            u: session.request().key.enc_x.clone(),
            v: session.request().key.enc_x.clone(),
        };
        let early = sign::phase2_contribution(
            &mut OsRng,
            session.transcript(),
            params,
            &phase1,
            participants()[0],
        )?;
        assert!(matches!(
            session.add_zkpi2(params, early),
            Err(Error::UnexpectedPhase)
        ));
        assert_eq!(session.state(), SessionState::Collecting);
        Ok(())
    }

    #[test]
    fn test_tampered_zkpi1_aborts_signing() -> Result<(), Error> {
        let fixture = fixture();
        let params = &fixture.params;
        let key = finished_keygen()?.key()?.clone();
        let request = SigningRequest::new(SessionId::random(&mut OsRng), key, b"aaa");
        let mut session = SigningSession::new(request, &participants())?;

        let mut c = sign::phase1_contribution(
            &mut OsRng,
            session.transcript(),
            params,
            &session.request().key,
            participants()[2],
        )?;
        c.proof.e += BigInt::from(1u32);
        assert!(matches!(
            session.add_zkpi1(params, c),
            Err(Error::ZkpVerificationFailed {
                proof: ProofKind::Zkpi1,
                ..
            })
        ));
        assert_eq!(session.state(), SessionState::Aborted);
        assert!(session.signature().is_none());
        assert!(matches!(
            session.finalize(params, &fixture.decryption_key),
            Err(Error::SessionAborted)
        ));
        Ok(())
    }

    fn store_down() -> Result<(), Error> {
        Err(Error::Store("down".to_string()))
    }

    #[test]
    fn test_failed_persist_leaves_keygen_untouched() -> Result<(), Error> {
        let params = &fixture().params;
        let ps = participants();
        let mut session = KeygenSession::new(SessionId::random(&mut OsRng), &ps)?;
        let mut shares = Vec::new();
        for &p in &ps {
            shares.push(keygen::generate_share(&mut OsRng, session.transcript(), params, p)?);
        }
        session.add_contribution(params, shares[0].contribution.clone())?;
        session.add_contribution(params, shares[1].contribution.clone())?;

        let last = shares[2].contribution.clone();
        assert!(matches!(
            session.add_contribution_with(params, last.clone(), |_, _| store_down()),
            Err(Error::Store(_))
        ));
        assert_eq!(session.state(), SessionState::Collecting);
        assert!(session.key().is_err());

        let mut persisted = None;
        let progress = session.add_contribution_with(params, last, |_, key| {
            persisted = key.cloned();
            Ok(())
        })?;
        assert_eq!(progress, Progress::Complete);
        assert_eq!(persisted.as_ref(), Some(session.key()?));
        Ok(())
    }

    #[test]
    fn test_failed_persist_keeps_signing_open() -> Result<(), Error> {
        let fixture = fixture();
        let params = &fixture.params;
        let key = finished_keygen()?.key()?.clone();
        let request = SigningRequest::new(SessionId::random(&mut OsRng), key, b"aaa");
        let mut session = SigningSession::new(request, &participants())?;

        for p in participants() {
            let c = sign::phase1_contribution(
                &mut OsRng,
                session.transcript(),
                params,
                &session.request().key,
                p,
            )?;
            assert!(session.add_zkpi1_with(params, c.clone(), |_| store_down()).is_err());
            session.add_zkpi1(params, c)?;
        }
        let phase1 = session.phase1_output().cloned().ok_or(Error::UnexpectedPhase)?;
        for p in participants() {
            let c = sign::phase2_contribution(&mut OsRng, session.transcript(), params, &phase1, p)?;
            assert!(session.add_zkpi2_with(params, c.clone(), |_| store_down()).is_err());
            assert_ne!(session.phase(), SigningPhase::Finalize);
            session.add_zkpi2(params, c)?;
        }

        assert!(matches!(
            session.finalize_with(params, &fixture.decryption_key, |_| store_down()),
            Err(Error::Store(_))
        ));
        assert_eq!(session.state(), SessionState::Collecting);
        assert!(session.signature().is_none());

        let sig = session.finalize(params, &fixture.decryption_key)?;
        assert_eq!(session.signature(), Some(&sig));
        Ok(())
    }

    #[test]
    fn test_wrong_decryption_key_is_rejected() -> Result<(), Error> {
        let params = &fixture().params;
        let key = finished_keygen()?.key()?.clone();
        let request = SigningRequest::new(SessionId::random(&mut OsRng), key, b"aaa");
        let mut session = SigningSession::new(request, &participants())?;

        let other = DecryptionKey::generate(&mut OsRng, 256)?;
        assert!(matches!(
            session.finalize(params, &other),
            Err(Error::Parameter(_))
        ));
        assert_eq!(session.state(), SessionState::Collecting);
        Ok(())
    }
}
