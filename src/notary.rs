//! A notary service, which hosts many sessions at once.
//!
//! Each session sits behind its own lock, so contributions to different
//! sessions never wait on each other. Accepted contributions and results are
//! written to a [SessionStore] before a session accepts them, so a failed
//! write can simply be retried.
//!
//! Finished and aborted sessions are dropped from memory. Their outcome stays
//! in the store, which is where later requests about them are answered from.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand_core::CryptoRngCore;
use tracing::{info, warn};

use crate::error::Error;
use crate::keygen::{AggregateKey, KeyShareContribution};
use crate::paillier::DecryptionKey;
use crate::params::ProtocolParameters;
use crate::protocol::Participant;
use crate::serde::{decode, encode};
use crate::session::{KeygenSession, Progress, SessionId, SessionState, SigningSession};
use crate::sign::{FullSignature, SigningRequest, Zkpi1Contribution, Zkpi2Contribution};
use crate::store::{self, SessionStore};
use crate::wire::WireFormat;

const PARTICIPANTS: &str = "participants";
const KEY_SHARES: &str = "key-shares";
const AGGREGATE_KEY: &str = "aggregate-key";
const ZKPI1: &str = "zkp-i1";
const ZKPI2: &str = "zkp-i2";
const SIGNATURE: &str = "signature";
const ABORTED: &str = "aborted";

type Sessions<T> = Mutex<HashMap<SessionId, Arc<Mutex<T>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Notary<S> {
    params: ProtocolParameters,
    decryption_key: Option<DecryptionKey>,
    store: S,
    keygens: Sessions<KeygenSession>,
    signings: Sessions<SigningSession>,
}

impl<S: SessionStore> Notary<S> {
    /// Create a notary.
    ///
    /// Only a notary holding the decryption key can finalize signatures.
    pub fn new(
        params: ProtocolParameters,
        decryption_key: Option<DecryptionKey>,
        store: S,
    ) -> Result<Self, Error> {
        params.validate()?;
        if decryption_key
            .as_ref()
            .map_or(false, |dk| dk.encryption_key() != &params.encryption_key)
        {
            return Err(Error::Parameter(
                "decryption key does not match the parameters".to_string(),
            ));
        }
        Ok(Self {
            params,
            decryption_key,
            store,
            keygens: Mutex::new(HashMap::new()),
            signings: Mutex::new(HashMap::new()),
        })
    }

    pub fn params(&self) -> &ProtocolParameters {
        &self.params
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Look up a live session, or explain why there isn't one.
    ///
    /// `result` is the namespace the outcome of a finished session is stored under.
    fn find<T>(
        &self,
        sessions: &Sessions<T>,
        id: &SessionId,
        result: &str,
    ) -> Result<Arc<Mutex<T>>, Error> {
        if let Some(session) = lock(sessions).get(id).cloned() {
            return Ok(session);
        }
        // Outcomes are stored before eviction, so a missing session is either
        // recorded here or never existed.
        if self.store.load(&store::key(result, id))?.is_some() {
            return Err(Error::SessionFinalized);
        }
        if self.store.load(&store::key(ABORTED, id))?.is_some() {
            return Err(Error::SessionAborted);
        }
        Err(Error::SessionNotFound(id.to_string()))
    }

    /// Drop a session from memory once it can't accept anything anymore.
    fn evict<T>(&self, sessions: &Sessions<T>, id: &SessionId, state: SessionState) {
        match state {
            SessionState::Collecting => return,
            SessionState::Aborted => {
                if let Err(e) = self.store.save(&store::key(ABORTED, id), Vec::new()) {
                    warn!(session = %id, error = %e, "failed to record abort, keeping session");
                    return;
                }
            }
            SessionState::Finalized => {}
        }
        lock(sessions).remove(id);
        info!(session = %id, ?state, "session evicted");
    }

    /// Open a new Lock-In session between some participants.
    pub fn start_keygen(
        &self,
        rng: &mut impl CryptoRngCore,
        participants: &[Participant],
    ) -> Result<SessionId, Error> {
        let id = SessionId::random(rng);
        let session = KeygenSession::new(id, participants)?;
        let members: Vec<Participant> = session.participants().iter().collect();
        self.store
            .save(&store::key(PARTICIPANTS, &id), encode(&members))?;
        lock(&self.keygens).insert(id, Arc::new(Mutex::new(session)));
        info!(session = %id, participants = members.len(), "lock-in session created");
        Ok(id)
    }

    pub fn keygen_session(&self, id: &SessionId) -> Result<Arc<Mutex<KeygenSession>>, Error> {
        self.find(&self.keygens, id, AGGREGATE_KEY)
    }

    pub fn submit_key_share(
        &self,
        id: &SessionId,
        contribution: KeyShareContribution,
    ) -> Result<Progress, Error> {
        let session = self.keygen_session(id)?;
        let mut session = lock(&session);

        let result = session.add_contribution_with(&self.params, contribution, |c, key| {
            if let Some(key) = key {
                self.store
                    .save(&store::key(AGGREGATE_KEY, id), key.to_wire())?;
            }
            self.store
                .append_contribution(&store::key(KEY_SHARES, id), encode(c))
        });
        self.evict(&self.keygens, id, session.state());
        result
    }

    /// The key produced by a finished Lock-In session.
    pub fn aggregate_key(&self, id: &SessionId) -> Result<AggregateKey, Error> {
        if let Some(session) = lock(&self.keygens).get(id).cloned() {
            return lock(&session).key().cloned();
        }
        let bytes = self
            .store
            .load(&store::key(AGGREGATE_KEY, id))?
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        Ok(AggregateKey::from_wire(&bytes)?)
    }

    /// Open a Lock-Out session for a message, using the key from a Lock-In session.
    ///
    /// The participants are the same as the ones who generated the key.
    pub fn start_signing(
        &self,
        rng: &mut impl CryptoRngCore,
        key_session: &SessionId,
        message: &[u8],
    ) -> Result<SessionId, Error> {
        let key = self.aggregate_key(key_session)?;
        let participants: Vec<Participant> = match self
            .store
            .load(&store::key(PARTICIPANTS, key_session))?
        {
            Some(bytes) => decode(&bytes)?,
            None => return Err(Error::SessionNotFound(key_session.to_string())),
        };

        let id = SessionId::random(rng);
        let session = SigningSession::new(SigningRequest::new(id, key, message), &participants)?;
        lock(&self.signings).insert(id, Arc::new(Mutex::new(session)));
        info!(session = %id, key_session = %key_session, "lock-out session created");
        Ok(id)
    }

    pub fn signing_session(&self, id: &SessionId) -> Result<Arc<Mutex<SigningSession>>, Error> {
        self.find(&self.signings, id, SIGNATURE)
    }

    pub fn submit_zkpi1(
        &self,
        id: &SessionId,
        contribution: Zkpi1Contribution,
    ) -> Result<Progress, Error> {
        let session = self.signing_session(id)?;
        let mut session = lock(&session);

        let result = session.add_zkpi1_with(&self.params, contribution, |c| {
            self.store
                .append_contribution(&store::key(ZKPI1, id), encode(c))
        });
        self.evict(&self.signings, id, session.state());
        result
    }

    pub fn submit_zkpi2(
        &self,
        id: &SessionId,
        contribution: Zkpi2Contribution,
    ) -> Result<Progress, Error> {
        let session = self.signing_session(id)?;
        let mut session = lock(&session);

        let result = session.add_zkpi2_with(&self.params, contribution, |c| {
            self.store
                .append_contribution(&store::key(ZKPI2, id), encode(c))
        });
        self.evict(&self.signings, id, session.state());
        result
    }

    /// Produce the signature for a session whose phases are both complete.
    ///
    /// The session lock makes this an atomic check and set: when called
    /// concurrently, exactly one caller gets the signature, and every other
    /// caller gets [Error::SessionFinalized]. The signature is stored before
    /// the session counts as finalized.
    pub fn finalize(&self, id: &SessionId) -> Result<FullSignature, Error> {
        let decryption_key = self.decryption_key.as_ref().ok_or_else(|| {
            Error::Parameter("this notary does not hold the decryption key".to_string())
        })?;
        let session = self.signing_session(id)?;
        let mut session = lock(&session);

        let result = session.finalize_with(&self.params, decryption_key, |sig| {
            self.store
                .save(&store::key(SIGNATURE, id), sig.to_bytes().to_vec())
        });
        self.evict(&self.signings, id, session.state());
        result
    }

    /// The signature of a finalized Lock-Out session, as `r || s || recovery_id`.
    pub fn signature(&self, id: &SessionId) -> Result<Vec<u8>, Error> {
        self.store
            .load(&store::key(SIGNATURE, id))?
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }
}
