//! Errors produced by the cryptographic core and the session layer.
//!
//! The variants follow how a caller should react to them:
//!
//! - [`Error::Parameter`] means the shared parameters cannot be used at all.
//! - [`Error::CommitmentVerificationFailed`] and [`Error::ZkpVerificationFailed`]
//!   identify a faulty or malicious party, and abort the whole session.
//! - [`Error::ThresholdNotMet`] just means that more contributions are needed.
//! - Everything else is a synchronous rejection of one input, leaving the
//!   session untouched.
use thiserror::Error;

use crate::protocol::Participant;
use crate::wire::WireError;

/// Which zero knowledge proof failed to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofKind {
    KeyGen,
    Zkpi1,
    Zkpi2,
}

impl std::fmt::Display for ProofKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProofKind::KeyGen => write!(f, "keygen"),
            ProofKind::Zkpi1 => write!(f, "zkp-i1"),
            ProofKind::Zkpi2 => write!(f, "zkp-i2"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The shared domain parameters are malformed or incompatible.
    #[error("bad protocol parameters: {0}")]
    Parameter(String),
    /// A Paillier plaintext was outside of `[0, N)`.
    #[error("paillier plaintext does not fit in the modulus")]
    MessageTooLarge,
    /// A Paillier ciphertext was outside of `(0, N^2)` or not invertible.
    #[error("invalid paillier ciphertext")]
    InvalidCiphertext,
    #[error("{party} already contributed to this phase")]
    DuplicateContribution { party: Participant },
    #[error("{party} is not a participant of this session")]
    UnknownParty { party: Participant },
    #[error("commitment from {party} failed to verify")]
    CommitmentVerificationFailed { party: Participant },
    #[error("{proof} proof from {party} failed to verify")]
    ZkpVerificationFailed {
        party: Participant,
        proof: ProofKind,
    },
    /// Not every participant has contributed yet.
    #[error("received {received} of {expected} contributions")]
    ThresholdNotMet { received: usize, expected: usize },
    /// The assembled signature did not verify under the aggregate key.
    #[error("assembled signature failed to verify")]
    SignatureSelfCheckFailed,
    #[error("session was aborted after a failed verification")]
    SessionAborted,
    #[error("session has already been finalized")]
    SessionFinalized,
    #[error("no session with id {0}")]
    SessionNotFound(String),
    #[error("contribution does not belong to the current phase")]
    UnexpectedPhase,
    /// The session store failed to load or save something.
    #[error("session store failure: {0}")]
    Store(String),
    #[error("encoding error: {0}")]
    Encoding(#[from] WireError),
    #[error("decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

impl Error {
    /// Whether this error moves a session into its aborted state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::CommitmentVerificationFailed { .. } | Error::ZkpVerificationFailed { .. }
        )
    }
}
