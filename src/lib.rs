//! Notary MPC is a threshold ECDSA protocol (and implementation), in which a
//! group of mutually distrusting notaries jointly hold a secp256k1 key.
//!
//! # Warning
//!
//! This is experimental cryptographic software.
//!
//! - None of the big integer arithmetic is constant time.
//! - This library has not undergone any form of audit.
//!
//! # Design
//!
//! The private key is never secret shared in the usual sense. Instead, it only
//! ever exists encrypted under a shared Paillier key:
//!
//! - **Lock-In** ([keygen]): every party contributes `x_i`, publishing
//!   `Y_i = x_i * G` and `Enc(x_i)`. The aggregate key is `Y = Σ Y_i`,
//!   along with `EncX = Σ Enc(x_i)`, which nobody ever decrypts.
//! - **Lock-Out** ([sign]): in two phases, the parties homomorphically build
//!   ciphertexts from which the holder of the decryption key can compute a
//!   signature under `Y`, without learning the private key.
//!
//! Every contribution is committed to with a pairing based trapdoor commitment
//! ([commitment]) before being revealed, and comes with a zero knowledge proof
//! ([proofs]) that its elliptic curve and Paillier parts are consistent.
//! A single failed check aborts the whole session. Signing needs every party
//! which took part in Lock-In.
//!
//! All of the shared setup, meaning the Paillier key, the auxiliary modulus for
//! range proofs, and the commitment key, lives in [params::ProtocolParameters],
//! which is generated once, according to a [config::ParameterConfig].
//!
//! ## API Design
//!
//! The protocols are exposed in two ways.
//!
//! The first is the same sans-IO interface for each party:
//! ```ignore
//! pub trait Protocol {
//!    type Output;
//!
//!    fn poke(&mut self) -> Result<Action<Self::Output>, ProtocolError>;
//!    fn message(&mut self, from: Participant, data: MessageData);
//! }
//! ```
//! Given an instance of this trait, which represents a single party
//! participating in a protocol, you can do two things:
//! - You can provide a new message received from some other party.
//! - You can "poke" the protocol to see if it has some kind of action it wants you to perform, or if an error happened.
//!
//! This action is either:
//! - The protocol telling you it has finished, with a return value of type `Output`.
//! - The protocol asking you to send a message to all other parties.
//! - The protocol informing you that no more progress can be made until it receives new messages.
//!
//! The second is a set of sessions ([session]), which accept contributions one
//! at a time, and a [notary::Notary] hosting many of them, persisted through
//! a [store::SessionStore]. This suits a service receiving contributions
//! through some API.
//!
//! # Shortcomings
//!
//! - There's no threshold: one missing party blocks a session.
//! - There are no timeouts or retries, a stalled peer stalls everyone.
pub mod commitment;
mod compat;
pub mod config;
mod crypto;
pub mod error;
pub mod keygen;
mod math;
pub mod notary;
pub mod paillier;
pub mod params;
pub mod participants;
pub mod proofs;
pub mod protocol;
mod serde;
pub mod session;
pub mod sign;
pub mod store;
pub mod wire;

pub use error::Error;
pub use keygen::{keygen, AggregateKey, KeygenOutput};
pub use sign::{sign, FullSignature, SigningRequest};
