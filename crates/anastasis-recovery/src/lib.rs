//! # anastasis-recovery
//!
//! the recovery driver (§4.F) and challenge runner (§4.G): downloads
//! and materializes a recovery document, drives individual challenges
//! through their authentication protocol, and reassembles the core
//! secret once any one policy is fully solved.

pub mod challenge;
pub mod document;
pub mod driver;
pub mod error;

pub use challenge::{poll_challenge, start_challenge, ChallengeAnswer, ChallengeState, ChallengeStep};
pub use document::decode_recovery_document;
pub use driver::{ChallengeDetails, CoreSecretRecovered, RecoveryDriver};
pub use error::RecoveryFailure;
