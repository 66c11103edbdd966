//! # anastasis-crypto
//!
//! the pure cryptographic facade of spec §4.A: user-identifier kdf,
//! account keypair derivation, aead encrypt/decrypt for recovery
//! documents/truth data/key shares, answer hashing, and the policy/
//! core-secret key chain. no I/O; every function here is a leaf.

pub mod account;
pub mod aead;
pub mod error;
pub mod facade;
pub mod kdf;

pub use account::AccountKeypair;
pub use error::{Error, Result};
pub use facade::*;
pub use kdf::derive_user_identifier;
