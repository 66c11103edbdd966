//! # anastasis-backup
//!
//! the truth uploader (§4.D) and secret sharer (§4.E): turns chosen
//! authentication methods and candidate policies into uploaded truths
//! and a signed, encrypted recovery document per provider.

pub mod error;
pub mod sharer;
pub mod truth_uploader;

pub use error::{Error, Result};
pub use sharer::{build_recovery_document, share_recovery_document, ShareResult};
pub use truth_uploader::{build_truth, upload_truth, UploadOutcome};
