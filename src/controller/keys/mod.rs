//! # Key Provisioning
//!
//! - `sanitize`: legacy state remediation for persisted key containers
//! - `decision`: generate / upload / skip decisions

pub mod decision;
pub mod sanitize;

pub use decision::{decide, ProvisionAction, UploadReason};
pub use sanitize::{sanitize, StoredKeyContainer, StoredProvisioning, StoredUpload};
