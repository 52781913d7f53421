//! # Resource Model
//!
//! Configuration and persisted-state types for the two managed resources.

mod key_container;
mod policy_document;

pub use key_container::{
    GenerateSpec, KeyContainer, KeyContainerConfig, KeyContainerManifest, KeyType, KeyUsage,
    Provisioning, SecretValue, UploadManifest, UploadSpec,
};
pub use policy_document::{AppSettings, PolicyDocument, PolicyDocumentConfig};
