//! # Key Container Types
//!
//! Desired configuration and persisted state for IEF policy key containers.
//!
//! The secret uploaded into a container is never part of either type. It is
//! split off the manifest as a [`SecretValue`] and handed to the reconciler as
//! a separate argument, so persisted state cannot carry it by construction.

use crate::error::ReconcileError;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// What a key container is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyUsage {
    #[serde(rename = "sig", alias = "signing")]
    Signing,
    #[serde(rename = "enc", alias = "encryption")]
    Encryption,
}

impl KeyUsage {
    /// Wire value expected by the trust framework API
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Signing => "sig",
            Self::Encryption => "enc",
        }
    }
}

impl std::fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key type for generated keys. B2C only supports RSA.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    #[default]
    #[serde(rename = "RSA")]
    Rsa,
}

impl KeyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
        }
    }
}

/// Generate a new key inside the container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateSpec {
    #[serde(default, rename = "type")]
    pub key_type: KeyType,
}

/// Upload caller-supplied secret material
///
/// `value_version` semantics:
/// - `None`: upload on every reconciliation
/// - `Some(n)` with `n >= 0`: upload only when `n` differs from the persisted version
/// - `Some(-1)`: always upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_version: Option<i64>,
}

/// How key material gets into the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provisioning {
    Generate(GenerateSpec),
    Upload(UploadSpec),
}

impl Provisioning {
    /// Build the provisioning mode from the two optional manifest blocks
    ///
    /// # Errors
    /// - [`ReconcileError::Config`] when both blocks are present
    /// - [`ReconcileError::Invariant`] when neither is present
    pub fn exactly_one(
        generate: Option<GenerateSpec>,
        upload: Option<UploadSpec>,
    ) -> Result<Self, ReconcileError> {
        match (generate, upload) {
            (Some(generate), None) => Ok(Self::Generate(generate)),
            (None, Some(upload)) => Ok(Self::Upload(upload)),
            (Some(_), Some(_)) => Err(ReconcileError::config(
                "Invalid key container configuration",
                "exactly one of `generate` or `upload` must be specified, found both",
            )),
            (None, None) => Err(ReconcileError::Invariant(
                "no provisioning method specified: expected a `generate` or `upload` block"
                    .to_string(),
            )),
        }
    }

    /// Version marker of the upload block, if any
    pub fn value_version(&self) -> Option<i64> {
        match self {
            Self::Upload(upload) => upload.value_version,
            Self::Generate(_) => None,
        }
    }
}

/// Write-only secret material
///
/// Wiped from memory on drop and never printed by `Debug`.
#[derive(Clone)]
pub struct SecretValue(Zeroizing<String>);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Raw secret, for building the upload payload only
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretValue(<redacted>)")
    }
}

/// Desired state of a key container, minus its secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyContainerConfig {
    /// Container name. The `B2C_1A_` prefix is not added.
    pub name: String,
    pub usage: KeyUsage,
    pub provisioning: Provisioning,
}

/// Persisted state of a key container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyContainer {
    /// Object id assigned by the directory
    pub id: String,
    pub name: String,
    pub usage: KeyUsage,
    pub provisioning: Provisioning,
}

impl KeyContainer {
    pub fn from_config(id: impl Into<String>, config: &KeyContainerConfig) -> Self {
        Self {
            id: id.into(),
            name: config.name.clone(),
            usage: config.usage,
            provisioning: config.provisioning,
        }
    }

    /// Forget the uploaded version so the next update uploads again
    ///
    /// Generated containers are returned unchanged.
    #[must_use]
    pub fn without_upload_version(mut self) -> Self {
        if let Provisioning::Upload(upload) = &mut self.provisioning {
            upload.value_version = None;
        }
        self
    }
}

/// Key container as declared by the user
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyContainerManifest {
    pub name: String,
    pub usage: KeyUsage,
    #[serde(default)]
    pub generate: Option<GenerateSpec>,
    #[serde(default)]
    pub upload: Option<UploadManifest>,
}

/// `upload` block of a manifest, including the write-only value
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadManifest {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub value_version: Option<i64>,
}

impl std::fmt::Debug for UploadManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadManifest")
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .field("value_version", &self.value_version)
            .finish()
    }
}

impl std::fmt::Debug for KeyContainerManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyContainerManifest")
            .field("name", &self.name)
            .field("usage", &self.usage)
            .field("generate", &self.generate)
            .field("upload", &self.upload)
            .finish()
    }
}

impl KeyContainerManifest {
    /// Split the manifest into configuration and the transient secret
    ///
    /// # Errors
    /// Fails when the exactly-one-of `generate`/`upload` rule is violated
    pub fn into_parts(self) -> Result<(KeyContainerConfig, Option<SecretValue>), ReconcileError> {
        let (upload, secret) = match self.upload {
            Some(block) => (
                Some(UploadSpec {
                    value_version: block.value_version,
                }),
                block.value.map(SecretValue::new),
            ),
            None => (None, None),
        };
        let provisioning = Provisioning::exactly_one(self.generate, upload)?;
        Ok((
            KeyContainerConfig {
                name: self.name,
                usage: self.usage,
                provisioning,
            },
            secret,
        ))
    }
}
