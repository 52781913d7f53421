//! # Legacy State Remediation
//!
//! Older state files may carry the uploaded secret under
//! `provisioning.upload.value`. Inbound persisted state is read as
//! [`StoredKeyContainer`], which tolerates that field, and is converted to a
//! [`KeyContainer`] here before anything else looks at it.

use crate::model::{GenerateSpec, KeyContainer, KeyUsage, Provisioning, UploadSpec};
use crate::observability::metrics;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Persisted key container as found on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKeyContainer {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub usage: KeyUsage,
    pub provisioning: StoredProvisioning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredProvisioning {
    Generate(GenerateSpec),
    Upload(StoredUpload),
}

/// `upload` block of persisted state, possibly still holding a secret
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUpload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Zeroizing<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_version: Option<i64>,
}

impl std::fmt::Debug for StoredUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredUpload")
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .field("value_version", &self.value_version)
            .finish()
    }
}

impl From<KeyContainer> for StoredKeyContainer {
    fn from(container: KeyContainer) -> Self {
        let provisioning = match container.provisioning {
            Provisioning::Generate(generate) => StoredProvisioning::Generate(generate),
            Provisioning::Upload(upload) => StoredProvisioning::Upload(StoredUpload {
                value: None,
                value_version: upload.value_version,
            }),
        };
        Self {
            id: container.id,
            name: container.name,
            usage: container.usage,
            provisioning,
        }
    }
}

/// Drop any persisted secret, keeping the version marker unchanged
///
/// Total: never fails and is a no-op for generated containers.
pub fn sanitize(stored: StoredKeyContainer) -> KeyContainer {
    let provisioning = match stored.provisioning {
        StoredProvisioning::Generate(generate) => Provisioning::Generate(generate),
        StoredProvisioning::Upload(upload) => {
            if upload.value.is_some() {
                warn!(
                    key.name = %stored.name,
                    key.id = %stored.id,
                    "Removing secret value found in persisted key container state"
                );
                metrics::increment_legacy_state_remediations();
            } else {
                debug!(key.name = %stored.name, "Persisted key container state is clean");
            }
            Provisioning::Upload(UploadSpec {
                value_version: upload.value_version,
            })
        }
    };

    KeyContainer {
        id: stored.id,
        name: stored.name,
        usage: stored.usage,
        provisioning,
    }
}
