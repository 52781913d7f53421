//! # Provisioning Decisions
//!
//! Decides which remote write, if any, brings a key container's key material
//! in line with its configuration. Nothing here talks to the directory.
//!
//! Upload gating by `value_version`:
//!
//! | desired  | persisted      | action  |
//! |----------|----------------|---------|
//! | absent   | any            | upload  |
//! | `-1`     | any            | upload  |
//! | `n >= 0` | absent or `!= n` | upload |
//! | `n >= 0` | `n`            | skip    |
//! | `< -1`   | any            | error   |

use crate::constants::FORCE_UPLOAD_VERSION;
use crate::error::ReconcileError;
use crate::model::{KeyType, KeyUsage, Provisioning, SecretValue};
use crate::observability::metrics;
use tracing::debug;

/// Why an upload is required
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadReason {
    /// No version marker configured: every pass uploads
    Unversioned,
    /// Version marker is the force sentinel
    Forced,
    VersionChanged { from: Option<i64>, to: i64 },
}

/// Remote write to perform for a key container
#[derive(Debug, Clone)]
pub enum ProvisionAction {
    Generate {
        usage: KeyUsage,
        key_type: KeyType,
    },
    Upload {
        usage: KeyUsage,
        secret: SecretValue,
        reason: UploadReason,
    },
    /// Persisted version matches the configured one; leave the directory alone
    Skip,
}

/// Decide the provisioning action
///
/// `prior_version` is the version marker recorded in persisted state, `None`
/// on create.
///
/// # Errors
/// [`ReconcileError::Validation`] for a version marker below `-1`, or when an
/// upload is required but no (or an empty) secret was supplied
pub fn decide(
    usage: KeyUsage,
    provisioning: &Provisioning,
    secret: Option<&SecretValue>,
    prior_version: Option<i64>,
) -> Result<ProvisionAction, ReconcileError> {
    let upload = match provisioning {
        Provisioning::Generate(generate) => {
            return Ok(ProvisionAction::Generate {
                usage,
                key_type: generate.key_type,
            });
        }
        Provisioning::Upload(upload) => upload,
    };

    let reason = match upload.value_version {
        None => UploadReason::Unversioned,
        Some(FORCE_UPLOAD_VERSION) => UploadReason::Forced,
        Some(version) if version < 0 => {
            return Err(ReconcileError::validation(
                "Invalid value_version",
                format!("value_version must be {FORCE_UPLOAD_VERSION} or >= 0, got {version}"),
            ));
        }
        Some(version) if prior_version == Some(version) => {
            debug!(
                value_version = version,
                "Secret version unchanged, skipping upload"
            );
            metrics::increment_uploads_skipped();
            return Ok(ProvisionAction::Skip);
        }
        Some(version) => UploadReason::VersionChanged {
            from: prior_version,
            to: version,
        },
    };

    let secret = match secret {
        Some(secret) if !secret.is_empty() => secret.clone(),
        _ => {
            return Err(ReconcileError::validation(
                "Missing secret value",
                "cannot upload an empty secret",
            ));
        }
    };

    debug!(reason = ?reason, "Secret upload required");
    Ok(ProvisionAction::Upload {
        usage,
        secret,
        reason,
    })
}
