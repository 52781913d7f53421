//! # Key Container Reconciler
//!
//! Drives a policy key container through its lifecycle:
//! `Absent -> Created -> Provisioned -> (Updated)* -> Deleted`.
//!
//! Persisted state coming in is always passed through
//! [`sanitize`](crate::controller::keys::sanitize) first. State going out is a
//! [`KeyContainer`], which has no place for a secret.

use super::types::{cancellable, Outcome, StateChange};
use crate::constants::KEY_CONTAINER_NOT_FOUND_CODE;
use crate::controller::keys::{decide, sanitize, ProvisionAction, StoredKeyContainer};
use crate::error::ReconcileError;
use crate::model::{KeyContainer, KeyContainerConfig, SecretValue};
use crate::observability::metrics;
use crate::provider::{DirectoryClient, DirectoryResponse, KeySetResponse};
use reqwest::StatusCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

const RESOURCE: &str = "key_container";

/// Reconciles IEF policy key containers
#[derive(Clone)]
pub struct KeyContainerReconciler {
    client: Arc<dyn DirectoryClient>,
}

impl std::fmt::Debug for KeyContainerReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyContainerReconciler").finish_non_exhaustive()
    }
}

impl KeyContainerReconciler {
    pub fn new(client: Arc<dyn DirectoryClient>) -> Self {
        Self { client }
    }

    /// Create a container and provision its key material
    ///
    /// The provisioning decision runs before the container is created, so a
    /// validation failure never leaves an orphaned container behind.
    ///
    /// If the container is created but provisioning fails, the returned
    /// [`Outcome`] carries both the new state and the error: the container
    /// exists remotely and must be persisted so it can be deleted later. That
    /// state records no upload version, so the next update uploads again.
    ///
    /// # Errors
    /// Fails without any state when the configuration is invalid or the
    /// container itself cannot be created
    pub async fn create(
        &self,
        cancel: &CancellationToken,
        config: &KeyContainerConfig,
        secret: Option<&SecretValue>,
    ) -> Result<Outcome<KeyContainer>, ReconcileError> {
        let span = info_span!(
            "key_container.create",
            key.name = %config.name,
            key.usage = %config.usage
        );
        async move {
            metrics::increment_reconciliations(RESOURCE, "create");

            let action = decide(config.usage, &config.provisioning, secret, None)
                .inspect_err(record_error)?;

            let response = cancellable(
                cancel,
                "Create keyset failed",
                self.client.create_key_container(&config.name, config.usage),
            )
            .await
            .inspect_err(record_error)?;

            let id = created_container_id(&response).inspect_err(record_error)?;
            info!(key.id = %id, "Created key container");

            let state = KeyContainer::from_config(id, config);
            match self.provision(cancel, &state.id, action).await {
                Ok(()) => Ok(Outcome::complete(state)),
                Err(e) => {
                    error!(
                        key.id = %state.id,
                        error = %e,
                        "Key container created but provisioning failed"
                    );
                    record_error(&e);
                    Ok(Outcome::partial(state.without_upload_version(), e))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Check that a persisted container still exists
    ///
    /// A container that is gone from the directory is drift, reported as
    /// [`StateChange::Remove`].
    ///
    /// # Errors
    /// Any directory answer other than success or "not found"
    pub async fn read(
        &self,
        cancel: &CancellationToken,
        stored: StoredKeyContainer,
    ) -> Result<StateChange<KeyContainer>, ReconcileError> {
        let state = sanitize(stored);
        let span = info_span!("key_container.read", key.name = %state.name, key.id = %state.id);
        async move {
            metrics::increment_reconciliations(RESOURCE, "read");

            if state.id.is_empty() {
                warn!("Persisted key container has no id, dropping it from state");
                metrics::increment_drift_detected(RESOURCE);
                return Ok(StateChange::Remove);
            }

            let response = cancellable(
                cancel,
                "Read keysets failed",
                self.client.get_key_container(&state.id),
            )
            .await
            .inspect_err(record_error)?;

            if response.status != StatusCode::OK {
                if response.body.contains(KEY_CONTAINER_NOT_FOUND_CODE) {
                    info!("Key container no longer exists in the directory");
                    metrics::increment_drift_detected(RESOURCE);
                    return Ok(StateChange::Remove);
                }
                let err =
                    ReconcileError::remote("Read keysets failed", response.status, response.body);
                record_error(&err);
                return Err(err);
            }

            let remote: KeySetResponse = serde_json::from_str(&response.body).map_err(|e| {
                let err = ReconcileError::remote(
                    format!("Error parsing graph response: {e}"),
                    response.status,
                    response.body.clone(),
                );
                record_error(&err);
                err
            })?;
            debug!(remote.id = %remote.id, "Key container exists");

            Ok(StateChange::Keep(state))
        }
        .instrument(span)
        .await
    }

    /// Apply configuration changes to an existing container
    ///
    /// Uploads are gated on `value_version` against the persisted version;
    /// generated containers get a new key on every update.
    ///
    /// # Errors
    /// Validation failures, or a failed directory write
    pub async fn update(
        &self,
        cancel: &CancellationToken,
        config: &KeyContainerConfig,
        secret: Option<&SecretValue>,
        stored: StoredKeyContainer,
    ) -> Result<KeyContainer, ReconcileError> {
        let prior = sanitize(stored);
        let span = info_span!(
            "key_container.update",
            key.name = %config.name,
            key.id = %prior.id
        );
        async move {
            metrics::increment_reconciliations(RESOURCE, "update");

            if prior.id.is_empty() {
                let err = ReconcileError::Invariant(format!(
                    "key container {} has no id in persisted state",
                    config.name
                ));
                record_error(&err);
                return Err(err);
            }

            let action = decide(
                config.usage,
                &config.provisioning,
                secret,
                prior.provisioning.value_version(),
            )
            .inspect_err(record_error)?;

            self.provision(cancel, &prior.id, action)
                .await
                .inspect_err(record_error)?;

            Ok(KeyContainer::from_config(prior.id, config))
        }
        .instrument(span)
        .await
    }

    /// Delete the remote container; a container that was never created is a no-op
    ///
    /// # Errors
    /// Any directory answer other than 204
    pub async fn delete(
        &self,
        cancel: &CancellationToken,
        stored: StoredKeyContainer,
    ) -> Result<(), ReconcileError> {
        let state = sanitize(stored);
        let span = info_span!("key_container.delete", key.name = %state.name, key.id = %state.id);
        async move {
            metrics::increment_reconciliations(RESOURCE, "delete");

            if state.id.is_empty() {
                debug!("Key container was never created, nothing to delete");
                return Ok(());
            }

            let response = cancellable(
                cancel,
                "Delete failed",
                self.client.delete_key_container(&state.id),
            )
            .await
            .inspect_err(record_error)?;

            if response.status != StatusCode::NO_CONTENT {
                let err = ReconcileError::remote("Delete failed", response.status, response.body);
                record_error(&err);
                return Err(err);
            }

            info!("Deleted key container");
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn provision(
        &self,
        cancel: &CancellationToken,
        container_id: &str,
        action: ProvisionAction,
    ) -> Result<(), ReconcileError> {
        let (summary, response) = match action {
            ProvisionAction::Skip => return Ok(()),
            ProvisionAction::Generate { usage, key_type } => {
                debug!(key.kty = key_type.as_str(), "Generating key");
                let summary = "Error generating policy key";
                let response = cancellable(
                    cancel,
                    summary,
                    self.client.generate_key(container_id, usage, key_type),
                )
                .await?;
                (summary, response)
            }
            ProvisionAction::Upload {
                usage,
                secret,
                reason,
            } => {
                debug!(reason = ?reason, "Uploading secret");
                let summary = "Error uploading policy key";
                let response = cancellable(
                    cancel,
                    summary,
                    self.client.upload_secret(container_id, usage, &secret),
                )
                .await?;
                (summary, response)
            }
        };

        expect_status(summary, response, StatusCode::OK)
    }
}

fn created_container_id(response: &DirectoryResponse) -> Result<String, ReconcileError> {
    if response.status != StatusCode::CREATED {
        return Err(ReconcileError::remote(
            "Create keyset failed",
            response.status,
            response.body.clone(),
        ));
    }
    match serde_json::from_str::<KeySetResponse>(&response.body) {
        Ok(parsed) if !parsed.id.is_empty() => Ok(parsed.id),
        _ => Err(ReconcileError::remote(
            "Create keyset failed",
            response.status,
            response.body.clone(),
        )),
    }
}

fn expect_status(
    summary: &str,
    response: DirectoryResponse,
    expected: StatusCode,
) -> Result<(), ReconcileError> {
    if response.status == expected {
        Ok(())
    } else {
        Err(ReconcileError::remote(summary, response.status, response.body))
    }
}

fn record_error(err: &ReconcileError) {
    metrics::increment_reconciliation_errors(RESOURCE, err.kind());
}
