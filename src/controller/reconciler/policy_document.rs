//! # Policy Document Reconciler
//!
//! Renders trust framework policies from templates and, when `publish` is
//! set, keeps the tenant's copy in sync.
//!
//! The policy id is always derived from the rendered XML, so changing an app
//! setting that feeds the `PolicyId` attribute moves the policy.

use super::types::{cancellable, StateChange};
use crate::controller::policy::{extract_policy_id, inject_settings, TemplateSource};
use crate::error::ReconcileError;
use crate::model::{PolicyDocument, PolicyDocumentConfig};
use crate::observability::metrics;
use crate::provider::DirectoryClient;
use reqwest::StatusCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

const RESOURCE: &str = "policy_document";

/// A template rendered with its app settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPolicy {
    pub xml: String,
    pub id: Option<String>,
}

/// Load a policy template from `templates` and inject the app settings
///
/// # Errors
/// [`ReconcileError::Config`] when the template path is empty or unreadable
pub async fn render_policy(
    templates: &dyn TemplateSource,
    config: &PolicyDocumentConfig,
) -> Result<RenderedPolicy, ReconcileError> {
    if config.file.as_os_str().is_empty() {
        return Err(ReconcileError::config(
            "Invalid config",
            "policy template file path is not defined",
        ));
    }

    let template = templates
        .load(&config.file)
        .await
        .map_err(|e| ReconcileError::config("File does not exist", format!("{e:#}")))?;

    let xml = inject_settings(&template, &config.app_settings);
    let id = extract_policy_id(&xml);
    debug!(
        policy.file = %config.file.display(),
        policy.id = id.as_deref().unwrap_or(""),
        "Rendered policy"
    );
    Ok(RenderedPolicy { xml, id })
}

/// Reconciles IEF custom policies
#[derive(Clone)]
pub struct PolicyDocumentReconciler {
    client: Arc<dyn DirectoryClient>,
    templates: Arc<dyn TemplateSource>,
}

impl std::fmt::Debug for PolicyDocumentReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyDocumentReconciler")
            .finish_non_exhaustive()
    }
}

impl PolicyDocumentReconciler {
    pub fn new(client: Arc<dyn DirectoryClient>, templates: Arc<dyn TemplateSource>) -> Self {
        Self { client, templates }
    }

    /// Load the template and inject app settings, without touching the tenant
    ///
    /// # Errors
    /// [`ReconcileError::Config`] when the template path is empty or unreadable
    pub async fn render(
        &self,
        config: &PolicyDocumentConfig,
    ) -> Result<RenderedPolicy, ReconcileError> {
        render_policy(self.templates.as_ref(), config).await
    }

    /// Render the policy and publish it if requested
    ///
    /// # Errors
    /// Configuration problems, or a rejected upload
    pub async fn create(
        &self,
        cancel: &CancellationToken,
        config: &PolicyDocumentConfig,
    ) -> Result<PolicyDocument, ReconcileError> {
        self.apply(cancel, config, "create").await
    }

    /// Re-render the policy and publish it again if requested
    ///
    /// # Errors
    /// Configuration problems, or a rejected upload
    pub async fn update(
        &self,
        cancel: &CancellationToken,
        config: &PolicyDocumentConfig,
    ) -> Result<PolicyDocument, ReconcileError> {
        self.apply(cancel, config, "update").await
    }

    /// Detect drift between persisted state, the template and the tenant
    ///
    /// A changed rendering, or a published policy missing from the tenant,
    /// yields [`StateChange::Remove`].
    ///
    /// # Errors
    /// An unreadable template, or a directory failure other than 404
    pub async fn read(
        &self,
        cancel: &CancellationToken,
        stored: PolicyDocument,
    ) -> Result<StateChange<PolicyDocument>, ReconcileError> {
        let span = info_span!(
            "policy_document.read",
            policy.file = %stored.file.display(),
            policy.id = stored.id.as_deref().unwrap_or("")
        );
        async move {
            metrics::increment_reconciliations(RESOURCE, "read");

            let rendered = self
                .render(&stored.config())
                .await
                .inspect_err(record_error)?;

            if rendered.xml != stored.xml {
                info!("Rendered policy differs from persisted state");
                metrics::increment_drift_detected(RESOURCE);
                return Ok(StateChange::Remove);
            }

            if stored.publish {
                let Some(policy_id) = rendered.id.as_deref() else {
                    warn!("Published policy has no PolicyId, dropping it from state");
                    metrics::increment_drift_detected(RESOURCE);
                    return Ok(StateChange::Remove);
                };

                let response = cancellable(
                    cancel,
                    "Error reading ief policy",
                    self.client.get_policy(policy_id),
                )
                .await
                .inspect_err(record_error)?;

                match response.status {
                    StatusCode::OK => debug!("Published policy exists"),
                    StatusCode::NOT_FOUND => {
                        info!("Published policy no longer exists in the tenant");
                        metrics::increment_drift_detected(RESOURCE);
                        return Ok(StateChange::Remove);
                    }
                    status => {
                        let err = ReconcileError::remote(
                            "Error reading ief policy",
                            status,
                            response.body,
                        );
                        record_error(&err);
                        return Err(err);
                    }
                }
            }

            Ok(StateChange::Keep(stored))
        }
        .instrument(span)
        .await
    }

    /// Remove a published policy from the tenant
    ///
    /// Unpublished policies only live in local state, so there is nothing to do.
    ///
    /// # Errors
    /// Any directory answer other than 204
    pub async fn delete(
        &self,
        cancel: &CancellationToken,
        stored: &PolicyDocument,
    ) -> Result<(), ReconcileError> {
        let span = info_span!(
            "policy_document.delete",
            policy.id = stored.id.as_deref().unwrap_or("")
        );
        async move {
            metrics::increment_reconciliations(RESOURCE, "delete");

            let policy_id = match stored.id.as_deref() {
                Some(id) if stored.publish && !id.is_empty() => id,
                _ => {
                    debug!("Policy was not published, nothing to delete");
                    return Ok(());
                }
            };

            let response = cancellable(
                cancel,
                "Error deleting ief policy",
                self.client.delete_policy(policy_id),
            )
            .await
            .inspect_err(record_error)?;

            if response.status != StatusCode::NO_CONTENT {
                let err = ReconcileError::remote(
                    "Error deleting ief policy",
                    response.status,
                    response.body,
                );
                record_error(&err);
                return Err(err);
            }

            info!("Deleted published policy");
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn apply(
        &self,
        cancel: &CancellationToken,
        config: &PolicyDocumentConfig,
        operation: &'static str,
    ) -> Result<PolicyDocument, ReconcileError> {
        let span = info_span!(
            "policy_document.apply",
            operation = operation,
            policy.file = %config.file.display(),
            policy.publish = config.publish
        );
        async move {
            metrics::increment_reconciliations(RESOURCE, operation);

            let rendered = self.render(config).await.inspect_err(record_error)?;

            if config.publish {
                let Some(policy_id) = rendered.id.as_deref() else {
                    let err = ReconcileError::config(
                        "Invalid config",
                        format!(
                            "cannot publish {}: the root element has no PolicyId attribute",
                            config.file.display()
                        ),
                    );
                    record_error(&err);
                    return Err(err);
                };

                let response = cancellable(
                    cancel,
                    "Error uploading policy",
                    self.client.put_policy(policy_id, &rendered.xml),
                )
                .await
                .inspect_err(record_error)?;

                if !matches!(response.status, StatusCode::OK | StatusCode::CREATED) {
                    let err = ReconcileError::remote(
                        "Error uploading policy",
                        response.status,
                        response.body,
                    );
                    record_error(&err);
                    return Err(err);
                }
                info!(policy.id = policy_id, "Published policy");
            }

            Ok(PolicyDocument {
                id: rendered.id,
                file: config.file.clone(),
                app_settings: config.app_settings.clone(),
                publish: config.publish,
                xml: rendered.xml,
            })
        }
        .instrument(span)
        .await
    }
}

fn record_error(err: &ReconcileError) {
    metrics::increment_reconciliation_errors(RESOURCE, err.kind());
}
