//! # Reconciliation Errors
//!
//! Error taxonomy surfaced to callers of the reconcilers.
//!
//! Drift is deliberately absent: a resource that vanished remotely or whose
//! rendered content changed is reported as [`crate::StateChange::Remove`],
//! never as an error.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Desired configuration is well-formed but its values are not acceptable
    #[error("{summary}: {detail}")]
    Validation { summary: String, detail: String },

    /// Configuration cannot be used at all (missing template, conflicting blocks)
    #[error("{summary}: {detail}")]
    Config { summary: String, detail: String },

    /// The directory answered with an unexpected status
    #[error("{summary}: Graph returned {status}: {body}")]
    Remote {
        summary: String,
        status: StatusCode,
        body: String,
    },

    /// The request never produced a response (timeout, connection, token acquisition)
    #[error("{summary}: {detail}")]
    Transport { summary: String, detail: String },

    /// An upstream contract was violated
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The caller cancelled the operation while a remote call was in flight
    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

impl ReconcileError {
    pub fn validation(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Validation {
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn config(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Config {
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn remote(summary: impl Into<String>, status: StatusCode, body: impl Into<String>) -> Self {
        Self::Remote {
            summary: summary.into(),
            status,
            body: body.into(),
        }
    }

    /// Wrap a collaborator failure, keeping the whole `anyhow` context chain as detail
    pub fn transport(summary: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::Transport {
            summary: summary.into(),
            detail: format!("{err:#}"),
        }
    }

    /// Short, user-facing description of what failed
    pub fn summary(&self) -> &str {
        match self {
            Self::Validation { summary, .. }
            | Self::Config { summary, .. }
            | Self::Remote { summary, .. }
            | Self::Transport { summary, .. } => summary,
            Self::Invariant(_) => "Invariant violated",
            Self::Cancelled(_) => "Operation cancelled",
        }
    }

    /// Underlying API or transport message
    pub fn detail(&self) -> String {
        match self {
            Self::Validation { detail, .. }
            | Self::Config { detail, .. }
            | Self::Transport { detail, .. } => detail.clone(),
            Self::Remote { status, body, .. } => format!("Graph returned {status}\n{body}"),
            Self::Invariant(detail) | Self::Cancelled(detail) => detail.clone(),
        }
    }

    /// Stable label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Config { .. } => "config",
            Self::Remote { .. } => "remote",
            Self::Transport { .. } => "transport",
            Self::Invariant(_) => "invariant",
            Self::Cancelled(_) => "cancelled",
        }
    }
}
