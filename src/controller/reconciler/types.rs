//! # Reconciliation Types
//!
//! Results shared by both reconcilers and the cancellation wrapper around
//! directory calls.

use crate::error::ReconcileError;
use crate::provider::DirectoryResponse;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Result of reading a resource back from the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange<T> {
    /// The resource still matches; persist this snapshot
    Keep(T),
    /// The resource drifted away; drop it from persisted state
    Remove,
}

impl<T> StateChange<T> {
    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove)
    }

    pub fn into_state(self) -> Option<T> {
        match self {
            Self::Keep(state) => Some(state),
            Self::Remove => None,
        }
    }
}

/// Result of an operation that can fail after persisting part of its work
///
/// When `error` is set the caller should still persist `state` and then
/// report the error.
#[derive(Debug)]
pub struct Outcome<T> {
    pub state: T,
    pub error: Option<ReconcileError>,
}

impl<T> Outcome<T> {
    pub fn complete(state: T) -> Self {
        Self { state, error: None }
    }

    pub fn partial(state: T, error: ReconcileError) -> Self {
        Self {
            state,
            error: Some(error),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Run a directory call unless `cancel` fires first
///
/// Transport failures become [`ReconcileError::Transport`] with `summary`.
pub(crate) async fn cancellable<F>(
    cancel: &CancellationToken,
    summary: &str,
    call: F,
) -> Result<DirectoryResponse, ReconcileError>
where
    F: Future<Output = anyhow::Result<DirectoryResponse>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ReconcileError::Cancelled(summary.to_string())),
        result = call => result.map_err(|e| ReconcileError::transport(summary, &e)),
    }
}
