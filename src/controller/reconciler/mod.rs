//! # Reconcilers
//!
//! Create / Read / Update / Delete entry points for the managed resources.
//!
//! Each entry point runs to completion in the caller's task. Every directory
//! call is raced against the caller's [`CancellationToken`](tokio_util::sync::CancellationToken);
//! nothing is retried.

pub mod key_container;
pub mod policy_document;
pub mod types;

pub use key_container::KeyContainerReconciler;
pub use policy_document::{render_policy, PolicyDocumentReconciler, RenderedPolicy};
pub use types::{Outcome, StateChange};
