//! IEF Policy Controller Library
//!
//! Reconciles Azure AD B2C Identity Experience Framework resources against
//! Microsoft Graph:
//!
//! - policy key containers (generated or uploaded key material)
//! - custom policy documents rendered from XML templates
//!
//! The reconcilers are driven by an external caller (the `iefctl` binary, or
//! any other state-management loop) that owns persisted state.

pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod model;
pub mod observability;
pub mod provider;

pub use config::DirectoryConfig;
pub use controller::reconciler::{
    render_policy, KeyContainerReconciler, Outcome, PolicyDocumentReconciler, RenderedPolicy,
    StateChange,
};
pub use error::ReconcileError;
pub use provider::{DirectoryClient, DirectoryResponse, GraphClient};
