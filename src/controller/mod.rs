//! # Controller
//!
//! Core reconciliation logic.
//!
//! - `keys`: legacy state remediation and upload decisions for key containers
//! - `policy`: template loading, settings injection and policy id extraction
//! - `reconciler`: key container and policy document reconcilers

pub mod keys;
pub mod policy;
pub mod reconciler;
