//! # Policy Rendering
//!
//! - `settings`: `{settings:NAME}` placeholder injection
//! - `policy_id`: `PolicyId` extraction from rendered XML
//! - `template`: template loading

pub mod policy_id;
pub mod settings;
pub mod template;

pub use policy_id::extract_policy_id;
pub use settings::inject_settings;
pub use template::{FsTemplateSource, TemplateSource};
