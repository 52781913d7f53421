//! # Policy Document Types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// App settings injected into a policy template. `None` values are skipped.
pub type AppSettings = BTreeMap<String, Option<String>>;

/// Desired state of a trust framework policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocumentConfig {
    /// Path of the XML template
    pub file: PathBuf,
    #[serde(default)]
    pub app_settings: AppSettings,
    /// Upload the rendered policy to the tenant
    #[serde(default)]
    pub publish: bool,
}

/// Persisted state of a trust framework policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// `PolicyId` of the rendered document's root element
    #[serde(default)]
    pub id: Option<String>,
    pub file: PathBuf,
    #[serde(default)]
    pub app_settings: AppSettings,
    #[serde(default)]
    pub publish: bool,
    /// Fully rendered policy XML
    pub xml: String,
}

impl PolicyDocument {
    /// Configuration this state was rendered from
    pub fn config(&self) -> PolicyDocumentConfig {
        PolicyDocumentConfig {
            file: self.file.clone(),
            app_settings: self.app_settings.clone(),
            publish: self.publish,
        }
    }
}
