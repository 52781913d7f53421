//! # Template Source
//!
//! Loads raw policy XML templates. The file system implementation is used by
//! the CLI; tests supply in-memory sources.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Where policy templates are read from
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Read the whole template as UTF-8 text
    async fn load(&self, path: &Path) -> Result<String>;
}

/// Reads templates from the local file system
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTemplateSource;

#[async_trait]
impl TemplateSource for FsTemplateSource {
    async fn load(&self, path: &Path) -> Result<String> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read policy template {}", path.display()))?;
        debug!(path = %path.display(), bytes = content.len(), "Loaded policy template");
        Ok(content)
    }
}
