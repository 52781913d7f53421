//! # Directory Client
//!
//! Boundary between the reconcilers and the remote identity platform.
//!
//! Implementations only move bytes: they return the raw status and body of
//! every response and fail only when no response was obtained (timeout,
//! connection error, token acquisition). Deciding which statuses count as
//! success is left to the reconcilers.

use crate::model::{KeyType, KeyUsage, SecretValue};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

pub mod graph;

pub use graph::GraphClient;

/// Raw answer from the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryResponse {
    pub status: StatusCode,
    pub body: String,
}

impl DirectoryResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Key set object as returned by `keySets` endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct KeySetResponse {
    pub id: String,
}

/// Operations the reconcilers need from the trust framework API
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Create an empty key container. Expected status: 201.
    async fn create_key_container(&self, name: &str, usage: KeyUsage)
        -> Result<DirectoryResponse>;

    /// Generate a key inside a container. Expected status: 200.
    async fn generate_key(
        &self,
        container_id: &str,
        usage: KeyUsage,
        key_type: KeyType,
    ) -> Result<DirectoryResponse>;

    /// Upload a secret into a container. Expected status: 200.
    async fn upload_secret(
        &self,
        container_id: &str,
        usage: KeyUsage,
        secret: &SecretValue,
    ) -> Result<DirectoryResponse>;

    /// Fetch a container. Expected status: 200.
    async fn get_key_container(&self, container_id: &str) -> Result<DirectoryResponse>;

    /// Delete a container. Expected status: 204.
    async fn delete_key_container(&self, container_id: &str) -> Result<DirectoryResponse>;

    /// Create or replace a policy document. Expected status: 200 or 201.
    async fn put_policy(&self, policy_id: &str, xml: &str) -> Result<DirectoryResponse>;

    /// Fetch a policy document. Expected status: 200.
    async fn get_policy(&self, policy_id: &str) -> Result<DirectoryResponse>;

    /// Delete a policy document. Expected status: 204.
    async fn delete_policy(&self, policy_id: &str) -> Result<DirectoryResponse>;
}
