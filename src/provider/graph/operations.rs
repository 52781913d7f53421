//! # Graph Operations
//!
//! `DirectoryClient` implementation for [`GraphClient`].

use super::requests::{CreateKeySetRequest, GenerateKeyRequest, UploadSecretRequest};
use super::GraphClient;
use crate::model::{KeyType, KeyUsage, SecretValue};
use crate::observability::metrics;
use crate::provider::{DirectoryClient, DirectoryResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use std::time::Instant;
use tracing::{debug, warn};

const TRUST_FRAMEWORK: &str = "trustFramework";
const KEY_SETS: &str = "keySets";
const POLICIES: &str = "policies";
const POLICY_CONTENT: &str = "$value";

impl GraphClient {
    /// Build an authenticated request for the path made of `segments`
    async fn make_request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.url(segments)?;
        let token = self
            .tokens
            .bearer()
            .await
            .context("Failed to acquire Graph access token")?;
        Ok(self
            .http_client
            .request(method, url)
            .bearer_auth(token.as_str()))
    }

    /// Send a request and capture status and body, whatever the status
    async fn execute(&self, operation: &str, request: RequestBuilder) -> Result<DirectoryResponse> {
        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_graph_request(operation, "error", start.elapsed().as_secs_f64());
                return Err(e).with_context(|| format!("Graph request {operation} failed"));
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read Graph response body for {operation}"))?;
        metrics::record_graph_request(operation, status.as_str(), start.elapsed().as_secs_f64());

        debug!(
            operation = operation,
            status = status.as_u16(),
            "Graph request completed"
        );

        if status == StatusCode::UNAUTHORIZED {
            warn!(operation = operation, "Graph rejected the access token");
            self.tokens.invalidate().await;
        }

        Ok(DirectoryResponse::new(status, body))
    }
}

#[async_trait]
impl DirectoryClient for GraphClient {
    async fn create_key_container(
        &self,
        name: &str,
        usage: KeyUsage,
    ) -> Result<DirectoryResponse> {
        let body = CreateKeySetRequest {
            id: name,
            usage: usage.as_str(),
            keys: Vec::new(),
        };
        let request = self.make_request(Method::POST, &[TRUST_FRAMEWORK, KEY_SETS]).await?.json(&body);
        self.execute("create_key_set", request).await
    }

    async fn generate_key(
        &self,
        container_id: &str,
        usage: KeyUsage,
        key_type: KeyType,
    ) -> Result<DirectoryResponse> {
        let body = GenerateKeyRequest {
            key_use: usage.as_str(),
            kty: key_type.as_str(),
        };
        let request = self
            .make_request(Method::POST, &[TRUST_FRAMEWORK, KEY_SETS, container_id, "generateKey"])
            .await?
            .json(&body);
        self.execute("generate_key", request).await
    }

    async fn upload_secret(
        &self,
        container_id: &str,
        usage: KeyUsage,
        secret: &SecretValue,
    ) -> Result<DirectoryResponse> {
        let body = UploadSecretRequest {
            key_use: usage.as_str(),
            k: secret.expose(),
        };
        let request = self
            .make_request(Method::POST, &[TRUST_FRAMEWORK, KEY_SETS, container_id, "uploadSecret"])
            .await?
            .json(&body);
        self.execute("upload_secret", request).await
    }

    async fn get_key_container(&self, container_id: &str) -> Result<DirectoryResponse> {
        let request = self
            .make_request(Method::GET, &[TRUST_FRAMEWORK, KEY_SETS, container_id])
            .await?;
        self.execute("get_key_set", request).await
    }

    async fn delete_key_container(&self, container_id: &str) -> Result<DirectoryResponse> {
        let request = self
            .make_request(Method::DELETE, &[TRUST_FRAMEWORK, KEY_SETS, container_id])
            .await?;
        self.execute("delete_key_set", request).await
    }

    async fn put_policy(&self, policy_id: &str, xml: &str) -> Result<DirectoryResponse> {
        let request = self
            .make_request(Method::PUT, &[TRUST_FRAMEWORK, POLICIES, policy_id, POLICY_CONTENT])
            .await?
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(xml.to_string());
        self.execute("put_policy", request).await
    }

    async fn get_policy(&self, policy_id: &str) -> Result<DirectoryResponse> {
        let request = self
            .make_request(Method::GET, &[TRUST_FRAMEWORK, POLICIES, policy_id, POLICY_CONTENT])
            .await?;
        self.execute("get_policy", request).await
    }

    async fn delete_policy(&self, policy_id: &str) -> Result<DirectoryResponse> {
        let request = self
            .make_request(Method::DELETE, &[TRUST_FRAMEWORK, POLICIES, policy_id])
            .await?;
        self.execute("delete_policy", request).await
    }
}
