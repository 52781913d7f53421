//! Common test utilities for reconciler and Pact tests
//!
//! Provides rustls initialization, a scripted in-memory directory client and
//! an in-memory template source.

#![allow(dead_code, reason = "each test crate uses a different subset")]

use async_trait::async_trait;
use ief_policy_controller::controller::policy::TemplateSource;
use ief_policy_controller::model::{KeyType, KeyUsage, SecretValue};
use ief_policy_controller::{DirectoryClient, DirectoryResponse};
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` so it only runs once per test binary.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Strip the trailing slash from a Pact mock server URL
pub fn mock_base_url(url: &impl ToString) -> String {
    let mut base_url = url.to_string();
    if base_url.ends_with('/') {
        base_url.pop();
    }
    base_url
}

/// A directory call as observed by [`FakeDirectory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateKeyContainer { name: String, usage: KeyUsage },
    GenerateKey { id: String, usage: KeyUsage, kty: KeyType },
    UploadSecret { id: String, usage: KeyUsage, secret: String },
    GetKeyContainer(String),
    DeleteKeyContainer(String),
    PutPolicy { id: String, xml: String },
    GetPolicy(String),
    DeletePolicy(String),
}

enum Reply {
    Respond(DirectoryResponse),
    Fail(String),
    Hang,
}

/// Directory client that answers from a script and records every call
#[derive(Default)]
pub struct FakeDirectory {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given status and body
    pub fn respond(self, status: u16, body: &str) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        self.push(Reply::Respond(DirectoryResponse::new(status, body)))
    }

    /// Queue a transport failure
    pub fn fail(self, message: &str) -> Self {
        self.push(Reply::Fail(message.to_string()))
    }

    /// Queue a call that never completes
    pub fn hang(self) -> Self {
        self.push(Reply::Hang)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn push(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    async fn answer(&self, call: Call) -> anyhow::Result<DirectoryResponse> {
        self.calls.lock().unwrap().push(call.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(anyhow::anyhow!(message)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(anyhow::anyhow!("unexpected directory call: {call:?}")),
        }
    }
}

#[async_trait]
impl DirectoryClient for FakeDirectory {
    async fn create_key_container(
        &self,
        name: &str,
        usage: KeyUsage,
    ) -> anyhow::Result<DirectoryResponse> {
        self.answer(Call::CreateKeyContainer {
            name: name.to_string(),
            usage,
        })
        .await
    }

    async fn generate_key(
        &self,
        container_id: &str,
        usage: KeyUsage,
        key_type: KeyType,
    ) -> anyhow::Result<DirectoryResponse> {
        self.answer(Call::GenerateKey {
            id: container_id.to_string(),
            usage,
            kty: key_type,
        })
        .await
    }

    async fn upload_secret(
        &self,
        container_id: &str,
        usage: KeyUsage,
        secret: &SecretValue,
    ) -> anyhow::Result<DirectoryResponse> {
        self.answer(Call::UploadSecret {
            id: container_id.to_string(),
            usage,
            secret: secret.expose().to_string(),
        })
        .await
    }

    async fn get_key_container(&self, container_id: &str) -> anyhow::Result<DirectoryResponse> {
        self.answer(Call::GetKeyContainer(container_id.to_string()))
            .await
    }

    async fn delete_key_container(&self, container_id: &str) -> anyhow::Result<DirectoryResponse> {
        self.answer(Call::DeleteKeyContainer(container_id.to_string()))
            .await
    }

    async fn put_policy(&self, policy_id: &str, xml: &str) -> anyhow::Result<DirectoryResponse> {
        self.answer(Call::PutPolicy {
            id: policy_id.to_string(),
            xml: xml.to_string(),
        })
        .await
    }

    async fn get_policy(&self, policy_id: &str) -> anyhow::Result<DirectoryResponse> {
        self.answer(Call::GetPolicy(policy_id.to_string())).await
    }

    async fn delete_policy(&self, policy_id: &str) -> anyhow::Result<DirectoryResponse> {
        self.answer(Call::DeletePolicy(policy_id.to_string())).await
    }
}

/// Template source backed by a map, editable between reconciliations
#[derive(Default)]
pub struct MemoryTemplates {
    files: Mutex<HashMap<PathBuf, String>>,
}

impl MemoryTemplates {
    pub fn with(path: &str, content: &str) -> Self {
        let templates = Self::default();
        templates.set(path, content);
        templates
    }

    pub fn set(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), content.to_string());
    }
}

#[async_trait]
impl TemplateSource for MemoryTemplates {
    async fn load(&self, path: &Path) -> anyhow::Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such template: {}", path.display()))
    }
}
