//! # Request Types
//!
//! Microsoft Graph trust framework request bodies.
//!
//! API Reference: https://learn.microsoft.com/graph/api/resources/trustframeworkkeyset

use serde::Serialize;

/// Request body for `POST /trustFramework/keySets`
#[derive(Debug, Serialize)]
pub(super) struct CreateKeySetRequest<'a> {
    /// Container name; the service prefixes it with `B2C_1A_` in the returned id
    pub id: &'a str,
    pub usage: &'a str,
    /// Always empty: keys are added by `generateKey` or `uploadSecret`
    pub keys: Vec<serde_json::Value>,
}

/// Request body for `POST /trustFramework/keySets/{id}/generateKey`
#[derive(Debug, Serialize)]
pub(super) struct GenerateKeyRequest<'a> {
    #[serde(rename = "use")]
    pub key_use: &'a str,
    pub kty: &'a str,
}

/// Request body for `POST /trustFramework/keySets/{id}/uploadSecret`
#[derive(Serialize)]
pub(super) struct UploadSecretRequest<'a> {
    #[serde(rename = "use")]
    pub key_use: &'a str,
    /// Raw secret value
    pub k: &'a str,
}

impl std::fmt::Debug for UploadSecretRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSecretRequest")
            .field("use", &self.key_use)
            .field("k", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_key_set_serializes_empty_key_list() {
        let body = serde_json::to_value(CreateKeySetRequest {
            id: "TokenSigningKeyContainer",
            usage: "sig",
            keys: Vec::new(),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"id": "TokenSigningKeyContainer", "usage": "sig", "keys": []})
        );
    }

    #[test]
    fn test_upload_secret_debug_hides_value() {
        let request = UploadSecretRequest {
            key_use: "enc",
            k: "client-secret",
        };
        assert!(!format!("{request:?}").contains("client-secret"));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"use": "enc", "k": "client-secret"})
        );
    }
}
