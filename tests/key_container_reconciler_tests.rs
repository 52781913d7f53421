//! Key container reconciler tests
//!
//! Drive `KeyContainerReconciler` against a scripted in-memory directory.

mod common;

use common::{Call, FakeDirectory};
use ief_policy_controller::controller::keys::{StoredKeyContainer, StoredProvisioning, StoredUpload};
use ief_policy_controller::model::{
    GenerateSpec, KeyContainerConfig, KeyType, KeyUsage, Provisioning, SecretValue, UploadSpec,
};
use ief_policy_controller::{KeyContainerReconciler, ReconcileError, StateChange};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

const CREATED: &str = r#"{"id":"B2C_1A_TokenSigningKeyContainer","keys":[]}"#;
const NOT_FOUND: &str = r#"{"error":{"code":"AADB2C90073","message":"Keyset with id 'B2C_1A_Gone' does not exist."}}"#;

fn reconciler(directory: FakeDirectory) -> (KeyContainerReconciler, Arc<FakeDirectory>) {
    let directory = Arc::new(directory);
    (KeyContainerReconciler::new(directory.clone()), directory)
}

fn generate_config() -> KeyContainerConfig {
    KeyContainerConfig {
        name: "TokenSigningKeyContainer".to_string(),
        usage: KeyUsage::Signing,
        provisioning: Provisioning::Generate(GenerateSpec::default()),
    }
}

fn upload_config(version: Option<i64>) -> KeyContainerConfig {
    KeyContainerConfig {
        name: "FacebookSecret".to_string(),
        usage: KeyUsage::Signing,
        provisioning: Provisioning::Upload(UploadSpec {
            value_version: version,
        }),
    }
}

fn stored_upload(id: &str, version: Option<i64>, leaked: Option<&str>) -> StoredKeyContainer {
    StoredKeyContainer {
        id: id.to_string(),
        name: "FacebookSecret".to_string(),
        usage: KeyUsage::Signing,
        provisioning: StoredProvisioning::Upload(StoredUpload {
            value: leaked.map(|v| Zeroizing::new(v.to_string())),
            value_version: version,
        }),
    }
}

#[tokio::test]
async fn test_create_generates_key_in_new_container() {
    let (reconciler, directory) = reconciler(
        FakeDirectory::new()
            .respond(201, CREATED)
            .respond(200, r#"{"kid":"abc","kty":"RSA","use":"sig"}"#),
    );

    let outcome = reconciler
        .create(&CancellationToken::new(), &generate_config(), None)
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.state.id, "B2C_1A_TokenSigningKeyContainer");
    assert_eq!(
        directory.calls(),
        vec![
            Call::CreateKeyContainer {
                name: "TokenSigningKeyContainer".to_string(),
                usage: KeyUsage::Signing
            },
            Call::GenerateKey {
                id: "B2C_1A_TokenSigningKeyContainer".to_string(),
                usage: KeyUsage::Signing,
                kty: KeyType::Rsa
            },
        ]
    );
}

#[tokio::test]
async fn test_create_uploads_secret_and_persists_version_only() {
    let (reconciler, directory) = reconciler(
        FakeDirectory::new()
            .respond(201, r#"{"id":"B2C_1A_FacebookSecret"}"#)
            .respond(200, "{}"),
    );
    let secret = SecretValue::new("fb-app-secret");

    let outcome = reconciler
        .create(&CancellationToken::new(), &upload_config(Some(1)), Some(&secret))
        .await
        .unwrap();

    assert!(outcome.is_complete());
    let json = serde_json::to_string(&outcome.state).unwrap();
    assert!(!json.contains("fb-app-secret"));
    assert_eq!(outcome.state.provisioning.value_version(), Some(1));
    assert!(matches!(
        &directory.calls()[1],
        Call::UploadSecret { secret, .. } if secret == "fb-app-secret"
    ));
}

#[tokio::test]
async fn test_create_with_failing_provisioning_keeps_container_id() {
    let (reconciler, _) = reconciler(
        FakeDirectory::new()
            .respond(201, CREATED)
            .respond(400, r#"{"error":{"code":"AADB2C90000","message":"bad key"}}"#),
    );

    let outcome = reconciler
        .create(&CancellationToken::new(), &generate_config(), None)
        .await
        .unwrap();

    assert_eq!(outcome.state.id, "B2C_1A_TokenSigningKeyContainer");
    let err = outcome.error.unwrap();
    assert!(matches!(err, ReconcileError::Remote { .. }));
    assert!(err.detail().contains("bad key"));
}

#[tokio::test]
async fn test_failed_create_upload_is_retried_by_next_update() {
    let (reconciler, directory) = reconciler(
        FakeDirectory::new()
            .respond(201, r#"{"id":"B2C_1A_FacebookSecret"}"#)
            .respond(500, "upload rejected")
            .respond(200, "{}"),
    );
    let secret = SecretValue::new("fb-app-secret");
    let config = upload_config(Some(1));

    let outcome = reconciler
        .create(&CancellationToken::new(), &config, Some(&secret))
        .await
        .unwrap();
    assert!(!outcome.is_complete());
    assert_eq!(outcome.state.id, "B2C_1A_FacebookSecret");
    assert_eq!(outcome.state.provisioning.value_version(), None);

    let state = reconciler
        .update(
            &CancellationToken::new(),
            &config,
            Some(&secret),
            StoredKeyContainer::from(outcome.state),
        )
        .await
        .unwrap();

    let uploads = directory
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Call::UploadSecret { .. }))
        .count();
    assert_eq!(uploads, 2);
    assert_eq!(state.provisioning.value_version(), Some(1));
}

#[tokio::test]
async fn test_create_rejected_container_persists_nothing() {
    let (reconciler, directory) = reconciler(
        FakeDirectory::new().respond(409, r#"{"error":{"message":"already exists"}}"#),
    );

    let err = reconciler
        .create(&CancellationToken::new(), &generate_config(), None)
        .await
        .unwrap_err();

    assert_eq!(err.summary(), "Create keyset failed");
    assert_eq!(directory.calls().len(), 1);
}

#[tokio::test]
async fn test_create_without_id_in_response_fails() {
    let (reconciler, _) = reconciler(FakeDirectory::new().respond(201, "{}"));

    let err = reconciler
        .create(&CancellationToken::new(), &generate_config(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Remote { .. }));
}

#[tokio::test]
async fn test_create_validates_before_any_remote_call() {
    let (reconciler, directory) = reconciler(FakeDirectory::new());

    let err = reconciler
        .create(
            &CancellationToken::new(),
            &upload_config(Some(-2)),
            Some(&SecretValue::new("x")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Validation { .. }));

    let err = reconciler
        .create(&CancellationToken::new(), &upload_config(None), None)
        .await
        .unwrap_err();
    assert_eq!(err.detail(), "cannot upload an empty secret");

    assert!(directory.calls().is_empty());
}

#[tokio::test]
async fn test_read_existing_container_keeps_sanitized_state() {
    let (reconciler, directory) = reconciler(
        FakeDirectory::new().respond(200, r#"{"id":"B2C_1A_FacebookSecret","keys":[]}"#),
    );

    let change = reconciler
        .read(
            &CancellationToken::new(),
            stored_upload("B2C_1A_FacebookSecret", Some(3), Some("leaked")),
        )
        .await
        .unwrap();

    let state = change.into_state().unwrap();
    assert_eq!(state.provisioning.value_version(), Some(3));
    assert!(!serde_json::to_string(&state).unwrap().contains("leaked"));
    assert_eq!(
        directory.calls(),
        vec![Call::GetKeyContainer("B2C_1A_FacebookSecret".to_string())]
    );
}

#[tokio::test]
async fn test_read_missing_container_is_drift() {
    let (reconciler, _) = reconciler(FakeDirectory::new().respond(404, NOT_FOUND));

    let change = reconciler
        .read(&CancellationToken::new(), stored_upload("B2C_1A_Gone", None, None))
        .await
        .unwrap();

    assert_eq!(change, StateChange::Remove);
}

#[tokio::test]
async fn test_read_without_id_is_drift_without_remote_call() {
    let (reconciler, directory) = reconciler(FakeDirectory::new());

    let change = reconciler
        .read(&CancellationToken::new(), stored_upload("", None, None))
        .await
        .unwrap();

    assert!(change.is_remove());
    assert!(directory.calls().is_empty());
}

#[tokio::test]
async fn test_read_other_failures_are_errors() {
    let (reconciler, _) = reconciler(FakeDirectory::new().respond(403, "Forbidden"));

    let err = reconciler
        .read(&CancellationToken::new(), stored_upload("B2C_1A_Key", None, None))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Read keysets failed: Graph returned 403 Forbidden: Forbidden"
    );
    match err {
        ReconcileError::Remote { status, body, .. } => {
            assert_eq!(status.as_u16(), 403);
            assert_eq!(body, "Forbidden");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_update_with_same_version_skips_upload() {
    let (reconciler, directory) = reconciler(FakeDirectory::new());

    let state = reconciler
        .update(
            &CancellationToken::new(),
            &upload_config(Some(1)),
            Some(&SecretValue::new("unchanged")),
            stored_upload("B2C_1A_FacebookSecret", Some(1), None),
        )
        .await
        .unwrap();

    assert!(directory.calls().is_empty());
    assert_eq!(state.id, "B2C_1A_FacebookSecret");
    assert_eq!(state.provisioning.value_version(), Some(1));
}

#[tokio::test]
async fn test_update_with_new_version_uploads() {
    let (reconciler, directory) = reconciler(FakeDirectory::new().respond(200, "{}"));

    let state = reconciler
        .update(
            &CancellationToken::new(),
            &upload_config(Some(2)),
            Some(&SecretValue::new("rotated")),
            stored_upload("B2C_1A_FacebookSecret", Some(1), Some("old-leaked")),
        )
        .await
        .unwrap();

    assert_eq!(state.provisioning.value_version(), Some(2));
    assert_eq!(
        directory.calls(),
        vec![Call::UploadSecret {
            id: "B2C_1A_FacebookSecret".to_string(),
            usage: KeyUsage::Signing,
            secret: "rotated".to_string()
        }]
    );
}

#[tokio::test]
async fn test_update_with_force_sentinel_always_uploads() {
    let (reconciler, directory) = reconciler(FakeDirectory::new().respond(200, "{}"));

    reconciler
        .update(
            &CancellationToken::new(),
            &upload_config(Some(-1)),
            Some(&SecretValue::new("forced")),
            stored_upload("B2C_1A_FacebookSecret", Some(-1), None),
        )
        .await
        .unwrap();

    assert_eq!(directory.calls().len(), 1);
}

#[tokio::test]
async fn test_update_failed_upload_is_reported() {
    let (reconciler, _) = reconciler(FakeDirectory::new().respond(500, "boom"));

    let err = reconciler
        .update(
            &CancellationToken::new(),
            &upload_config(None),
            Some(&SecretValue::new("s")),
            stored_upload("B2C_1A_FacebookSecret", None, None),
        )
        .await
        .unwrap_err();

    assert_eq!(err.summary(), "Error uploading policy key");
}

#[tokio::test]
async fn test_delete_expects_no_content() {
    let (reconciler, directory) = reconciler(FakeDirectory::new().respond(204, ""));

    reconciler
        .delete(
            &CancellationToken::new(),
            stored_upload("B2C_1A_FacebookSecret", Some(1), Some("leaked")),
        )
        .await
        .unwrap();

    assert_eq!(
        directory.calls(),
        vec![Call::DeleteKeyContainer("B2C_1A_FacebookSecret".to_string())]
    );
}

#[tokio::test]
async fn test_delete_unexpected_status_is_error() {
    let (reconciler, _) = reconciler(FakeDirectory::new().respond(200, "{}"));

    let err = reconciler
        .delete(&CancellationToken::new(), stored_upload("B2C_1A_Key", None, None))
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Remote { .. }));
    assert_eq!(err.summary(), "Delete failed");
}

#[tokio::test]
async fn test_delete_without_id_is_noop() {
    let (reconciler, directory) = reconciler(FakeDirectory::new());

    reconciler
        .delete(&CancellationToken::new(), stored_upload("", None, None))
        .await
        .unwrap();

    assert!(directory.calls().is_empty());
}

#[tokio::test]
async fn test_transport_failure_is_reported() {
    let (reconciler, _) = reconciler(FakeDirectory::new().fail("connection refused"));

    let err = reconciler
        .delete(&CancellationToken::new(), stored_upload("B2C_1A_Key", None, None))
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Transport { .. }));
    assert!(err.detail().contains("connection refused"));
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_call() {
    let (reconciler, _) = reconciler(FakeDirectory::new().hang());
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        reconciler.read(&cancel, stored_upload("B2C_1A_Key", None, None)),
    )
    .await
    .expect("read should return once cancelled")
    .unwrap_err();

    assert!(matches!(err, ReconcileError::Cancelled(_)));
}
