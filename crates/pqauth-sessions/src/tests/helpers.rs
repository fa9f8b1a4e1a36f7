//! Test helpers and mocks for credential service tests.

use crate::*;
use async_trait::async_trait;
use pqauth_crypto::{current_timestamp_ms, signature, SignatureSecretKey};
use pqauth_policy::{Attributes, PolicyEngineImpl};
use pqauth_risk::BehavioralScorer;
use pqauth_storage::{Batch, MemoryStorage, Storage};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const TEST_CLIENT_ID: &str = "test-client-001";
pub const TEST_FINGERPRINT: &str = "dev-1";

/// Audit sink that keeps every event for inspection
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }

    pub async fn of_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.events()
            .await
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

pub type TestService = CredentialService<MemoryStorage, PolicyEngineImpl, RecordingAuditSink>;

pub struct TestHarness {
    pub storage: Arc<MemoryStorage>,
    pub audit: Arc<RecordingAuditSink>,
    pub scorer: Arc<BehavioralScorer>,
    pub service: TestService,
}

/// Helper to create a service over fresh in-memory storage
pub fn create_test_service() -> TestHarness {
    create_test_service_with_config(ServiceConfig::default())
}

pub fn create_test_service_with_config(config: ServiceConfig) -> TestHarness {
    let storage = Arc::new(MemoryStorage::new());
    let audit = Arc::new(RecordingAuditSink::default());
    let scorer = Arc::new(BehavioralScorer::new());
    let service = CredentialService::with_components(
        Arc::clone(&storage),
        Arc::new(PolicyEngineImpl::new()),
        Arc::clone(&scorer),
        Arc::clone(&audit),
        config,
    );
    TestHarness {
        storage,
        audit,
        scorer,
        service,
    }
}

pub fn generate_request(permissions: &[&str], attributes: Attributes) -> GenerateCredentialRequest {
    GenerateCredentialRequest {
        client_id: TEST_CLIENT_ID.to_string(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        attributes,
        device_fingerprint: None,
        context: AuthContext::default(),
    }
}

/// Helper to mint a credential with `READ_METRICS`
pub async fn issue_test_credential(service: &TestService) -> GenerateCredentialResponse {
    service
        .generate_credential(generate_request(&["READ_METRICS"], Attributes::new()))
        .await
        .unwrap()
}

/// Authentication request signed with the credential's signing key
pub fn signed_request_at(
    credential: &GenerateCredentialResponse,
    timestamp: u64,
    context: AuthContext,
) -> AuthenticateRequest {
    let signing_key = SignatureSecretKey::from_hex(&credential.signing_key).unwrap();
    let message = format!("{}:{}", credential.api_key.as_str(), timestamp);
    let signature = signature::sign(message.as_bytes(), &signing_key).unwrap();

    AuthenticateRequest {
        api_key: credential.api_key.as_str().to_owned(),
        timestamp,
        signature: signature.to_hex(),
        device_fingerprint: TEST_FINGERPRINT.to_string(),
        context,
    }
}

pub fn signed_request(
    credential: &GenerateCredentialResponse,
    device_integrity: Option<&str>,
) -> AuthenticateRequest {
    signed_request_at(
        credential,
        current_timestamp_ms(),
        AuthContext {
            device_integrity: device_integrity.map(str::to_string),
            ..AuthContext::default()
        },
    )
}

/// Mint a credential and authenticate once, returning both
pub async fn issue_test_session(
    service: &TestService,
) -> (GenerateCredentialResponse, AuthenticateResponse) {
    let credential = issue_test_credential(service).await;
    let response = service
        .authenticate(signed_request(&credential, Some("PASS")))
        .await
        .unwrap();
    (credential, response)
}

/// In-memory storage that counts point reads per column family
#[derive(Default)]
pub struct CountingStorage {
    inner: MemoryStorage,
    reads: std::sync::Mutex<HashMap<String, usize>>,
}

impl CountingStorage {
    pub fn reads(&self) -> HashMap<String, usize> {
        self.reads.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.reads.lock().unwrap().clear();
    }
}

#[async_trait]
impl Storage for CountingStorage {
    async fn get<K, V>(&self, cf: &str, key: &K) -> pqauth_storage::Result<Option<V>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        *self.reads.lock().unwrap().entry(cf.to_string()).or_default() += 1;
        self.inner.get(cf, key).await
    }

    async fn put<K, V>(&self, cf: &str, key: &K, value: &V) -> pqauth_storage::Result<()>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync,
    {
        self.inner.put(cf, key, value).await
    }

    async fn delete<K>(&self, cf: &str, key: &K) -> pqauth_storage::Result<()>
    where
        K: Serialize + Send + Sync,
    {
        self.inner.delete(cf, key).await
    }

    async fn compare_and_swap<K, V>(
        &self,
        cf: &str,
        key: &K,
        expected: Option<&V>,
        new: Option<&V>,
    ) -> pqauth_storage::Result<bool>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync,
    {
        self.inner.compare_and_swap(cf, key, expected, new).await
    }

    async fn get_by_prefix<K, V>(
        &self,
        cf: &str,
        prefix: &K,
    ) -> pqauth_storage::Result<Vec<(Vec<u8>, V)>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        self.inner.get_by_prefix(cf, prefix).await
    }

    async fn scan<V>(&self, cf: &str) -> pqauth_storage::Result<Vec<(Vec<u8>, V)>>
    where
        V: DeserializeOwned,
    {
        self.inner.scan(cf).await
    }

    fn batch(&self) -> Box<dyn Batch> {
        self.inner.batch()
    }
}
