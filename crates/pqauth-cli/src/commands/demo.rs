/*!
 * End-to-end credential lifecycle demo
 *
 * Everything runs in-process against in-memory storage: the credential holder and the
 * service share one address space, so the demo plays both sides.
 */

use anyhow::{Context, Result};
use colored::*;
use pqauth_crypto::{
    current_timestamp_ms, signature, AllowAllGate, KemPublicKey, SignatureSecretKey,
};
use pqauth_policy::{Attributes, PolicyEngineImpl};
use pqauth_risk::BehavioralScorer;
use pqauth_sessions::{
    open_channel, AuthContext, AuthenticateRequest, CredentialManager, CredentialService,
    GenerateCredentialRequest, ServiceConfig, TracingAuditSink,
};
use pqauth_storage::MemoryStorage;
use std::sync::Arc;
use tracing::info;

const DEMO_FINGERPRINT: &str = "pqauth-cli-demo-device";

pub async fn run(
    client_id: &str,
    permissions: Vec<String>,
    location: Option<String>,
    device_integrity: &str,
) -> Result<()> {
    println!("{}", "=== Post-Quantum Credential Demo ===".bold().cyan());
    println!();

    let config = ServiceConfig::from_env().context("Invalid PQAUTH_* configuration")?;
    info!(
        replay_window_ms = config.replay_window_ms,
        session_ttl_ms = config.session_ttl_ms,
        custody = %format!("{}-of-{}", config.custody_threshold, config.custody_shares),
        "Loaded configuration"
    );
    let service = CredentialService::with_components(
        Arc::new(MemoryStorage::new()),
        Arc::new(PolicyEngineImpl::new()),
        Arc::new(BehavioralScorer::new()),
        Arc::new(TracingAuditSink),
        config,
    );
    let context = AuthContext {
        location,
        device_integrity: Some(device_integrity.to_string()),
        ..AuthContext::default()
    };

    // Step 1: Issue a credential
    println!("{}", "Step 1: Generating credential...".yellow());
    let credential = service
        .generate_credential(GenerateCredentialRequest {
            client_id: client_id.to_string(),
            permissions,
            attributes: Attributes::new(),
            device_fingerprint: Some(DEMO_FINGERPRINT.to_string()),
            context: context.clone(),
        })
        .await
        .map_err(|e| anyhow::anyhow!("Credential issuance failed: {}", e.to_public().message))?;
    println!("{}", "✓ Credential issued".green());
    println!("  Key ID: {}", credential.key_id);
    println!("  KEM: {} ({} hex chars)", credential.algorithm, credential.public_key.len());
    println!(
        "  Signature: {} ({} hex chars)",
        credential.signature_algorithm,
        credential.verification_key.len()
    );
    println!("  API Key: {}...", credential.api_key[..8].dimmed());
    println!();

    // Step 2: Sign the challenge
    println!("{}", "Step 2: Signing apiKey:timestamp...".yellow());
    let timestamp = current_timestamp_ms();
    let signing_key = SignatureSecretKey::from_hex(&credential.signing_key)?;
    let message = format!("{}:{}", credential.api_key.as_str(), timestamp);
    let signature = signature::sign(message.as_bytes(), &signing_key)?;
    println!("{}", "✓ Request signed".green());
    println!();

    // Step 3: Authenticate
    println!("{}", "Step 3: Authenticating...".yellow());
    let authenticated = service
        .authenticate(AuthenticateRequest {
            api_key: credential.api_key.as_str().to_owned(),
            timestamp,
            signature: signature.to_hex(),
            device_fingerprint: DEMO_FINGERPRINT.to_string(),
            context,
        })
        .await;
    let authenticated = match authenticated {
        Ok(response) => response,
        Err(e) => {
            let public = e.to_public();
            println!("{}", format!("✗ {} ({})", public.message, public.status).red());
            println!("  {}", format!("Reason: {e}").dimmed());
            return Ok(());
        }
    };
    println!("{}", "✓ Authenticated".green());
    println!("  Session: {}...", authenticated.session_token[..8].dimmed());
    println!("  PQC: {}", authenticated.pqc_status);
    println!("  ABAC: {}", authenticated.abac_status);
    println!("  Behavioral score: {:.2}", authenticated.behavioral_score);
    println!("  Permissions: {}", authenticated.permissions.join(", "));
    println!();

    // Step 4: Validate the session
    println!("{}", "Step 4: Validating session...".yellow());
    let session = service.validate_session(&authenticated.session_token).await?;
    println!("{}", "✓ Session valid".green());
    println!("  Expires At: {}", session.expires_at);
    println!();

    // Step 5: Key exchange
    println!("{}", "Step 5: Opening ML-KEM channel...".yellow());
    let public_key = KemPublicKey::from_bytes(&hex::decode(&credential.public_key)?)?;
    let (ciphertext, mut initiator) = open_channel(&public_key, &credential.key_id)?;
    let mut responder = service
        .establish_channel(&credential.key_id, &ciphertext, &AllowAllGate)
        .await?;
    let sealed = initiator.seal(b"hello over a post-quantum channel")?;
    let opened = responder.open(&sealed)?;
    println!(
        "{}",
        format!("✓ Channel message: {}", String::from_utf8_lossy(&opened)).green()
    );
    println!();

    // Step 6: Revoke
    println!("{}", "Step 6: Revoking session...".yellow());
    let revoked = service.revoke(&authenticated.session_token).await?;
    println!("{}", format!("✓ {}", revoked.message).green());
    println!("  Integrity tag: {}", revoked.artifact.tag.dimmed());

    match service.validate_session(&authenticated.session_token).await {
        Ok(_) => anyhow::bail!("Revoked session still validates"),
        Err(e) => println!(
            "{}",
            format!("✓ Revoked session rejected: {}", e.to_public().message).green()
        ),
    }
    println!();

    println!("{}", "✓ Demo complete".bold().green());
    Ok(())
}
