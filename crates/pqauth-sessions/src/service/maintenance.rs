//! Pruning of records that can no longer change any outcome.

use crate::{errors::*, traits::*, types::*};
use pqauth_crypto::current_timestamp_ms;
use pqauth_policy::PolicyEngine;
use pqauth_storage::{column_families::*, traits::deserialize_value, Storage};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::CredentialService;

impl<S: Storage, P: PolicyEngine, A: AuditSink> CredentialService<S, P, A> {
    /// Delete expired sessions and revocation tombstones with their index entries, revocation
    /// custody shares past retention, and the baselines of credentials that can no longer
    /// authenticate.
    ///
    /// Expiry is terminal, so a pruned session reads exactly like an expired one.
    pub async fn prune_expired(&self) -> Result<PruneReport> {
        let now = current_timestamp_ms();
        let mut report = PruneReport::default();
        let mut batch = self.storage.batch();

        let sessions: Vec<(Vec<u8>, Session)> = self.storage.scan(CF_SESSIONS).await?;
        let mut expired = HashSet::new();
        for (raw_key, session) in sessions {
            if now >= session.expires_at {
                batch.delete_raw(CF_SESSIONS, raw_key)?;
                expired.insert(session.token_digest);
            }
        }
        report.sessions = expired.len();

        // Only entries of sessions deleted above; a session being issued right now has its
        // record written before its index entry
        let index: Vec<(Vec<u8>, ())> = self.storage.scan(CF_SESSIONS_BY_KEY).await?;
        for (raw_key, ()) in index {
            let (_, token_digest): (String, String) = deserialize_value(&raw_key)?;
            if expired.contains(&token_digest) {
                batch.delete_raw(CF_SESSIONS_BY_KEY, raw_key)?;
                report.index_entries += 1;
            }
        }

        let seal_shares: Vec<(Vec<u8>, SealShare)> =
            self.storage.scan(CF_REVOCATION_SHARES).await?;
        for (raw_key, record) in seal_shares {
            if now >= record.sealed_at.saturating_add(self.config.seal_retention_ms) {
                batch.delete_raw(CF_REVOCATION_SHARES, raw_key)?;
                report.seal_shares += 1;
            }
        }
        batch.commit().await?;

        let credentials: Vec<(Vec<u8>, Credential)> = self.storage.scan(CF_CREDENTIALS).await?;
        let usable: HashSet<String> = credentials
            .into_iter()
            .filter(|(_, c)| {
                matches!(
                    c.effective_state(now),
                    CredentialState::Issued | CredentialState::Active
                )
            })
            .map(|(_, c)| c.key_id)
            .collect();
        report.baselines = self.scorer.retain_baselines(|key_id| usable.contains(key_id));

        if report == PruneReport::default() {
            debug!("Nothing to prune");
        } else {
            info!(
                sessions = report.sessions,
                index_entries = report.index_entries,
                seal_shares = report.seal_shares,
                baselines = report.baselines,
                "Pruned expired records"
            );
        }
        Ok(report)
    }
}

/// Run [`CredentialService::prune_expired`] every `period` until the handle is aborted.
pub fn spawn_pruner<S, P, A>(
    service: Arc<CredentialService<S, P, A>>,
    period: Duration,
) -> JoinHandle<()>
where
    S: Storage + 'static,
    P: PolicyEngine + 'static,
    A: AuditSink + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = service.prune_expired().await {
                warn!(error = %e, "Pruning pass failed");
            }
        }
    })
}
