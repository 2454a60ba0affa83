//! Outbox relay engine.
//!
//! A pass scans a bucket in ascending id order, publishes each recognised
//! envelope and deletes it once the broker acknowledges. Anything that cannot
//! be published stays in the outbox for the next pass, which gives
//! at-least-once delivery.

use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{bucket_for, OutboxEnvelope};
use crate::bus::EventPublisher;
use crate::config::RelayConfig;
use crate::storage::{OutboxStore, Result};

/// Upper bound on `RelayConfig::lookback_days`.
pub const MAX_LOOKBACK_DAYS: u32 = 366;

/// Per-pass outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Envelopes returned by the bucket scans.
    pub fetched: usize,
    /// Envelopes acknowledged by the broker.
    pub published: usize,
    /// Publish attempts that failed or were cancelled.
    pub failed: usize,
    /// Envelopes left untouched: unknown type or undecodable payload.
    pub skipped: usize,
}

impl AddAssign for PassSummary {
    fn add_assign(&mut self, other: Self) {
        self.fetched += other.fetched;
        self.published += other.published;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// Drains outbox buckets into a publisher.
pub struct RelayEngine {
    store: Arc<dyn OutboxStore>,
    publisher: Arc<dyn EventPublisher>,
    config: RelayConfig,
}

impl RelayEngine {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        publisher: Arc<dyn EventPublisher>,
        config: RelayConfig,
    ) -> Self {
        if config.lookback_days > MAX_LOOKBACK_DAYS {
            warn!(
                lookback_days = config.lookback_days,
                max = MAX_LOOKBACK_DAYS,
                "Relay lookback capped"
            );
        }
        Self {
            store,
            publisher,
            config,
        }
    }

    /// Buckets a pass at `now` visits, oldest first.
    ///
    /// The lookback is capped at [`MAX_LOOKBACK_DAYS`]; days before the
    /// earliest representable date are skipped.
    pub fn buckets_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let lookback = self.config.lookback_days.min(MAX_LOOKBACK_DAYS);
        (0..=lookback)
            .rev()
            .filter_map(|days_back| {
                chrono::Duration::try_days(i64::from(days_back))
                    .and_then(|back| now.checked_sub_signed(back))
            })
            .map(bucket_for)
            .collect()
    }

    /// Run one pass over the current bucket (and the lookback window).
    ///
    /// Only a failed scan is returned as an error. Per-envelope failures are
    /// logged and counted in the summary.
    pub async fn process_pass(&self, cancel: &CancellationToken) -> Result<PassSummary> {
        let mut summary = PassSummary::default();
        for bucket in self.buckets_at(Utc::now()) {
            if cancel.is_cancelled() {
                break;
            }
            summary += self.process_bucket(&bucket, cancel).await?;
        }
        Ok(summary)
    }

    /// Run one pass over a single bucket.
    pub async fn process_bucket(
        &self,
        bucket: &str,
        cancel: &CancellationToken,
    ) -> Result<PassSummary> {
        let envelopes = self.store.fetch_pending(bucket).await?;
        let mut summary = PassSummary {
            fetched: envelopes.len(),
            ..PassSummary::default()
        };

        for (index, envelope) in envelopes.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(
                    bucket = %bucket,
                    remaining = envelopes.len() - index,
                    "Relay pass cancelled"
                );
                break;
            }
            self.relay_one(envelope, cancel, &mut summary).await;
        }

        if summary.fetched > 0 {
            debug!(
                bucket = %bucket,
                fetched = summary.fetched,
                published = summary.published,
                failed = summary.failed,
                skipped = summary.skipped,
                "Relay pass over bucket complete"
            );
        }
        Ok(summary)
    }

    async fn relay_one(
        &self,
        envelope: &OutboxEnvelope,
        cancel: &CancellationToken,
        summary: &mut PassSummary,
    ) {
        let Some(kind) = envelope.kind() else {
            warn!(
                id = %envelope.id,
                event_type = %envelope.event_type,
                "Unknown event type, skipping"
            );
            summary.skipped += 1;
            return;
        };

        let body = match kind.retag(&envelope.payload) {
            Ok(body) => body,
            Err(e) => {
                error!(id = %envelope.id, error = %e, "Undecodable outbox payload, leaving in place");
                summary.skipped += 1;
                return;
            }
        };

        let key = envelope.routing_key();
        if let Err(e) = self
            .publisher
            .publish(cancel, kind.as_str(), &key, body)
            .await
        {
            warn!(id = %envelope.id, key = %key, error = %e, "Failed to publish outbox event");
            summary.failed += 1;
            return;
        }
        summary.published += 1;

        if let Err(e) = self.store.delete(&envelope.bucket, envelope.id).await {
            error!(
                id = %envelope.id,
                error = %e,
                "Failed to delete published event from outbox"
            );
        }
    }
}

/// Handle to a running relay task.
pub struct RelayTaskHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RelayTaskHandle {
    /// Signal the relay task to stop. An in-flight publish wait is abandoned.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!(error = %e, "Relay task terminated abnormally");
        }
    }
}

/// Spawn a background task that runs a relay pass every `interval`.
///
/// Returns a handle that can be used to stop the task.
pub fn spawn_relay_task(engine: Arc<RelayEngine>, interval: Duration) -> RelayTaskHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Outbox relay task started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    match engine.process_pass(&token).await {
                        Ok(summary) if summary.published > 0 => {
                            info!(published = summary.published, "Relayed outbox events");
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "Outbox relay pass failed"),
                    }
                }
                _ = token.cancelled() => {
                    info!("Outbox relay task stopped");
                    break;
                }
            }
        }
    });

    RelayTaskHandle { cancel, task }
}
