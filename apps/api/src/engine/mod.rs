//! Freshness Engine: decides whether a topic's summary for a given day is
//! served from the store or generated now, and guarantees at most one
//! in-flight provider call per `(topic_id, summary_date)`.
//!
//! Flow for `get_or_generate`:
//!   read record → decide → (serve | observe in-flight | claim lease →
//!   re-check → write pending → provider call under timeout → write outcome →
//!   release lease)
//!
//! All coordination goes through the `SummaryStore` (conditional upsert and
//! lease rows). Nothing is held in process memory between calls.

pub mod clock;
pub mod prewarm;


use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::summary::{GenerationLease, SummaryRecord, SummaryStatus};
use crate::models::topic::Topic;
use crate::provider::{ContentProvider, ProviderError};
use crate::store::{DateRange, StoreError, SummaryStore, UpsertOutcome};
use crate::topics::TopicStore;

use clock::Clock;

const ABANDONED_ATTEMPT: &str = "previous generation attempt was abandoned (lease expired)";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Topic '{0}' not found")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Day boundary for "today".
    pub timezone: Tz,
    pub provider_timeout: StdDuration,
    pub retry_cooldown: Duration,
    pub max_attempts_per_day: i32,
    pub lease_ttl: Duration,
    /// How long a caller waits on someone else's in-flight attempt. Zero returns pending at once.
    pub pending_wait: StdDuration,
    pub pending_poll: StdDuration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            provider_timeout: StdDuration::from_secs(60),
            retry_cooldown: Duration::seconds(300),
            max_attempts_per_day: 3,
            lease_ttl: Duration::seconds(120),
            pending_wait: StdDuration::ZERO,
            pending_poll: StdDuration::from_millis(250),
        }
    }
}

/// Tallies from one pre-warm pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PrewarmReport {
    pub ready: usize,
    pub pending: usize,
    pub failed: usize,
    pub errors: usize,
}

#[derive(Debug, PartialEq)]
enum Decision {
    Serve(SummaryRecord),
    InFlight(SummaryRecord),
    Generate,
}

fn decide(
    record: Option<SummaryRecord>,
    lease: Option<&GenerationLease>,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Decision {
    let Some(record) = record else {
        return Decision::Generate;
    };
    match record.status {
        SummaryStatus::Ready => Decision::Serve(record),
        SummaryStatus::Pending => match lease {
            Some(lease) if !lease.is_expired(now) => Decision::InFlight(record),
            // No live lease behind a pending record: its holder crashed.
            _ => Decision::Generate,
        },
        SummaryStatus::Failed if retry_due(&record, now, config) => Decision::Generate,
        SummaryStatus::Failed => Decision::Serve(record),
    }
}

fn retry_due(record: &SummaryRecord, now: DateTime<Utc>, config: &EngineConfig) -> bool {
    if record.attempt_count >= config.max_attempts_per_day {
        return false;
    }
    match record.last_attempt_at {
        Some(at) => at + config.retry_cooldown <= now,
        None => true,
    }
}

pub struct FreshnessEngine {
    topics: Arc<dyn TopicStore>,
    store: Arc<dyn SummaryStore>,
    provider: Arc<dyn ContentProvider>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl FreshnessEngine {
    pub fn new(
        topics: Arc<dyn TopicStore>,
        store: Arc<dyn SummaryStore>,
        provider: Arc<dyn ContentProvider>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            topics,
            store,
            provider,
            clock,
            config,
        }
    }

    /// Current calendar date in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        self.clock
            .now()
            .with_timezone(&self.config.timezone)
            .date_naive()
    }

    async fn topic(&self, topic_id: &str) -> Result<Topic, EngineError> {
        self.topics
            .get(topic_id)
            .await
            .ok_or_else(|| EngineError::NotFound(topic_id.to_string()))
    }

    /// Returns the summary for `topic_id` on `as_of` (default: today), generating
    /// it if the key has no record or a retry is due.
    ///
    /// Provider failures are not errors here: they come back as a `failed`
    /// record. Only unknown topics and storage failures return `Err`.
    pub async fn get_or_generate(
        &self,
        topic_id: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<SummaryRecord, EngineError> {
        let topic = self.topic(topic_id).await?;
        let date = as_of.unwrap_or_else(|| self.today());
        let deadline = Instant::now() + self.config.pending_wait;

        loop {
            let record = self.store.get(topic_id, date).await?;
            let lease = match &record {
                Some(r) if r.status == SummaryStatus::Pending => {
                    self.store.get_lease(topic_id, date).await?
                }
                _ => None,
            };
            let now = self.clock.now();

            let in_flight = match decide(record, lease.as_ref(), now, &self.config) {
                Decision::Serve(record) => return Ok(record),
                Decision::InFlight(record) => record,
                Decision::Generate => match self.attempt(&topic, date).await? {
                    Some(record) => return Ok(record),
                    None => {
                        debug!("Lease for {}/{} held elsewhere, observing", topic_id, date);
                        match self.store.get(topic_id, date).await? {
                            Some(r) if r.status != SummaryStatus::Pending => return Ok(r),
                            Some(r) => r,
                            // Winner has the lease but has not written pending yet.
                            None => SummaryRecord::pending(topic_id, date, now),
                        }
                    }
                },
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(in_flight);
            }
            tokio::time::sleep(remaining.min(self.config.pending_poll)).await;
        }
    }

    /// Clears the record for a key so the next read regenerates it.
    /// Returns whether a record existed.
    pub async fn invalidate(
        &self,
        topic_id: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<bool, EngineError> {
        self.topic(topic_id).await?;
        let date = as_of.unwrap_or_else(|| self.today());
        let removed = self.store.delete(topic_id, date).await?;
        info!(
            "Invalidated summary {}/{} (record existed: {})",
            topic_id, date, removed
        );
        Ok(removed)
    }

    /// `invalidate` followed by `get_or_generate` on the same resolved date.
    pub async fn refresh(
        &self,
        topic_id: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<SummaryRecord, EngineError> {
        let date = as_of.unwrap_or_else(|| self.today());
        self.invalidate(topic_id, Some(date)).await?;
        self.get_or_generate(topic_id, Some(date)).await
    }

    pub async fn history(
        &self,
        topic_id: &str,
        range: DateRange,
        limit: usize,
    ) -> Result<Vec<SummaryRecord>, EngineError> {
        self.topic(topic_id).await?;
        Ok(self.store.list(topic_id, range, limit).await?)
    }

    /// Runs `get_or_generate` for every enabled topic for today.
    pub async fn prewarm_all(&self) -> PrewarmReport {
        let date = self.today();
        let mut report = PrewarmReport::default();
        for topic in self.topics.list().await {
            match self.get_or_generate(&topic.topic_id, Some(date)).await {
                Ok(record) => match record.status {
                    SummaryStatus::Ready => report.ready += 1,
                    SummaryStatus::Pending => report.pending += 1,
                    SummaryStatus::Failed => report.failed += 1,
                },
                Err(e) => {
                    warn!("Pre-warm failed for topic '{}': {}", topic.topic_id, e);
                    report.errors += 1;
                }
            }
        }
        report
    }

    // ────────────────────────────────────────────────────────────────────────
    // Generation under lease
    // ────────────────────────────────────────────────────────────────────────

    /// One generation attempt. `Ok(None)` means another caller holds the lease.
    async fn attempt(
        &self,
        topic: &Topic,
        date: NaiveDate,
    ) -> Result<Option<SummaryRecord>, EngineError> {
        let holder = Uuid::new_v4();
        let claimed = self
            .store
            .acquire_lease(
                &topic.topic_id,
                date,
                holder,
                self.clock.now(),
                self.config.lease_ttl,
            )
            .await?;
        if !claimed {
            return Ok(None);
        }

        let result = self.attempt_under_lease(topic, date).await;

        if let Err(e) = self
            .store
            .release_lease(&topic.topic_id, date, holder)
            .await
        {
            // Unreleased leases expire on their own.
            warn!(
                "Failed to release lease for {}/{}: {}",
                topic.topic_id, date, e
            );
        }

        result.map(Some)
    }

    async fn attempt_under_lease(
        &self,
        topic: &Topic,
        date: NaiveDate,
    ) -> Result<SummaryRecord, EngineError> {
        let topic_id = topic.topic_id.as_str();
        let now = self.clock.now();

        // Re-read under the lease: the previous holder may have finished
        // between our first read and the claim.
        let (attempts, last_error) = match self.store.get(topic_id, date).await? {
            None => (0, None),
            Some(r) if r.is_ready() => return Ok(r),
            Some(r) if r.status == SummaryStatus::Failed => {
                if !retry_due(&r, now, &self.config) {
                    return Ok(r);
                }
                (r.attempt_count, r.last_error)
            }
            Some(r) => {
                let attempts = r.attempt_count + 1;
                warn!(
                    "Reclaimed abandoned attempt {} for {}/{}",
                    attempts, topic_id, date
                );
                if attempts >= self.config.max_attempts_per_day {
                    let failed = SummaryRecord {
                        status: SummaryStatus::Failed,
                        attempt_count: attempts,
                        last_error: Some(ABANDONED_ATTEMPT.to_string()),
                        last_attempt_at: Some(now),
                        updated_at: now,
                        ..r
                    };
                    return self.write(failed).await;
                }
                (attempts, Some(ABANDONED_ATTEMPT.to_string()))
            }
        };

        let pending = SummaryRecord {
            attempt_count: attempts,
            last_error,
            ..SummaryRecord::pending(topic_id, date, now)
        };
        if self.store.upsert(&pending).await? == UpsertOutcome::Rejected {
            return self.read_back(pending).await;
        }

        info!(
            "Generating summary for {}/{} (attempt {} of {})",
            topic_id,
            date,
            attempts + 1,
            self.config.max_attempts_per_day
        );

        let timeout = self.config.provider_timeout;
        let result = match tokio::time::timeout(
            timeout,
            self.provider.fetch_summary(&topic.name, &topic.query, timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout.as_millis())),
        };

        let finished = self.clock.now();
        let outcome = match result {
            Ok(content) => {
                info!("Summary ready for {}/{}", topic_id, date);
                SummaryRecord {
                    status: SummaryStatus::Ready,
                    content: Some(content),
                    generated_at: Some(finished),
                    attempt_count: attempts + 1,
                    last_error: None,
                    updated_at: finished,
                    ..pending
                }
            }
            Err(e) => {
                warn!(
                    "Summary attempt {} failed for {}/{}: {}",
                    attempts + 1,
                    topic_id,
                    date,
                    e
                );
                SummaryRecord {
                    status: SummaryStatus::Failed,
                    attempt_count: attempts + 1,
                    last_error: Some(e.to_string()),
                    // Cooldown runs from the failure, not from the attempt start.
                    last_attempt_at: Some(finished),
                    updated_at: finished,
                    ..pending
                }
            }
        };

        self.write(outcome).await
    }

    async fn write(&self, record: SummaryRecord) -> Result<SummaryRecord, EngineError> {
        match self.store.upsert(&record).await? {
            UpsertOutcome::Written(written) => Ok(written),
            UpsertOutcome::Rejected => self.read_back(record).await,
        }
    }

    /// A rejected write means the key already holds a ready record; serve that one.
    async fn read_back(&self, attempted: SummaryRecord) -> Result<SummaryRecord, EngineError> {
        debug!(
            "Write for {}/{} rejected, serving stored record",
            attempted.topic_id, attempted.summary_date
        );
        Ok(self
            .store
            .get(&attempted.topic_id, attempted.summary_date)
            .await?
            .unwrap_or(attempted))
    }
}
