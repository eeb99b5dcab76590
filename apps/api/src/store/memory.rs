use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use super::{DateRange, StoreError, SummaryStore, UpsertOutcome};
use crate::models::summary::{GenerationLease, SummaryRecord, SummaryStatus};

type Key = (String, NaiveDate);

#[derive(Default)]
struct Inner {
    // Per-topic BTreeMap keeps history queries ordered by date.
    summaries: HashMap<String, BTreeMap<NaiveDate, SummaryRecord>>,
    leases: HashMap<Key, GenerationLease>,
}

/// Process-local store. Every operation runs under one mutex, which gives the
/// same conditional-write semantics as the Postgres backend within a process.
#[derive(Default)]
pub struct MemorySummaryStore {
    inner: Mutex<Inner>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the guard cannot leave a half-written record.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SummaryStore for MemorySummaryStore {
    async fn get(
        &self,
        topic_id: &str,
        date: NaiveDate,
    ) -> Result<Option<SummaryRecord>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .summaries
            .get(topic_id)
            .and_then(|days| days.get(&date))
            .cloned())
    }

    async fn upsert(&self, record: &SummaryRecord) -> Result<UpsertOutcome, StoreError> {
        let mut inner = self.lock();
        let days = inner.summaries.entry(record.topic_id.clone()).or_default();
        if let Some(existing) = days.get(&record.summary_date) {
            if existing.status == SummaryStatus::Ready {
                return Ok(UpsertOutcome::Rejected);
            }
        }
        days.insert(record.summary_date, record.clone());
        Ok(UpsertOutcome::Written(record.clone()))
    }

    async fn list(
        &self,
        topic_id: &str,
        range: DateRange,
        limit: usize,
    ) -> Result<Vec<SummaryRecord>, StoreError> {
        if range.from > range.to {
            return Ok(Vec::new());
        }
        let inner = self.lock();
        Ok(inner
            .summaries
            .get(topic_id)
            .map(|days| {
                days.range(range.from..=range.to)
                    .take(limit)
                    .map(|(_, r)| r.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, topic_id: &str, date: NaiveDate) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        Ok(inner
            .summaries
            .get_mut(topic_id)
            .and_then(|days| days.remove(&date))
            .is_some())
    }

    async fn acquire_lease(
        &self,
        topic_id: &str,
        date: NaiveDate,
        holder_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let key = (topic_id.to_string(), date);
        if let Some(existing) = inner.leases.get(&key) {
            if !existing.is_expired(now) {
                return Ok(false);
            }
        }
        inner.leases.insert(
            key,
            GenerationLease {
                topic_id: topic_id.to_string(),
                summary_date: date,
                holder_id,
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release_lease(
        &self,
        topic_id: &str,
        date: NaiveDate,
        holder_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let key = (topic_id.to_string(), date);
        if inner
            .leases
            .get(&key)
            .is_some_and(|lease| lease.holder_id == holder_id)
        {
            inner.leases.remove(&key);
        }
        Ok(())
    }

    async fn get_lease(
        &self,
        topic_id: &str,
        date: NaiveDate,
    ) -> Result<Option<GenerationLease>, StoreError> {
        let inner = self.lock();
        Ok(inner.leases.get(&(topic_id.to_string(), date)).cloned())
    }
}
