use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{DateRange, StoreError, SummaryStore, UpsertOutcome};
use crate::models::summary::{GenerationLease, SummaryRecord, SummaryRow};

/// Postgres-backed store. Correct across any number of service instances:
/// the ready-guard and the lease claim are single conditional statements.
#[derive(Clone)]
pub struct PgSummaryStore {
    pool: PgPool,
}

impl PgSummaryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_record(row: SummaryRow) -> Result<SummaryRecord, StoreError> {
    SummaryRecord::try_from(row).map_err(StoreError::Corrupt)
}

#[async_trait]
impl SummaryStore for PgSummaryStore {
    async fn get(
        &self,
        topic_id: &str,
        date: NaiveDate,
    ) -> Result<Option<SummaryRecord>, StoreError> {
        let row = sqlx::query_as::<_, SummaryRow>(
            "SELECT * FROM summaries WHERE topic_id = $1 AND summary_date = $2",
        )
        .bind(topic_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_record).transpose()
    }

    async fn upsert(&self, record: &SummaryRecord) -> Result<UpsertOutcome, StoreError> {
        // The WHERE on the conflict arm is the write-once guard: a ready row
        // matches nothing, so RETURNING yields no row.
        let row = sqlx::query_as::<_, SummaryRow>(
            r#"
            INSERT INTO summaries
                (topic_id, summary_date, status, content, generated_at,
                 attempt_count, last_error, last_attempt_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (topic_id, summary_date) DO UPDATE SET
                status          = EXCLUDED.status,
                content         = EXCLUDED.content,
                generated_at    = EXCLUDED.generated_at,
                attempt_count   = EXCLUDED.attempt_count,
                last_error      = EXCLUDED.last_error,
                last_attempt_at = EXCLUDED.last_attempt_at,
                updated_at      = EXCLUDED.updated_at
            WHERE summaries.status <> 'ready'
            RETURNING *
            "#,
        )
        .bind(&record.topic_id)
        .bind(record.summary_date)
        .bind(record.status.as_str())
        .bind(&record.content)
        .bind(record.generated_at)
        .bind(record.attempt_count)
        .bind(&record.last_error)
        .bind(record.last_attempt_at)
        .bind(record.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(UpsertOutcome::Written(into_record(row)?)),
            None => {
                debug!(
                    "Upsert rejected for {}/{}: record already ready",
                    record.topic_id, record.summary_date
                );
                Ok(UpsertOutcome::Rejected)
            }
        }
    }

    async fn list(
        &self,
        topic_id: &str,
        range: DateRange,
        limit: usize,
    ) -> Result<Vec<SummaryRecord>, StoreError> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT * FROM summaries
            WHERE topic_id = $1 AND summary_date BETWEEN $2 AND $3
            ORDER BY summary_date ASC
            LIMIT $4
            "#,
        )
        .bind(topic_id)
        .bind(range.from)
        .bind(range.to)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_record).collect()
    }

    async fn delete(&self, topic_id: &str, date: NaiveDate) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM summaries WHERE topic_id = $1 AND summary_date = $2")
                .bind(topic_id)
                .bind(date)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn acquire_lease(
        &self,
        topic_id: &str,
        date: NaiveDate,
        holder_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        // Insert, or take over only an expired lease. Concurrent claimants
        // serialize on the primary key; losers see the winner's fresh row.
        let claimed: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO generation_leases (topic_id, summary_date, holder_id, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (topic_id, summary_date) DO UPDATE SET
                holder_id  = EXCLUDED.holder_id,
                expires_at = EXCLUDED.expires_at
            WHERE generation_leases.expires_at <= $5
            RETURNING holder_id
            "#,
        )
        .bind(topic_id)
        .bind(date)
        .bind(holder_id)
        .bind(now + ttl)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(claimed == Some(holder_id))
    }

    async fn release_lease(
        &self,
        topic_id: &str,
        date: NaiveDate,
        holder_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM generation_leases WHERE topic_id = $1 AND summary_date = $2 AND holder_id = $3",
        )
        .bind(topic_id)
        .bind(date)
        .bind(holder_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_lease(
        &self,
        topic_id: &str,
        date: NaiveDate,
    ) -> Result<Option<GenerationLease>, StoreError> {
        Ok(sqlx::query_as::<_, GenerationLease>(
            "SELECT * FROM generation_leases WHERE topic_id = $1 AND summary_date = $2",
        )
        .bind(topic_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?)
    }
}
