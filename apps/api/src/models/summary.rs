use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle state of a daily summary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Pending,
    Ready,
    Failed,
}

impl SummaryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStatus::Pending => "pending",
            SummaryStatus::Ready => "ready",
            SummaryStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SummaryStatus::Pending),
            "ready" => Some(SummaryStatus::Ready),
            "failed" => Some(SummaryStatus::Failed),
            _ => None,
        }
    }
}

/// One summary per `(topic_id, summary_date)`. The key is the dedup unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryRecord {
    pub topic_id: String,
    pub summary_date: NaiveDate,
    pub status: SummaryStatus,
    pub content: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    /// Start of the attempt while pending; time of the failure once failed.
    /// The retry cooldown is measured from it.
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl SummaryRecord {
    /// A fresh pending record for a key that has never been attempted.
    pub fn pending(topic_id: &str, summary_date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            topic_id: topic_id.to_string(),
            summary_date,
            status: SummaryStatus::Pending,
            content: None,
            generated_at: None,
            attempt_count: 0,
            last_error: None,
            last_attempt_at: Some(now),
            updated_at: now,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == SummaryStatus::Ready
    }
}

/// Raw `summaries` row. Status is stored as TEXT and validated on the way out.
#[derive(Debug, Clone, FromRow)]
pub struct SummaryRow {
    pub topic_id: String,
    pub summary_date: NaiveDate,
    pub status: String,
    pub content: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SummaryRow> for SummaryRecord {
    type Error = String;

    fn try_from(row: SummaryRow) -> Result<Self, Self::Error> {
        let status = SummaryStatus::parse(&row.status)
            .ok_or_else(|| format!("unknown summary status '{}'", row.status))?;
        Ok(SummaryRecord {
            topic_id: row.topic_id,
            summary_date: row.summary_date,
            status,
            content: row.content,
            generated_at: row.generated_at,
            attempt_count: row.attempt_count,
            last_error: row.last_error,
            last_attempt_at: row.last_attempt_at,
            updated_at: row.updated_at,
        })
    }
}

/// Time-bounded claim on a `(topic_id, summary_date)` key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct GenerationLease {
    pub topic_id: String,
    pub summary_date: NaiveDate,
    pub holder_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl GenerationLease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            SummaryStatus::Pending,
            SummaryStatus::Ready,
            SummaryStatus::Failed,
        ] {
            assert_eq!(SummaryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SummaryStatus::parse("done"), None);
    }

    #[test]
    fn test_row_with_unknown_status_is_rejected() {
        let now = Utc::now();
        let row = SummaryRow {
            topic_id: "weather".to_string(),
            summary_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            status: "archived".to_string(),
            content: None,
            generated_at: None,
            attempt_count: 0,
            last_error: None,
            last_attempt_at: None,
            updated_at: now,
        };
        assert!(SummaryRecord::try_from(row).is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SummaryStatus::Ready).unwrap();
        assert_eq!(json, "\"ready\"");
    }

    #[test]
    fn test_lease_expiry_is_inclusive() {
        let now = Utc::now();
        let lease = GenerationLease {
            topic_id: "ai".to_string(),
            summary_date: now.date_naive(),
            holder_id: Uuid::new_v4(),
            expires_at: now,
        };
        assert!(lease.is_expired(now));
        assert!(!lease.is_expired(now - chrono::Duration::seconds(1)));
    }
}
