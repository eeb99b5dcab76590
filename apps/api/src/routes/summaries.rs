//! Axum route handlers for topic summaries. Thin mapping onto `FreshnessEngine`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::summary::{SummaryRecord, SummaryStatus};
use crate::state::AppState;
use crate::store::DateRange;

const DEFAULT_HISTORY_DAYS: u64 = 30;
const DEFAULT_HISTORY_LIMIT: usize = 30;
const MAX_HISTORY_LIMIT: usize = 100;
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Last date of the previous page; the next page starts the day after.
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub topic_id: String,
    pub date: NaiveDate,
    pub status: SummaryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub last_error: Option<String>,
}

impl From<SummaryRecord> for SummaryResponse {
    fn from(record: SummaryRecord) -> Self {
        Self {
            topic_id: record.topic_id,
            date: record.summary_date,
            status: record.status,
            content: record.content,
            generated_at: record.generated_at,
            attempt_count: record.attempt_count,
            last_error: record.last_error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TopicListItem {
    pub id: String,
    pub name: String,
    pub source_count: usize,
}

#[derive(Debug, Serialize)]
pub struct TopicListResponse {
    pub topics: Vec<TopicListItem>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub topic_id: String,
    pub items: Vec<SummaryResponse>,
    pub next_cursor: Option<NaiveDate>,
}

/// Dates outside four-digit years are refused; chrono accepts signed years far
/// beyond what the stores can hold or date arithmetic can reach.
fn parse_date(raw: Option<&str>, field: &str) -> Result<Option<NaiveDate>, AppError> {
    raw.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .filter(|d| (MIN_YEAR..=MAX_YEAR).contains(&d.year()))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "{field} must be a date in YYYY-MM-DD format between years {MIN_YEAR} and {MAX_YEAR}, got '{s}'"
                ))
            })
    })
    .transpose()
}

/// Pending summaries answer 202 so pollers can tell "come back later" from a final answer.
fn summary_reply(record: SummaryRecord) -> (StatusCode, Json<SummaryResponse>) {
    let status = match record.status {
        SummaryStatus::Pending => StatusCode::ACCEPTED,
        SummaryStatus::Ready | SummaryStatus::Failed => StatusCode::OK,
    };
    (status, Json(record.into()))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /topics
pub async fn handle_list_topics(State(state): State<AppState>) -> Json<TopicListResponse> {
    let topics = state
        .topics
        .list()
        .await
        .into_iter()
        .map(|t| TopicListItem {
            source_count: t.query.sources.len(),
            id: t.topic_id,
            name: t.name,
        })
        .collect();
    Json(TopicListResponse { topics })
}

/// GET /topics/:id/summary?date=YYYY-MM-DD
///
/// Serves the day's summary, generating it on first read. Provider failures
/// come back as a `failed` record with 200, not as an error.
pub async fn handle_get_summary(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Query(params): Query<DateQuery>,
) -> Result<(StatusCode, Json<SummaryResponse>), AppError> {
    let date = parse_date(params.date.as_deref(), "date")?;
    let record = state.engine.get_or_generate(&topic_id, date).await?;
    Ok(summary_reply(record))
}

/// POST /topics/:id/summary/refresh?date=YYYY-MM-DD
pub async fn handle_refresh_summary(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Query(params): Query<DateQuery>,
) -> Result<(StatusCode, Json<SummaryResponse>), AppError> {
    let date = parse_date(params.date.as_deref(), "date")?;
    let record = state.engine.refresh(&topic_id, date).await?;
    Ok(summary_reply(record))
}

/// DELETE /topics/:id/summary?date=YYYY-MM-DD
pub async fn handle_invalidate_summary(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Query(params): Query<DateQuery>,
) -> Result<StatusCode, AppError> {
    let date = parse_date(params.date.as_deref(), "date")?;
    state.engine.invalidate(&topic_id, date).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /topics/:id/summaries?from=&to=&cursor=&limit=
///
/// Defaults to the last 30 days ending today. `next_cursor` is set when the
/// page is full; pass it back as `cursor` to continue.
pub async fn handle_summary_history(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_HISTORY_LIMIT}"
        )));
    }

    let to = parse_date(params.to.as_deref(), "to")?.unwrap_or_else(|| state.engine.today());
    let mut from = match parse_date(params.from.as_deref(), "from")? {
        Some(from) => from,
        None => to
            .checked_sub_days(Days::new(DEFAULT_HISTORY_DAYS - 1))
            .ok_or_else(|| AppError::Validation("to is too early for a default range".to_string()))?,
    };
    if from > to {
        return Err(AppError::Validation("from must not be after to".to_string()));
    }
    if let Some(cursor) = parse_date(params.cursor.as_deref(), "cursor")? {
        let next = cursor
            .succ_opt()
            .ok_or_else(|| AppError::Validation("cursor is the last representable date".to_string()))?;
        from = from.max(next);
    }

    // A cursor past `to` yields an empty range, which every store answers with no rows.
    let records = state
        .engine
        .history(&topic_id, DateRange::new(from, to), limit)
        .await?;

    let next_cursor = if records.len() == limit {
        records.last().map(|r| r.summary_date)
    } else {
        None
    };

    Ok(Json(HistoryResponse {
        topic_id,
        items: records.into_iter().map(SummaryResponse::from).collect(),
        next_cursor,
    }))
}
