//! Content Provider Client: the narrow seam between the freshness engine and
//! whatever turns a topic query into summary text.
//!
//! One call is one attempt as far as the engine is concerned. Cross-attempt
//! retries, cooldowns and the daily ceiling belong to the engine.

pub mod dedup;
pub mod digest;
pub mod fetcher;
pub mod prompts;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm_client::LlmError;
use crate::models::topic::TopicQuery;

pub use digest::FeedDigestProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider timed out after {0}ms")]
    Timeout(u128),

    #[error("provider error: {0}")]
    Upstream(String),
}

impl From<LlmError> for ProviderError {
    fn from(e: LlmError) -> Self {
        ProviderError::Upstream(format!("summarization failed: {e}"))
    }
}

/// Produces the summary text for one topic. `timeout` is the caller's budget
/// for the whole call; implementations should size their own I/O under it.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn fetch_summary(
        &self,
        topic_name: &str,
        query: &TopicQuery,
        timeout: Duration,
    ) -> Result<String, ProviderError>;
}
