use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::topic::FeedSource;

/// Max simultaneous open feed connections per topic.
const MAX_CONCURRENT_FETCHES: usize = 10;
const FEED_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = "daily-digest/1.0 (RSS Reader)";

/// Why a single feed was skipped.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("timeout fetching {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("failed to read body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("malformed feed: {0}")]
    Malformed(#[from] feed_rs::parser::ParseFeedError),
}

/// A normalized feed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub source: String,
}

/// Outcome of fetching every source of a topic.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub articles: Vec<Article>,
    pub failed_sources: Vec<String>,
}

#[derive(Clone)]
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Fetches all sources concurrently, keeping source order in the output so
    /// earlier sources win during deduplication. One bad feed never fails the batch.
    pub async fn fetch_all(&self, sources: &[FeedSource], budget: Duration) -> FetchReport {
        let per_feed = budget.min(FEED_TIMEOUT);

        // Owned sources: borrowed ones fail the Send bound of async_trait callers.
        let results: Vec<(String, Result<Vec<Article>, FeedError>)> =
            stream::iter(sources.to_vec())
                .map(|source| async move {
                    let result = self.fetch_feed(&source, per_feed).await;
                    (source.name, result)
                })
                .buffered(MAX_CONCURRENT_FETCHES)
                .collect()
                .await;

        let mut report = FetchReport::default();
        for (name, result) in results {
            match result {
                Ok(articles) => {
                    info!("Fetched {} articles from {}", articles.len(), name);
                    report.articles.extend(articles);
                }
                Err(e) => {
                    warn!("Skipping feed {}: {}", name, e);
                    report.failed_sources.push(name);
                }
            }
        }
        report
    }

    async fn fetch_feed(
        &self,
        source: &FeedSource,
        timeout: Duration,
    ) -> Result<Vec<Article>, FeedError> {
        let response = self
            .client
            .get(&source.url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FeedError::Timeout(source.url.clone())
                } else {
                    FeedError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                url: source.url.clone(),
            });
        }

        let bytes = response.bytes().await.map_err(FeedError::Body)?;
        parse_feed(&bytes, &source.name)
    }
}

/// Parses RSS/Atom bytes into articles. Entries missing a title or link are skipped.
pub fn parse_feed(bytes: &[u8], source_name: &str) -> Result<Vec<Article>, FeedError> {
    let feed = parser::parse(bytes)?;

    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry
                .title
                .map(|t| strip_html(&t.content))
                .unwrap_or_default();
            let url = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .unwrap_or_default();
            if title.is_empty() || url.is_empty() {
                return None;
            }

            let raw_summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            Some(Article {
                title,
                url,
                summary: strip_html(&raw_summary),
                published: entry.published.or(entry.updated),
                source: source_name.to_string(),
            })
        })
        .collect())
}

/// Converts HTML to plain text and collapses all whitespace runs.
pub fn strip_html(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 10_000)
        .unwrap_or_else(|_| html.to_string());
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <link>https://example.com</link>
    <description>d</description>
    <item>
      <title>Rust 2.0 released</title>
      <link>https://example.com/rust</link>
      <description>&lt;p&gt;Big   news &lt;b&gt;today&lt;/b&gt;&lt;/p&gt;</description>
      <pubDate>Sat, 01 Jun 2024 08:00:00 GMT</pubDate>
    </item>
    <item>
      <title>No link here</title>
      <description>dropped</description>
    </item>
    <item>
      <title>Undated entry</title>
      <link>https://example.com/undated</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_normalizes_entries() {
        let articles = parse_feed(RSS.as_bytes(), "Example").unwrap();
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.title, "Rust 2.0 released");
        assert_eq!(first.url, "https://example.com/rust");
        assert_eq!(first.source, "Example");
        assert!(first.summary.contains("Big news"));
        assert!(!first.summary.contains('<'));
        assert!(first.published.is_some());

        assert!(articles[1].published.is_none());
        assert!(articles[1].summary.is_empty());
    }

    #[test]
    fn test_parse_feed_rejects_garbage() {
        let err = parse_feed(b"definitely not xml", "x").unwrap_err();
        assert!(matches!(err, FeedError::Malformed(_)));
        assert!(err.to_string().starts_with("malformed feed"));
    }

    #[test]
    fn test_status_error_names_the_feed() {
        let err = FeedError::Status {
            status: 503,
            url: "https://example.com/rss".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503 from https://example.com/rss");
    }

    fn source(name: &str, url: &str) -> FeedSource {
        FeedSource {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_fetch_all_future_is_send() {
        fn assert_send<T: Send>(_: T) {}
        let fetcher = FeedFetcher::new().unwrap();
        let sources = vec![source("A", "https://a.example/rss")];
        assert_send(fetcher.fetch_all(&sources, Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_unusable_sources_are_reported_in_order() {
        let fetcher = FeedFetcher::new().unwrap();
        let sources = vec![source("First", "not a url"), source("Second", "also not a url")];

        let report = fetcher.fetch_all(&sources, Duration::from_secs(1)).await;
        assert!(report.articles.is_empty());
        assert_eq!(report.failed_sources, vec!["First", "Second"]);
    }

    #[test]
    fn test_strip_html_collapses_whitespace() {
        assert_eq!(strip_html("plain\n\n  text\twith   gaps"), "plain text with gaps");
    }
}
