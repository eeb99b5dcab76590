//! Feed digest provider.
//!
//! Flow: fetch topic feeds → deduplicate → keep the most recent N →
//!       prompt the LLM → extract bullet lines.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::dedup::deduplicate;
use super::fetcher::{Article, FeedFetcher};
use super::prompts::{DIGEST_PROMPT_TEMPLATE, DIGEST_SYSTEM};
use super::{ContentProvider, ProviderError};
use crate::llm_client::LlmClient;
use crate::models::topic::TopicQuery;

pub const DEFAULT_MAX_ARTICLES: usize = 10;
/// Per-article summary excerpt length in the prompt, in characters.
const MAX_SUMMARY_CHARS: usize = 300;
const BULLET: char = '•';

pub struct FeedDigestProvider {
    fetcher: FeedFetcher,
    llm: LlmClient,
}

impl FeedDigestProvider {
    pub fn new(fetcher: FeedFetcher, llm: LlmClient) -> Self {
        Self { fetcher, llm }
    }
}

#[async_trait]
impl ContentProvider for FeedDigestProvider {
    async fn fetch_summary(
        &self,
        topic_name: &str,
        query: &TopicQuery,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let report = self.fetcher.fetch_all(&query.sources, timeout).await;

        if report.articles.is_empty() {
            return Err(if report.failed_sources.len() == query.sources.len() {
                ProviderError::Upstream(format!(
                    "all {} feeds failed: {}",
                    report.failed_sources.len(),
                    report.failed_sources.join(", ")
                ))
            } else {
                ProviderError::Upstream("no articles".to_string())
            });
        }

        let fetched = report.articles.len();
        let articles = trim_articles(
            deduplicate(report.articles),
            query.max_articles.unwrap_or(DEFAULT_MAX_ARTICLES),
        );
        info!(
            "Summarizing topic '{}': {} articles (from {} fetched)",
            topic_name,
            articles.len(),
            fetched
        );

        let prompt = build_prompt(topic_name, &articles);
        let raw = self.llm.complete(&prompt, DIGEST_SYSTEM).await?;

        let bullets = extract_bullets(&raw);
        if bullets.is_empty() {
            return Err(ProviderError::Upstream(
                "model returned no bullet points".to_string(),
            ));
        }
        info!("Generated {} bullets for topic '{}'", bullets.len(), topic_name);
        Ok(bullets.join("\n"))
    }
}

/// Most recent first, undated articles last, capped at `max`.
pub fn trim_articles(mut articles: Vec<Article>, max: usize) -> Vec<Article> {
    // Option orders None < Some, so descending puts undated entries at the end.
    articles.sort_by(|a, b| b.published.cmp(&a.published));
    articles.truncate(max);
    articles
}

pub fn build_prompt(topic_name: &str, articles: &[Article]) -> String {
    let lines = articles
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let summary = if a.summary.is_empty() {
                "No summary available.".to_string()
            } else {
                a.summary.chars().take(MAX_SUMMARY_CHARS).collect()
            };
            format!("{}. [{}] {}\n   {}", i + 1, a.source, a.title, summary)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    DIGEST_PROMPT_TEMPLATE
        .replace("{topic_name}", topic_name)
        .replace("{article_count}", &articles.len().to_string())
        .replace("{articles}", &lines)
}

/// Lines starting with "•". If the model ignored the format, every non-empty
/// line becomes a bullet.
pub fn extract_bullets(raw: &str) -> Vec<String> {
    let bullets: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with(BULLET))
        .map(str::to_string)
        .collect();

    if !bullets.is_empty() {
        return bullets;
    }

    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| format!("{BULLET} {l}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn article(title: &str, hour: Option<u32>) -> Article {
        Article {
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            summary: "x".repeat(400),
            published: hour.map(|h| Utc.with_ymd_and_hms(2024, 6, 1, h, 0, 0).unwrap()),
            source: "Example".to_string(),
        }
    }

    #[test]
    fn test_trim_orders_newest_first_and_undated_last() {
        let trimmed = trim_articles(
            vec![
                article("undated", None),
                article("early", Some(1)),
                article("late", Some(9)),
            ],
            10,
        );
        let titles: Vec<_> = trimmed.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["late", "early", "undated"]);
    }

    #[test]
    fn test_trim_caps_article_count() {
        let articles = (0..15).map(|h| article(&format!("a{h}"), Some(h))).collect();
        let trimmed = trim_articles(articles, DEFAULT_MAX_ARTICLES);
        assert_eq!(trimmed.len(), 10);
        assert_eq!(trimmed[0].title, "a14");
    }

    #[test]
    fn test_prompt_truncates_summaries_and_names_sources() {
        let prompt = build_prompt("AI", &[article("launch", Some(1))]);
        assert!(prompt.contains("today's top AI news"));
        assert!(prompt.contains("1. [Example] launch"));
        assert!(prompt.contains(&"x".repeat(300)));
        assert!(!prompt.contains(&"x".repeat(301)));
        assert!(prompt.contains("Here are the 1 most recent articles"));
    }

    #[test]
    fn test_prompt_marks_missing_summary() {
        let mut a = article("bare", None);
        a.summary.clear();
        assert!(build_prompt("AI", &[a]).contains("No summary available."));
    }

    #[test]
    fn test_extract_bullets_keeps_only_bullet_lines() {
        let raw = "Here you go:\n• One [A]\n  • Two [B]\n\nThanks";
        assert_eq!(extract_bullets(raw), vec!["• One [A]", "• Two [B]"]);
    }

    #[test]
    fn test_extract_bullets_falls_back_to_all_lines() {
        let raw = "- One\n\n- Two\n";
        assert_eq!(extract_bullets(raw), vec!["• - One", "• - Two"]);
    }

    #[test]
    fn test_extract_bullets_of_blank_output_is_empty() {
        assert!(extract_bullets("  \n \n").is_empty());
    }
}
