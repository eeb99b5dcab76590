//! Topic Store: read-only access to topic definitions.
//!
//! Topics are authored outside this service. The default backend loads them
//! once from a `topics.json` file and validates the shape up front, so a bad
//! file fails startup instead of surfacing as per-request errors.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::models::topic::{FeedSource, Topic, TopicQuery};

#[derive(Debug, Error)]
pub enum TopicConfigError {
    #[error("Config not found: {0}")]
    Missing(String),

    #[error("Failed to read topics config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid topics JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Read path over topic definitions. Disabled topics are invisible to callers.
#[async_trait]
pub trait TopicStore: Send + Sync {
    async fn get(&self, topic_id: &str) -> Option<Topic>;
    async fn list(&self) -> Vec<Topic>;
}

// ────────────────────────────────────────────────────────────────────────────
// JSON file backend
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawTopicsFile {
    topics: Option<Vec<RawTopic>>,
}

#[derive(Debug, Deserialize)]
struct RawTopic {
    id: Option<String>,
    name: Option<String>,
    enabled: Option<bool>,
    sources: Option<Vec<RawSource>>,
    max_articles: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    name: Option<String>,
    url: Option<String>,
}

/// Topics loaded from a JSON document, keyed by id. Preserves file order for `list`.
pub struct JsonTopicStore {
    order: Vec<String>,
    topics: HashMap<String, Topic>,
}

impl JsonTopicStore {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TopicConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TopicConfigError::Missing(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        let store = Self::from_json(&text)?;
        info!(
            "Loaded {} topics from {}",
            store.order.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn from_json(text: &str) -> Result<Self, TopicConfigError> {
        let raw: RawTopicsFile = serde_json::from_str(text)?;
        let topics = validate_topics(raw)?;
        Ok(Self::from_topics(topics))
    }

    pub fn from_topics(topics: Vec<Topic>) -> Self {
        let order = topics.iter().map(|t| t.topic_id.clone()).collect();
        let topics = topics
            .into_iter()
            .map(|t| (t.topic_id.clone(), t))
            .collect();
        Self { order, topics }
    }
}

#[async_trait]
impl TopicStore for JsonTopicStore {
    async fn get(&self, topic_id: &str) -> Option<Topic> {
        self.topics.get(topic_id).filter(|t| t.enabled).cloned()
    }

    async fn list(&self) -> Vec<Topic> {
        self.order
            .iter()
            .filter_map(|id| self.topics.get(id))
            .filter(|t| t.enabled)
            .cloned()
            .collect()
    }
}

fn validate_topics(raw: RawTopicsFile) -> Result<Vec<Topic>, TopicConfigError> {
    let raw_topics = match raw.topics {
        Some(t) if !t.is_empty() => t,
        _ => {
            return Err(TopicConfigError::Invalid(
                "topics must be a non-empty list".to_string(),
            ))
        }
    };

    let mut seen = HashSet::new();
    let mut topics = Vec::with_capacity(raw_topics.len());

    for raw_topic in raw_topics {
        let id = match raw_topic.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                return Err(TopicConfigError::Invalid(
                    "Each topic must have a string 'id'".to_string(),
                ))
            }
        };
        if !seen.insert(id.clone()) {
            return Err(TopicConfigError::Invalid(format!(
                "Duplicate topic id: {id}"
            )));
        }

        let raw_sources = match raw_topic.sources {
            Some(s) if !s.is_empty() => s,
            _ => {
                return Err(TopicConfigError::Invalid(format!(
                    "Topic '{id}' must have a non-empty sources list"
                )))
            }
        };

        let mut sources = Vec::with_capacity(raw_sources.len());
        for source in raw_sources {
            match (source.name, source.url) {
                (Some(name), Some(url)) => sources.push(FeedSource { name, url }),
                _ => {
                    return Err(TopicConfigError::Invalid(format!(
                        "Topic '{id}' sources must contain name + url"
                    )))
                }
            }
        }

        let name = raw_topic.name.unwrap_or_else(|| title_case(&id));
        topics.push(Topic {
            topic_id: id,
            name,
            enabled: raw_topic.enabled.unwrap_or(true),
            query: TopicQuery {
                sources,
                max_articles: raw_topic.max_articles,
            },
        });
    }

    Ok(topics)
}

fn title_case(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().to_string() + chars.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics_json(body: &str) -> String {
        format!(r#"{{"topics": {body}}}"#)
    }

    #[tokio::test]
    async fn test_loads_valid_topics_and_hides_disabled() {
        let json = topics_json(
            r#"[
                {"id": "ai", "name": "AI", "sources": [{"name": "HN", "url": "https://hn.example/rss"}]},
                {"id": "golf", "name": "Golf", "enabled": false, "sources": [{"name": "G", "url": "https://g.example/rss"}]}
            ]"#,
        );
        let store = JsonTopicStore::from_json(&json).unwrap();

        assert!(store.get("ai").await.is_some());
        assert!(store.get("golf").await.is_none());
        assert!(store.get("missing").await.is_none());

        let listed = store.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].topic_id, "ai");
    }

    #[test]
    fn test_rejects_empty_topics() {
        let err = JsonTopicStore::from_json(&topics_json("[]")).err().unwrap();
        assert!(err.to_string().contains("non-empty list"));

        let err = JsonTopicStore::from_json("{}").err().unwrap();
        assert!(err.to_string().contains("non-empty list"));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let json = topics_json(
            r#"[
                {"id": "ai", "sources": [{"name": "A", "url": "https://a.example"}]},
                {"id": "ai", "sources": [{"name": "B", "url": "https://b.example"}]}
            ]"#,
        );
        let err = JsonTopicStore::from_json(&json).err().unwrap();
        assert_eq!(err.to_string(), "Duplicate topic id: ai");
    }

    #[test]
    fn test_rejects_topic_without_sources() {
        let json = topics_json(r#"[{"id": "ai", "sources": []}]"#);
        let err = JsonTopicStore::from_json(&json).err().unwrap();
        assert!(err.to_string().contains("non-empty sources list"));
    }

    #[test]
    fn test_rejects_source_without_url() {
        let json = topics_json(r#"[{"id": "ai", "sources": [{"name": "A"}]}]"#);
        let err = JsonTopicStore::from_json(&json).err().unwrap();
        assert!(err.to_string().contains("name + url"));
    }

    #[test]
    fn test_rejects_missing_id() {
        let json = topics_json(r#"[{"name": "AI", "sources": [{"name": "A", "url": "u"}]}]"#);
        let err = JsonTopicStore::from_json(&json).err().unwrap();
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn test_missing_name_falls_back_to_title_case() {
        let json = topics_json(r#"[{"id": "science", "sources": [{"name": "A", "url": "u"}]}]"#);
        let store = JsonTopicStore::from_json(&json).unwrap();
        assert_eq!(store.topics["science"].name, "Science");
    }

    #[tokio::test]
    async fn test_bundled_topics_file_is_valid() {
        let store = JsonTopicStore::from_json(include_str!("../../config/topics.json")).unwrap();
        let ids: Vec<_> = store.list().await.into_iter().map(|t| t.topic_id).collect();
        assert_eq!(ids, vec!["ai", "rust"]);
        assert_eq!(store.get("rust").await.unwrap().query.max_articles, Some(8));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = JsonTopicStore::from_path("/nonexistent/topics.json")
            .err()
            .unwrap();
        assert!(matches!(err, TopicConfigError::Missing(_)));
    }
}
