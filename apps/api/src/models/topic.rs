use serde::{Deserialize, Serialize};

/// A single feed a topic draws articles from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

/// Provider parameters for a topic. Opaque to the freshness engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicQuery {
    pub sources: Vec<FeedSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_articles: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    #[serde(rename = "id")]
    pub topic_id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub query: TopicQuery,
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_deserializes_flat_sources() {
        let json = serde_json::json!({
            "id": "ai",
            "name": "AI",
            "sources": [{"name": "OpenAI Blog", "url": "https://openai.com/blog/rss.xml"}]
        });
        let topic: Topic = serde_json::from_value(json).unwrap();
        assert_eq!(topic.topic_id, "ai");
        assert!(topic.enabled);
        assert_eq!(topic.query.sources.len(), 1);
        assert_eq!(topic.query.max_articles, None);
    }
}
