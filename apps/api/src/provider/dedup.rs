//! Same-story detection within one topic's article batch.
//!
//! Two passes per article, in arrival order: exact URL match, then Jaccard
//! similarity of normalized title word sets against every article kept so
//! far. First seen wins, so higher-quality sources should be listed first.

use std::collections::HashSet;

use tracing::info;

use super::fetcher::Article;

/// Titles at or above this similarity are treated as the same story.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "is",
    "are", "was", "were", "be", "been", "has", "have", "had", "it", "its", "this", "that", "by",
    "from", "as", "new", "how", "why", "what", "who", "will", "can", "just", "more", "up",
    "about",
];

/// Lowercased, punctuation-free title words minus stopwords and single characters.
pub fn normalize_title(title: &str) -> HashSet<String> {
    title
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .split_whitespace()
        .filter(|w| w.chars().count() > 1 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// |A ∩ B| / |A ∪ B|, defined as 0.0 when both sets are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

pub fn deduplicate(articles: Vec<Article>) -> Vec<Article> {
    let before = articles.len();
    let mut kept: Vec<Article> = Vec::with_capacity(before);
    let mut kept_urls: HashSet<String> = HashSet::new();
    let mut kept_titles: Vec<HashSet<String>> = Vec::new();

    for article in articles {
        if kept_urls.contains(&article.url) {
            continue;
        }

        let words = normalize_title(&article.title);
        if kept_titles
            .iter()
            .any(|seen| jaccard(&words, seen) >= SIMILARITY_THRESHOLD)
        {
            continue;
        }

        kept_urls.insert(article.url.clone());
        kept_titles.push(words);
        kept.push(article);
    }

    info!(
        "Deduplication: {} → {} articles ({} removed)",
        before,
        kept.len(),
        before - kept.len()
    );
    kept
}
