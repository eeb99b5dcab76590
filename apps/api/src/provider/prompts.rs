pub const DIGEST_SYSTEM: &str = "You are a concise news digest writer. \
    You write clear, factual bullet points for busy readers.";

/// Filled by `digest::build_prompt`.
pub const DIGEST_PROMPT_TEMPLATE: &str = "\
You are summarizing today's top {topic_name} news for a personal daily digest.

Here are the {article_count} most recent articles:

{articles}

Write 5 concise bullet points summarizing the most important and interesting developments.
Each bullet should:
- Be 1-2 sentences max
- Focus on what actually happened or what's new
- Be written in plain English, no jargon
- Include the source name in brackets at the end, e.g. [Hacker News]

Return only the bullet points, one per line, starting each with \"•\".";
