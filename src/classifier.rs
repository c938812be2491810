use crate::agent::memory::{ConversationThread, Role};
use crate::article::Category;

const TECHNOLOGY_KEYWORDS: &[&str] = &[
    "ai",
    "artificial intelligence",
    "machine learning",
    "software",
    "tech",
    "technology",
    "startup",
    "startups",
    "chip",
    "chips",
    "semiconductor",
    "quantum",
    "robot",
    "robotics",
    "cyber",
    "cybersecurity",
    "crypto",
    "blockchain",
    "app",
    "apps",
    "cloud",
    "llm",
    "programming",
    "gpu",
    "computing",
];

const BUSINESS_KEYWORDS: &[&str] = &[
    "stock",
    "stocks",
    "market",
    "markets",
    "economy",
    "finance",
    "financial",
    "earnings",
    "business",
    "ipo",
    "merger",
    "acquisition",
    "investor",
    "investors",
    "revenue",
    "inflation",
    "bank",
    "banks",
    "trade",
    "nasdaq",
    "dow",
    "shares",
    "price",
];

/// Maps a free-text query onto a category by keyword hits. Single words match
/// whole tokens, phrases match as substrings. Ties go to technology, then
/// business; no hits at all means general.
pub fn classify(query: &str) -> Category {
    let lowered = query.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let tech = hits(TECHNOLOGY_KEYWORDS, &lowered, &tokens);
    let business = hits(BUSINESS_KEYWORDS, &lowered, &tokens);

    if tech == 0 && business == 0 {
        Category::General
    } else if tech >= business {
        Category::Technology
    } else {
        Category::Business
    }
}

/// Like [`classify`], but a general follow-up inherits the topic of the most
/// recent user turn in the thread that had one.
pub fn classify_in_context(query: &str, thread: Option<&ConversationThread>) -> Category {
    let category = classify(query);
    if category != Category::General {
        return category;
    }
    thread
        .into_iter()
        .flat_map(|t| t.turns.iter().rev())
        .filter(|turn| turn.role == Role::User)
        .map(|turn| classify(&turn.text))
        .find(|c| *c != Category::General)
        .unwrap_or(Category::General)
}

fn hits(lexicon: &[&str], lowered: &str, tokens: &[&str]) -> usize {
    lexicon
        .iter()
        .filter(|keyword| {
            if keyword.contains(' ') {
                lowered.contains(*keyword)
            } else {
                tokens.contains(keyword)
            }
        })
        .count()
}
