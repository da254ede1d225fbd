//! Query routing: keyword-led vs semantic-led
//!
//! A cheap heuristic decides how much each retrieval branch contributes
//! to the fused score. Long questions lean on the vector branch; short
//! term-like queries lean on the keyword branch; everything else stays
//! balanced.

use once_cell::sync::Lazy;
use regex::Regex;

/// Question-indicator characters; any single occurrence marks the query
/// as interrogative
const INTERROGATIVE_CHARS: &str = "如何什么为怎样";

/// English question words, matched as whole tokens so "show" never
/// counts as "how"
const INTERROGATIVE_WORDS: &[&str] = &["how", "what", "why"];

static CJK_TERM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{4e00}-\u{9fa5}]{2,4}").unwrap());

/// Per-branch fusion weights chosen for one query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryWeights {
    pub keyword: f32,
    pub vector: f32,
}

impl QueryWeights {
    pub const SEMANTIC_LED: Self = Self {
        keyword: 0.3,
        vector: 0.7,
    };
    pub const KEYWORD_LED: Self = Self {
        keyword: 0.7,
        vector: 0.3,
    };
    pub const BALANCED: Self = Self {
        keyword: 0.5,
        vector: 0.5,
    };
}

fn ascii_tokens(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

fn is_interrogative(query: &str, tokens: &[String]) -> bool {
    query
        .chars()
        .any(|c| INTERROGATIVE_CHARS.contains(c))
        || tokens
            .iter()
            .any(|t| INTERROGATIVE_WORDS.contains(&t.as_str()))
}

fn has_specific_term(query: &str, tokens: &[String]) -> bool {
    CJK_TERM.is_match(query)
        || tokens.iter().any(|t| {
            t.chars().any(|c| c.is_ascii_alphabetic()) && t.chars().any(|c| c.is_ascii_digit())
        })
}

/// Classify a query and pick branch weights.
///
/// Rules apply in order: an interrogative query longer than 10 code
/// points is semantic-led; a query with a specific term shorter than 15
/// is keyword-led; anything else is balanced. A short question like
/// "什么" therefore routes keyword-led, because the CJK-term rule fires
/// before the balanced default.
pub fn analyze_query(query: &str) -> QueryWeights {
    let length = query.chars().count();
    let tokens = ascii_tokens(query);

    let weights = if is_interrogative(query, &tokens) && length > 10 {
        QueryWeights::SEMANTIC_LED
    } else if has_specific_term(query, &tokens) && length < 15 {
        QueryWeights::KEYWORD_LED
    } else {
        QueryWeights::BALANCED
    };

    tracing::debug!(
        query,
        length,
        keyword_weight = weights.keyword,
        vector_weight = weights.vector,
        "query routed"
    );
    weights
}
