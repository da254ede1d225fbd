//! Query expansion into keyword variants
//!
//! The original query is split into coarse terms and each term becomes an
//! extra fanout query, widening recall for passages that match only part
//! of the phrasing. No synonym dictionary; terms come from the query
//! itself.

/// Splitter characters between terms: whitespace plus CJK punctuation
fn is_term_separator(c: char) -> bool {
    c.is_whitespace() || "，。、；：！？".contains(c)
}

/// Terms of two or more code points, in order of appearance
pub fn query_terms(query: &str) -> Vec<&str> {
    query
        .split(is_term_separator)
        .map(str::trim)
        .filter(|t| t.chars().count() >= 2)
        .collect()
}

/// Expansion set for a query: the full query first, then each distinct
/// term. Deduplicated so no passage is scored twice for the same string.
pub fn expand_query(query: &str) -> Vec<String> {
    let mut queries = vec![query.to_string()];
    for term in query_terms(query) {
        if !queries.iter().any(|q| q == term) {
            queries.push(term.to_string());
        }
    }

    tracing::debug!(query, expansions = queries.len(), "query expanded");
    queries
}
