//! Key information extraction (tier three)
//!
//! Pulls structured facts out of each turn with a fixed table of field
//! extractors (order ids, phone numbers, emails, ...) plus one coarse
//! intent label, and folds them into a per-conversation record in the
//! memory store. Later turns overwrite earlier values for the same field,
//! so the record always reflects the latest known state. Labels match both
//! Chinese and English phrasings.

use crate::backend::MemoryStore;
use crate::memory::{scope_label, MemoryError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "chat:key_info:";

/// Field extractors, applied in order; group 1 is the value, first match
/// per field wins.
static EXTRACTORS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        (
            "order_id",
            r"(?i)(?:订单[号|ID]|order[\s_-]?id)[:：]?\s*([A-Z0-9]{6,20})",
        ),
        (
            "phone",
            r"(?i)(?:手机[号|号码]|电话|phone)[:：]?\s*(1[3-9]\d{9})",
        ),
        (
            "email",
            r"(?i)(?:邮箱|email)[:：]?\s*([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})",
        ),
        (
            "category",
            r"(?i)(?:问题[类型|分类]|category)[:：]?\s*([^，。\n]{2,20})",
        ),
        (
            "status",
            r"(?i)(?:状态|status)[:：]?\s*(已解决|未解决|处理中|待处理|已完成|进行中)",
        ),
        (
            "amount",
            r"(?i)(?:金额|价格|费用|amount)[:：]?\s*(\d+(?:\.\d+)?)",
        ),
        (
            "date",
            r"(?i)(?:日期|时间|date)[:：]?\s*(\d{4}[-/]\d{1,2}[-/]\d{1,2})",
        ),
    ]
    .into_iter()
    .map(|(field, pattern)| (field, Regex::new(pattern).unwrap()))
    .collect()
});

/// Intent rules checked in priority order: CJK labels by substring, English
/// ones as whole word tokens.
static INTENTS: &[(&str, &[&str], &[&str])] = &[
    ("how_to", &["如何", "怎么", "怎样"], &["how"]),
    ("what", &["什么", "哪些", "是什么"], &["what", "which"]),
    ("why", &["为什么", "为何"], &["why"]),
    ("when", &["什么时候", "何时"], &["when"]),
    ("where", &["哪里", "在哪"], &["where"]),
    ("who", &["谁", "哪个"], &["who"]),
    ("query", &["查询", "查看", "搜索"], &["search", "query"]),
    ("problem", &["问题", "错误", "异常"], &["problem", "error"]),
];

/// Run every extractor over the text, keeping the first match per field
pub fn extract_fields(text: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for (field, pattern) in EXTRACTORS.iter() {
        if let Some(captures) = pattern.captures(text) {
            if let Some(value) = captures.get(1) {
                fields.insert(field.to_string(), value.as_str().to_string());
            }
        }
    }
    fields
}

/// Coarse intent label for a question; `None` for blank input
pub fn classify_intent(question: &str) -> Option<&'static str> {
    let question = question.trim();
    if question.is_empty() {
        return None;
    }

    let lowered = question.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    for (label, substrings, words) in INTENTS {
        let cjk_hit = substrings.iter().any(|s| lowered.contains(s));
        let word_hit = words.iter().any(|w| tokens.contains(w));
        if cjk_hit || word_hit {
            return Some(label);
        }
    }
    Some("general")
}

/// Structured-fact record per conversation, stored as a JSON map with TTL
pub struct KeyInfoExtractor {
    store: Arc<dyn MemoryStore>,
    ttl: Duration,
}

impl KeyInfoExtractor {
    pub fn new(store: Arc<dyn MemoryStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(user_id: u64, document_id: Option<u64>) -> String {
        format!("{}{}:{}", KEY_PREFIX, user_id, scope_label(document_id))
    }

    /// Extract fields from one turn and merge them into the stored record.
    /// Returns what this turn contributed, not the merged record.
    pub async fn extract_and_store(
        &self,
        user_id: u64,
        document_id: Option<u64>,
        question: &str,
        answer: &str,
    ) -> Result<BTreeMap<String, String>, MemoryError> {
        let full_text = format!("{question}\n{answer}");
        let mut extracted = extract_fields(&full_text);
        if let Some(intent) = classify_intent(question) {
            extracted.insert("intent".to_string(), intent.to_string());
        }

        if !extracted.is_empty() {
            self.merge(user_id, document_id, &extracted).await?;
            debug!(
                user_id,
                scope = %scope_label(document_id),
                fields = extracted.len(),
                "extracted key information"
            );
        }
        Ok(extracted)
    }

    /// The current record for a conversation; absent or unreadable reads as
    /// empty.
    pub async fn current(
        &self,
        user_id: u64,
        document_id: Option<u64>,
    ) -> Result<BTreeMap<String, String>, MemoryError> {
        let key = Self::key(user_id, document_id);
        match self.store.get(&key).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(record) => Ok(record),
                Err(e) => {
                    warn!(key = %key, error = %e, "discarding unreadable key-info record");
                    Ok(BTreeMap::new())
                }
            },
            None => Ok(BTreeMap::new()),
        }
    }

    /// Fold fields into the stored record, new values overwriting old ones
    pub async fn merge(
        &self,
        user_id: u64,
        document_id: Option<u64>,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), MemoryError> {
        if fields.is_empty() {
            return Ok(());
        }

        let key = Self::key(user_id, document_id);
        let mut record = self.current(user_id, document_id).await?;
        for (field, value) in fields {
            record.insert(field.clone(), value.clone());
        }

        let encoded = serde_json::to_string(&record)?;
        self.store.put(&key, &encoded, self.ttl).await?;
        Ok(())
    }

    /// Drop the record for a conversation
    pub async fn clear(&self, user_id: u64, document_id: Option<u64>) -> Result<(), MemoryError> {
        self.store.delete(&Self::key(user_id, document_id)).await?;
        Ok(())
    }
}
