//! Integration test: end-to-end question answering
//!
//! Drives the full engine with the default offline configuration: ingest,
//! gated retrieval, grounded and general answers, per-conversation memory
//! and document lifecycle.

use std::time::Duration;
use strata::config::Config;
use strata::ChatEngine;
use tempfile::TempDir;

fn engine(dir: &TempDir) -> ChatEngine {
    let mut config = Config::default();
    config.storage.data_dir = dir.path().to_path_buf();
    ChatEngine::new(config).unwrap()
}

fn refund_text() -> String {
    "The refund policy window lasts thirty days from the delivery date. Customers request \
     a refund from the orders page and approved refunds are returned to the original \
     payment method within seven business days. "
        .repeat(2)
}

fn shipping_text() -> String {
    "Standard shipping takes five business days inside the country. Express couriers \
     deliver in two days and tracking numbers arrive by email once the parcel leaves \
     the warehouse. "
        .repeat(2)
}

// Conversation ids are timestamped to the millisecond; keep them distinct.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(2)).await;
}

#[tokio::test]
async fn test_conversation_mixes_grounded_and_general_answers() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let report = engine.ingest("refund-policy", &refund_text()).await.unwrap();
    let doc = report.document_id;

    let grounded = engine.ask(1, Some(doc), "refund policy window").await.unwrap();
    assert!(grounded.grounded);
    assert_eq!(grounded.sources, vec![format!("{doc}_1")]);
    assert!(grounded.text.contains("refund policy"));
    settle().await;

    let general = engine.ask(1, Some(doc), "galaxy cluster trivia").await.unwrap();
    assert!(!general.grounded);
    assert!(general.sources.is_empty());
    settle().await;

    // Both turns landed in the conversation window, oldest first.
    let context = engine.memory().build_context(1, Some(doc), "recap").await;
    assert_eq!(context.short_term.len(), 4);
    assert_eq!(context.short_term[0].content, "refund policy window");
    assert_eq!(context.short_term[2].content, "galaxy cluster trivia");
}

#[tokio::test]
async fn test_document_scope_controls_grounding() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let refund = engine.ingest("refund-policy", &refund_text()).await.unwrap();
    let shipping = engine.ingest("shipping", &shipping_text()).await.unwrap();

    let scoped = engine
        .ask(1, Some(refund.document_id), "refund policy window")
        .await
        .unwrap();
    assert!(scoped.grounded);
    assert!(scoped
        .sources
        .iter()
        .all(|s| s.starts_with(&format!("{}_", refund.document_id))));
    settle().await;

    // The same question against the wrong document finds nothing.
    let missed = engine
        .ask(1, Some(shipping.document_id), "refund policy window")
        .await
        .unwrap();
    assert!(!missed.grounded);
    assert!(missed.sources.is_empty());
}

#[tokio::test]
async fn test_forget_clears_one_conversation_only() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let report = engine.ingest("refund-policy", &refund_text()).await.unwrap();
    let doc = report.document_id;

    engine.ask(1, None, "galaxy cluster trivia").await.unwrap();
    settle().await;
    engine.ask(1, Some(doc), "refund policy window").await.unwrap();
    settle().await;

    engine.forget(1, None).await.unwrap();

    let general = engine.memory().build_context(1, None, "recap").await;
    assert!(general.short_term.is_empty());
    let scoped = engine.memory().build_context(1, Some(doc), "recap").await;
    assert_eq!(scoped.short_term.len(), 2);
}

#[tokio::test]
async fn test_removed_document_no_longer_grounds_answers() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let report = engine.ingest("refund-policy", &refund_text()).await.unwrap();

    assert!(engine.remove_document(report.document_id).await.unwrap());
    assert!(engine.documents().unwrap().is_empty());

    let answer = engine.ask(1, None, "refund policy window").await.unwrap();
    assert!(!answer.grounded);
}

#[tokio::test]
async fn test_stats_track_documents_and_conversations() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    engine.ingest("refund-policy", &refund_text()).await.unwrap();
    engine.ask(1, None, "refund policy window").await.unwrap();

    let stats = engine.stats().unwrap();
    assert_eq!(stats.db.document_count, 1);
    assert_eq!(stats.db.chunk_count, 1);
    // One document chunk plus one recorded conversation turn.
    assert!(stats.db.embedding_count >= 2);
    assert!(stats.db.memory_key_count >= 1);
    assert!(stats.disk_size > 0);
}
