use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::ChatPipeline;
use crate::config::AppConfig;
use crate::error::{Error, Stage, UpstreamKind};
use crate::generation::PromptTemplate;
use crate::providers::mock::{MockCompletion, MockEmbedder, MockSearch};
use crate::types::{ConversationTurn, Document};

struct Harness {
    embedder: MockEmbedder,
    search: MockSearch,
    completion: MockCompletion,
    pipeline: ChatPipeline,
}

fn harness(embedder: MockEmbedder, search: MockSearch, completion: MockCompletion) -> Harness {
    harness_with(AppConfig::default(), embedder, search, completion)
}

fn harness_with(
    config: AppConfig,
    embedder: MockEmbedder,
    search: MockSearch,
    completion: MockCompletion,
) -> Harness {
    let pipeline = ChatPipeline::new(
        &config,
        Arc::new(embedder.clone()),
        Arc::new(search.clone()),
        Arc::new(completion.clone()),
    );
    Harness {
        embedder,
        search,
        completion,
        pipeline,
    }
}

fn ceo_history() -> Vec<ConversationTurn> {
    vec![
        ConversationTurn::user("who is the CEO?"),
        ConversationTurn::assistant("Jane Doe is the CEO."),
    ]
}

#[tokio::test]
async fn test_no_history_single_document() {
    let h = harness(
        MockEmbedder::default(),
        MockSearch::with_documents(&[Document::new("doc1", "Jane Doe is CEO.")]),
        MockCompletion::default().respond(PromptTemplate::Chat, "Jane Doe is the CEO."),
    );

    let response = h.pipeline.handle_turn("who is the CEO?", &[]).await.unwrap();

    assert_eq!(response.reply, "Jane Doe is the CEO.");
    assert_eq!(response.context, ">>> From: doc1\nJane Doe is CEO.");
    assert_eq!(h.embedder.calls(), vec!["who is the CEO?".to_string()]);
    assert_eq!(h.completion.count(PromptTemplate::QueryIntent), 0);
    assert_eq!(h.completion.count(PromptTemplate::Chat), 1);
}

#[tokio::test]
async fn test_empty_results_still_generate() {
    let h = harness(
        MockEmbedder::default(),
        MockSearch::default(),
        MockCompletion::default().respond(PromptTemplate::Chat, "I don't know."),
    );

    let response = h.pipeline.handle_turn("who is the CEO?", &[]).await.unwrap();

    assert_eq!(response.context, "");
    assert_eq!(response.reply, "I don't know.");
    let requests = h.completion.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].variable("documents"), Some(""));
}

#[tokio::test]
async fn test_embedding_auth_failure_stops_pipeline() {
    let h = harness(
        MockEmbedder::failing(UpstreamKind::AuthFailure),
        MockSearch::with_documents(&[Document::new("doc1", "x")]),
        MockCompletion::default(),
    );

    let err = h.pipeline.handle_turn("who is the CEO?", &[]).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Embedding));
    assert_eq!(err.upstream_kind(), Some(UpstreamKind::AuthFailure));
    assert!(h.search.queries().is_empty());
    assert!(h.completion.requests().is_empty());
}

#[tokio::test]
async fn test_cancel_during_completion() {
    let h = harness(
        MockEmbedder::default(),
        MockSearch::with_documents(&[Document::new("doc1", "x")]),
        MockCompletion::default().with_delay(5_000),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = h
        .pipeline
        .handle_turn_with_cancel("who is the CEO?", &[], &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.stage(), Some(Stage::Completion));
    assert_eq!(h.completion.count(PromptTemplate::Chat), 1);
}

#[tokio::test]
async fn test_cancelled_before_start_makes_no_calls() {
    let h = harness(MockEmbedder::default(), MockSearch::default(), MockCompletion::default());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = h
        .pipeline
        .handle_turn_with_cancel("hello", &[], &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Embedding));
    assert!(err.is_cancelled());
    assert!(h.search.queries().is_empty());
}

#[tokio::test]
async fn test_same_inputs_same_response() {
    let h = harness(
        MockEmbedder::default(),
        MockSearch::with_documents(&[
            Document::new("doc1", "Jane Doe is CEO."),
            Document::new("doc2", "SQD was founded in 2010."),
        ]),
        MockCompletion::default()
            .with_default("Since 2019.")
            .respond(PromptTemplate::QueryIntent, "CEO start date")
            .respond(PromptTemplate::QueryIntent, "CEO start date"),
    );

    let first = h.pipeline.handle_turn("since when?", &ceo_history()).await.unwrap();
    let second = h.pipeline.handle_turn("since when?", &ceo_history()).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_history_triggers_one_intent_call() {
    let h = harness(
        MockEmbedder::default(),
        MockSearch::with_documents(&[Document::new("doc1", "x")]),
        MockCompletion::default().respond(PromptTemplate::QueryIntent, "  CEO start date \n"),
    );

    h.pipeline.handle_turn("since when?", &ceo_history()).await.unwrap();

    assert_eq!(h.completion.count(PromptTemplate::QueryIntent), 1);
    assert_eq!(h.embedder.calls(), vec!["  CEO start date \n".to_string()]);

    let requests = h.completion.requests();
    let intent = &requests[0];
    assert_eq!(intent.template, PromptTemplate::QueryIntent);
    assert_eq!(intent.variable("query"), Some("since when?"));
    assert_eq!(intent.history, ceo_history());
    assert_eq!(intent.max_tokens, 256);

    let chat = &requests[1];
    assert_eq!(chat.template, PromptTemplate::Chat);
    assert_eq!(chat.history, ceo_history());
    assert_eq!(chat.variable("chat_input"), Some("since when?"));
    assert!((chat.temperature - 0.2).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_intent_failure_does_not_fall_back() {
    let h = harness(
        MockEmbedder::default(),
        MockSearch::default(),
        MockCompletion::default().fail_on(PromptTemplate::QueryIntent, UpstreamKind::Timeout),
    );

    let err = h.pipeline.handle_turn("since when?", &ceo_history()).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Completion));
    assert_eq!(err.upstream_kind(), Some(UpstreamKind::Timeout));
    assert!(h.embedder.calls().is_empty());
}

#[tokio::test]
async fn test_blank_intent_is_malformed() {
    let h = harness(
        MockEmbedder::default(),
        MockSearch::default(),
        MockCompletion::default().respond(PromptTemplate::QueryIntent, "   "),
    );

    let err = h.pipeline.handle_turn("since when?", &ceo_history()).await.unwrap_err();
    assert_eq!(err.upstream_kind(), Some(UpstreamKind::MalformedResponse));
    assert!(h.embedder.calls().is_empty());
}

#[tokio::test]
async fn test_search_failure_carries_stage() {
    let h = harness(
        MockEmbedder::default(),
        MockSearch::failing(UpstreamKind::ServiceUnavailable),
        MockCompletion::default(),
    );

    let err = h.pipeline.handle_turn("hello", &[]).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Search));
    assert_eq!(err.upstream_kind(), Some(UpstreamKind::ServiceUnavailable));
    assert!(h.completion.requests().is_empty());
}

#[tokio::test]
async fn test_invalid_input_rejected_before_calls() {
    let h = harness(MockEmbedder::default(), MockSearch::default(), MockCompletion::default());

    let err = h.pipeline.handle_turn("   ", &[]).await.unwrap_err();
    assert!(matches!(err, Error::Input(_)));

    let bad_history = vec![ConversationTurn::user("hi"), ConversationTurn::assistant("")];
    let err = h.pipeline.handle_turn("hello", &bad_history).await.unwrap_err();
    assert!(matches!(err, Error::Input(_)));

    assert!(h.embedder.calls().is_empty());
    assert!(h.completion.requests().is_empty());
}

#[tokio::test]
async fn test_retrieve_respects_k_and_order() {
    let docs: Vec<Document> = (0..5)
        .map(|i| Document::new(format!("doc{}", i), format!("content {}", i)))
        .collect();
    let h = harness(MockEmbedder::default(), MockSearch::with_documents(&docs), MockCompletion::default());
    let cancel = CancellationToken::new();

    let retrieved = h.pipeline.retrieve("query", 2, &cancel).await.unwrap();
    assert_eq!(retrieved, docs[..2].to_vec());

    let queries = h.search.queries();
    assert_eq!(queries[0].k, 2);
    assert_eq!(queries[0].vector_field, "contentVector");
    assert_eq!(queries[0].select, vec!["id".to_string(), "content".to_string()]);

    let err = h.pipeline.retrieve("query", 0, &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Input(_)));
    let err = h.pipeline.retrieve(" \t", 3, &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Input(_)));
}

#[tokio::test]
async fn test_slow_call_times_out() {
    let mut config = AppConfig::default();
    config.network.request_timeout_secs = 1;
    let h = harness_with(
        config,
        MockEmbedder::default().with_delay(3_000),
        MockSearch::default(),
        MockCompletion::default(),
    );

    let err = h.pipeline.handle_turn("hello", &[]).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Embedding));
    assert_eq!(err.upstream_kind(), Some(UpstreamKind::Timeout));
}

#[tokio::test]
async fn test_concurrent_turns_are_independent() {
    let h = harness(
        MockEmbedder::default(),
        MockSearch::with_documents(&[Document::new("doc1", "x")]),
        MockCompletion::default().with_default("ok"),
    );

    let turns = (0..8).map(|i| {
        let pipeline = h.pipeline.clone();
        tokio::spawn(async move { pipeline.handle_turn(&format!("question {}", i), &[]).await })
    });

    for handle in futures::future::join_all(turns).await {
        let response = handle.unwrap().unwrap();
        assert_eq!(response.context, ">>> From: doc1\nx");
        assert_eq!(response.reply, "ok");
    }
    assert_eq!(h.embedder.calls().len(), 8);
}
