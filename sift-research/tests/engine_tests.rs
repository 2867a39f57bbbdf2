//! Round controller behaviour end to end

mod common;

use common::{test_config, CannedText, FailingSearch, FailingText, FixedSearch, FreshSearch};
use sift_core::{CitationResult, ResearchDepth, SearchProvider, SiftResult};
use sift_research::research::CancelHandle;
use sift_research::{ResearchEngine, ResearchProgress, RoundState, TerminationReason};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[tokio::test]
async fn test_always_failing_search_degrades_gracefully() {
    let provider = Arc::new(FailingSearch::new());
    let engine = ResearchEngine::without_text_generation(test_config(), provider.clone()).unwrap();

    let outcome = engine.execute_rounds("tokio runtime").await;

    assert!(outcome.citations.is_empty());
    assert!(outcome.insights.is_empty());
    assert!(outcome.degraded);
    assert_eq!(outcome.termination, TerminationReason::Stagnation);
    assert!(outcome.rounds_executed >= 1 && outcome.rounds_executed <= 3);
    assert!(provider.calls.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn test_rounds_accumulate_until_budget() {
    let mut config = test_config();
    config.research.max_sources = 500;
    let provider = Arc::new(FreshSearch::new(3));
    let (tx, mut rx) = mpsc::unbounded_channel::<ResearchProgress>();
    let engine = ResearchEngine::without_text_generation(config, provider.clone())
        .unwrap()
        .with_progress_channel(tx);

    let outcome = engine.execute_rounds("tokio runtime").await;

    assert!(!outcome.degraded);
    assert_eq!(outcome.termination, TerminationReason::RoundBudget);
    assert_eq!(outcome.rounds_executed, 3);
    assert_eq!(outcome.rounds.len(), 3);

    let urls: HashSet<&str> = outcome.citations.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(urls.len(), outcome.citations.len());

    let added: usize = outcome.rounds.iter().map(|r| r.new_citations).sum();
    assert_eq!(added, outcome.citations.len());
    assert!(outcome.rounds.iter().all(|r| r.new_citations > 0));

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events
        .windows(2)
        .all(|pair| pair[0].citations <= pair[1].citations));
    let last = events.last().unwrap();
    assert_eq!(last.state, RoundState::Terminated);
    assert_eq!(last.progress, 1.0);

    // The last round falls back to the broad query
    assert_eq!(
        provider.seen_queries().last().map(String::as_str),
        Some("tokio runtime")
    );
}

#[tokio::test]
async fn test_source_limit_caps_citations() {
    let mut config = test_config();
    config.research.max_sources = 5;
    let engine =
        ResearchEngine::without_text_generation(config, Arc::new(FreshSearch::new(3))).unwrap();

    let outcome = engine.execute_rounds("tokio runtime").await;

    assert_eq!(outcome.citations.len(), 5);
    assert_eq!(outcome.termination, TerminationReason::SourceLimit);
    assert_eq!(outcome.rounds_executed, 1);
}

#[tokio::test]
async fn test_repeated_results_stagnate() {
    let results = vec![
        common::citation("Scheduler design notes", "https://alpha.io/1", 0.9),
        common::citation("Work stealing in practice", "https://beta.io/2", 0.8),
        common::citation("Cooperative budgeting", "https://gamma.io/3", 0.7),
    ];
    let engine =
        ResearchEngine::without_text_generation(test_config(), Arc::new(FixedSearch { results }))
            .unwrap();

    let outcome = engine.execute_rounds("tokio runtime").await;

    assert_eq!(outcome.citations.len(), 3);
    assert_eq!(outcome.termination, TerminationReason::Stagnation);
    assert_eq!(outcome.rounds_executed, 2);
    assert_eq!(outcome.rounds[1].new_citations, 0);
}

#[tokio::test]
async fn test_low_quality_results_are_filtered() {
    let results = vec![
        common::citation("Sponsored offer", "https://www.facebook.com/ads/1", 0.95),
        common::citation("Barely related musings", "https://weak.io/2", 0.2),
        common::citation("Solid write-up", "https://strong.io/3", 0.75),
        common::citation("Lecture notes", "https://cs.stanford.edu/4", 0.3),
    ];
    let engine =
        ResearchEngine::without_text_generation(test_config(), Arc::new(FixedSearch { results }))
            .unwrap();

    let outcome = engine.execute_rounds("tokio runtime").await;

    let urls: Vec<&str> = outcome.citations.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(urls, vec!["https://strong.io/3", "https://cs.stanford.edu/4"]);
}

#[tokio::test]
async fn test_sufficient_evidence_stops_early() {
    let mut config = test_config();
    config.research.depth = ResearchDepth::Quick;
    let content = "A primer covering the definition, the key concepts, typical use cases \
                   and the history of the project, with enough detail and background material \
                   to be worth citing in a report.";
    let engine = ResearchEngine::without_text_generation(
        config,
        Arc::new(FreshSearch::with_content(3, content)),
    )
    .unwrap();

    let outcome = engine.execute_rounds("tokio runtime").await;

    assert_eq!(outcome.termination, TerminationReason::Sufficient);
    assert_eq!(outcome.rounds_executed, 1);
    assert!(outcome.coverage.overall_score > 0.7);
    assert!(outcome.citations.len() >= 15);
    assert!(outcome.insights.len() >= 2);
}

#[tokio::test]
async fn test_cancel_before_start() {
    let engine =
        ResearchEngine::without_text_generation(test_config(), Arc::new(FreshSearch::new(3)))
            .unwrap();
    let mut session = engine.create_session("tokio runtime");
    session.cancel_handle().cancel();

    let outcome = engine.run_session(&mut session).await;

    assert_eq!(outcome.termination, TerminationReason::Cancelled);
    assert_eq!(outcome.rounds_executed, 0);
    assert!(outcome.degraded);
}

/// Cancels the session on its first call
struct CancellingSearch {
    handle: Mutex<Option<CancelHandle>>,
    inner: FreshSearch,
}

#[async_trait::async_trait]
impl SearchProvider for CancellingSearch {
    async fn search(&self, query: &str) -> SiftResult<Vec<CitationResult>> {
        if let Some(handle) = self.handle.lock().unwrap().as_ref() {
            handle.cancel();
        }
        self.inner.search(query).await
    }
}

#[tokio::test]
async fn test_cancel_mid_round_discards_results() {
    let provider = Arc::new(CancellingSearch {
        handle: Mutex::new(None),
        inner: FreshSearch::new(3),
    });
    let engine = ResearchEngine::without_text_generation(test_config(), provider.clone()).unwrap();
    let mut session = engine.create_session("tokio runtime");
    *provider.handle.lock().unwrap() = Some(session.cancel_handle());

    let outcome = engine.run_session(&mut session).await;

    assert_eq!(outcome.termination, TerminationReason::Cancelled);
    assert!(outcome.citations.is_empty());
    assert_eq!(outcome.rounds_executed, 1);
    assert!(!provider.inner.seen_queries().is_empty());
}

#[tokio::test]
async fn test_text_generation_failure_falls_back_to_templates() {
    let provider = Arc::new(FreshSearch::new(2));
    let mut config = test_config();
    config.research.max_rounds = 1;
    let engine = ResearchEngine::new(config, provider.clone(), Arc::new(FailingText)).unwrap();

    let outcome = engine.execute_rounds("tokio runtime").await;

    assert!(!outcome.degraded);
    assert_eq!(outcome.termination, TerminationReason::RoundBudget);
    assert!(provider
        .seen_queries()
        .contains(&"What is tokio runtime".to_string()));
}

#[tokio::test]
async fn test_generated_questions_are_searched() {
    let provider = Arc::new(FreshSearch::new(2));
    let mut config = test_config();
    config.research.max_rounds = 1;
    let canned = r#"Here you go:
[
  {"text": "How does the tokio scheduler steal work?", "category": "implementation", "priority": "high", "rationale": "core mechanism"},
  {"text": "tokio runtime flavors", "priority": "low"}
]"#;
    let text = Arc::new(CannedText(canned.to_string()));
    let engine = ResearchEngine::new(config, provider.clone(), text).unwrap();

    let outcome = engine.execute_rounds("tokio runtime").await;

    let seen = provider.seen_queries();
    assert!(seen.contains(&"How does the tokio scheduler steal work?".to_string()));
    assert!(seen.contains(&"tokio runtime flavors".to_string()));
    assert_eq!(outcome.insights.len(), 2);
    assert_eq!(outcome.rounds[0].questions, 2);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = test_config();
    config.research.max_rounds = 0;
    let provider = Arc::new(FreshSearch::new(1));
    assert!(ResearchEngine::without_text_generation(config, provider).is_err());
}
