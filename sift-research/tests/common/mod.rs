//! Shared mock providers and fixtures
#![allow(dead_code)]

use sift_core::{
    async_trait, search_error, CitationResult, SearchProvider, SiftConfig, SiftError, SiftResult,
    TextGenerationProvider,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

pub const FILLER: &str = "This page walks through the topic in depth, covering the \
     runtime model, the scheduling strategy, the memory layout and the tradeoffs \
     involved when deploying it in production systems of realistic size.";

pub fn citation(title: &str, url: &str, score: f64) -> CitationResult {
    CitationResult::new(title, url, FILLER, score)
}

/// Fast configuration for tests: no pacing, tiny backoff
pub fn test_config() -> SiftConfig {
    let mut config = SiftConfig::default();
    config.research.max_rounds = 3;
    config.search.rate_limit_ms = 0;
    config.search.max_attempts = 2;
    config.search.initial_backoff_ms = 1;
    config.search.max_backoff_ms = 2;
    config.search.per_query_timeout_ms = 2_000;
    config
}

/// Always fails
pub struct FailingSearch {
    pub calls: AtomicUsize,
}

impl FailingSearch {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchProvider for FailingSearch {
    async fn search(&self, query: &str) -> SiftResult<Vec<CitationResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(search_error!("upstream unavailable", "mock_search", query))
    }
}

/// Returns `per_query` fresh citations on distinct hosts for every call
pub struct FreshSearch {
    counter: AtomicUsize,
    per_query: usize,
    content: String,
    pub queries: Mutex<Vec<String>>,
}

impl FreshSearch {
    pub fn new(per_query: usize) -> Self {
        Self::with_content(per_query, FILLER)
    }

    pub fn with_content(per_query: usize, content: &str) -> Self {
        Self {
            counter: AtomicUsize::new(0),
            per_query,
            content: content.to_string(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

const WORDS: &[&str] = &[
    "amber", "birch", "cobalt", "delta", "ember", "fjord", "garnet", "harbor", "indigo", "juniper",
    "kelp", "lumen", "maple", "nectar", "onyx", "pepper", "quartz", "raven", "sable", "tundra",
];

#[async_trait]
impl SearchProvider for FreshSearch {
    async fn search(&self, query: &str) -> SiftResult<Vec<CitationResult>> {
        self.queries.lock().unwrap().push(query.to_string());
        let results = (0..self.per_query)
            .map(|_| {
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                let word = WORDS[n % WORDS.len()];
                let title = format!("{} notes {} volume {}", word, n / WORDS.len(), n);
                let url = format!("https://site{}.io/articles/{}", n % 7, n);
                CitationResult::new(title, url, self.content.clone(), 0.9)
            })
            .collect();
        Ok(results)
    }
}

/// Returns the same fixed batch for every query
pub struct FixedSearch {
    pub results: Vec<CitationResult>,
}

#[async_trait]
impl SearchProvider for FixedSearch {
    async fn search(&self, _query: &str) -> SiftResult<Vec<CitationResult>> {
        Ok(self.results.clone())
    }
}

/// Holds every call until the test releases permits on `gate`
pub struct GatedSearch {
    pub gate: Arc<Semaphore>,
    pub started: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub order: Mutex<Vec<String>>,
}

impl GatedSearch {
    pub fn new(initial_permits: usize) -> Self {
        Self {
            gate: Arc::new(Semaphore::new(initial_permits)),
            started: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            order: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SearchProvider for GatedSearch {
    async fn search(&self, query: &str) -> SiftResult<Vec<CitationResult>> {
        self.order.lock().unwrap().push(query.to_string());
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let permit = self.gate.acquire().await.map_err(|e| SiftError::Internal {
            message: e.to_string(),
            source: None,
            context: sift_core::ErrorContext::new("gated_search"),
        })?;
        permit.forget();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![citation(
            &format!("result for {}", query),
            &format!("https://gated.io/{}", query.replace(' ', "-")),
            0.9,
        )])
    }
}

/// Sleeps longer than any test timeout
pub struct SlowSearch(pub Duration);

#[async_trait]
impl SearchProvider for SlowSearch {
    async fn search(&self, query: &str) -> SiftResult<Vec<CitationResult>> {
        tokio::time::sleep(self.0).await;
        Ok(vec![citation("late", &format!("https://slow.io/{}", query.len()), 0.9)])
    }
}

/// Text generation that always fails
pub struct FailingText;

#[async_trait]
impl TextGenerationProvider for FailingText {
    async fn complete(&self, _prompt: &str) -> SiftResult<String> {
        Err(SiftError::TextGeneration {
            message: "model offline".to_string(),
            provider: Some("mock".to_string()),
            source: None,
            context: sift_core::ErrorContext::new("mock_text"),
        })
    }
}

/// Text generation returning a canned response
pub struct CannedText(pub String);

#[async_trait]
impl TextGenerationProvider for CannedText {
    async fn complete(&self, _prompt: &str) -> SiftResult<String> {
        Ok(self.0.clone())
    }
}
