//! Integration tests for sift-core infrastructure

use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use sift_core::{
    config_error, init_logging, search_error, validation_error, with_timeout, CitationResult,
    ErrorContext, LanePool, LogFormat, LoggingConfig, Priority, ResearchDepth, SiftConfig,
    SiftError,
};

#[tokio::test]
async fn test_error_handling() {
    let error = search_error!("provider returned 503", "search", "tokio select");

    match &error {
        SiftError::Search {
            message,
            query,
            context,
            ..
        } => {
            assert_eq!(message, "provider returned 503");
            assert_eq!(query.as_deref(), Some("tokio select"));
            assert_eq!(context.component, "search");
            assert!(!context.error_id.is_empty());
            assert!(!context.recovery_suggestions.is_empty());
        }
        _ => panic!("Expected Search error"),
    }

    // Should not panic
    error.log();

    let timeout = SiftError::Timeout {
        operation: "search".to_string(),
        duration_ms: 30_000,
        context: ErrorContext::new("test"),
    };
    assert!(timeout.is_recoverable());

    let config = config_error!("Invalid config", "test");
    assert!(!config.is_recoverable());

    let validation = validation_error!("empty url", "url", "citation");
    match validation {
        SiftError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("url")),
        _ => panic!("Expected Validation error"),
    }
}

#[tokio::test]
async fn test_logging_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sift.log");
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Json,
        log_to_file: true,
        log_file_path: Some(path.to_string_lossy().into_owned()),
        ..LoggingConfig::default()
    };

    // The global subscriber can only be installed once per process
    init_logging(&config).unwrap();
    tracing::info!(target: "sift_core", marker = "logging-test", "hello");

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("logging-test"));
}

#[test]
fn test_logging_to_file_requires_path() {
    let config = LoggingConfig {
        log_to_file: true,
        log_file_path: None,
        ..LoggingConfig::default()
    };
    assert!(init_logging(&config).is_err());
}

#[tokio::test]
async fn test_config_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sift.toml");

    let mut config = SiftConfig::default();
    config.research.max_rounds = 3;
    config.research.depth = ResearchDepth::Deep;
    config.search.max_parallel_searches = 4;
    config.quality.allowlist.push("docs.example.org".to_string());
    config.save_to_file(&path).unwrap();

    let loaded = SiftConfig::from_file(&path).unwrap();
    assert_eq!(loaded.research.max_rounds, 3);
    assert_eq!(loaded.research.depth, ResearchDepth::Deep);
    assert_eq!(loaded.search.max_parallel_searches, 4);
    assert!(loaded
        .quality
        .allowlist
        .contains(&"docs.example.org".to_string()));
    assert_eq!(loaded.sufficiency().min_sources, 35);
}

#[tokio::test]
async fn test_partial_config_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.toml");
    std::fs::write(&path, "[research]\nmax_rounds = 2\n\n[search]\nrate_limit_ms = 0\n").unwrap();

    let loaded = SiftConfig::from_file(&path).unwrap();
    assert_eq!(loaded.research.max_rounds, 2);
    assert_eq!(loaded.research.max_sources, 50);
    assert_eq!(loaded.search.rate_limit_ms, 0);
    assert_eq!(loaded.search.max_parallel_searches, 8);
    assert_eq!(loaded.search.per_query_timeout_ms, 30_000);
    assert_eq!(loaded.quality.min_relevance_score, 0.6);
}

#[tokio::test]
async fn test_config_validation() {
    assert!(SiftConfig::default().validate().is_ok());

    let mut config = SiftConfig::default();
    config.research.max_rounds = 0;
    let error = config.validate().unwrap_err();
    assert!(matches!(error, SiftError::Config { .. }));
    assert_eq!(
        error.context().unwrap().recovery_suggestions,
        vec!["Set research.max_rounds to a positive value".to_string()]
    );

    let mut config = SiftConfig::default();
    config.search.max_parallel_searches = 0;
    assert!(config.validate().is_err());

    let mut config = SiftConfig::default();
    config.quality.min_relevance_score = 1.5;
    assert!(config.validate().is_err());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[research]\nmax_sources = 0\n").unwrap();
    assert!(SiftConfig::from_file(&path).is_err());

    assert!(SiftConfig::from_file(dir.path().join("missing.toml")).is_err());
}

#[tokio::test]
async fn test_timeout_functionality() {
    let result = with_timeout(
        async {
            sleep(Duration::from_millis(10)).await;
            "success"
        },
        200,
        "fast_operation",
    )
    .await;
    assert_eq!(result.unwrap(), "success");

    let result = with_timeout(
        async {
            sleep(Duration::from_millis(500)).await;
            "never"
        },
        20,
        "slow_operation",
    )
    .await;

    match result {
        Err(SiftError::Timeout {
            operation,
            duration_ms,
            ..
        }) => {
            assert_eq!(operation, "slow_operation");
            assert_eq!(duration_ms, 20);
        }
        other => panic!("Expected Timeout error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_lane_pool_bounds_concurrency() {
    let pool = Arc::new(LanePool::new(3, 0));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks = (0..10).map(|_| {
        let pool = Arc::clone(&pool);
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        async move {
            let mut lane = pool.acquire().await.unwrap();
            lane.pace().await;
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(10)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    });
    join_all(tasks).await;

    assert_eq!(peak.load(Ordering::SeqCst), 3);
    assert_eq!(pool.available(), 3);
}

#[tokio::test]
async fn test_lane_pacing_enforces_interval() {
    let pool = LanePool::new(1, 50);
    let start = Instant::now();

    for _ in 0..3 {
        let mut lane = pool.acquire().await.unwrap();
        lane.pace().await;
    }

    // First dispatch is immediate, the next two wait out the interval
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_closed_pool_rejects_waiters() {
    let pool = Arc::new(LanePool::new(1, 0));
    let held = pool.acquire().await.unwrap();

    let waiter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
    };
    sleep(Duration::from_millis(10)).await;
    pool.close();

    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(SiftError::Cancelled { .. })));
    drop(held);
    assert!(pool.is_closed());
}

#[test]
fn test_citation_construction() {
    let citation = CitationResult::new("Title", "https://www.Docs.rs/tokio", "body", 1.7);
    assert_eq!(citation.domain, "docs.rs");
    assert_eq!(citation.relevance_score, 1.0);
    assert!(citation.is_valid);

    let nan = CitationResult::new("Title", "not a url", "body", f64::NAN);
    assert_eq!(nan.relevance_score, 0.0);
    assert_eq!(nan.domain, "");
}

#[test]
fn test_priority_order() {
    assert!(Priority::High > Priority::Medium);
    assert!(Priority::Medium > Priority::Low);
    assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
    assert!("urgent".parse::<Priority>().is_err());
}
