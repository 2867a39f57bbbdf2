//! Search execution with pacing, retries and a per-query deadline

use super::text::keywords;
use sift_core::{
    clamp_score, domain_of, CitationResult, LaneGuard, LanePool, RetryConfig, SearchProvider,
    SearchQuery, SearchSettings,
};
use std::sync::Arc;
use tokio::time::{sleep, timeout_at, Duration, Instant};
use tracing::{debug, warn};

/// Result of running one query to completion
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub query: SearchQuery,
    pub citations: Vec<CitationResult>,
    pub attempts: usize,
    /// The per-query deadline elapsed
    pub timed_out: bool,
    pub last_error: Option<String>,
}

impl QueryOutcome {
    fn empty(
        query: SearchQuery,
        attempts: usize,
        timed_out: bool,
        last_error: Option<String>,
    ) -> Self {
        Self {
            query,
            citations: Vec::new(),
            attempts,
            timed_out,
            last_error,
        }
    }
}

/// Lexically modified fallbacks tried when a query keeps coming back empty
fn lexical_variants(text: &str) -> Vec<String> {
    let terms = keywords(text);
    let mut variants = vec![format!("{} tutorial", text), format!("{} guide", text)];
    if terms.len() > 1 {
        variants.push(terms.join(" AND "));
    }
    variants
}

/// Runs queries against the search provider.
///
/// Every attempt checks out a lane from the shared pool and paces on it. The
/// lane goes back to the pool before a backoff sleep, so a retrying query
/// never holds a worker slot while it waits.
#[derive(Clone)]
pub struct SearchExecutor {
    provider: Arc<dyn SearchProvider>,
    lanes: Arc<LanePool>,
    retry: RetryConfig,
    query_timeout: Duration,
}

impl SearchExecutor {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        lanes: Arc<LanePool>,
        settings: &SearchSettings,
    ) -> Self {
        Self {
            provider,
            lanes,
            retry: settings.retry_config(),
            query_timeout: Duration::from_millis(settings.per_query_timeout_ms),
        }
    }

    pub fn lanes(&self) -> &Arc<LanePool> {
        &self.lanes
    }

    /// Run a query; failures and timeouts yield an empty list
    pub async fn execute(&self, query: &SearchQuery) -> Vec<CitationResult> {
        match self.lanes.acquire().await {
            Ok(lane) => self.execute_on(lane, query.clone()).await.citations,
            Err(e) => {
                e.log();
                Vec::new()
            }
        }
    }

    /// Run a query whose first attempt uses an already checked-out lane.
    ///
    /// The deadline starts now, not when the query was queued.
    pub async fn execute_on(&self, lane: LaneGuard, query: SearchQuery) -> QueryOutcome {
        let deadline = Instant::now() + self.query_timeout;
        let mut lane = Some(lane);
        let mut text = query.text.clone();
        let mut fallbacks = lexical_variants(&query.text).into_iter();
        let mut attempts = 0;
        let mut last_error = None;

        loop {
            attempts += 1;

            let mut guard = match lane.take() {
                Some(guard) => guard,
                None => match timeout_at(deadline, self.lanes.acquire()).await {
                    Ok(Ok(guard)) => guard,
                    Ok(Err(e)) => {
                        e.log();
                        let error = Some(e.to_string());
                        return QueryOutcome::empty(query, attempts - 1, false, error);
                    }
                    Err(_) => {
                        warn!(query = %query.text, "Query timed out waiting for a lane");
                        return QueryOutcome::empty(query, attempts - 1, true, last_error);
                    }
                },
            };

            let lane_id = guard.lane_id();
            let provider = &self.provider;
            let result = timeout_at(deadline, async {
                guard.pace().await;
                provider.search(&text).await
            })
            .await;
            drop(guard);

            match result {
                Err(_) => {
                    warn!(
                        query = %query.text,
                        attempts,
                        timeout_ms = self.query_timeout.as_millis() as u64,
                        "Query timed out, contributing no results"
                    );
                    return QueryOutcome::empty(query, attempts, true, last_error);
                }
                Ok(Ok(citations)) if !citations.is_empty() => {
                    debug!(
                        query = %text,
                        lane = lane_id,
                        attempts,
                        results = citations.len(),
                        "Search succeeded"
                    );
                    return QueryOutcome {
                        query,
                        citations: citations.into_iter().map(sanitize).collect(),
                        attempts,
                        timed_out: false,
                        last_error,
                    };
                }
                Ok(Ok(_)) => {
                    debug!(query = %text, lane = lane_id, attempts, "Search returned no results");
                    if let Some(next) = fallbacks.next() {
                        text = next;
                    }
                }
                Ok(Err(e)) if !e.is_recoverable() => {
                    e.log();
                    return QueryOutcome::empty(query, attempts, false, Some(e.to_string()));
                }
                Ok(Err(e)) => {
                    debug!(
                        query = %text,
                        lane = lane_id,
                        attempts,
                        error = %e,
                        "Search attempt failed"
                    );
                    last_error = Some(e.to_string());
                }
            }

            if !self.retry.allows_another(attempts) {
                warn!(
                    query = %query.text,
                    attempts,
                    error = last_error.as_deref().unwrap_or("empty result"),
                    "Search attempts exhausted, contributing no results"
                );
                return QueryOutcome::empty(query, attempts, false, last_error);
            }

            let delay = self.retry.delay_for_attempt(attempts - 1);
            if Instant::now() + delay >= deadline {
                warn!(query = %query.text, attempts, "Backoff would overrun the query deadline");
                return QueryOutcome::empty(query, attempts, true, last_error);
            }
            sleep(delay).await;
        }
    }
}

/// Clamp scores and fill a missing domain from the url
fn sanitize(mut citation: CitationResult) -> CitationResult {
    citation.relevance_score = clamp_score(citation.relevance_score);
    if citation.domain.trim().is_empty() {
        citation.domain = domain_of(&citation.url).unwrap_or_default();
    }
    citation
}
