//! Priority scheduling of a round's searches

use super::executor::{QueryOutcome, SearchExecutor};
use crate::{ResearchError, ResearchResult};
use sift_core::{Priority, SearchQuery};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Submits a round's queries High before Medium before Low and fans them
/// out over the executor's lane pool.
///
/// A query is spawned only after it has checked out a lane, so at most
/// `pool size` searches are in flight and the rest wait here in priority
/// order.
pub struct SearchScheduler {
    executor: SearchExecutor,
}

impl SearchScheduler {
    pub fn new(executor: SearchExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &SearchExecutor {
        &self.executor
    }

    /// Stable grouping by priority tier
    pub fn order_by_priority(queries: Vec<SearchQuery>) -> Vec<SearchQuery> {
        let mut ordered = Vec::with_capacity(queries.len());
        let mut remaining = queries;
        for tier in Priority::DESCENDING {
            let (matching, rest): (Vec<_>, Vec<_>) =
                remaining.into_iter().partition(|q| q.priority == tier);
            ordered.extend(matching);
            remaining = rest;
        }
        ordered
    }

    /// Dispatch every query and wait for all of them.
    ///
    /// Outcomes are returned in completion order. Submission stops once
    /// `cancelled` is set; queries already running are left to finish.
    pub async fn dispatch(
        &self,
        queries: Vec<SearchQuery>,
        cancelled: &AtomicBool,
    ) -> ResearchResult<Vec<QueryOutcome>> {
        let ordered = Self::order_by_priority(queries);
        let total = ordered.len();
        info!(
            queries = total,
            lanes = self.executor.lanes().size(),
            "Dispatching searches"
        );

        let completed: Arc<Mutex<Vec<QueryOutcome>>> =
            Arc::new(Mutex::new(Vec::with_capacity(total)));
        let mut tasks = JoinSet::new();

        for query in ordered {
            if cancelled.load(Ordering::SeqCst) {
                debug!("Session cancelled, stopping submission");
                break;
            }

            let lane = self.executor.lanes().acquire().await?;
            debug!(
                lane = lane.lane_id(),
                priority = %query.priority,
                query = %query.text,
                "Submitting search"
            );

            let executor = self.executor.clone();
            let completed = Arc::clone(&completed);
            tasks.spawn(async move {
                let outcome = executor.execute_on(lane, query).await;
                completed.lock().await.push(outcome);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    warn!(error = %e, "Search task panicked, its results are lost");
                } else {
                    return Err(ResearchError::dispatch(format!("search task aborted: {}", e)));
                }
            }
        }

        let outcomes = std::mem::take(&mut *completed.lock().await);
        debug!(completed = outcomes.len(), submitted = total, "Fan-in complete");
        Ok(outcomes)
    }
}
