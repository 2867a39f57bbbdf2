//! Async utilities and patterns
//!
//! Provides retry policy, timeouts, and the paced worker-lane pool used for
//! provider calls

use crate::error::{ErrorContext, SiftError, SiftResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::debug;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: usize,
    /// Delay before the second attempt in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier (exponential backoff)
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (0-based).
    ///
    /// Attempt `n` waits `initial_delay_ms * multiplier^n`, capped at `max_delay_ms`.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = attempt.min(32) as i32;
        let base = (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_delay_ms as f64).max(0.0);

        let actual = if self.jitter {
            let jitter_factor = 0.1;
            let jitter = (fastrand::f64() - 0.5) * 2.0 * jitter_factor;
            capped * (1.0 + jitter)
        } else {
            capped
        };

        Duration::from_millis(actual as u64)
    }

    /// Whether another attempt is allowed after `attempts_made`
    pub fn allows_another(&self, attempts_made: usize) -> bool {
        attempts_made < self.max_attempts
    }
}

/// Timeout wrapper for async operations
pub async fn with_timeout<F, T>(future: F, timeout_ms: u64, operation_name: &str) -> SiftResult<T>
where
    F: std::future::Future<Output = T>,
{
    match timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(SiftError::Timeout {
            operation: operation_name.to_string(),
            duration_ms: timeout_ms,
            context: ErrorContext::new("async_utils")
                .with_operation("timeout")
                .with_metadata("timeout_ms", &timeout_ms.to_string())
                .with_suggestion("Increase timeout duration")
                .with_suggestion("Verify provider availability"),
        }),
    }
}

/// A logical worker slot with its own pacing state
#[derive(Debug)]
struct Lane {
    id: usize,
    last_dispatch: Option<Instant>,
}

/// Fixed-size pool of paced worker lanes.
///
/// A semaphore bounds how many lanes are checked out; waiting acquirers are
/// served in FIFO order. Free lanes form a queue, so the lane idle the longest
/// is handed out next. Each lane carries its own last-dispatch timestamp,
/// which only the task holding the lane touches.
#[derive(Debug)]
pub struct LanePool {
    permits: Arc<Semaphore>,
    lanes: Arc<Mutex<VecDeque<Lane>>>,
    min_interval: Duration,
    size: usize,
}

impl LanePool {
    /// Create a pool with `size` lanes and a per-lane minimum dispatch interval
    pub fn new(size: usize, min_interval_ms: u64) -> Self {
        let size = size.max(1);
        let lanes = (0..size)
            .map(|id| Lane {
                id,
                last_dispatch: None,
            })
            .collect();

        Self {
            permits: Arc::new(Semaphore::new(size)),
            lanes: Arc::new(Mutex::new(lanes)),
            min_interval: Duration::from_millis(min_interval_ms),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Lanes currently free
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Check out a lane, waiting for one to free up
    pub async fn acquire(&self) -> SiftResult<LaneGuard> {
        let permit =
            self.permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| SiftError::Cancelled {
                    operation: format!("lane acquisition: {}", e),
                    context: ErrorContext::new("lane_pool")
                        .with_operation("acquire")
                        .with_suggestion("The pool was closed at session end"),
                })?;

        let lane = self
            .lanes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .ok_or_else(|| SiftError::Internal {
                message: "lane pool permit granted without a free lane".to_string(),
                source: None,
                context: ErrorContext::new("lane_pool").with_operation("acquire"),
            })?;

        Ok(LaneGuard {
            lane: Some(lane),
            lanes: Arc::clone(&self.lanes),
            min_interval: self.min_interval,
            _permit: permit,
        })
    }

    /// Stop handing out lanes; pending and future acquisitions fail
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

/// RAII guard for a checked-out lane. The lane returns to the pool on drop
pub struct LaneGuard {
    lane: Option<Lane>,
    lanes: Arc<Mutex<VecDeque<Lane>>>,
    min_interval: Duration,
    _permit: OwnedSemaphorePermit,
}

impl LaneGuard {
    pub fn lane_id(&self) -> usize {
        self.lane.as_ref().map(|l| l.id).unwrap_or_default()
    }

    /// Wait out the lane's minimum interval, then stamp a new dispatch
    pub async fn pace(&mut self) {
        let Some(lane) = self.lane.as_mut() else {
            return;
        };

        if let Some(last) = lane.last_dispatch {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let sleep_duration = self.min_interval - elapsed;
                debug!(
                    lane = lane.id,
                    sleep_ms = sleep_duration.as_millis() as u64,
                    "Rate limiting: sleeping to enforce minimum interval"
                );
                sleep(sleep_duration).await;
            }
        }
        lane.last_dispatch = Some(Instant::now());
    }
}

impl Drop for LaneGuard {
    fn drop(&mut self) {
        if let Some(lane) = self.lane.take() {
            self.lanes
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push_back(lane);
        }
    }
}
