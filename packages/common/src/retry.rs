use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

/// A single failed attempt, kept for DLQ diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// 1-based attempt number.
    pub attempt: u8,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl RetryAttempt {
    pub fn new(attempt: u8, error: impl Into<String>) -> Self {
        Self {
            attempt,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of recording a failure.
#[derive(Debug, Clone)]
pub enum RetryDecision {
    Retry {
        attempt: u8,
    },
    Exhausted {
        history: Vec<RetryAttempt>,
    },
}

struct JobRetryState {
    attempt: u8,
    history: Vec<RetryAttempt>,
    last_updated: Instant,
}

/// Tracks per-job failure counts against a retry budget.
pub struct RetryTracker {
    state: HashMap<String, JobRetryState>,
    max_retries: u8,
}

impl RetryTracker {
    pub fn new(max_retries: u8) -> Self {
        Self {
            state: HashMap::new(),
            max_retries,
        }
    }

    /// Record a failure for `job_id` and decide whether to retry.
    ///
    /// Exhausted jobs are forgotten; the returned history goes to the DLQ.
    pub fn record_failure(&mut self, job_id: &str, error: &str) -> RetryDecision {
        let entry = self
            .state
            .entry(job_id.to_string())
            .or_insert_with(|| JobRetryState {
                attempt: 0,
                history: Vec::new(),
                last_updated: Instant::now(),
            });

        entry.attempt += 1;
        entry.last_updated = Instant::now();
        entry.history.push(RetryAttempt::new(entry.attempt, error));

        if entry.attempt <= self.max_retries {
            RetryDecision::Retry {
                attempt: entry.attempt,
            }
        } else {
            let history = entry.history.clone();
            self.state.remove(job_id);
            RetryDecision::Exhausted { history }
        }
    }

    /// Forget retry state after a success.
    pub fn clear(&mut self, job_id: &str) {
        self.state.remove(job_id);
    }

    /// Drop entries that have not been touched within `max_age`.
    pub fn sweep_stale(&mut self, max_age: Duration) -> usize {
        let before = self.state.len();
        let now = Instant::now();
        self.state
            .retain(|_, s| now.duration_since(s.last_updated) < max_age);
        before - self.state.len()
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

/// Exponential backoff with jitter: `min(base * 2^(attempt-1) + jitter, max)`.
pub fn calculate_backoff(attempt: u8, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exp = 2u64.saturating_pow(u32::from(attempt - 1));
    let delay_ms = base_ms.saturating_mul(exp);

    let jitter = if delay_ms > 0 {
        rand::rng().random_range(0..=delay_ms / 4)
    } else {
        0
    };

    Duration::from_millis(delay_ms.saturating_add(jitter).min(max_ms))
}

/// Periodically sweep abandoned retry state so the tracker cannot grow
/// without bound when jobs vanish mid-retry.
pub fn spawn_retry_sweeper(
    tracker: Arc<Mutex<RetryTracker>>,
    interval: Duration,
    max_age: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = tracker.lock().await.sweep_stale(max_age);
            if removed > 0 {
                debug!(removed, "swept stale retry entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        let d1 = calculate_backoff(1, 1000, 60_000);
        assert!(d1.as_millis() >= 1000 && d1.as_millis() <= 1250);

        let d3 = calculate_backoff(3, 1000, 60_000);
        assert!(d3.as_millis() >= 4000 && d3.as_millis() <= 5000);
    }

    #[test]
    fn backoff_is_capped() {
        let d = calculate_backoff(30, 1000, 60_000);
        assert_eq!(d.as_millis(), 60_000);
    }

    #[test]
    fn backoff_zero_attempt_is_zero() {
        assert_eq!(calculate_backoff(0, 1000, 60_000), Duration::ZERO);
    }

    #[test]
    fn tracker_retries_then_exhausts() {
        let mut tracker = RetryTracker::new(2);

        assert!(matches!(
            tracker.record_failure("job", "e1"),
            RetryDecision::Retry { attempt: 1 }
        ));
        assert!(matches!(
            tracker.record_failure("job", "e2"),
            RetryDecision::Retry { attempt: 2 }
        ));

        match tracker.record_failure("job", "e3") {
            RetryDecision::Exhausted { history } => {
                assert_eq!(history.len(), 3);
                assert_eq!(history[2].error, "e3");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }

        // Exhausted jobs start fresh.
        assert!(tracker.is_empty());
    }

    #[test]
    fn clear_resets_budget() {
        let mut tracker = RetryTracker::new(1);
        tracker.record_failure("job", "e1");
        tracker.clear("job");
        assert!(matches!(
            tracker.record_failure("job", "e2"),
            RetryDecision::Retry { attempt: 1 }
        ));
    }

    #[test]
    fn sweep_drops_stale_entries() {
        let mut tracker = RetryTracker::new(3);
        tracker.record_failure("job", "e1");
        assert_eq!(tracker.sweep_stale(Duration::ZERO), 1);
        assert!(tracker.is_empty());
    }
}
