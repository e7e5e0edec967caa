//! Per-session search generations.
//!
//! Each postcode search takes the next generation number for its session.
//! When a slow search finishes after a newer one has started, its results
//! are stale and must not replace the newer suggestion list.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;

/// Tracks the latest search generation for each session.
#[derive(Clone)]
pub struct SearchTracker {
    generations: Cache<String, Arc<AtomicU64>>,
}

impl Default for SearchTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchTracker {
    /// Create a tracker. Idle sessions are forgotten after an hour.
    #[must_use]
    pub fn new() -> Self {
        Self {
            generations: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(Duration::from_secs(3600))
                .build(),
        }
    }

    /// Start a new search for `scope`, returning its generation.
    pub async fn begin(&self, scope: &str) -> u64 {
        let counter = self
            .generations
            .get_with(scope.to_string(), async { Arc::new(AtomicU64::new(0)) })
            .await;
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `generation` is still the latest search for `scope`.
    pub async fn is_current(&self, scope: &str, generation: u64) -> bool {
        self.generations
            .get(scope)
            .await
            .is_some_and(|counter| counter.load(Ordering::SeqCst) == generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_newer_search_supersedes_older() {
        let tracker = SearchTracker::new();

        let first = tracker.begin("session-a").await;
        let second = tracker.begin("session-a").await;

        assert!(second > first);
        assert!(!tracker.is_current("session-a", first).await);
        assert!(tracker.is_current("session-a", second).await);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let tracker = SearchTracker::new();

        let a = tracker.begin("session-a").await;
        let _ = tracker.begin("session-b").await;

        assert!(tracker.is_current("session-a", a).await);
        assert!(!tracker.is_current("session-c", 1).await);
    }
}
