use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

/// Counts completed dashboard panels against a fixed total.
///
/// Shared by reference between concurrent loads; each panel calls
/// [`LoadProgress::mark_loaded`] exactly once whether it succeeded or not.
#[derive(Debug)]
pub struct LoadProgress {
    loaded: AtomicUsize,
    total: usize,
}

impl LoadProgress {
    pub fn new(total: usize) -> Self {
        Self {
            loaded: AtomicUsize::new(0),
            total,
        }
    }

    pub fn reset(&self) {
        self.loaded.store(0, Ordering::SeqCst);
    }

    pub fn mark_loaded(&self) -> usize {
        let loaded = self.loaded.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(loaded, total = self.total, "panel loaded");
        loaded
    }

    pub fn loaded(&self) -> usize {
        self.loaded.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.loaded().min(self.total) as f64 / self.total as f64) * 100.0
    }

    pub fn is_ready(&self) -> bool {
        self.loaded() >= self.total
    }

    /// Polls until every panel reported in, or `deadline` passes.
    /// Returns whether the dashboard became ready.
    pub async fn wait_until_ready(&self, poll: Duration, deadline: Duration) -> bool {
        let started = Instant::now();
        loop {
            if self.is_ready() {
                return true;
            }
            if started.elapsed() >= deadline {
                return false;
            }
            sleep(poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counts_toward_total() {
        let progress = LoadProgress::new(8);
        assert_eq!(progress.percent(), 0.0);
        for _ in 0..4 {
            progress.mark_loaded();
        }
        assert_eq!(progress.percent(), 50.0);
        assert!(!progress.is_ready());

        progress.reset();
        assert_eq!(progress.loaded(), 0);
    }

    #[test]
    fn empty_total_is_ready() {
        let progress = LoadProgress::new(0);
        assert!(progress.is_ready());
        assert_eq!(progress.percent(), 100.0);
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let progress = Arc::new(LoadProgress::new(64));
        let mut handles = Vec::new();
        for _ in 0..64 {
            let progress = Arc::clone(&progress);
            handles.push(tokio::spawn(async move {
                progress.mark_loaded();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(progress.loaded(), 64);
        assert!(progress.is_ready());
    }

    #[tokio::test]
    async fn wait_gives_up_at_deadline() {
        let progress = LoadProgress::new(2);
        progress.mark_loaded();
        let ready = progress
            .wait_until_ready(Duration::from_millis(5), Duration::from_millis(30))
            .await;
        assert!(!ready);
    }

    #[tokio::test]
    async fn wait_returns_once_ready() {
        let progress = Arc::new(LoadProgress::new(1));
        let waiter = {
            let progress = Arc::clone(&progress);
            tokio::spawn(async move {
                progress
                    .wait_until_ready(Duration::from_millis(5), Duration::from_secs(5))
                    .await
            })
        };
        progress.mark_loaded();
        assert!(waiter.await.unwrap());
    }
}
