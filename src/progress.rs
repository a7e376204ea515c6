use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Progress counter shared between the batch loop and encoder threads
pub struct BatchProgress {
    pub total: usize,
    processed: AtomicUsize,
    start_time: Instant,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Increment processed count and return current count
    pub fn increment(&self) -> usize {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    /// Get current progress (0.0 to 1.0)
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.processed().min(self.total) as f64) / (self.total as f64)
        }
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Option<Duration> {
        let processed = self.processed();
        if processed == 0 {
            return None;
        }

        let remaining = self.total.saturating_sub(processed);
        if remaining == 0 {
            return Some(Duration::new(0, 0));
        }

        let time_per_item = self.start_time.elapsed() / processed as u32;
        Some(time_per_item * remaining as u32)
    }

    /// Get processing speed (items per second)
    pub fn items_per_second(&self) -> f64 {
        let processed = self.processed();
        if processed == 0 {
            return 0.0;
        }

        let elapsed_secs = self.start_time.elapsed().as_secs_f64();
        if elapsed_secs == 0.0 {
            return 0.0;
        }

        processed as f64 / elapsed_secs
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_batch_progress_fraction() {
        let progress = BatchProgress::new(10);

        assert_eq!(progress.fraction(), 0.0);

        progress.increment();
        assert!((progress.fraction() - 0.1).abs() < 0.01);

        for _ in 0..9 {
            progress.increment();
        }
        assert!((progress.fraction() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_empty_batch_is_complete() {
        let progress = BatchProgress::new(0);
        assert_eq!(progress.fraction(), 1.0);
        assert_eq!(progress.items_per_second(), 0.0);
    }

    #[test]
    fn test_batch_progress_eta() {
        let progress = BatchProgress::new(4);

        // No ETA before any processing
        assert!(progress.eta().is_none());

        thread::sleep(Duration::from_millis(10));
        progress.increment();

        let eta = progress.eta().unwrap();
        assert!(eta > Duration::new(0, 0));

        for _ in 0..3 {
            progress.increment();
        }
        assert_eq!(progress.eta(), Some(Duration::new(0, 0)));
    }

    #[test]
    fn test_increment_from_threads() {
        let progress = BatchProgress::new(8);
        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    progress.increment();
                    progress.increment();
                });
            }
        });
        assert_eq!(progress.processed(), 8);
    }
}
