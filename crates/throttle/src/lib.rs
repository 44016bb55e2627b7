//! Adaptive throttler for the online index builder (spec.md §4.1).
//!
//! Maintains `{batch, delay}` plus consecutive-success/-failure counters.
//! A run of `success_threshold` consecutive successes grows the batch size
//! and shrinks the delay; any single failure immediately shrinks the batch
//! and grows the delay. All state lives behind one mutex (spec.md §5
//! "Shared resource policy": "Throttler state is protected by a single
//! mutex").

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::time::Duration;

use fusion_kv::KvError;
use parking_lot::Mutex;

/// Tunables for an [`AdaptiveThrottler`].
///
/// Defaults are chosen to match the teacher's own tunable-config structs:
/// explicit `impl Default`, not `#[derive(Default)]`, because none of the
/// meaningful defaults are zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleConfig {
    /// Smallest allowed batch size.
    pub min_batch: usize,
    /// Largest allowed batch size.
    pub max_batch: usize,
    /// Smallest allowed inter-batch delay.
    pub min_delay: Duration,
    /// Largest allowed inter-batch delay.
    pub max_delay: Duration,
    /// Multiplier applied to `batch` after `success_threshold` consecutive
    /// successes. Must be `> 1.0`.
    pub increase_ratio: f64,
    /// Multiplier applied to `batch` on any failure. Must be in `(0, 1)`.
    pub decrease_ratio: f64,
    /// Multiplier applied to `delay` on any failure.
    pub delay_increase_ratio: f64,
    /// Multiplier applied to `delay` after `success_threshold` consecutive
    /// successes.
    pub delay_decrease_ratio: f64,
    /// Number of consecutive successes required before growing the batch.
    pub success_threshold: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        ThrottleConfig {
            min_batch: 10,
            max_batch: 10_000,
            min_delay: Duration::from_millis(0),
            max_delay: Duration::from_secs(5),
            increase_ratio: 1.5,
            decrease_ratio: 0.5,
            delay_increase_ratio: 2.0,
            delay_decrease_ratio: 0.8,
            success_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct State {
    batch: usize,
    delay: Duration,
    consecutive_successes: u32,
    consecutive_failures: u32,
}

/// Adaptive batch-size and inter-batch-delay controller.
///
/// All mutation goes through [`record_success`](Self::record_success) and
/// [`record_failure`](Self::record_failure); both take `&self` and lock
/// internally so one throttler can be shared across worker-pool tasks
/// without the caller managing synchronization.
pub struct AdaptiveThrottler {
    config: ThrottleConfig,
    state: Mutex<State>,
}

impl AdaptiveThrottler {
    /// Create a throttler starting at `config`'s minimum batch/delay.
    pub fn new(config: ThrottleConfig) -> Self {
        AdaptiveThrottler {
            state: Mutex::new(State {
                batch: config.min_batch,
                delay: config.min_delay,
                consecutive_successes: 0,
                consecutive_failures: 0,
            }),
            config,
        }
    }

    /// The current batch size a caller should request next.
    pub fn batch(&self) -> usize {
        self.state.lock().batch
    }

    /// The current inter-batch delay.
    pub fn delay(&self) -> Duration {
        self.state.lock().delay
    }

    /// Record a successful batch of `items` processed in `duration`.
    ///
    /// `items`/`duration` are accepted for parity with the source API and
    /// future rate-based tuning, but the current policy only reacts to the
    /// consecutive-success count (spec.md §4.1).
    pub fn record_success(&self, items: usize, duration: Duration) {
        let _ = (items, duration);
        let mut s = self.state.lock();
        s.consecutive_failures = 0;
        s.consecutive_successes += 1;
        if s.consecutive_successes >= self.config.success_threshold {
            s.batch = clamp(
                (s.batch as f64 * self.config.increase_ratio) as usize,
                self.config.min_batch,
                self.config.max_batch,
            );
            s.delay = clamp_duration(
                s.delay.mul_f64(self.config.delay_decrease_ratio),
                self.config.min_delay,
                self.config.max_delay,
            );
            s.consecutive_successes = 0;
        }
    }

    /// Record a failed batch, shrinking the batch size and growing the
    /// delay immediately (no threshold — unlike growth, backoff is instant).
    pub fn record_failure(&self, err: &KvError) {
        let _ = err;
        let mut s = self.state.lock();
        s.consecutive_successes = 0;
        s.consecutive_failures += 1;
        s.batch = clamp(
            (s.batch as f64 * self.config.decrease_ratio).max(1.0) as usize,
            self.config.min_batch,
            self.config.max_batch,
        );
        s.delay = clamp_duration(
            max_duration(
                s.delay.mul_f64(self.config.delay_increase_ratio),
                Duration::from_millis(1),
            ),
            self.config.min_delay,
            self.config.max_delay,
        );
    }

    /// True for errors an online-build loop should simply retry after
    /// `record_failure` and `wait_before_next_batch` (spec.md §4.1,
    /// `isRetryable`).
    pub fn is_retryable(&self, err: &KvError) -> bool {
        err.is_retryable()
    }

    /// Block the current thread for the current delay. Called between
    /// batches by the online builder (spec.md §4.1 `waitBeforeNextBatch`).
    pub fn wait_before_next_batch(&self) {
        let delay = self.delay();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

fn clamp(v: usize, min: usize, max: usize) -> usize {
    v.clamp(min, max)
}

fn clamp_duration(v: Duration, min: Duration, max: Duration) -> Duration {
    v.clamp(min, max)
}

fn max_duration(a: Duration, b: Duration) -> Duration {
    if a > b {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ThrottleConfig {
        ThrottleConfig {
            min_batch: 10,
            max_batch: 1000,
            min_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(1000),
            increase_ratio: 2.0,
            decrease_ratio: 0.5,
            delay_increase_ratio: 2.0,
            delay_decrease_ratio: 0.5,
            success_threshold: 2,
        }
    }

    #[test]
    fn batch_grows_after_threshold_successes() {
        let t = AdaptiveThrottler::new(config());
        assert_eq!(t.batch(), 10);
        t.record_success(10, Duration::from_millis(1));
        assert_eq!(t.batch(), 10); // below threshold yet
        t.record_success(10, Duration::from_millis(1));
        assert_eq!(t.batch(), 20); // threshold hit, doubled
    }

    #[test]
    fn batch_shrinks_immediately_on_failure() {
        let t = AdaptiveThrottler::new(config());
        t.record_success(10, Duration::from_millis(1));
        t.record_success(10, Duration::from_millis(1));
        assert_eq!(t.batch(), 20);
        t.record_failure(&KvError::CommitConflict(vec![]));
        assert_eq!(t.batch(), 10);
    }

    #[test]
    fn batch_and_delay_stay_within_bounds() {
        let t = AdaptiveThrottler::new(config());
        for _ in 0..50 {
            t.record_success(10, Duration::from_millis(1));
        }
        assert!(t.batch() <= config().max_batch);
        for _ in 0..50 {
            t.record_failure(&KvError::CommitConflict(vec![]));
        }
        assert!(t.batch() >= config().min_batch);
        assert!(t.delay() <= config().max_delay);
    }

    #[test]
    fn retryable_errors_are_identified() {
        let t = AdaptiveThrottler::new(config());
        assert!(t.is_retryable(&KvError::CommitConflict(vec![])));
        assert!(!t.is_retryable(&KvError::TransactionResolved));
    }
}
