//! Clock abstraction for the observation window.
//!
//! The oracle never calls `tokio::time` directly. It asks a [`Clock`] for the
//! elapsed time and for sleeps, so the same polling loop runs on wall-clock
//! time against a live browser and on virtual time in tests.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of time for polling loops
#[async_trait]
pub trait Clock: Debug + Send + Sync {
    /// Milliseconds elapsed since the clock's origin
    fn now_ms(&self) -> u64;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);

    /// Elapsed time since the clock's origin
    fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms())
    }
}

/// Thread-safe clock handle
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time backed by tokio timers
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Create a shared handle
    #[must_use]
    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fake clock for deterministic testing
///
/// Time only moves when someone sleeps on it or fast-forwards it. A sleep
/// returns immediately after advancing the clock by the requested duration.
#[derive(Debug, Default)]
pub struct FakeClock {
    current_ms: AtomicU64,
}

impl FakeClock {
    /// Create a fake clock at time zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared fake clock at time zero
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Fast-forward time by duration
    pub fn fast_forward(&self, duration: Duration) {
        self.current_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    /// Fast-forward time by milliseconds
    pub fn fast_forward_ms(&self, ms: u64) {
        self.fast_forward(Duration::from_millis(ms));
    }

    /// Set clock to a fixed time
    pub fn set_fixed_time(&self, time_ms: u64) {
        self.current_ms.store(time_ms, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        self.fast_forward(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod fake_clock_tests {
        use super::*;

        #[test]
        fn test_starts_at_zero() {
            let clock = FakeClock::new();
            assert_eq!(clock.now_ms(), 0);
        }

        #[test]
        fn test_fast_forward() {
            let clock = FakeClock::new();
            clock.fast_forward_ms(1500);
            clock.fast_forward(Duration::from_secs(2));
            assert_eq!(clock.now_ms(), 3500);
            assert_eq!(clock.now(), Duration::from_millis(3500));
        }

        #[test]
        fn test_set_fixed_time() {
            let clock = FakeClock::new();
            clock.fast_forward_ms(10);
            clock.set_fixed_time(42);
            assert_eq!(clock.now_ms(), 42);
        }

        #[tokio::test]
        async fn test_sleep_advances_time() {
            let clock = FakeClock::new();
            clock.sleep(Duration::from_secs(2)).await;
            clock.sleep(Duration::from_secs(2)).await;
            assert_eq!(clock.now_ms(), 4000);
        }

        #[tokio::test]
        async fn test_shared_handle_sees_same_time() {
            let clock = FakeClock::shared();
            let dyn_clock: SharedClock = clock.clone();
            dyn_clock.sleep(Duration::from_millis(250)).await;
            assert_eq!(clock.now_ms(), 250);
        }
    }

    mod system_clock_tests {
        use super::*;

        #[tokio::test]
        async fn test_sleep_moves_forward() {
            let clock = SystemClock::new();
            let before = clock.now_ms();
            clock.sleep(Duration::from_millis(20)).await;
            assert!(clock.now_ms() >= before + 20);
        }
    }
}
