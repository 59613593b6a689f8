//! Wait Mechanisms
//!
//! Bounded polling used by the acceptance flows to synchronize with the page:
//! wait for text to show up, for a selector to match, or for an element to go
//! away. Every wait runs on a [`Clock`](crate::clock::Clock), so the same code
//! is driven by wall-clock time in a live run and virtual time in tests.
//!
//! A probe that errors while waiting counts as "not yet"; only running out of
//! time is an error.

use crate::clock::SharedClock;
use crate::driver::DomInspector;
use crate::result::{WaypointError, WaypointResult};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Default timeout for wait operations (30 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Default polling interval (100ms)
pub const DEFAULT_WAIT_POLL_MS: u64 = 100;

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_WAIT_POLL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Result of a successful wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResult {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
}

/// Polls page conditions against a clock
#[derive(Debug, Clone)]
pub struct Waiter {
    clock: SharedClock,
}

impl Waiter {
    /// Create a waiter on `clock`
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    /// The clock this waiter sleeps on
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Fixed delay, for UI transitions that have no observable end
    pub async fn pause(&self, ms: u64) {
        self.clock.sleep(Duration::from_millis(ms)).await;
    }

    /// Wait until `check` reports true
    pub async fn wait_for<F, Fut>(
        &self,
        description: &str,
        options: &WaitOptions,
        mut check: F,
    ) -> WaypointResult<WaitResult>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = WaypointResult<bool>>,
    {
        let start = self.clock.now_ms();
        loop {
            match check().await {
                Ok(true) => {
                    let elapsed = Duration::from_millis(self.clock.now_ms() - start);
                    debug!(waited_for = description, ?elapsed, "wait satisfied");
                    return Ok(WaitResult {
                        elapsed,
                        waited_for: description.to_string(),
                    });
                }
                Ok(false) => {}
                Err(e) => debug!(waited_for = description, error = %e, "probe failed while waiting"),
            }

            let waited = self.clock.now_ms() - start;
            if waited >= options.timeout_ms {
                return Err(WaypointError::Timeout {
                    ms: options.timeout_ms,
                });
            }
            let remaining = Duration::from_millis(options.timeout_ms - waited);
            self.clock.sleep(options.poll_interval().min(remaining)).await;
        }
    }

    /// Wait for visible text anywhere on the page
    pub async fn wait_for_text<D>(
        &self,
        dom: &D,
        text: &str,
        options: &WaitOptions,
    ) -> WaypointResult<WaitResult>
    where
        D: DomInspector + ?Sized,
    {
        self.wait_for(&format!("text={text}"), options, || dom.is_text_visible(text))
            .await
    }

    /// Wait for at least one element matching `selector`
    pub async fn wait_for_selector<D>(
        &self,
        dom: &D,
        selector: &str,
        options: &WaitOptions,
    ) -> WaypointResult<WaitResult>
    where
        D: DomInspector + ?Sized,
    {
        self.wait_for(selector, options, || async move {
            Ok::<_, WaypointError>(dom.count(selector).await? > 0)
        })
        .await
    }

    /// Wait until no element matches `selector`
    pub async fn wait_until_gone<D>(
        &self,
        dom: &D,
        selector: &str,
        options: &WaitOptions,
    ) -> WaypointResult<WaitResult>
    where
        D: DomInspector + ?Sized,
    {
        self.wait_for(&format!("{selector} gone"), options, || async move {
            Ok::<_, WaypointError>(dom.count(selector).await? == 0)
        })
        .await
    }

    /// Whether `text` becomes visible within `timeout_ms`; never errors
    pub async fn text_appears<D>(&self, dom: &D, text: &str, timeout_ms: u64) -> bool
    where
        D: DomInspector + ?Sized,
    {
        let options = WaitOptions::new().with_timeout(timeout_ms);
        self.wait_for_text(dom, text, &options).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FakeClock};
    use crate::driver::NetworkMonitor;
    use crate::scripted::{ScriptedPage, Timeline};

    async fn armed(timeline: Timeline) -> (ScriptedPage, Waiter) {
        let page = ScriptedPage::new(timeline);
        page.on_request(Box::new(|_| {})).await.unwrap();
        let waiter = Waiter::new(page.clock());
        (page, waiter)
    }

    mod options_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let opts = WaitOptions::default();
            assert_eq!(opts.timeout_ms, DEFAULT_WAIT_TIMEOUT_MS);
            assert_eq!(opts.poll_interval(), Duration::from_millis(100));
        }

        #[test]
        fn test_builders() {
            let opts = WaitOptions::new().with_timeout(15_000).with_poll_interval(500);
            assert_eq!(opts.timeout(), Duration::from_secs(15));
            assert_eq!(opts.poll_interval_ms, 500);
        }
    }

    mod waiter_tests {
        use super::*;

        #[tokio::test]
        async fn test_wait_for_text_appearing_later() {
            let (page, waiter) =
                armed(Timeline::new().element_between("button", "Sign out", 1200, None)).await;
            let opts = WaitOptions::new().with_timeout(15_000).with_poll_interval(500);
            let result = waiter.wait_for_text(&page, "Sign out", &opts).await.unwrap();
            assert_eq!(result.elapsed, Duration::from_millis(1500));
            assert_eq!(result.waited_for, "text=Sign out");
        }

        #[tokio::test]
        async fn test_wait_times_out() {
            let (page, waiter) = armed(Timeline::new()).await;
            let opts = WaitOptions::new().with_timeout(2_000).with_poll_interval(300);
            let err = waiter.wait_for_text(&page, "Sign out", &opts).await.unwrap_err();
            assert!(matches!(err, WaypointError::Timeout { ms: 2_000 }));
            assert_eq!(page.now_ms(), 2_000);
        }

        #[tokio::test]
        async fn test_wait_until_gone() {
            let (page, waiter) = armed(
                Timeline::new().element_between("input[type=\"email\"]", "", 0, Some(3_000)),
            )
            .await;
            let opts = WaitOptions::new().with_timeout(10_000).with_poll_interval(1_000);
            assert!(waiter
                .wait_until_gone(&page, "input[type=\"email\"]", &opts)
                .await
                .is_ok());
            assert_eq!(page.now_ms(), 3_000);
        }

        #[tokio::test]
        async fn test_wait_for_selector_immediate() {
            let (page, waiter) = armed(Timeline::new().element("a[href*=\"/trips/\"]", "Trip")).await;
            let result = waiter
                .wait_for_selector(&page, "a[href*=\"/trips/\"]", &WaitOptions::default())
                .await
                .unwrap();
            assert_eq!(result.elapsed, Duration::ZERO);
        }

        #[tokio::test]
        async fn test_probe_errors_are_retried() {
            let (page, waiter) = armed(
                Timeline::new()
                    .element("h2", "新增地點")
                    .probe_failure(0, 1_000),
            )
            .await;
            let opts = WaitOptions::new().with_timeout(5_000).with_poll_interval(500);
            let result = waiter.wait_for_selector(&page, "h2", &opts).await.unwrap();
            assert_eq!(result.elapsed, Duration::from_millis(1_000));
        }

        #[tokio::test]
        async fn test_text_appears_never_errors() {
            let (page, waiter) = armed(Timeline::new().element("div", "歡迎回來")).await;
            assert!(waiter.text_appears(&page, "歡迎", 1_000).await);
            assert!(!waiter.text_appears(&page, "Welcome", 1_000).await);
        }

        #[tokio::test]
        async fn test_pause_advances_clock() {
            let clock = FakeClock::shared();
            let waiter = Waiter::new(clock.clone());
            waiter.pause(500).await;
            assert_eq!(clock.now_ms(), 500);
            assert_eq!(waiter.clock().now_ms(), 500);
        }
    }
}
