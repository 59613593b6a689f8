//! Scripted page: a virtual-time stand-in for a browser tab.
//!
//! A [`Timeline`] lists network exchanges, DOM elements with visibility
//! windows, and windows in which DOM probes fail or stall. All timeline times
//! are milliseconds measured from the moment the first network listener is
//! registered (the arm point); before that, the page is frozen at time zero.
//!
//! Time only moves through the clock returned by [`ScriptedPage::clock`].
//! Sleeping on it advances virtual time and delivers every network exchange
//! that has come due to the registered listeners, in timeline order.
//!
//! The same timeline format (YAML or JSON) is what `waypointer judge` reads.

use crate::clock::{Clock, FakeClock, SharedClock};
use crate::driver::{
    ActionDriver, DomInspector, ElementSnapshot, NetworkCallback, NetworkExchange, NetworkMonitor,
};
use crate::evidence::Direction;
use crate::result::{WaypointError, WaypointResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const fn default_visible() -> bool {
    true
}

/// A network exchange scheduled on the timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledExchange {
    /// Delivery time relative to the arm point
    pub at_ms: u64,
    /// Request or response
    pub direction: Direction,
    /// Exchange URL
    pub url: String,
    /// HTTP status (responses)
    #[serde(default)]
    pub status: Option<u16>,
}

/// An element that exists during part of the timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedElement {
    /// Selector the element answers to, compared verbatim
    pub selector: String,
    /// Text content
    #[serde(default)]
    pub text: String,
    /// Whether the element is rendered
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// First instant the element exists
    #[serde(default)]
    pub from_ms: u64,
    /// Instant the element is removed (never if absent)
    #[serde(default)]
    pub until_ms: Option<u64>,
}

impl ScriptedElement {
    fn is_active(&self, at_ms: u64) -> bool {
        self.from_ms <= at_ms && self.until_ms.map_or(true, |until| at_ms < until)
    }
}

/// Half-open interval `[from_ms, until_ms)` on the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Start (inclusive)
    pub from_ms: u64,
    /// End (exclusive)
    pub until_ms: u64,
}

impl Window {
    fn contains(&self, at_ms: u64) -> bool {
        self.from_ms <= at_ms && at_ms < self.until_ms
    }
}

/// Everything a scripted page will show and emit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeline {
    /// Initial page URL
    pub url: String,
    /// Scheduled network traffic
    pub network: Vec<ScheduledExchange>,
    /// DOM elements and their lifetimes
    pub elements: Vec<ScriptedElement>,
    /// Windows in which DOM queries return an error
    pub probe_failures: Vec<Window>,
    /// Windows in which DOM queries never complete
    pub stalls: Vec<Window>,
}

impl Timeline {
    /// Create an empty timeline
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML (or JSON) timeline
    pub fn from_yaml_str(source: &str) -> WaypointResult<Self> {
        Ok(serde_yaml_ng::from_str(source)?)
    }

    /// Load a timeline file; JSON is accepted as a YAML subset
    pub fn load(path: &Path) -> WaypointResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }

    /// Set the initial URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Schedule an outgoing request
    #[must_use]
    pub fn request(mut self, at_ms: u64, url: impl Into<String>) -> Self {
        self.network.push(ScheduledExchange {
            at_ms,
            direction: Direction::Request,
            url: url.into(),
            status: None,
        });
        self
    }

    /// Schedule an incoming response
    #[must_use]
    pub fn response(mut self, at_ms: u64, url: impl Into<String>, status: u16) -> Self {
        self.network.push(ScheduledExchange {
            at_ms,
            direction: Direction::Response,
            url: url.into(),
            status: Some(status),
        });
        self
    }

    /// Add a visible element that exists for the whole timeline
    #[must_use]
    pub fn element(self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        self.element_between(selector, text, 0, None)
    }

    /// Add a visible element that exists during `[from_ms, until_ms)`
    #[must_use]
    pub fn element_between(
        mut self,
        selector: impl Into<String>,
        text: impl Into<String>,
        from_ms: u64,
        until_ms: Option<u64>,
    ) -> Self {
        self.elements.push(ScriptedElement {
            selector: selector.into(),
            text: text.into(),
            visible: true,
            from_ms,
            until_ms,
        });
        self
    }

    /// Add an element that exists but is not rendered
    #[must_use]
    pub fn hidden_element(mut self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        self.elements.push(ScriptedElement {
            selector: selector.into(),
            text: text.into(),
            visible: false,
            from_ms: 0,
            until_ms: None,
        });
        self
    }

    /// Make DOM queries fail during `[from_ms, until_ms)`
    #[must_use]
    pub fn probe_failure(mut self, from_ms: u64, until_ms: u64) -> Self {
        self.probe_failures.push(Window { from_ms, until_ms });
        self
    }

    /// Make DOM queries hang during `[from_ms, until_ms)`
    #[must_use]
    pub fn stall(mut self, from_ms: u64, until_ms: u64) -> Self {
        self.stalls.push(Window { from_ms, until_ms });
        self
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ScriptState {
    clock: FakeClock,
    timeline: Timeline,
    armed_at: Mutex<Option<u64>>,
    delivered: Mutex<usize>,
    request_callbacks: Mutex<Vec<NetworkCallback>>,
    response_callbacks: Mutex<Vec<NetworkCallback>>,
    history: Mutex<Vec<String>>,
    url: Mutex<String>,
}

impl std::fmt::Debug for ScriptState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptState")
            .field("now_ms", &self.clock.now_ms())
            .field("armed_at", &*lock(&self.armed_at))
            .field("delivered", &*lock(&self.delivered))
            .field("url", &*lock(&self.url))
            .finish_non_exhaustive()
    }
}

impl ScriptState {
    fn timeline_now(&self) -> u64 {
        lock(&self.armed_at).map_or(0, |armed| self.clock.now_ms().saturating_sub(armed))
    }

    fn arm(&self) {
        let mut armed_at = lock(&self.armed_at);
        if armed_at.is_none() {
            *armed_at = Some(self.clock.now_ms());
        }
    }

    /// Deliver every exchange that has come due
    fn pump(&self) {
        if lock(&self.armed_at).is_none() {
            return;
        }
        let now = self.timeline_now();
        let mut cursor = lock(&self.delivered);
        while let Some(scheduled) = self.timeline.network.get(*cursor) {
            if scheduled.at_ms > now {
                break;
            }
            *cursor += 1;
            let exchange = NetworkExchange {
                url: scheduled.url.clone(),
                status: scheduled.status,
            };
            let callbacks = match scheduled.direction {
                Direction::Request => lock(&self.request_callbacks),
                Direction::Response => lock(&self.response_callbacks),
            };
            for callback in callbacks.iter() {
                callback(exchange.clone());
            }
        }
    }

    fn active_elements(&self, selector: &str) -> Vec<&ScriptedElement> {
        let now = self.timeline_now();
        self.timeline
            .elements
            .iter()
            .filter(|e| e.selector == selector && e.is_active(now))
            .collect()
    }

    async fn probe(&self) -> WaypointResult<()> {
        self.pump();
        let now = self.timeline_now();
        if self.timeline.stalls.iter().any(|w| w.contains(now)) {
            futures::future::pending::<()>().await;
        }
        if self.timeline.probe_failures.iter().any(|w| w.contains(now)) {
            return Err(WaypointError::page(format!(
                "scripted probe failure at {now}ms"
            )));
        }
        Ok(())
    }

    fn record(&self, call: String) {
        lock(&self.history).push(call);
    }

    fn require(&self, selector: &str) -> WaypointResult<()> {
        if self.active_elements(selector).is_empty() {
            return Err(WaypointError::ElementNotFound {
                selector: selector.to_string(),
            });
        }
        Ok(())
    }
}

/// Page double driven by a [`Timeline`] on virtual time
#[derive(Debug, Clone)]
pub struct ScriptedPage {
    state: Arc<ScriptState>,
}

impl ScriptedPage {
    /// Create a page at virtual time zero
    #[must_use]
    pub fn new(mut timeline: Timeline) -> Self {
        timeline.network.sort_by_key(|e| e.at_ms);
        let url = timeline.url.clone();
        Self {
            state: Arc::new(ScriptState {
                clock: FakeClock::new(),
                timeline,
                armed_at: Mutex::new(None),
                delivered: Mutex::new(0),
                request_callbacks: Mutex::new(Vec::new()),
                response_callbacks: Mutex::new(Vec::new()),
                history: Mutex::new(Vec::new()),
                url: Mutex::new(url),
            }),
        }
    }

    /// Create a page whose timeline starts now instead of at the first listener
    #[must_use]
    pub fn running(timeline: Timeline) -> Self {
        let page = Self::new(timeline);
        page.state.arm();
        page
    }

    /// Clock that drives this page; sleeping on it delivers due traffic
    #[must_use]
    pub fn clock(&self) -> SharedClock {
        Arc::new(ScriptedClock {
            state: Arc::clone(&self.state),
        })
    }

    /// Virtual milliseconds since creation
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.state.clock.now_ms()
    }

    /// Virtual time at which the first listener registered
    #[must_use]
    pub fn armed_at(&self) -> Option<u64> {
        *lock(&self.state.armed_at)
    }

    /// Calls made through [`ActionDriver`], oldest first
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        lock(&self.state.history).clone()
    }

    /// Check if an action was called
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        lock(&self.state.history)
            .iter()
            .any(|c| c.starts_with(prefix))
    }
}

/// Clock handle returned by [`ScriptedPage::clock`]
#[derive(Debug)]
struct ScriptedClock {
    state: Arc<ScriptState>,
}

#[async_trait]
impl Clock for ScriptedClock {
    fn now_ms(&self) -> u64 {
        self.state.clock.now_ms()
    }

    async fn sleep(&self, duration: Duration) {
        self.state.clock.fast_forward(duration);
        self.state.pump();
        tokio::task::yield_now().await;
    }
}

#[async_trait]
impl DomInspector for ScriptedPage {
    async fn find_by_text(&self, selector: &str, labels: &[String]) -> WaypointResult<bool> {
        self.state.probe().await?;
        Ok(self
            .state
            .active_elements(selector)
            .iter()
            .any(|e| labels.iter().any(|l| l == e.text.trim())))
    }

    async fn query_all(&self, selector: &str) -> WaypointResult<Vec<ElementSnapshot>> {
        self.state.probe().await?;
        Ok(self
            .state
            .active_elements(selector)
            .into_iter()
            .map(|e| ElementSnapshot::new(e.text.trim(), e.visible))
            .collect())
    }

    async fn is_text_visible(&self, text: &str) -> WaypointResult<bool> {
        self.state.probe().await?;
        let now = self.state.timeline_now();
        Ok(self
            .state
            .timeline
            .elements
            .iter()
            .any(|e| e.visible && e.is_active(now) && e.text.contains(text)))
    }

    async fn count(&self, selector: &str) -> WaypointResult<usize> {
        self.state.probe().await?;
        Ok(self.state.active_elements(selector).len())
    }

    async fn current_url(&self) -> WaypointResult<String> {
        Ok(lock(&self.state.url).clone())
    }
}

#[async_trait]
impl NetworkMonitor for ScriptedPage {
    async fn on_request(&self, callback: NetworkCallback) -> WaypointResult<()> {
        self.state.arm();
        lock(&self.state.request_callbacks).push(callback);
        Ok(())
    }

    async fn on_response(&self, callback: NetworkCallback) -> WaypointResult<()> {
        self.state.arm();
        lock(&self.state.response_callbacks).push(callback);
        Ok(())
    }
}

#[async_trait]
impl ActionDriver for ScriptedPage {
    async fn navigate(&self, url: &str) -> WaypointResult<()> {
        self.state.record(format!("navigate:{url}"));
        *lock(&self.state.url) = url.to_string();
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> WaypointResult<()> {
        self.state.require(selector)?;
        self.state.record(format!("fill:{selector}={value}"));
        Ok(())
    }

    async fn fill_nth(&self, selector: &str, index: usize, value: &str) -> WaypointResult<()> {
        if self.state.active_elements(selector).len() <= index {
            return Err(WaypointError::ElementNotFound {
                selector: format!("{selector} >> nth={index}"),
            });
        }
        self.state.record(format!("fill:{selector}[{index}]={value}"));
        Ok(())
    }

    async fn attach_file(&self, selector: &str, path: &Path) -> WaypointResult<()> {
        self.state.require(selector)?;
        self.state
            .record(format!("attach_file:{selector}={}", path.display()));
        Ok(())
    }

    async fn click(&self, selector: &str) -> WaypointResult<()> {
        self.state.require(selector)?;
        self.state.record(format!("click:{selector}"));
        Ok(())
    }

    async fn click_text(&self, selector: &str, text: &str) -> WaypointResult<()> {
        if !self
            .state
            .active_elements(selector)
            .iter()
            .any(|e| e.text.contains(text))
        {
            return Err(WaypointError::ElementNotFound {
                selector: format!("{selector}:has-text({text})"),
            });
        }
        self.state.record(format!("click_text:{selector}={text}"));
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> WaypointResult<()> {
        self.state.record(format!("screenshot:{}", path.display()));
        Ok(())
    }

    async fn clear_session(&self) -> WaypointResult<()> {
        self.state.record("clear_session".to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback(counter: &Arc<AtomicUsize>) -> NetworkCallback {
        let counter = Arc::clone(counter);
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    mod timeline_tests {
        use super::*;

        #[test]
        fn test_parse_yaml_timeline() {
            let yaml = r#"
network:
  - at_ms: 3000
    direction: response
    url: https://api.cloudinary.com/v1_1/demo/image/upload
    status: 200
elements:
  - selector: h2
    text: 新增地點
    until_ms: 4000
"#;
            let timeline = Timeline::from_yaml_str(yaml).unwrap();
            assert_eq!(timeline.network.len(), 1);
            assert_eq!(timeline.network[0].status, Some(200));
            assert!(timeline.elements[0].visible);
            assert_eq!(timeline.elements[0].until_ms, Some(4000));
            assert!(timeline.stalls.is_empty());
        }

        #[test]
        fn test_json_is_accepted() {
            let json = r#"{"elements":[{"selector":"h2","text":"編輯地點"}]}"#;
            let timeline = Timeline::from_yaml_str(json).unwrap();
            assert_eq!(timeline.elements[0].text, "編輯地點");
        }

        #[test]
        fn test_load_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("timeline.yaml");
            std::fs::write(&path, "url: http://localhost:5173/\n").unwrap();
            let timeline = Timeline::load(&path).unwrap();
            assert_eq!(timeline.url, "http://localhost:5173/");
        }

        #[test]
        fn test_element_windows() {
            let elem = ScriptedElement {
                selector: "h2".into(),
                text: String::new(),
                visible: true,
                from_ms: 1000,
                until_ms: Some(2000),
            };
            assert!(!elem.is_active(999));
            assert!(elem.is_active(1000));
            assert!(!elem.is_active(2000));
        }
    }

    mod delivery_tests {
        use super::*;

        #[tokio::test]
        async fn test_nothing_delivered_before_arming() {
            let page = ScriptedPage::new(Timeline::new().response(0, "https://m.test/", 200));
            page.clock().sleep(Duration::from_secs(5)).await;
            let counter = Arc::new(AtomicUsize::new(0));
            page.on_response(counting_callback(&counter)).await.unwrap();
            assert_eq!(counter.load(Ordering::SeqCst), 0);
            assert_eq!(page.armed_at(), Some(5000));
        }

        #[tokio::test]
        async fn test_due_exchanges_delivered_on_sleep() {
            let page = ScriptedPage::new(
                Timeline::new()
                    .response(3000, "https://m.test/b", 200)
                    .request(1000, "https://m.test/a"),
            );
            let requests = Arc::new(AtomicUsize::new(0));
            let responses = Arc::new(AtomicUsize::new(0));
            page.on_request(counting_callback(&requests)).await.unwrap();
            page.on_response(counting_callback(&responses)).await.unwrap();

            let clock = page.clock();
            clock.sleep(Duration::from_secs(2)).await;
            assert_eq!(requests.load(Ordering::SeqCst), 1);
            assert_eq!(responses.load(Ordering::SeqCst), 0);

            clock.sleep(Duration::from_secs(2)).await;
            assert_eq!(responses.load(Ordering::SeqCst), 1);

            clock.sleep(Duration::from_secs(2)).await;
            assert_eq!(responses.load(Ordering::SeqCst), 1, "delivered once");
        }
    }

    mod dom_tests {
        use super::*;

        #[tokio::test]
        async fn test_find_by_text_respects_window() {
            let page = ScriptedPage::new(Timeline::new().element_between(
                "h2",
                " 新增地點 ",
                0,
                Some(4000),
            ));
            let labels = vec!["新增地點".to_string()];
            page.on_request(Box::new(|_| {})).await.unwrap();
            assert!(page.find_by_text("h2", &labels).await.unwrap());
            page.clock().sleep(Duration::from_secs(4)).await;
            assert!(!page.find_by_text("h2", &labels).await.unwrap());
        }

        #[tokio::test]
        async fn test_hidden_elements_are_not_visible_text() {
            let page = ScriptedPage::new(Timeline::new().hidden_element("div", "Sign out"));
            assert!(!page.is_text_visible("Sign out").await.unwrap());
            assert_eq!(page.count("div").await.unwrap(), 1);
            assert!(!page.query_all("div").await.unwrap()[0].is_visible());
        }

        #[tokio::test]
        async fn test_probe_failure_window() {
            let page = ScriptedPage::new(Timeline::new().probe_failure(0, 1000));
            assert!(page.count("h2").await.is_err());
        }
    }

    mod action_tests {
        use super::*;

        #[tokio::test]
        async fn test_actions_are_recorded() {
            let page = ScriptedPage::new(
                Timeline::new()
                    .element("input[type=\"password\"]", "")
                    .element("input[type=\"password\"]", "")
                    .element("button", "儲存地點"),
            );
            page.navigate("http://localhost:5173/login").await.unwrap();
            page.fill_nth("input[type=\"password\"]", 1, "pw").await.unwrap();
            page.click_text("button", "儲存").await.unwrap();
            assert!(page.was_called("navigate:http://localhost:5173/login"));
            assert!(page.was_called("fill:input[type=\"password\"][1]=pw"));
            assert!(page.was_called("click_text:button=儲存"));
            assert_eq!(
                page.current_url().await.unwrap(),
                "http://localhost:5173/login"
            );
        }

        #[tokio::test]
        async fn test_missing_target_is_an_error() {
            let page = ScriptedPage::new(Timeline::new());
            let err = page.click("[aria-label=\"Add new place\"]").await.unwrap_err();
            assert!(matches!(err, WaypointError::ElementNotFound { .. }));
            assert!(page.fill_nth("input", 0, "x").await.is_err());
            assert!(page.history().is_empty());
        }
    }
}
