//! Collaborator traits for browser automation.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  PageSession = DomInspector + NetworkMonitor + ActionDriver      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────┐        ┌────────────────────────────┐  │
//! │  │  ChromiumPage        │        │  ScriptedPage              │  │
//! │  │  (feature "browser") │        │  (virtual-time timeline)   │  │
//! │  │  CDP via chromiumoxide│       │  tests + offline judging   │  │
//! │  └──────────────────────┘        └────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The oracle only ever reads through [`DomInspector`] and subscribes through
//! [`NetworkMonitor`]. Flows use [`ActionDriver`] to get the page into the
//! state the oracle expects.

use crate::result::WaypointResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Read-only view of one element at query time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Trimmed text content
    pub text: String,
    /// Whether the element is rendered (has a layout box)
    pub visible: bool,
}

impl ElementSnapshot {
    /// Create a snapshot
    #[must_use]
    pub fn new(text: impl Into<String>, visible: bool) -> Self {
        Self {
            text: text.into(),
            visible,
        }
    }

    /// Element text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Check if element is visible
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }
}

/// A network exchange as delivered to monitor callbacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkExchange {
    /// Request URL
    pub url: String,
    /// HTTP status (responses only)
    pub status: Option<u16>,
}

impl NetworkExchange {
    /// An outgoing request
    #[must_use]
    pub fn request(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: None,
        }
    }

    /// An incoming response
    #[must_use]
    pub fn response(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status: Some(status),
        }
    }
}

/// Callback invoked for each network exchange, in arrival order
pub type NetworkCallback = Box<dyn Fn(NetworkExchange) + Send + Sync>;

/// Read-only queries over the rendered page. Every call reflects live state.
#[async_trait]
pub trait DomInspector: Send + Sync {
    /// Whether an element matching `selector` has trimmed text equal to one of `labels`
    async fn find_by_text(&self, selector: &str, labels: &[String]) -> WaypointResult<bool>;

    /// Snapshot every element matching `selector`
    async fn query_all(&self, selector: &str) -> WaypointResult<Vec<ElementSnapshot>>;

    /// Whether some visible element contains `text`
    async fn is_text_visible(&self, text: &str) -> WaypointResult<bool>;

    /// Number of elements matching `selector`
    async fn count(&self, selector: &str) -> WaypointResult<usize>;

    /// Current page URL
    async fn current_url(&self) -> WaypointResult<String>;
}

/// Passive subscription to network traffic
///
/// Registration must happen before the action that triggers the traffic;
/// exchanges that complete earlier are not replayed.
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Subscribe to outgoing requests
    async fn on_request(&self, callback: NetworkCallback) -> WaypointResult<()>;

    /// Subscribe to incoming responses
    async fn on_response(&self, callback: NetworkCallback) -> WaypointResult<()>;
}

/// Simulated user input. Each call waits for its target to be ready.
#[async_trait]
pub trait ActionDriver: Send + Sync {
    /// Navigate to URL
    async fn navigate(&self, url: &str) -> WaypointResult<()>;

    /// Replace the value of the first field matching `selector`
    async fn fill(&self, selector: &str, value: &str) -> WaypointResult<()>;

    /// Replace the value of the `index`-th field matching `selector`
    async fn fill_nth(&self, selector: &str, index: usize, value: &str) -> WaypointResult<()>;

    /// Attach a file to a file input
    async fn attach_file(&self, selector: &str, path: &Path) -> WaypointResult<()>;

    /// Click the first element matching `selector`
    async fn click(&self, selector: &str) -> WaypointResult<()>;

    /// Click the first element matching `selector` whose text contains `text`
    async fn click_text(&self, selector: &str, text: &str) -> WaypointResult<()>;

    /// Capture the viewport to a PNG file
    async fn screenshot(&self, path: &Path) -> WaypointResult<()>;

    /// Drop cookies and web storage for the current origin
    async fn clear_session(&self) -> WaypointResult<()>;
}

/// Everything a flow needs from one browser tab
pub trait PageSession: DomInspector + NetworkMonitor + ActionDriver {}

impl<T: DomInspector + NetworkMonitor + ActionDriver> PageSession for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_snapshot_accessors() {
        let elem = ElementSnapshot::new("新增地點", true);
        assert_eq!(elem.text(), "新增地點");
        assert!(elem.is_visible());
    }

    #[test]
    fn test_exchange_constructors() {
        assert_eq!(NetworkExchange::request("https://a.test/").status, None);
        assert_eq!(NetworkExchange::response("https://a.test/", 404).status, Some(404));
    }

    #[test]
    fn test_snapshot_serde() {
        let json = serde_json::to_string(&ElementSnapshot::new("x", false)).unwrap();
        let back: ElementSnapshot = serde_json::from_str(&json).unwrap();
        assert!(!back.is_visible());
    }
}
