//! Evidence recorded during an observation window.
//!
//! Network events are appended by monitor callbacks in arrival order and are
//! never mutated afterwards. Toasts and modal state are sampled from the DOM
//! at discrete points, so a toast that appears and vanishes between two
//! samples is not seen. That gap is accepted, not papered over.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use url::{Host, Url};

/// Direction of an observed network exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Outgoing request
    Request,
    /// Incoming response
    Response,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request => write!(f, "->"),
            Self::Response => write!(f, "<-"),
        }
    }
}

/// A network exchange with the target host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEvent {
    /// Request or response
    pub direction: Direction,
    /// Full URL of the exchange
    pub url: String,
    /// Host part of the URL
    pub destination_host: String,
    /// HTTP status (responses only)
    pub status: Option<u16>,
    /// Clock reading when the event was recorded
    pub observed_at_ms: u64,
}

impl NetworkEvent {
    /// Record an outgoing request
    #[must_use]
    pub fn request(url: &str, observed_at_ms: u64) -> Self {
        Self {
            direction: Direction::Request,
            url: url.to_string(),
            destination_host: host_of(url),
            status: None,
            observed_at_ms,
        }
    }

    /// Record an incoming response
    #[must_use]
    pub fn response(url: &str, status: Option<u16>, observed_at_ms: u64) -> Self {
        Self {
            direction: Direction::Response,
            url: url.to_string(),
            destination_host: host_of(url),
            status,
            observed_at_ms,
        }
    }

    /// Whether this is a response
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.direction == Direction::Response
    }

    /// A response whose status is known and outside 2xx
    #[must_use]
    pub fn is_non_success(&self) -> bool {
        self.is_response() && self.status.is_some_and(|s| !(200..300).contains(&s))
    }
}

/// Lowercased host of a URL; IPv6 literals come back without brackets
///
/// Scheme-less input such as `media.example.com/a` is read as `http://`.
/// Unparseable input yields an empty host.
#[must_use]
pub fn host_of(url: &str) -> String {
    let parsed = Url::parse(url).or_else(|_| Url::parse(&format!("http://{url}")));
    match parsed.ok().as_ref().and_then(Url::host) {
        Some(Host::Domain(domain)) => domain.to_lowercase(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => String::new(),
    }
}

/// Substring identifying the upload destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetHost(String);

impl TargetHost {
    /// Create a target matcher
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self(host.into())
    }

    /// The configured substring
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the URL's host contains the target substring, ignoring case
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        let target = self.0.trim_start_matches('[').trim_end_matches(']');
        !target.is_empty() && host_of(url).contains(&target.to_lowercase())
    }
}

impl std::fmt::Display for TargetHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append-only, arrival-ordered log of network evidence
///
/// Cheap to clone. Monitor callbacks hold one clone and push; the oracle
/// holds another and only reads.
#[derive(Debug, Clone, Default)]
pub struct EvidenceLog {
    events: Arc<Mutex<Vec<NetworkEvent>>>,
}

impl EvidenceLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn push(&self, event: NetworkEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Copy of all events in arrival order
    #[must_use]
    pub fn snapshot(&self) -> Vec<NetworkEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded requests
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.count(Direction::Request)
    }

    /// Number of recorded responses
    #[must_use]
    pub fn response_count(&self) -> usize {
        self.count(Direction::Response)
    }

    /// Whether at least one response has been recorded
    #[must_use]
    pub fn has_response(&self) -> bool {
        self.response_count() > 0
    }

    fn count(&self, direction: Direction) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.direction == direction)
            .count()
    }
}

/// A transient UI notification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToastMessage {
    /// Trimmed text content
    pub text: String,
}

impl ToastMessage {
    /// Create a toast from raw element text
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
        }
    }
}

/// Deduplicated toasts in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToastLog {
    toasts: Vec<ToastMessage>,
}

impl ToastLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sampled toast; empty or repeated texts are ignored.
    /// Returns whether the toast was new.
    pub fn record(&mut self, toast: ToastMessage) -> bool {
        if toast.text.is_empty() || self.toasts.contains(&toast) {
            return false;
        }
        self.toasts.push(toast);
        true
    }

    /// All recorded toasts
    #[must_use]
    pub fn toasts(&self) -> &[ToastMessage] {
        &self.toasts
    }

    /// Number of distinct toasts
    #[must_use]
    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    /// Whether no toast was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }
}

/// Substrings whose presence marks a toast as a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorKeywords(Vec<String>);

impl ErrorKeywords {
    /// Create from a keyword list
    #[must_use]
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keywords.into_iter().map(Into::into).collect())
    }

    /// First keyword contained in `text`, if any. Matching is case-sensitive;
    /// list each casing you want caught.
    #[must_use]
    pub fn find_in(&self, text: &str) -> Option<&str> {
        self.0
            .iter()
            .filter(|k| !k.is_empty())
            .find(|k| text.contains(k.as_str()))
            .map(String::as_str)
    }

    /// Whether any keyword is contained in `text`
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.find_in(text).is_some()
    }

    /// Configured keywords
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for ErrorKeywords {
    fn default() -> Self {
        Self::new(["失敗", "錯誤", "error", "Error", "failed", "Failed"])
    }
}

/// Whether the place editor modal is still showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorModalState {
    /// A heading from the editor label set is present
    pub is_open: bool,
}

impl EditorModalState {
    /// Modal is showing
    pub const OPEN: Self = Self { is_open: true };
    /// Modal is gone
    pub const CLOSED: Self = Self { is_open: false };
}

#[cfg(test)]
mod tests {
    use super::*;

    mod host_tests {
        use super::*;

        #[test]
        fn test_host_of_strips_scheme_path_and_port() {
            assert_eq!(
                host_of("https://api.cloudinary.com/v1_1/demo/image/upload"),
                "api.cloudinary.com"
            );
            assert_eq!(host_of("http://localhost:5173/login"), "localhost");
            assert_eq!(host_of("https://user:pw@media.example.com:8443?x=1"), "media.example.com");
            assert_eq!(host_of("media.example.com/a"), "media.example.com");
        }

        #[test]
        fn test_target_host_matches_host_only() {
            let target = TargetHost::new("cloudinary.com");
            assert!(target.matches("https://api.cloudinary.com/v1_1/x/upload"));
            assert!(target.matches("https://res.cloudinary.com/x/image.jpg"));
            assert!(!target.matches("http://localhost:5173/?next=cloudinary.com"));
        }

        #[test]
        fn test_host_is_lowercased() {
            assert_eq!(
                host_of("https://API.Cloudinary.com/v1_1/demo/image/upload"),
                "api.cloudinary.com"
            );
            assert!(TargetHost::new("cloudinary.com")
                .matches("https://API.Cloudinary.com/v1_1/demo/image/upload"));
            assert!(TargetHost::new("Cloudinary.COM").matches("https://api.cloudinary.com/x"));
        }

        #[test]
        fn test_ipv6_literal_host() {
            let url = "http://[::1]:9000/v1_1/demo/image/upload";
            assert_eq!(host_of(url), "::1");
            assert!(TargetHost::new("::1").matches(url));
            assert!(TargetHost::new("[::1]").matches(url));
            assert!(!TargetHost::new("::2").matches(url));
        }

        #[test]
        fn test_ipv4_literal_host() {
            assert_eq!(host_of("http://127.0.0.1:4173/upload"), "127.0.0.1");
        }

        #[test]
        fn test_unparseable_url_has_no_host() {
            assert_eq!(host_of(""), "");
            assert!(!TargetHost::new("cloudinary.com").matches("not a url at all"));
        }

        #[test]
        fn test_empty_target_matches_nothing() {
            assert!(!TargetHost::new("").matches("https://anything.test/"));
        }
    }

    mod network_event_tests {
        use super::*;

        #[test]
        fn test_request_has_no_status() {
            let event = NetworkEvent::request("https://media.example.com/up", 10);
            assert_eq!(event.direction, Direction::Request);
            assert_eq!(event.destination_host, "media.example.com");
            assert!(!event.is_response());
            assert!(!event.is_non_success());
        }

        #[test]
        fn test_non_success_statuses() {
            assert!(!NetworkEvent::response("https://m.test/", Some(200), 0).is_non_success());
            assert!(!NetworkEvent::response("https://m.test/", Some(204), 0).is_non_success());
            assert!(NetworkEvent::response("https://m.test/", Some(302), 0).is_non_success());
            assert!(NetworkEvent::response("https://m.test/", Some(500), 0).is_non_success());
            assert!(!NetworkEvent::response("https://m.test/", None, 0).is_non_success());
        }

        #[test]
        fn test_direction_serializes_lowercase() {
            let json = serde_json::to_string(&Direction::Response).unwrap();
            assert_eq!(json, "\"response\"");
        }
    }

    mod evidence_log_tests {
        use super::*;

        #[test]
        fn test_counts_by_direction() {
            let log = EvidenceLog::new();
            assert!(!log.has_response());
            log.push(NetworkEvent::request("https://m.test/a", 1));
            log.push(NetworkEvent::request("https://m.test/b", 2));
            log.push(NetworkEvent::response("https://m.test/a", Some(200), 3));
            assert_eq!(log.request_count(), 2);
            assert_eq!(log.response_count(), 1);
            assert!(log.has_response());
        }

        #[test]
        fn test_clones_share_storage_and_keep_order() {
            let log = EvidenceLog::new();
            let writer = log.clone();
            writer.push(NetworkEvent::request("https://m.test/1", 5));
            writer.push(NetworkEvent::response("https://m.test/1", Some(201), 9));
            let events = log.snapshot();
            assert_eq!(events.len(), 2);
            assert_eq!(events[0].observed_at_ms, 5);
            assert_eq!(events[1].status, Some(201));
        }
    }

    mod toast_tests {
        use super::*;

        #[test]
        fn test_toast_text_is_trimmed() {
            assert_eq!(ToastMessage::new("  已儲存 \n").text, "已儲存");
        }

        #[test]
        fn test_log_deduplicates_and_skips_empty() {
            let mut log = ToastLog::new();
            assert!(log.record(ToastMessage::new("Upload failed")));
            assert!(!log.record(ToastMessage::new("Upload failed ")));
            assert!(!log.record(ToastMessage::new("   ")));
            assert!(log.record(ToastMessage::new("地點已儲存")));
            assert_eq!(log.len(), 2);
            assert_eq!(log.toasts()[1].text, "地點已儲存");
        }
    }

    mod keyword_tests {
        use super::*;

        #[test]
        fn test_default_keywords_cover_both_languages() {
            let keywords = ErrorKeywords::default();
            assert_eq!(keywords.find_in("照片上傳失敗"), Some("失敗"));
            assert_eq!(keywords.find_in("Upload failed"), Some("failed"));
            assert!(keywords.matches("Network Error"));
            assert!(!keywords.matches("地點已儲存"));
        }

        #[test]
        fn test_matching_is_case_sensitive() {
            let keywords = ErrorKeywords::new(["failed"]);
            assert!(!keywords.matches("FAILED"));
        }

        #[test]
        fn test_empty_keyword_never_matches() {
            let keywords = ErrorKeywords::new([""]);
            assert!(!keywords.matches("anything"));
        }
    }
}
