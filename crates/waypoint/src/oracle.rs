//! Upload Outcome Oracle
//!
//! Decides whether an asynchronous photo upload succeeded by watching three
//! kinds of evidence for a bounded window: responses from the media host,
//! toast messages, and whether the place editor modal is still open.
//!
//! ```text
//!   arm(monitor) ──► listeners registered ──► [caller clicks save]
//!                                                   │
//!   observe(dom) ◄──────────────────────────────────┘
//!     loop: sleep(poll) → response seen?  ─yes─► stop
//!                       → modal closed?   ─yes─► stop
//!                       → sample toasts
//!                       → deadline?       ─yes─► stop
//!     settle: sample toasts, sleep(settle), sample toasts, probe modal
//!     verdict: first matching rule in VERDICT_RULES
//! ```
//!
//! The oracle never fails. A probe that errors or exceeds `probe_timeout`
//! counts as "no evidence this cycle" and the loop carries on.

use crate::clock::SharedClock;
use crate::driver::{DomInspector, NetworkMonitor};
use crate::evidence::{
    EditorModalState, ErrorKeywords, EvidenceLog, NetworkEvent, TargetHost, ToastLog,
    ToastMessage,
};
use crate::result::WaypointResult;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default observation window (30 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default spacing between DOM re-checks (2 seconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// Default pause before the last toast sample (3 seconds)
pub const DEFAULT_SETTLE_MS: u64 = 3_000;

/// Default bound on a single DOM probe (5 seconds)
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

fn default_modal_labels() -> Vec<String> {
    vec!["新增地點".to_string(), "編輯地點".to_string()]
}

fn default_toast_selectors() -> Vec<String> {
    [
        "[data-sonner-toast]",
        "[class*=\"toaster\"] li",
        "[class*=\"toast\"]",
        "[role=\"status\"]",
        "[role=\"alert\"]",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Oracle inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Maximum time to wait for terminating evidence
    pub timeout_ms: u64,
    /// Spacing between DOM re-checks
    pub poll_interval_ms: u64,
    /// Pause between the two closing toast samples
    pub settle_ms: u64,
    /// Bound on a single DOM probe
    pub probe_timeout_ms: u64,
    /// Substring identifying the upload destination host
    pub target_host: TargetHost,
    /// Heading texts meaning the editor is still open
    pub modal_labels: Vec<String>,
    /// Selector for editor headings
    pub heading_selector: String,
    /// Selectors sampled for toast messages
    pub toast_selectors: Vec<String>,
    /// Substrings that mark a toast as a failure
    pub error_keywords: ErrorKeywords,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            target_host: TargetHost::new("cloudinary.com"),
            modal_labels: default_modal_labels(),
            heading_selector: "h2".to_string(),
            toast_selectors: default_toast_selectors(),
            error_keywords: ErrorKeywords::default(),
        }
    }
}

impl OracleConfig {
    /// Create a config with defaults
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

    /// Set settle delay in milliseconds
    #[must_use]
    pub const fn with_settle(mut self, settle_ms: u64) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    /// Set per-probe bound in milliseconds
    #[must_use]
    pub const fn with_probe_timeout(mut self, probe_timeout_ms: u64) -> Self {
        self.probe_timeout_ms = probe_timeout_ms;
        self
    }

    /// Set target host substring
    #[must_use]
    pub fn with_target_host(mut self, host: impl Into<String>) -> Self {
        self.target_host = TargetHost::new(host);
        self
    }

    /// Set error keywords
    #[must_use]
    pub fn with_error_keywords(mut self, keywords: ErrorKeywords) -> Self {
        self.error_keywords = keywords;
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

    /// Get settle delay as Duration
    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Get per-probe bound as Duration
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// The oracle's sole output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// At least one response, none failed, no error toast
    Success,
    /// A media-host response had a non-2xx status
    FailNonSuccessResponse,
    /// A toast contained an error keyword
    FailErrorToast,
    /// Modal closed but no media-host response was seen
    InconclusiveNoNetworkEvidence,
    /// Nothing decisive before the deadline
    InconclusiveTimeout,
}

impl Verdict {
    /// Wire name of the verdict
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::FailNonSuccessResponse => "FAIL_NON_SUCCESS_RESPONSE",
            Self::FailErrorToast => "FAIL_ERROR_TOAST",
            Self::InconclusiveNoNetworkEvidence => "INCONCLUSIVE_NO_NETWORK_EVIDENCE",
            Self::InconclusiveTimeout => "INCONCLUSIVE_TIMEOUT",
        }
    }

    /// Check if the upload definitely succeeded
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Check if the upload definitely failed
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::FailNonSuccessResponse | Self::FailErrorToast)
    }

    /// Check if the evidence was ambiguous
    #[must_use]
    pub const fn is_inconclusive(&self) -> bool {
        matches!(
            self,
            Self::InconclusiveNoNetworkEvidence | Self::InconclusiveTimeout
        )
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why evidence collection stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A response from the target host was recorded
    ResponseObserved,
    /// The editor modal closed
    ModalClosed,
    /// The observation window ran out
    TimedOut,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResponseObserved => write!(f, "response observed"),
            Self::ModalClosed => write!(f, "modal closed"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Evidence accumulated over one window, ready for verdict derivation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceSummary {
    /// Network events to the target host, in arrival order
    pub network: Vec<NetworkEvent>,
    /// Distinct toasts, first-seen order
    pub toasts: Vec<ToastMessage>,
    /// Toasts containing an error keyword
    pub error_toasts: Vec<ToastMessage>,
    /// Modal state used for the verdict
    pub modal: EditorModalState,
}

impl EvidenceSummary {
    /// Build a summary, classifying toasts against `keywords`
    #[must_use]
    pub fn new(
        network: Vec<NetworkEvent>,
        toasts: Vec<ToastMessage>,
        keywords: &ErrorKeywords,
        modal: EditorModalState,
    ) -> Self {
        let error_toasts = toasts
            .iter()
            .filter(|t| keywords.matches(&t.text))
            .cloned()
            .collect();
        Self {
            network,
            toasts,
            error_toasts,
            modal,
        }
    }

    fn has_non_success_response(&self) -> bool {
        self.network.iter().any(NetworkEvent::is_non_success)
    }

    fn has_error_toast(&self) -> bool {
        !self.error_toasts.is_empty()
    }

    fn has_response(&self) -> bool {
        self.network.iter().any(NetworkEvent::is_response)
    }

    fn modal_closed(&self) -> bool {
        !self.modal.is_open
    }
}

/// One predicate→verdict rule
#[derive(Debug, Clone, Copy)]
pub struct VerdictRule {
    /// Verdict produced when the predicate holds
    pub verdict: Verdict,
    /// Human-readable predicate
    pub description: &'static str,
    predicate: fn(&EvidenceSummary) -> bool,
}

impl VerdictRule {
    /// Whether this rule fires for `summary`
    #[must_use]
    pub fn applies(&self, summary: &EvidenceSummary) -> bool {
        (self.predicate)(summary)
    }
}

/// Verdict rules, evaluated top-down; the first that applies wins.
///
/// An error toast outranks a 2xx response.
pub const VERDICT_RULES: [VerdictRule; 5] = [
    VerdictRule {
        verdict: Verdict::FailNonSuccessResponse,
        description: "a target-host response has a non-success status",
        predicate: EvidenceSummary::has_non_success_response,
    },
    VerdictRule {
        verdict: Verdict::FailErrorToast,
        description: "a captured toast contains an error keyword",
        predicate: EvidenceSummary::has_error_toast,
    },
    VerdictRule {
        verdict: Verdict::Success,
        description: "at least one target-host response was recorded",
        predicate: EvidenceSummary::has_response,
    },
    VerdictRule {
        verdict: Verdict::InconclusiveNoNetworkEvidence,
        description: "the editor closed without observable upload traffic",
        predicate: EvidenceSummary::modal_closed,
    },
    VerdictRule {
        verdict: Verdict::InconclusiveTimeout,
        description: "no decisive evidence before the deadline",
        predicate: |_| true,
    },
];

/// Apply [`VERDICT_RULES`] to a summary
#[must_use]
pub fn derive_verdict(summary: &EvidenceSummary) -> Verdict {
    VERDICT_RULES
        .iter()
        .find(|rule| rule.applies(summary))
        .map_or(Verdict::InconclusiveTimeout, |rule| rule.verdict)
}

/// What the oracle saw and concluded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleReport {
    /// Final verdict
    pub verdict: Verdict,
    /// Why collection stopped
    pub stop_reason: StopReason,
    /// Target host substring
    pub target_host: String,
    /// Time from start of observation to verdict
    pub elapsed_ms: u64,
    /// Poll cycles completed
    pub polls: u32,
    /// Requests to the target host
    pub request_count: usize,
    /// Responses from the target host
    pub response_count: usize,
    /// Every recorded network event
    pub events: Vec<NetworkEvent>,
    /// Distinct toasts captured
    pub toasts: Vec<ToastMessage>,
    /// Toasts that matched an error keyword
    pub error_toasts: Vec<ToastMessage>,
    /// Probes that errored or timed out
    pub probe_errors: usize,
    /// Whether the editor modal was seen closed
    pub modal_closed: bool,
}

/// Upload outcome oracle, not yet listening
#[derive(Debug, Clone)]
pub struct UploadOracle {
    config: OracleConfig,
    clock: SharedClock,
}

impl UploadOracle {
    /// Create an oracle
    #[must_use]
    pub fn new(config: OracleConfig, clock: SharedClock) -> Self {
        Self { config, clock }
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Register request and response listeners for the target host.
    ///
    /// Call this before the action that triggers the upload.
    pub async fn arm<M>(&self, monitor: &M) -> WaypointResult<ArmedOracle>
    where
        M: NetworkMonitor + ?Sized,
    {
        let log = EvidenceLog::new();

        let (target, sink, clock) = (
            self.config.target_host.clone(),
            log.clone(),
            Arc::clone(&self.clock),
        );
        monitor
            .on_request(Box::new(move |exchange| {
                if target.matches(&exchange.url) {
                    debug!(url = %exchange.url, "upload request observed");
                    sink.push(NetworkEvent::request(&exchange.url, clock.now_ms()));
                }
            }))
            .await?;

        let (target, sink, clock) = (
            self.config.target_host.clone(),
            log.clone(),
            Arc::clone(&self.clock),
        );
        monitor
            .on_response(Box::new(move |exchange| {
                if target.matches(&exchange.url) {
                    debug!(url = %exchange.url, status = ?exchange.status, "upload response observed");
                    sink.push(NetworkEvent::response(
                        &exchange.url,
                        exchange.status,
                        clock.now_ms(),
                    ));
                }
            }))
            .await?;

        debug!(target = %self.config.target_host, "oracle armed");
        Ok(ArmedOracle {
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
            log,
        })
    }
}

/// Oracle with listeners in place; consumed by [`ArmedOracle::observe`]
#[derive(Debug)]
pub struct ArmedOracle {
    config: OracleConfig,
    clock: SharedClock,
    log: EvidenceLog,
}

impl ArmedOracle {
    /// Evidence recorded so far
    #[must_use]
    pub fn evidence(&self) -> &EvidenceLog {
        &self.log
    }

    /// Collect evidence until a stop condition, then derive the verdict
    pub async fn observe<D>(self, dom: &D) -> OracleReport
    where
        D: DomInspector + ?Sized,
    {
        let started = self.clock.now_ms();
        let deadline = started.saturating_add(self.config.timeout_ms);
        let mut toasts = ToastLog::new();
        let mut probe_errors = 0usize;
        let mut modal_closed = false;
        let mut polls = 0u32;

        let stop_reason = loop {
            let now = self.clock.now_ms();
            if now >= deadline {
                break StopReason::TimedOut;
            }
            let nap = self.config.poll_interval().min(Duration::from_millis(deadline - now));
            self.clock.sleep(nap).await;
            polls += 1;

            if self.log.has_response() {
                break StopReason::ResponseObserved;
            }
            match self.probe_modal(dom).await {
                Some(state) if !state.is_open => {
                    modal_closed = true;
                    break StopReason::ModalClosed;
                }
                Some(_) => {}
                None => probe_errors += 1,
            }
            probe_errors += self.sample_toasts(dom, &mut toasts).await;
            debug!(
                poll = polls,
                elapsed_ms = self.clock.now_ms() - started,
                requests = self.log.request_count(),
                "no decisive evidence yet"
            );
        };
        debug!(%stop_reason, "evidence collection stopped");

        probe_errors += self.sample_toasts(dom, &mut toasts).await;
        self.clock.sleep(self.config.settle()).await;
        probe_errors += self.sample_toasts(dom, &mut toasts).await;
        match self.probe_modal(dom).await {
            Some(state) => modal_closed |= !state.is_open,
            None => probe_errors += 1,
        }

        let modal = if modal_closed {
            EditorModalState::CLOSED
        } else {
            EditorModalState::OPEN
        };
        let summary = EvidenceSummary::new(
            self.log.snapshot(),
            toasts.toasts().to_vec(),
            &self.config.error_keywords,
            modal,
        );
        let verdict = derive_verdict(&summary);
        let report = OracleReport {
            verdict,
            stop_reason,
            target_host: self.config.target_host.to_string(),
            elapsed_ms: self.clock.now_ms() - started,
            polls,
            request_count: self.log.request_count(),
            response_count: self.log.response_count(),
            events: summary.network,
            toasts: summary.toasts,
            error_toasts: summary.error_toasts,
            probe_errors,
            modal_closed,
        };
        info!(
            verdict = %report.verdict,
            stop_reason = %report.stop_reason,
            responses = report.response_count,
            toasts = report.toasts.len(),
            probe_errors = report.probe_errors,
            "upload verdict"
        );
        report
    }

    async fn probe_modal<D>(&self, dom: &D) -> Option<EditorModalState>
    where
        D: DomInspector + ?Sized,
    {
        self.bounded(
            "modal",
            dom.find_by_text(&self.config.heading_selector, &self.config.modal_labels),
        )
        .await
        .map(|is_open| EditorModalState { is_open })
    }

    /// Sample every toast selector; returns the number of failed probes
    async fn sample_toasts<D>(&self, dom: &D, toasts: &mut ToastLog) -> usize
    where
        D: DomInspector + ?Sized,
    {
        let mut failures = 0;
        for selector in &self.config.toast_selectors {
            let Some(elements) = self.bounded("toast", dom.query_all(selector)).await else {
                failures += 1;
                continue;
            };
            for element in elements {
                let toast = ToastMessage::new(element.text());
                if toasts.record(toast.clone()) {
                    debug!(text = %toast.text, "toast captured");
                }
            }
        }
        failures
    }

    /// Run one probe, mapping errors and overruns to `None`
    async fn bounded<T, F>(&self, probe: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = WaypointResult<T>>,
    {
        tokio::select! {
            biased;
            result = fut => match result {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(probe, error = %e, "evidence probe failed; no evidence this cycle");
                    None
                }
            },
            () = self.clock.sleep(self.config.probe_timeout()) => {
                warn!(probe, timeout_ms = self.config.probe_timeout_ms, "evidence probe timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedPage, Timeline};
    use proptest::prelude::*;

    const UPLOAD_URL: &str = "https://api.cloudinary.com/v1_1/demo/image/upload";

    fn editor_open() -> Timeline {
        Timeline::new().element("h2", "新增地點")
    }

    fn editor_closing_at(ms: u64) -> Timeline {
        Timeline::new().element_between("h2", "新增地點", 0, Some(ms))
    }

    async fn judge(timeline: Timeline, config: OracleConfig) -> OracleReport {
        let page = ScriptedPage::new(timeline);
        let oracle = UploadOracle::new(config, page.clock());
        let armed = oracle.arm(&page).await.unwrap();
        armed.observe(&page).await
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = OracleConfig::default();
            assert_eq!(config.timeout(), Duration::from_secs(30));
            assert_eq!(config.poll_interval(), Duration::from_secs(2));
            assert_eq!(config.settle(), Duration::from_secs(3));
            assert_eq!(config.target_host.as_str(), "cloudinary.com");
            assert_eq!(config.modal_labels, vec!["新增地點", "編輯地點"]);
            assert_eq!(config.toast_selectors.len(), 5);
        }

        #[test]
        fn test_builders() {
            let config = OracleConfig::new()
                .with_timeout(10)
                .with_poll_interval(1)
                .with_settle(0)
                .with_probe_timeout(7)
                .with_target_host("media.example.com");
            assert_eq!(config.timeout_ms, 10);
            assert_eq!(config.poll_interval_ms, 1);
            assert_eq!(config.settle_ms, 0);
            assert_eq!(config.probe_timeout_ms, 7);
            assert!(config.target_host.matches("https://media.example.com/x"));
        }

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config: OracleConfig =
                serde_yaml_ng::from_str("timeout_ms: 5000\ntarget_host: media.example.com\n")
                    .unwrap();
            assert_eq!(config.timeout_ms, 5000);
            assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
            assert_eq!(config.target_host.as_str(), "media.example.com");
        }
    }

    mod verdict_tests {
        use super::*;

        #[test]
        fn test_wire_names() {
            assert_eq!(Verdict::Success.to_string(), "SUCCESS");
            assert_eq!(
                serde_json::to_string(&Verdict::InconclusiveNoNetworkEvidence).unwrap(),
                "\"INCONCLUSIVE_NO_NETWORK_EVIDENCE\""
            );
        }

        #[test]
        fn test_classification() {
            assert!(Verdict::Success.is_success());
            assert!(Verdict::FailErrorToast.is_failure());
            assert!(Verdict::FailNonSuccessResponse.is_failure());
            assert!(Verdict::InconclusiveTimeout.is_inconclusive());
            assert!(!Verdict::InconclusiveTimeout.is_failure());
        }

        #[test]
        fn test_rules_are_in_priority_order() {
            let order: Vec<Verdict> = VERDICT_RULES.iter().map(|r| r.verdict).collect();
            assert_eq!(
                order,
                vec![
                    Verdict::FailNonSuccessResponse,
                    Verdict::FailErrorToast,
                    Verdict::Success,
                    Verdict::InconclusiveNoNetworkEvidence,
                    Verdict::InconclusiveTimeout,
                ]
            );
        }

        #[test]
        fn test_error_toast_outranks_success_response() {
            let summary = EvidenceSummary::new(
                vec![NetworkEvent::response(UPLOAD_URL, Some(200), 0)],
                vec![ToastMessage::new("照片上傳失敗")],
                &ErrorKeywords::default(),
                EditorModalState::OPEN,
            );
            assert_eq!(derive_verdict(&summary), Verdict::FailErrorToast);
        }

        #[test]
        fn test_requests_alone_are_not_network_evidence() {
            let summary = EvidenceSummary::new(
                vec![NetworkEvent::request(UPLOAD_URL, 0)],
                vec![],
                &ErrorKeywords::default(),
                EditorModalState::CLOSED,
            );
            assert_eq!(
                derive_verdict(&summary),
                Verdict::InconclusiveNoNetworkEvidence
            );
        }
    }

    mod scenario_tests {
        use super::*;

        #[tokio::test]
        async fn test_single_ok_response_is_success() {
            let report = judge(
                editor_open().response(1500, "https://media.example.com/upload", 200),
                OracleConfig::default().with_target_host("media.example.com"),
            )
            .await;
            assert_eq!(report.verdict, Verdict::Success);
            assert_eq!(report.stop_reason, StopReason::ResponseObserved);
            assert_eq!(report.response_count, 1);
            assert_eq!(report.polls, 1);
        }

        #[tokio::test]
        async fn test_server_error_response_fails() {
            let report = judge(
                editor_open().response(1000, UPLOAD_URL, 500),
                OracleConfig::default(),
            )
            .await;
            assert_eq!(report.verdict, Verdict::FailNonSuccessResponse);
        }

        #[tokio::test]
        async fn test_error_toast_with_open_modal_fails() {
            let report = judge(
                editor_open().element("[data-sonner-toast]", "Upload failed"),
                OracleConfig::default(),
            )
            .await;
            assert_eq!(report.verdict, Verdict::FailErrorToast);
            assert_eq!(report.stop_reason, StopReason::TimedOut);
            assert_eq!(report.error_toasts, vec![ToastMessage::new("Upload failed")]);
        }

        #[tokio::test]
        async fn test_modal_closing_without_traffic_is_inconclusive() {
            let report = judge(editor_closing_at(4000), OracleConfig::default()).await;
            assert_eq!(report.verdict, Verdict::InconclusiveNoNetworkEvidence);
            assert_eq!(report.stop_reason, StopReason::ModalClosed);
            assert_eq!(report.polls, 2);
            assert!(report.modal_closed);
        }

        #[tokio::test]
        async fn test_nothing_happens_times_out() {
            let report = judge(editor_open(), OracleConfig::default()).await;
            assert_eq!(report.verdict, Verdict::InconclusiveTimeout);
            assert_eq!(report.stop_reason, StopReason::TimedOut);
            assert_eq!(report.polls, 15);
            assert_eq!(report.elapsed_ms, DEFAULT_TIMEOUT_MS + DEFAULT_SETTLE_MS);
        }

        #[tokio::test]
        async fn test_other_hosts_are_ignored() {
            let report = judge(
                editor_open()
                    .request(500, "https://firestore.googleapis.com/v1/write")
                    .response(900, "https://firestore.googleapis.com/v1/write", 500),
                OracleConfig::default().with_timeout(6000),
            )
            .await;
            assert_eq!(report.verdict, Verdict::InconclusiveTimeout);
            assert!(report.events.is_empty());
        }

        #[tokio::test]
        async fn test_toast_seen_only_during_settle_counts() {
            let report = judge(
                editor_open()
                    .response(1000, UPLOAD_URL, 200)
                    .element_between("[role=\"alert\"]", "儲存失敗", 3000, None),
                OracleConfig::default(),
            )
            .await;
            assert_eq!(report.verdict, Verdict::FailErrorToast);
        }

        #[tokio::test]
        async fn test_toast_vanishing_between_samples_is_missed() {
            let report = judge(
                editor_closing_at(4000).element_between(
                    "[data-sonner-toast]",
                    "Upload failed",
                    2500,
                    Some(3500),
                ),
                OracleConfig::default(),
            )
            .await;
            assert!(report.toasts.is_empty());
            assert_eq!(report.verdict, Verdict::InconclusiveNoNetworkEvidence);
        }

        #[tokio::test]
        async fn test_identical_timelines_give_identical_verdicts() {
            let timeline = editor_closing_at(8000)
                .request(2000, UPLOAD_URL)
                .element("[role=\"status\"]", "地點已儲存");
            let first = judge(timeline.clone(), OracleConfig::default()).await;
            let second = judge(timeline, OracleConfig::default()).await;
            assert_eq!(first, second);
        }
    }

    mod resilience_tests {
        use super::*;

        #[tokio::test]
        async fn test_probe_failures_do_not_abort() {
            let report = judge(
                editor_closing_at(6000).probe_failure(0, 5000),
                OracleConfig::default(),
            )
            .await;
            assert!(report.probe_errors > 0);
            assert_eq!(report.verdict, Verdict::InconclusiveNoNetworkEvidence);
        }

        #[tokio::test]
        async fn test_stalled_probes_are_bounded() {
            let config = OracleConfig::default()
                .with_timeout(10_000)
                .with_probe_timeout(1_000);
            let report = judge(editor_open().stall(0, 60_000), config).await;
            assert_eq!(report.verdict, Verdict::InconclusiveTimeout);
            assert!(report.probe_errors > 0);
            assert!(report.elapsed_ms < 60_000);
        }

        #[tokio::test]
        async fn test_zero_timeout_still_terminates() {
            let report = judge(editor_open(), OracleConfig::default().with_timeout(0)).await;
            assert_eq!(report.polls, 0);
            assert_eq!(report.stop_reason, StopReason::TimedOut);
        }
    }

    fn status_strategy() -> impl Strategy<Value = u16> {
        prop_oneof![200u16..300, 300u16..600]
    }

    fn toast_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("地點已儲存".to_string()),
            Just("照片上傳失敗".to_string()),
            Just("Upload failed".to_string()),
            "[a-z ]{0,12}",
        ]
    }

    proptest! {
        #[test]
        fn prop_non_success_response_dominates(
            statuses in proptest::collection::vec(status_strategy(), 0..6),
            bad in 300u16..600,
            toasts in proptest::collection::vec(toast_strategy(), 0..4),
            modal_open in any::<bool>(),
        ) {
            let mut network: Vec<NetworkEvent> = statuses
                .iter()
                .map(|s| NetworkEvent::response(UPLOAD_URL, Some(*s), 0))
                .collect();
            network.push(NetworkEvent::response(UPLOAD_URL, Some(bad), 0));
            let summary = EvidenceSummary::new(
                network,
                toasts.into_iter().map(ToastMessage::new).collect(),
                &ErrorKeywords::default(),
                EditorModalState { is_open: modal_open },
            );
            prop_assert_eq!(derive_verdict(&summary), Verdict::FailNonSuccessResponse);
        }

        #[test]
        fn prop_no_responses_no_error_toasts_depends_on_modal(
            requests in 0usize..4,
            modal_open in any::<bool>(),
        ) {
            let network = (0..requests)
                .map(|i| NetworkEvent::request(UPLOAD_URL, i as u64))
                .collect();
            let summary = EvidenceSummary::new(
                network,
                vec![ToastMessage::new("地點已儲存")],
                &ErrorKeywords::default(),
                EditorModalState { is_open: modal_open },
            );
            let expected = if modal_open {
                Verdict::InconclusiveTimeout
            } else {
                Verdict::InconclusiveNoNetworkEvidence
            };
            prop_assert_eq!(derive_verdict(&summary), expected);
        }

        #[test]
        fn prop_observation_always_terminates_within_budget(
            timeout_ms in 0u64..20_000,
            poll_ms in 1u64..5_000,
            close_at in proptest::option::of(0u64..25_000),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            let config = OracleConfig::default()
                .with_timeout(timeout_ms)
                .with_poll_interval(poll_ms);
            let timeline = Timeline::new().element_between("h2", "編輯地點", 0, close_at);
            let report = runtime.block_on(judge(timeline, config));
            prop_assert!(report.elapsed_ms <= timeout_ms + DEFAULT_SETTLE_MS);
        }
    }
}
