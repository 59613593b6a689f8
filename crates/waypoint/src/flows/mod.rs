//! Acceptance flows.
//!
//! Each flow is a linear script over a [`PageSession`](crate::driver::PageSession):
//! it records a [`StepRecord`] per step, captures screenshots along the way,
//! and ends in a [`RunVerdict`].
//!
//! ```text
//! ┌────────────┐   steps   ┌──────────┐  verdict  ┌────────────┐
//! │  auth flow │ ────────► │ StepLog  │ ────────► │ RunVerdict │
//! └────────────┘           └──────────┘           └────────────┘
//! ┌────────────┐   arm/observe   ┌──────────────┐       ▲
//! │ upload flow│ ──────────────► │ UploadOracle │ ──────┘
//! └────────────┘                 └──────────────┘
//! ```

pub mod auth;
pub mod upload;

pub use auth::{run_auth_flow, AuthConfig, AuthFlowOutcome};
pub use upload::{run_upload_flow, BlockedReason, UploadConfig, UploadFlowOutcome, UploadResult};

use crate::clock::SharedClock;
use crate::driver::ActionDriver;
use crate::oracle::Verdict;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of a single flow step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Step met its expectation
    Pass,
    /// Step completed but something looked off
    Warn,
    /// Step did not meet its expectation
    Fail,
}

impl StepStatus {
    /// Fixed-width label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step name
    pub name: String,
    /// Outcome
    pub status: StepStatus,
    /// Extra context (errors found, counts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Clock reading when the step was recorded, relative to flow start
    pub at_ms: u64,
}

/// Ordered step records for one flow run
#[derive(Debug)]
pub struct StepLog {
    clock: SharedClock,
    started_ms: u64,
    steps: Vec<StepRecord>,
}

impl StepLog {
    /// Start a log at the clock's current reading
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        let started_ms = clock.now_ms();
        Self {
            clock,
            started_ms,
            steps: Vec::new(),
        }
    }

    fn record(&mut self, name: &str, status: StepStatus, detail: Option<String>) {
        match status {
            StepStatus::Pass => info!(step = name, detail = ?detail, "step passed"),
            StepStatus::Warn => warn!(step = name, detail = ?detail, "step warning"),
            StepStatus::Fail => warn!(step = name, detail = ?detail, "step failed"),
        }
        self.steps.push(StepRecord {
            name: name.to_string(),
            status,
            detail,
            at_ms: self.clock.now_ms().saturating_sub(self.started_ms),
        });
    }

    /// Record a passing step
    pub fn pass(&mut self, name: &str) {
        self.record(name, StepStatus::Pass, None);
    }

    /// Record a passing step with context
    pub fn pass_with(&mut self, name: &str, detail: impl Into<String>) {
        self.record(name, StepStatus::Pass, Some(detail.into()));
    }

    /// Record a warning
    pub fn warn(&mut self, name: &str, detail: impl Into<String>) {
        self.record(name, StepStatus::Warn, Some(detail.into()));
    }

    /// Record a failure
    pub fn fail(&mut self, name: &str, detail: impl Into<String>) {
        self.record(name, StepStatus::Fail, Some(detail.into()));
    }

    /// Recorded steps
    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Whether any step failed
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Fail)
    }

    /// Consume the log
    #[must_use]
    pub fn into_steps(self) -> Vec<StepRecord> {
        self.steps
    }
}

/// Overall result of a flow run; maps onto the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunVerdict {
    /// Everything checked out
    Pass,
    /// A definite failure was observed
    Fail,
    /// The flow could not reach the point it tests
    Blocked,
    /// The evidence was ambiguous
    Inconclusive,
}

impl RunVerdict {
    /// Process exit code for this verdict
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Pass => 0,
            Self::Fail => 1,
            Self::Blocked => 2,
            Self::Inconclusive => 3,
        }
    }

    /// Verdict for a flow judged only by its steps
    #[must_use]
    pub fn from_steps(steps: &[StepRecord]) -> Self {
        if steps.iter().any(|s| s.status == StepStatus::Fail) {
            Self::Fail
        } else {
            Self::Pass
        }
    }
}

impl From<Verdict> for RunVerdict {
    fn from(verdict: Verdict) -> Self {
        if verdict.is_success() {
            Self::Pass
        } else if verdict.is_failure() {
            Self::Fail
        } else {
            Self::Inconclusive
        }
    }
}

impl std::fmt::Display for RunVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Blocked => write!(f, "BLOCKED"),
            Self::Inconclusive => write!(f, "INCONCLUSIVE"),
        }
    }
}

/// Numbered screenshots for one flow run
#[derive(Debug, Clone)]
pub struct Screenshots {
    dir: PathBuf,
    prefix: String,
    taken: Vec<PathBuf>,
}

impl Screenshots {
    /// Save screenshots as `{dir}/{prefix}_{nn}_{name}.png`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            taken: Vec::new(),
        }
    }

    /// Target directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Capture the page; a failed capture is logged and skipped
    pub async fn capture<A>(&mut self, page: &A, name: &str) -> Option<PathBuf>
    where
        A: ActionDriver + ?Sized,
    {
        let path = self.dir.join(format!(
            "{}_{:02}_{name}.png",
            self.prefix,
            self.taken.len() + 1
        ));
        match page.screenshot(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "screenshot");
                self.taken.push(path.clone());
                Some(path)
            }
            Err(e) => {
                warn!(name, error = %e, "screenshot failed");
                None
            }
        }
    }

    /// Paths captured so far
    #[must_use]
    pub fn taken(&self) -> &[PathBuf] {
        &self.taken
    }

    /// Consume into captured paths
    #[must_use]
    pub fn into_paths(self) -> Vec<PathBuf> {
        self.taken
    }
}

/// `base_url` joined with `path`, with exactly one slash between
#[must_use]
pub fn join_url(base_url: &str, path: &str) -> String {
    match (base_url.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base_url}{}", &path[1..]),
        (false, false) if !path.is_empty() => format!("{base_url}/{path}"),
        _ => format!("{base_url}{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FakeClock};
    use crate::scripted::{ScriptedPage, Timeline};
    use std::time::Duration;

    mod step_log_tests {
        use super::*;

        #[tokio::test]
        async fn test_records_in_order_with_offsets() {
            let clock = FakeClock::shared();
            clock.fast_forward_ms(100);
            let mut log = StepLog::new(clock.clone());
            log.pass("open login page");
            clock.sleep(Duration::from_millis(250)).await;
            log.warn("welcome toast", "no toast");
            assert!(!log.has_failures());
            log.fail("signed in", "timeout");
            assert!(log.has_failures());

            let steps = log.into_steps();
            assert_eq!(steps.len(), 3);
            assert_eq!(steps[0].at_ms, 0);
            assert_eq!(steps[1].at_ms, 250);
            assert_eq!(steps[1].detail.as_deref(), Some("no toast"));
            assert_eq!(steps[2].status, StepStatus::Fail);
        }
    }

    mod verdict_tests {
        use super::*;

        #[test]
        fn test_exit_codes() {
            assert_eq!(RunVerdict::Pass.exit_code(), 0);
            assert_eq!(RunVerdict::Fail.exit_code(), 1);
            assert_eq!(RunVerdict::Blocked.exit_code(), 2);
            assert_eq!(RunVerdict::Inconclusive.exit_code(), 3);
        }

        #[test]
        fn test_from_oracle_verdict() {
            assert_eq!(RunVerdict::from(Verdict::Success), RunVerdict::Pass);
            assert_eq!(RunVerdict::from(Verdict::FailErrorToast), RunVerdict::Fail);
            assert_eq!(
                RunVerdict::from(Verdict::FailNonSuccessResponse),
                RunVerdict::Fail
            );
            assert_eq!(
                RunVerdict::from(Verdict::InconclusiveTimeout),
                RunVerdict::Inconclusive
            );
        }

        #[test]
        fn test_from_steps_ignores_warnings() {
            let warn = StepRecord {
                name: "toast".into(),
                status: StepStatus::Warn,
                detail: None,
                at_ms: 0,
            };
            assert_eq!(RunVerdict::from_steps(&[warn.clone()]), RunVerdict::Pass);
            let fail = StepRecord {
                status: StepStatus::Fail,
                ..warn.clone()
            };
            assert_eq!(RunVerdict::from_steps(&[warn, fail]), RunVerdict::Fail);
        }
    }

    mod screenshot_tests {
        use super::*;

        #[tokio::test]
        async fn test_numbered_names() {
            let page = ScriptedPage::new(Timeline::new());
            let mut shots = Screenshots::new("/tmp/shots", "ac_035");
            shots.capture(&page, "signup_page").await;
            let second = shots.capture(&page, "after_signup").await.unwrap();
            assert_eq!(second, PathBuf::from("/tmp/shots/ac_035_02_after_signup.png"));
            assert_eq!(shots.taken().len(), 2);
            assert!(page.was_called("screenshot:/tmp/shots/ac_035_01_signup_page.png"));
        }
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://localhost:5173", "/login"), "http://localhost:5173/login");
        assert_eq!(join_url("http://localhost:5173/", "/login"), "http://localhost:5173/login");
        assert_eq!(join_url("http://localhost:5173", "login"), "http://localhost:5173/login");
        assert_eq!(join_url("http://localhost:5173", ""), "http://localhost:5173");
    }
}
