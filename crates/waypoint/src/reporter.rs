//! Run reports.
//!
//! Every invocation produces one [`RunReport`]: the steps a flow recorded, the
//! oracle's evidence when it ran, and any console problems the browser
//! reported. Reports render as a terminal summary, as JSON for archiving, or
//! as JUnit XML for CI.
//!
//! ```text
//! AuthFlowOutcome ──┐
//! UploadFlowOutcome ┼──► RunReport ──► render_text / to_json / render_junit
//! OracleReport ─────┘
//! ```

use crate::console::ConsoleMessage;
use crate::flows::{
    AuthFlowOutcome, BlockedReason, RunVerdict, StepRecord, StepStatus, UploadFlowOutcome,
    UploadResult,
};
use crate::oracle::OracleReport;
use crate::result::WaypointResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What produced the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    /// Register and login flow
    Auth,
    /// Photo upload flow
    Upload,
    /// Offline judgement of a recorded timeline
    Judge,
}

impl std::fmt::Display for RunKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auth => write!(f, "auth"),
            Self::Upload => write!(f, "upload"),
            Self::Judge => write!(f, "judge"),
        }
    }
}

/// Report for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run id
    pub run_id: Uuid,
    /// Run kind
    pub kind: RunKind,
    /// When the report was created
    pub generated_at: DateTime<Utc>,
    /// Overall verdict
    pub verdict: RunVerdict,
    /// Account used, when a flow created or signed in with one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Flow steps
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    /// Screenshots captured
    #[serde(default)]
    pub screenshots: Vec<PathBuf>,
    /// Why the upload flow stopped early
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked: Option<BlockedReason>,
    /// Oracle output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle: Option<OracleReport>,
    /// Console warnings and errors worth a look
    #[serde(default)]
    pub console: Vec<ConsoleMessage>,
}

impl RunReport {
    fn new(kind: RunKind, verdict: RunVerdict) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            kind,
            generated_at: Utc::now(),
            verdict,
            account: None,
            steps: Vec::new(),
            screenshots: Vec::new(),
            blocked: None,
            oracle: None,
            console: Vec::new(),
        }
    }

    /// Report for an auth flow run
    #[must_use]
    pub fn from_auth(outcome: &AuthFlowOutcome) -> Self {
        Self {
            account: Some(outcome.registered.email.clone()),
            steps: outcome.steps.clone(),
            screenshots: outcome.screenshots.clone(),
            ..Self::new(RunKind::Auth, outcome.verdict)
        }
    }

    /// Report for an upload flow run
    #[must_use]
    pub fn from_upload(outcome: &UploadFlowOutcome) -> Self {
        let (blocked, oracle) = match &outcome.result {
            UploadResult::Blocked { reason } => (Some(*reason), None),
            UploadResult::Judged { report } => (None, Some(report.clone())),
        };
        Self {
            account: Some(outcome.account.email.clone()),
            steps: outcome.steps.clone(),
            screenshots: outcome.screenshots.clone(),
            blocked,
            oracle,
            ..Self::new(RunKind::Upload, outcome.verdict())
        }
    }

    /// Report for an offline judgement
    #[must_use]
    pub fn from_oracle(report: OracleReport) -> Self {
        Self {
            oracle: Some(report.clone()),
            ..Self::new(RunKind::Judge, report.verdict.into())
        }
    }

    /// Attach console messages
    #[must_use]
    pub fn with_console(mut self, messages: Vec<ConsoleMessage>) -> Self {
        self.console = messages;
        self
    }

    /// Number of steps with the given status
    #[must_use]
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!("{} {}", self.kind, self.verdict);
        if let Some(reason) = self.blocked {
            let _ = write!(line, ": {reason}");
        } else if let Some(oracle) = &self.oracle {
            let _ = write!(line, ": {} ({})", oracle.verdict, oracle.stop_reason);
        } else if !self.steps.is_empty() {
            let _ = write!(
                line,
                ": {} passed, {} warnings, {} failed",
                self.count(StepStatus::Pass),
                self.count(StepStatus::Warn),
                self.count(StepStatus::Fail)
            );
        }
        line
    }

    /// Plain-text report for the terminal
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.summary());
        let _ = writeln!(out, "run {}  {}", self.run_id, self.generated_at.to_rfc3339());
        if let Some(account) = &self.account {
            let _ = writeln!(out, "account: {account}");
        }

        if !self.steps.is_empty() {
            let _ = writeln!(out, "\nsteps:");
            for step in &self.steps {
                let _ = write!(out, "  [{}] {:>6}ms  {}", step.status, step.at_ms, step.name);
                if let Some(detail) = &step.detail {
                    let _ = write!(out, "  ({detail})");
                }
                out.push('\n');
            }
        }

        if let Some(oracle) = &self.oracle {
            let _ = writeln!(out, "\nupload evidence ({}):", oracle.target_host);
            let _ = writeln!(out, "  verdict:     {}", oracle.verdict);
            let _ = writeln!(out, "  stopped:     {} after {}ms", oracle.stop_reason, oracle.elapsed_ms);
            let _ = writeln!(
                out,
                "  network:     {} requests, {} responses",
                oracle.request_count, oracle.response_count
            );
            for event in oracle.events.iter().filter(|e| e.is_response()) {
                let status = event
                    .status
                    .map_or_else(|| "-".to_string(), |s| s.to_string());
                let _ = writeln!(out, "    {status} {}", event.url);
            }
            let _ = writeln!(out, "  modal:       {}", if oracle.modal_closed { "closed" } else { "open" });
            let _ = writeln!(out, "  toasts:      {}", oracle.toasts.len());
            for toast in &oracle.toasts {
                let marker = if oracle.error_toasts.contains(toast) { "!" } else { " " };
                let _ = writeln!(out, "   {marker} {}", toast.text);
            }
            if oracle.probe_errors > 0 {
                let _ = writeln!(out, "  probe errors: {}", oracle.probe_errors);
            }
        }

        if !self.console.is_empty() {
            let _ = writeln!(out, "\nconsole:");
            for message in &self.console {
                let _ = writeln!(out, "  {message}");
            }
        }

        if !self.screenshots.is_empty() {
            let _ = writeln!(out, "\nscreenshots: {}", self.screenshots.len());
            if let Some(dir) = self.screenshots[0].parent() {
                let _ = writeln!(out, "  {}", dir.display());
            }
        }
        out
    }

    /// Pretty JSON
    pub fn to_json(&self) -> WaypointResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write pretty JSON to `path`, creating parent directories
    pub fn write_json(&self, path: &Path) -> WaypointResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// JUnit XML, one test case per step (or one for a bare oracle run)
    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut cases: Vec<(String, Option<String>)> = self
            .steps
            .iter()
            .map(|s| {
                let failure = (s.status == StepStatus::Fail)
                    .then(|| s.detail.clone().unwrap_or_default());
                (s.name.clone(), failure)
            })
            .collect();
        if let Some(oracle) = &self.oracle {
            let failure = (!oracle.verdict.is_success()).then(|| oracle.verdict.to_string());
            cases.push(("upload verdict".to_string(), failure));
        }

        let failures = cases.iter().filter(|(_, f)| f.is_some()).count();
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            xml,
            r#"<testsuite name="waypoint.{}" tests="{}" failures="{}" timestamp="{}">"#,
            self.kind,
            cases.len(),
            failures,
            self.generated_at.to_rfc3339()
        );
        for (name, failure) in cases {
            match failure {
                Some(message) => {
                    let _ = writeln!(xml, r#"  <testcase name="{}">"#, escape_xml(&name));
                    let _ = writeln!(
                        xml,
                        r#"    <failure message="{0}">{0}</failure>"#,
                        escape_xml(&message)
                    );
                    xml.push_str("  </testcase>\n");
                }
                None => {
                    let _ = writeln!(xml, r#"  <testcase name="{}"/>"#, escape_xml(&name));
                }
            }
        }
        xml.push_str("</testsuite>\n");
        xml
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
