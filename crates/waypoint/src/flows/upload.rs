//! Photo upload flow.
//!
//! Creates an account, enters the first trip, opens the place editor, attaches
//! the JPEG fixture and saves. Whether the upload worked is then left to the
//! [`UploadOracle`](crate::oracle::UploadOracle), armed before the save click.
//!
//! ```text
//! fixture → account → trip → editor? ─no─► Blocked(EditorNotOpen)
//!                               │
//!                              yes → name → arm → file input? ─no─► Blocked(NoFileInput)
//!                                                    │
//!                                                   yes → save? ─no─► Blocked(NoSaveButton)
//!                                                           │
//!                                                          yes → observe → Judged(report)
//! ```

use super::{RunVerdict, Screenshots, StepLog, StepRecord};
use crate::clock::SharedClock;
use crate::config::AcceptanceConfig;
use crate::driver::PageSession;
use crate::fixture::{write_jpeg_fixture, TestAccount};
use crate::oracle::{OracleReport, UploadOracle};
use crate::result::{WaypointError, WaypointResult};
use crate::wait::{WaitOptions, Waiter};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Selectors, labels and timings for the upload flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Prefix for generated account emails
    pub account_prefix: String,
    /// Element type carrying the form mode toggles
    pub toggle_selector: String,
    /// Toggle text switching to the register form
    pub signup_toggle_text: String,
    /// Toggle text switching back to the login form
    pub login_toggle_text: String,
    /// Email field on either auth form
    pub email_field: String,
    /// Password fields on either auth form
    pub password_field: String,
    /// Form submit button
    pub submit_button: String,
    /// Elements that may carry auth error messages
    pub auth_error_selectors: Vec<String>,
    /// Substrings meaning the email is already registered (ASCII ones match any case)
    pub already_in_use_markers: Vec<String>,
    /// How long to wait for the auth page to go away
    pub auth_timeout_ms: u64,
    /// Pause for the first trip to be created after sign-up
    pub trip_settle_ms: u64,
    /// Link into a trip
    pub trip_link: String,
    /// Button opening a new place editor
    pub add_place_button: String,
    /// Button revealing the sidebar that holds the add button
    pub open_sidebar_button: String,
    /// Place name field
    pub name_field: String,
    /// Place name field when the preferred one is missing
    pub name_fallback_field: String,
    /// Place name to enter
    pub place_name: String,
    /// Hidden photo input
    pub file_input: String,
    /// Element type of the save button
    pub save_button_selector: String,
    /// Save button texts, in preference order
    pub save_labels: Vec<String>,
    /// Local photo previews
    pub preview_selector: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            account_prefix: "playwright_test".to_string(),
            toggle_selector: "button".to_string(),
            signup_toggle_text: "註冊新帳號".to_string(),
            login_toggle_text: "登入".to_string(),
            email_field: "input[type=\"email\"]".to_string(),
            password_field: "input[type=\"password\"]".to_string(),
            submit_button: "button[type=\"submit\"]".to_string(),
            auth_error_selectors: vec![
                "[class*=\"error\"]".to_string(),
                "[class*=\"red\"]".to_string(),
                "[role=\"alert\"]".to_string(),
            ],
            already_in_use_markers: vec!["已被使用".to_string(), "already".to_string()],
            auth_timeout_ms: 10_000,
            trip_settle_ms: 6_000,
            trip_link: "a[href*=\"/trips/\"]".to_string(),
            add_place_button: "[aria-label=\"Add new place\"]".to_string(),
            open_sidebar_button: "[aria-label=\"Open sidebar\"]".to_string(),
            name_field: "input[placeholder=\"例如：Central World\"]".to_string(),
            name_fallback_field: "input[type=\"text\"]".to_string(),
            place_name: "Playwright 照片上傳測試".to_string(),
            file_input: "input[type=\"file\"]".to_string(),
            save_button_selector: "button".to_string(),
            save_labels: vec!["儲存地點".to_string(), "儲存".to_string()],
            preview_selector: "img[src^=\"blob:\"]".to_string(),
        }
    }
}

/// Why the flow stopped before the oracle could judge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockedReason {
    /// No editor heading after trying to open the editor
    EditorNotOpen,
    /// The editor has no file input
    NoFileInput,
    /// No save button matched any label
    NoSaveButton,
}

impl std::fmt::Display for BlockedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EditorNotOpen => write!(f, "place editor could not be opened"),
            Self::NoFileInput => write!(f, "no file input in the editor"),
            Self::NoSaveButton => write!(f, "no save button in the editor"),
        }
    }
}

/// Where the flow ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum UploadResult {
    /// Stopped before the save click
    Blocked {
        /// Why
        reason: BlockedReason,
    },
    /// The oracle observed the save
    Judged {
        /// Oracle output
        report: OracleReport,
    },
}

impl UploadResult {
    /// Run verdict for this result
    #[must_use]
    pub fn verdict(&self) -> RunVerdict {
        match self {
            Self::Blocked { .. } => RunVerdict::Blocked,
            Self::Judged { report } => report.verdict.into(),
        }
    }

    /// Oracle report, when the flow got that far
    #[must_use]
    pub const fn report(&self) -> Option<&OracleReport> {
        match self {
            Self::Judged { report } => Some(report),
            Self::Blocked { .. } => None,
        }
    }
}

/// Result of one upload flow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFlowOutcome {
    /// Account the flow signed in with
    pub account: TestAccount,
    /// Step log
    pub steps: Vec<StepRecord>,
    /// Screenshots captured
    pub screenshots: Vec<PathBuf>,
    /// Blocked or judged
    pub result: UploadResult,
}

impl UploadFlowOutcome {
    /// Overall verdict
    #[must_use]
    pub fn verdict(&self) -> RunVerdict {
        self.result.verdict()
    }
}

struct UploadRun<'a, P: ?Sized> {
    page: &'a P,
    settings: &'a AcceptanceConfig,
    config: &'a UploadConfig,
    clock: SharedClock,
    waiter: Waiter,
    log: StepLog,
    shots: Screenshots,
}

/// Run the upload flow.
///
/// Errors only when the fixture cannot be written, the app cannot be reached
/// or network listeners cannot be registered; everything else ends in an
/// [`UploadResult`].
pub async fn run_upload_flow<P>(
    page: &P,
    clock: SharedClock,
    settings: &AcceptanceConfig,
    account: TestAccount,
) -> WaypointResult<UploadFlowOutcome>
where
    P: PageSession + ?Sized,
{
    let fixture = write_jpeg_fixture(&settings.fixture_path)?;
    info!(fixture = %fixture.display(), email = %account.email, "upload flow starting");

    let mut run = UploadRun {
        page,
        settings,
        config: &settings.upload,
        clock: clock.clone(),
        waiter: Waiter::new(clock.clone()),
        log: StepLog::new(clock),
        shots: Screenshots::new(&settings.screenshots_dir, "ac_035"),
    };
    run.log.pass_with("write fixture", fixture.display().to_string());

    page.navigate(&settings.base_url).await?;

    run.create_account(&account).await;
    run.enter_trip().await;
    let result = run.upload(&fixture).await?;
    Ok(run.finish(account, result))
}

impl<P> UploadRun<'_, P>
where
    P: PageSession + ?Sized,
{
    async fn create_account(&mut self, account: &TestAccount) {
        match self.submit_signup(account).await {
            Ok(()) => self.log.pass("create account: submit"),
            Err(e) => self.log.fail("create account: submit", e.to_string()),
        }

        self.waiter.pause(3_000).await;
        let options = WaitOptions::new()
            .with_timeout(self.config.auth_timeout_ms)
            .with_poll_interval(250);
        let (email_field, trip_link) = (&self.config.email_field, &self.config.trip_link);
        let page = self.page;
        let left_auth = self
            .waiter
            .wait_for("auth page left", &options, || async move {
                Ok::<_, WaypointError>(
                    page.count(email_field).await? == 0 || page.count(trip_link).await? > 0,
                )
            })
            .await;
        if left_auth.is_err() {
            self.log
                .warn("create account: leave auth page", "timed out, continuing");
        }
        self.waiter.pause(2_000).await;
        self.shots.capture(self.page, "after_signup").await;

        let still_on_auth = self.page.count(&self.config.email_field).await.unwrap_or(0) > 0;
        if !still_on_auth {
            self.log.pass("create account: signed in");
            return;
        }

        let errors = self.auth_errors().await;
        if self.already_in_use(&errors) {
            match self.login_instead(account).await {
                Ok(()) => self
                    .log
                    .pass_with("create account: login fallback", "email already in use"),
                Err(e) => self.log.fail("create account: login fallback", e.to_string()),
            }
        } else {
            self.log.warn(
                "create account: signed in",
                format!("still on auth page; errors: [{}]", errors.join(" | ")),
            );
        }
    }

    async fn submit_signup(&mut self, account: &TestAccount) -> WaypointResult<()> {
        self.page
            .click_text(&self.config.toggle_selector, &self.config.signup_toggle_text)
            .await?;
        self.waiter.pause(500).await;
        self.shots.capture(self.page, "signup_page").await;

        self.page.fill(&self.config.email_field, &account.email).await?;
        match self.page.count(&self.config.password_field).await? {
            0 => {}
            1 => {
                self.page
                    .fill(&self.config.password_field, &account.password)
                    .await?;
            }
            _ => {
                self.page
                    .fill_nth(&self.config.password_field, 0, &account.password)
                    .await?;
                self.page
                    .fill_nth(&self.config.password_field, 1, &account.password)
                    .await?;
            }
        }
        self.shots.capture(self.page, "signup_filled").await;
        self.page.click(&self.config.submit_button).await
    }

    async fn auth_errors(&self) -> Vec<String> {
        let mut errors: Vec<String> = Vec::new();
        for selector in &self.config.auth_error_selectors {
            if let Ok(elements) = self.page.query_all(selector).await {
                for text in elements.into_iter().map(|e| e.text) {
                    if !text.is_empty() && !errors.contains(&text) {
                        errors.push(text);
                    }
                }
            }
        }
        errors
    }

    fn already_in_use(&self, errors: &[String]) -> bool {
        errors.iter().any(|error| {
            let lowered = error.to_lowercase();
            self.config
                .already_in_use_markers
                .iter()
                .any(|marker| error.contains(marker.as_str()) || lowered.contains(marker.as_str()))
        })
    }

    async fn login_instead(&mut self, account: &TestAccount) -> WaypointResult<()> {
        let toggle = self
            .page
            .click_text(&self.config.toggle_selector, &self.config.login_toggle_text)
            .await;
        if toggle.is_ok() {
            self.waiter.pause(300).await;
        } else {
            self.page.navigate(&self.settings.base_url).await?;
        }
        self.page.fill(&self.config.email_field, &account.email).await?;
        self.page
            .fill(&self.config.password_field, &account.password)
            .await?;
        self.page.click(&self.config.submit_button).await?;
        self.waiter.pause(3_000).await;
        Ok(())
    }

    async fn enter_trip(&mut self) {
        self.waiter.pause(self.config.trip_settle_ms).await;
        self.shots.capture(self.page, "landing_page").await;

        let mut entered = self.click_if_present(&self.config.trip_link).await;
        if !entered {
            self.waiter.pause(3_000).await;
            entered = self.click_if_present(&self.config.trip_link).await;
        }
        if entered {
            self.waiter.pause(4_000).await;
            let url = self.page.current_url().await.unwrap_or_default();
            self.log.pass_with("enter trip", url);
        } else {
            self.log.warn("enter trip", "no trip link found");
        }
        self.shots.capture(self.page, "map_page").await;
    }

    async fn click_if_present(&self, selector: &str) -> bool {
        self.page.count(selector).await.unwrap_or(0) > 0 && self.page.click(selector).await.is_ok()
    }

    async fn open_editor(&mut self) -> bool {
        self.waiter.pause(3_000).await;
        if self.click_if_present(&self.config.add_place_button).await {
            self.waiter.pause(1_000).await;
        } else if self.click_if_present(&self.config.open_sidebar_button).await {
            self.waiter.pause(500).await;
            if self.click_if_present(&self.config.add_place_button).await {
                self.waiter.pause(1_000).await;
            }
        }
        self.shots.capture(self.page, "pre_editor").await;
        self.waiter.pause(1_000).await;

        let oracle = &self.settings.oracle;
        self.page
            .find_by_text(&oracle.heading_selector, &oracle.modal_labels)
            .await
            .unwrap_or(false)
    }

    async fn fill_place_name(&mut self) {
        let field = if self.page.count(&self.config.name_field).await.unwrap_or(0) > 0 {
            &self.config.name_field
        } else {
            &self.config.name_fallback_field
        };
        match self.page.fill(field, &self.config.place_name).await {
            Ok(()) => self.log.pass_with("fill place name", field.clone()),
            Err(e) => self.log.warn("fill place name", e.to_string()),
        }
        self.shots.capture(self.page, "editor_ready").await;
    }

    async fn blocked(&mut self, step: &str, reason: BlockedReason, shot: &str) -> UploadResult {
        self.log.fail(step, reason.to_string());
        self.shots.capture(self.page, shot).await;
        UploadResult::Blocked { reason }
    }

    async fn upload(&mut self, fixture: &Path) -> WaypointResult<UploadResult> {
        if !self.open_editor().await {
            return Ok(self
                .blocked("open editor", BlockedReason::EditorNotOpen, "editor_not_open")
                .await);
        }
        self.log.pass("open editor");
        self.fill_place_name().await;

        let oracle = UploadOracle::new(self.settings.oracle.clone(), self.clock.clone());
        let armed = oracle.arm(self.page).await?;

        if self.page.count(&self.config.file_input).await.unwrap_or(0) == 0
            || self
                .page
                .attach_file(&self.config.file_input, fixture)
                .await
                .is_err()
        {
            return Ok(self
                .blocked("attach photo", BlockedReason::NoFileInput, "err_no_file_input")
                .await);
        }
        self.waiter.pause(2_000).await;
        let previews = self
            .page
            .count(&self.config.preview_selector)
            .await
            .unwrap_or(0);
        self.log
            .pass_with("attach photo", format!("{previews} local previews"));
        self.shots.capture(self.page, "photo_preview").await;

        let mut saved = false;
        for label in &self.config.save_labels {
            if self
                .page
                .click_text(&self.config.save_button_selector, label)
                .await
                .is_ok()
            {
                self.log.pass_with("click save", label.clone());
                saved = true;
                break;
            }
        }
        if !saved {
            return Ok(self
                .blocked("click save", BlockedReason::NoSaveButton, "err_no_save_btn")
                .await);
        }

        let report = armed.observe(self.page).await;
        self.shots.capture(self.page, "final_state").await;
        let detail = format!(
            "{} ({}; {} responses, {} toasts)",
            report.verdict,
            report.stop_reason,
            report.response_count,
            report.toasts.len()
        );
        match RunVerdict::from(report.verdict) {
            RunVerdict::Pass => self.log.pass_with("upload verdict", detail),
            RunVerdict::Fail => self.log.fail("upload verdict", detail),
            _ => self.log.warn("upload verdict", detail),
        }
        Ok(UploadResult::Judged { report })
    }

    fn finish(self, account: TestAccount, result: UploadResult) -> UploadFlowOutcome {
        let outcome = UploadFlowOutcome {
            account,
            steps: self.log.into_steps(),
            screenshots: self.shots.into_paths(),
            result,
        };
        info!(verdict = %outcome.verdict(), "upload flow finished");
        outcome
    }
}
