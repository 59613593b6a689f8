//! Waypoint: acceptance harness for the TravelDot web app.
//!
//! Two linear flows drive a headless Chromium against a running app: account
//! registration and login, and photo upload inside the trip editor. The
//! upload flow ends in the [`UploadOracle`], which decides whether an
//! asynchronous upload worked from three kinds of evidence: traffic to the
//! media host, toast messages, and whether the editor modal closed.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         WAYPOINT                                 │
//! ├──────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌─────────────────────┐    │
//! │   │ flows      │───►│ PageSession│◄───│ ChromiumPage (CDP)  │    │
//! │   │ auth/upload│    │ (traits)   │◄───│ ScriptedPage (fake) │    │
//! │   └─────┬──────┘    └─────┬──────┘    └─────────────────────┘    │
//! │         │ arm/observe     │ DOM + network                        │
//! │         ▼                 ▼                                      │
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐             │
//! │   │UploadOracle│───►│ Verdict    │───►│ RunReport  │             │
//! │   └────────────┘    └────────────┘    └────────────┘             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Judging a recorded timeline
//!
//! ```no_run
//! use waypoint::prelude::*;
//!
//! # async fn demo() -> WaypointResult<()> {
//! let page = ScriptedPage::new(
//!     Timeline::new()
//!         .element("h2", "新增地點")
//!         .response(1_500, "https://api.cloudinary.com/v1_1/demo/image/upload", 200),
//! );
//! let oracle = UploadOracle::new(OracleConfig::default(), page.clock());
//! let armed = oracle.arm(&page).await?;
//! let report = armed.observe(&page).await;
//! assert_eq!(report.verdict, Verdict::Success);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Chromium implementation of the page traits (feature `browser`)
pub mod browser;

/// Time source for polling loops
pub mod clock;

/// Acceptance run configuration (YAML + defaults)
pub mod config;

/// Browser console capture
pub mod console;

/// Page collaborator traits
pub mod driver;

/// Evidence types recorded during an observation window
pub mod evidence;

/// Test accounts and the JPEG upload fixture
pub mod fixture;

/// Register/login and photo upload flows
pub mod flows;

/// Upload outcome oracle
pub mod oracle;

/// Run reports (text, JSON, JUnit)
pub mod reporter;

mod result;

/// Virtual-time page double driven by a timeline
pub mod scripted;

/// Bounded polling helpers
pub mod wait;

pub use browser::BrowserConfig;
#[cfg(feature = "browser")]
pub use browser::{Browser, ChromiumPage};
pub use clock::{Clock, FakeClock, SharedClock, SystemClock};
pub use config::AcceptanceConfig;
pub use console::{ConsoleCapture, ConsoleLevel, ConsoleMessage};
pub use driver::{
    ActionDriver, DomInspector, ElementSnapshot, NetworkCallback, NetworkExchange, NetworkMonitor,
    PageSession,
};
pub use evidence::{EditorModalState, ErrorKeywords, NetworkEvent, TargetHost, ToastMessage};
pub use fixture::{write_jpeg_fixture, TestAccount};
pub use flows::{
    run_auth_flow, run_upload_flow, RunVerdict, StepRecord, StepStatus, UploadFlowOutcome,
    UploadResult,
};
pub use oracle::{
    ArmedOracle, OracleConfig, OracleReport, StopReason, UploadOracle, Verdict,
};
pub use reporter::{RunKind, RunReport};
pub use result::{WaypointError, WaypointResult};
pub use scripted::{ScriptedPage, Timeline};

/// Everything a flow or test usually needs
pub mod prelude {
    pub use super::browser::*;
    pub use super::clock::*;
    pub use super::config::*;
    pub use super::console::*;
    pub use super::driver::*;
    pub use super::evidence::*;
    pub use super::fixture::*;
    pub use super::flows::*;
    pub use super::oracle::*;
    pub use super::reporter::*;
    pub use super::result::*;
    pub use super::scripted::*;
    pub use super::wait::*;
}
