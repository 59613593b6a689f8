//! Acceptance run configuration.
//!
//! One YAML document covers everything a run needs: where the app lives,
//! where artifacts go, how to launch the browser, the selectors each flow
//! uses and the oracle's timings. Every section is optional; missing keys
//! fall back to the TravelDot defaults.
//!
//! ```yaml
//! base_url: http://localhost:5173
//! screenshots_dir: screenshots
//! oracle:
//!   timeout_ms: 30000
//!   target_host: cloudinary.com
//! ```

use crate::browser::BrowserConfig;
use crate::flows::{AuthConfig, UploadConfig};
use crate::oracle::OracleConfig;
use crate::result::{WaypointError, WaypointResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default app address (the Vite dev server)
pub const DEFAULT_BASE_URL: &str = "http://localhost:5173";

fn default_fixture_path() -> PathBuf {
    std::env::temp_dir().join("test_photo_upload.jpg")
}

/// Settings shared by every flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceConfig {
    /// App root URL
    pub base_url: String,
    /// Directory for step screenshots
    pub screenshots_dir: PathBuf,
    /// Where the JPEG fixture is written before the upload flow
    pub fixture_path: PathBuf,
    /// Browser launch settings
    pub browser: BrowserConfig,
    /// Register and login flow
    pub auth: AuthConfig,
    /// Photo upload flow
    pub upload: UploadConfig,
    /// Upload oracle
    pub oracle: OracleConfig,
}

impl Default for AcceptanceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            screenshots_dir: PathBuf::from("screenshots"),
            fixture_path: default_fixture_path(),
            browser: BrowserConfig::default(),
            auth: AuthConfig::default(),
            upload: UploadConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl AcceptanceConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(source: &str) -> WaypointResult<Self> {
        let config: Self = serde_yaml_ng::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn load(path: &Path) -> WaypointResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source).map_err(|e| match e {
            WaypointError::Config { message } => {
                WaypointError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> WaypointResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Set the app root URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the screenshot directory
    #[must_use]
    pub fn with_screenshots_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshots_dir = dir.into();
        self
    }

    /// Reject settings no run can succeed with
    pub fn validate(&self) -> WaypointResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(WaypointError::config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        let oracle = &self.oracle;
        if oracle.poll_interval_ms == 0 {
            return Err(WaypointError::config("oracle.poll_interval_ms must be > 0"));
        }
        if oracle.timeout_ms == 0 {
            return Err(WaypointError::config("oracle.timeout_ms must be > 0"));
        }
        if oracle.probe_timeout_ms == 0 {
            return Err(WaypointError::config("oracle.probe_timeout_ms must be > 0"));
        }
        if oracle.target_host.as_str().is_empty() {
            return Err(WaypointError::config("oracle.target_host must not be empty"));
        }
        if oracle.modal_labels.is_empty() {
            return Err(WaypointError::config("oracle.modal_labels must not be empty"));
        }
        if self.upload.save_labels.is_empty() {
            return Err(WaypointError::config("upload.save_labels must not be empty"));
        }
        Ok(())
    }
}
