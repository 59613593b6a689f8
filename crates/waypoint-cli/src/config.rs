//! CLI configuration

use crate::commands::{OracleArgs, RunArgs};
use crate::error::CliResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use waypoint::AcceptanceConfig;

/// Settings file picked up from the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "waypoint.yaml";

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - minimal output
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Check if debug mode
    #[must_use]
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }

    /// Default log filter for this verbosity
    #[must_use]
    pub const fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn,waypoint=info",
            Self::Verbose => "info,waypoint=debug,waypoint_cli=debug",
            Self::Debug => "debug,waypoint=trace,waypoint_cli=trace",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// Structured log output
    pub log_json: bool,
    /// Explicit settings file
    pub settings_path: Option<PathBuf>,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set JSON logging
    #[must_use]
    pub const fn with_log_json(mut self, log_json: bool) -> Self {
        self.log_json = log_json;
        self
    }

    /// Set the settings file
    #[must_use]
    pub fn with_settings_path(mut self, path: Option<PathBuf>) -> Self {
        self.settings_path = path;
        self
    }

    /// Settings file to read, if any: the explicit one, else `waypoint.yaml`
    /// in `cwd` when it exists
    #[must_use]
    pub fn settings_file(&self, cwd: &Path) -> Option<PathBuf> {
        self.settings_path.clone().or_else(|| {
            let candidate = cwd.join(DEFAULT_SETTINGS_FILE);
            candidate.is_file().then_some(candidate)
        })
    }

    /// Load acceptance settings, falling back to defaults
    pub fn load_settings(&self, cwd: &Path) -> CliResult<AcceptanceConfig> {
        match self.settings_file(cwd) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading settings");
                Ok(AcceptanceConfig::load(&path)?)
            }
            None => Ok(AcceptanceConfig::default()),
        }
    }
}

/// Apply live-run flags on top of file settings
pub fn apply_run_args(settings: &mut AcceptanceConfig, args: &RunArgs) {
    if let Some(url) = &args.base_url {
        settings.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(path) = &args.chromium_path {
        settings.browser.chromium_path = Some(path.clone());
    }
    if args.headed {
        settings.browser.headless = false;
    }
    if args.no_sandbox {
        settings.browser.sandbox = false;
    }
    if let Some(dir) = &args.screenshots {
        settings.screenshots_dir = dir.clone();
    }
}

/// Apply oracle flags on top of file settings
pub fn apply_oracle_args(settings: &mut AcceptanceConfig, args: &OracleArgs) {
    if let Some(ms) = args.timeout_ms {
        settings.oracle.timeout_ms = ms;
    }
    if let Some(ms) = args.poll_interval_ms {
        settings.oracle.poll_interval_ms = ms;
    }
    if let Some(host) = &args.target_host {
        settings.oracle = settings.oracle.clone().with_target_host(host.clone());
    }
}
