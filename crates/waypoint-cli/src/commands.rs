//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Waypointer: TravelDot acceptance flows and upload verdicts
#[derive(Parser, Debug)]
#[command(name = "waypointer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Settings file (defaults to ./waypoint.yaml when present)
    #[arg(short, long, env = "WAYPOINT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a new account, then log in with an existing one
    Auth(AuthArgs),

    /// Upload a photo to a new place and judge the outcome
    Upload(UploadArgs),

    /// Judge a recorded evidence timeline without a browser
    Judge(JudgeArgs),

    /// Create or show the settings file
    Config(ConfigArgs),
}

/// Options shared by the live flows
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// App root URL
    #[arg(long, env = "WAYPOINT_BASE_URL")]
    pub base_url: Option<String>,

    /// Chromium executable
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Screenshot directory
    #[arg(short, long)]
    pub screenshots: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Where and how to print the report
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Report format on stdout
    #[arg(short, long, default_value = "text")]
    pub format: ReportFormat,

    /// Also write the JSON report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Also write a JUnit XML report to this file
    #[arg(long)]
    pub junit: Option<PathBuf>,
}

/// Arguments for the auth command
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Email of the existing account used for the login scenario
    #[arg(long, env = "WAYPOINT_LOGIN_EMAIL")]
    pub login_email: Option<String>,

    /// Password of the existing account
    #[arg(long, env = "WAYPOINT_LOGIN_PASSWORD", hide_env_values = true)]
    pub login_password: Option<String>,
}

/// Arguments for the upload command
#[derive(Parser, Debug)]
pub struct UploadArgs {
    #[command(flatten)]
    pub run: RunArgs,

    #[command(flatten)]
    pub oracle: OracleArgs,

    /// Where to write the JPEG fixture
    #[arg(long)]
    pub fixture: Option<PathBuf>,
}

/// Oracle overrides
#[derive(Args, Debug, Clone, Default)]
pub struct OracleArgs {
    /// Observation timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Poll interval in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Host substring identifying upload traffic
    #[arg(long)]
    pub target_host: Option<String>,
}

/// Arguments for the judge command
#[derive(Parser, Debug)]
pub struct JudgeArgs {
    /// Timeline file (YAML or JSON)
    pub timeline: PathBuf,

    #[command(flatten)]
    pub oracle: OracleArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a settings file with every default spelled out
    Init {
        /// Target path
        #[arg(default_value = "waypoint.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective settings
    Show,
}

/// Report format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON report
    Json,
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
