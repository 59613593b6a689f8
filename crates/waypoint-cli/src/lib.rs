//! Waypoint CLI library
//!
//! Argument parsing, settings layering, logging setup and the command
//! handlers behind the `waypointer` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{
    AuthArgs, Cli, ColorArg, Commands, ConfigAction, ConfigArgs, JudgeArgs, OracleArgs,
    OutputArgs, ReportFormat, RunArgs, UploadArgs,
};
pub use config::{
    apply_oracle_args, apply_run_args, CliConfig, ColorChoice, Verbosity, DEFAULT_SETTINGS_FILE,
};
pub use error::{CliError, CliResult};
pub use output::ProgressReporter;
