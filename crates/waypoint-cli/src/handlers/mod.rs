//! Command handlers, kept out of main.rs so they can be tested
//!
//! Each handler turns parsed arguments plus file settings into a
//! [`RunReport`]; [`emit_report`] prints it and writes the requested files.

pub mod auth;
pub mod config;
pub mod judge;
pub mod upload;

pub use auth::execute_auth;
pub use config::execute_config;
pub use judge::execute_judge;
pub use upload::execute_upload;

use crate::commands::{OutputArgs, ReportFormat};
use crate::error::CliResult;
use crate::output::ProgressReporter;
use std::io::Write;
use waypoint::RunReport;

/// Print the report on stdout and write any report files
pub fn emit_report(
    reporter: &ProgressReporter,
    report: &RunReport,
    output: &OutputArgs,
) -> CliResult<()> {
    let rendered = match output.format {
        ReportFormat::Text => report.render_text(),
        ReportFormat::Json => report.to_json()?,
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", rendered.trim_end())?;
    stdout.flush()?;

    if let Some(path) = &output.report {
        report.write_json(path)?;
        reporter.info(&format!("JSON report: {}", path.display()));
    }
    if let Some(path) = &output.junit {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, report.render_junit())?;
        reporter.info(&format!("JUnit report: {}", path.display()));
    }
    reporter.verdict(report);
    Ok(())
}
