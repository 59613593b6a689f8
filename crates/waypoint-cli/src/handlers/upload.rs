//! Upload command handler

use crate::commands::UploadArgs;
use crate::config::{apply_oracle_args, apply_run_args, CliConfig};
use crate::error::CliResult;
use waypoint::{AcceptanceConfig, RunReport};

/// Settings for an upload run: file settings with flags applied
pub fn upload_settings(
    mut settings: AcceptanceConfig,
    args: &UploadArgs,
) -> CliResult<AcceptanceConfig> {
    apply_run_args(&mut settings, &args.run);
    apply_oracle_args(&mut settings, &args.oracle);
    if let Some(path) = &args.fixture {
        settings.fixture_path = path.clone();
    }
    settings.validate()?;
    Ok(settings)
}

/// Run the upload flow in Chromium
#[cfg(feature = "browser")]
pub async fn execute_upload(
    config: &CliConfig,
    settings: AcceptanceConfig,
    args: &UploadArgs,
) -> CliResult<RunReport> {
    use crate::output::ProgressReporter;
    use waypoint::console::UPLOAD_ERROR_KEYWORDS;
    use waypoint::{run_upload_flow, Browser, SystemClock, TestAccount};

    let settings = upload_settings(settings, args)?;
    let mut reporter =
        ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.header(&format!("upload against {}", settings.base_url));

    let browser = Browser::launch(settings.browser.clone()).await?;
    let page = browser.new_page().await?;
    let account = TestAccount::timestamped(&settings.upload.account_prefix);
    reporter.info(&format!("account {}", account.email));

    reporter.start_spinner("creating account, opening editor, uploading");
    let outcome = run_upload_flow(&page, SystemClock::shared(), &settings, account).await;
    reporter.finish();

    let console = page.console().problems_matching(UPLOAD_ERROR_KEYWORDS);
    drop(page);
    browser.close().await?;

    let outcome = outcome?;
    reporter.steps(&outcome.steps);
    if !console.is_empty() {
        reporter.warning(&format!("{} upload-related console problems", console.len()));
    }
    Ok(RunReport::from_upload(&outcome).with_console(console))
}

/// Run the upload flow in Chromium
#[cfg(not(feature = "browser"))]
pub async fn execute_upload(
    _config: &CliConfig,
    settings: AcceptanceConfig,
    args: &UploadArgs,
) -> CliResult<RunReport> {
    upload_settings(settings, args)?;
    Err(crate::error::CliError::BrowserUnavailable { command: "upload" })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::commands::{OracleArgs, RunArgs};
    use std::path::PathBuf;

    fn args() -> UploadArgs {
        UploadArgs {
            run: RunArgs {
                base_url: Some("http://127.0.0.1:4173".to_string()),
                ..RunArgs::default()
            },
            oracle: OracleArgs {
                timeout_ms: Some(45_000),
                ..OracleArgs::default()
            },
            fixture: Some(PathBuf::from("/tmp/photo.jpg")),
        }
    }

    #[test]
    fn test_flags_override_file_settings() {
        let settings = upload_settings(AcceptanceConfig::default(), &args()).unwrap();
        assert_eq!(settings.base_url, "http://127.0.0.1:4173");
        assert_eq!(settings.oracle.timeout_ms, 45_000);
        assert_eq!(settings.fixture_path, PathBuf::from("/tmp/photo.jpg"));
    }

    #[test]
    fn test_bad_base_url_rejected_before_launch() {
        let mut bad = args();
        bad.run.base_url = Some("localhost".to_string());
        assert!(upload_settings(AcceptanceConfig::default(), &bad).is_err());
    }
}
