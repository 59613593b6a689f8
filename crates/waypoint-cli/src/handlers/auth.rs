//! Auth command handler

use crate::commands::AuthArgs;
use crate::config::{apply_run_args, CliConfig};
use crate::error::{CliError, CliResult};
use waypoint::{AcceptanceConfig, RunReport, TestAccount};

/// Settings for an auth run: file settings with flags applied
pub fn auth_settings(mut settings: AcceptanceConfig, args: &AuthArgs) -> CliResult<AcceptanceConfig> {
    apply_run_args(&mut settings, &args.run);
    match (&args.login_email, &args.login_password) {
        (Some(email), Some(password)) => {
            settings.auth.existing_account = TestAccount::new(email.clone(), password.clone());
        }
        (None, None) => {}
        _ => {
            return Err(CliError::invalid_argument(
                "--login-email and --login-password go together",
            ))
        }
    }
    settings.validate()?;
    Ok(settings)
}

/// Run the auth flow in Chromium
#[cfg(feature = "browser")]
pub async fn execute_auth(
    config: &CliConfig,
    settings: AcceptanceConfig,
    args: &AuthArgs,
) -> CliResult<RunReport> {
    use crate::output::ProgressReporter;
    use waypoint::{run_auth_flow, Browser, SystemClock};

    let settings = auth_settings(settings, args)?;
    let mut reporter =
        ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.header(&format!("auth against {}", settings.base_url));

    let browser = Browser::launch(settings.browser.clone()).await?;
    let page = browser.new_page().await?;
    let account = TestAccount::timestamped(&settings.auth.account_prefix);
    reporter.info(&format!("registering {}", account.email));

    reporter.start_spinner("registering, then logging in");
    let outcome = run_auth_flow(&page, SystemClock::shared(), &settings, account).await;
    reporter.finish();

    let console: Vec<_> = page
        .console()
        .messages()
        .into_iter()
        .filter(|m| m.level.is_warning_or_error())
        .collect();
    drop(page);
    browser.close().await?;

    reporter.steps(&outcome.steps);
    Ok(RunReport::from_auth(&outcome).with_console(console))
}

/// Run the auth flow in Chromium
#[cfg(not(feature = "browser"))]
pub async fn execute_auth(
    _config: &CliConfig,
    settings: AcceptanceConfig,
    args: &AuthArgs,
) -> CliResult<RunReport> {
    auth_settings(settings, args)?;
    Err(CliError::BrowserUnavailable { command: "auth" })
}
