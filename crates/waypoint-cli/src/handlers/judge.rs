//! Judge command handler
//!
//! Replays a recorded timeline through the oracle on virtual time, so a
//! 30 second observation window finishes instantly.

use crate::commands::JudgeArgs;
use crate::config::apply_oracle_args;
use crate::error::CliResult;
use tracing::info;
use waypoint::{AcceptanceConfig, RunReport, ScriptedPage, Timeline, UploadOracle};

/// Judge the timeline named in `args`
pub async fn execute_judge(mut settings: AcceptanceConfig, args: &JudgeArgs) -> CliResult<RunReport> {
    apply_oracle_args(&mut settings, &args.oracle);
    settings.validate()?;

    let timeline = Timeline::load(&args.timeline)?;
    info!(
        path = %args.timeline.display(),
        exchanges = timeline.network.len(),
        elements = timeline.elements.len(),
        "judging timeline"
    );
    let page = ScriptedPage::new(timeline);
    let armed = UploadOracle::new(settings.oracle, page.clock())
        .arm(&page)
        .await?;
    let report = armed.observe(&page).await;
    Ok(RunReport::from_oracle(report))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::commands::{OracleArgs, OutputArgs};
    use std::path::Path;
    use waypoint::{RunVerdict, StopReason, Verdict};

    fn args(path: &Path, oracle: OracleArgs) -> JudgeArgs {
        JudgeArgs {
            timeline: path.to_path_buf(),
            oracle,
            output: OutputArgs::default(),
        }
    }

    fn write(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("timeline.yaml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_success_timeline() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r"
elements:
  - selector: h2
    text: 新增地點
network:
  - at_ms: 2500
    direction: response
    url: https://api.cloudinary.com/v1_1/demo/image/upload
    status: 200
",
        );
        let report = execute_judge(AcceptanceConfig::default(), &args(&path, OracleArgs::default()))
            .await
            .unwrap();
        assert_eq!(report.verdict, RunVerdict::Pass);
        assert_eq!(report.oracle.unwrap().stop_reason, StopReason::ResponseObserved);
    }

    #[tokio::test]
    async fn test_target_host_override_ignores_other_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r"
elements:
  - selector: h2
    text: 新增地點
network:
  - at_ms: 1000
    direction: response
    url: https://api.cloudinary.com/upload
    status: 500
",
        );
        let oracle = OracleArgs {
            timeout_ms: Some(6_000),
            poll_interval_ms: None,
            target_host: Some("media.example.com".to_string()),
        };
        let report = execute_judge(AcceptanceConfig::default(), &args(&path, oracle))
            .await
            .unwrap();
        let oracle = report.oracle.unwrap();
        assert_eq!(oracle.verdict, Verdict::InconclusiveTimeout);
        assert_eq!(oracle.response_count, 0);
        assert_eq!(report.verdict, RunVerdict::Inconclusive);
    }

    #[tokio::test]
    async fn test_invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "{}");
        let oracle = OracleArgs {
            poll_interval_ms: Some(0),
            ..OracleArgs::default()
        };
        assert!(execute_judge(AcceptanceConfig::default(), &args(&path, oracle))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_missing_timeline_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(execute_judge(AcceptanceConfig::default(), &args(&missing, OracleArgs::default()))
            .await
            .is_err());
    }
}
