//! Config command handler

use crate::commands::ConfigAction;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use std::path::{Path, PathBuf};
use waypoint::AcceptanceConfig;

/// Header written above a generated settings file
pub const SETTINGS_HEADER: &str = "\
# waypoint settings
# Every key is optional; delete what you do not need to override.
";

/// Execute the config command; returns what was written or shown
pub fn execute_config(config: &CliConfig, cwd: &Path, action: &ConfigAction) -> CliResult<String> {
    match action {
        ConfigAction::Init { path, force } => {
            let target = resolve(cwd, path);
            init_settings(&target, *force)?;
            Ok(format!("wrote {}", target.display()))
        }
        ConfigAction::Show => {
            let source = config
                .settings_file(cwd)
                .map_or_else(|| "defaults".to_string(), |p| p.display().to_string());
            let settings = config.load_settings(cwd)?;
            Ok(format!("# source: {source}\n{}", settings.to_yaml()?))
        }
    }
}

fn resolve(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Write a settings file with every default spelled out
pub fn init_settings(path: &Path, force: bool) -> CliResult<()> {
    if path.exists() && !force {
        return Err(CliError::config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let body = AcceptanceConfig::default().to_yaml()?;
    std::fs::write(path, format!("{SETTINGS_HEADER}{body}"))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let action = ConfigAction::Init {
            path: PathBuf::from("waypoint.yaml"),
            force: false,
        };
        let message = execute_config(&CliConfig::new(), dir.path(), &action).unwrap();
        assert!(message.starts_with("wrote"));

        let written = dir.path().join("waypoint.yaml");
        assert!(std::fs::read_to_string(&written)
            .unwrap()
            .starts_with("# waypoint settings"));
        assert_eq!(
            AcceptanceConfig::load(&written).unwrap(),
            AcceptanceConfig::default()
        );
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waypoint.yaml");
        std::fs::write(&path, "base_url: http://keep.me\n").unwrap();
        assert!(init_settings(&path, false).is_err());
        assert!(init_settings(&path, true).is_ok());
    }

    #[test]
    fn test_show_reports_source() {
        let dir = tempfile::tempdir().unwrap();
        let shown = execute_config(&CliConfig::new(), dir.path(), &ConfigAction::Show).unwrap();
        assert!(shown.starts_with("# source: defaults"));
        assert!(shown.contains("base_url"));

        std::fs::write(
            dir.path().join("waypoint.yaml"),
            "base_url: http://127.0.0.1:4173\n",
        )
        .unwrap();
        let shown = execute_config(&CliConfig::new(), dir.path(), &ConfigAction::Show).unwrap();
        assert!(shown.contains("waypoint.yaml"));
        assert!(shown.contains("127.0.0.1:4173"));
    }
}
