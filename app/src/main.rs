use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use askdb_core::config::{config_dir, default_config_path, DashboardConfig};
use askdb_core::saved_queries::default_saved_queries_path;
use askdb_tui::{TuiError, TuiOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "askdb.log";

#[derive(Debug, Clone)]
struct AppPaths {
    config: PathBuf,
    saved_queries: PathBuf,
    exports: PathBuf,
    log: PathBuf,
}

impl AppPaths {
    fn resolve() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = config_dir()?;
        Ok(Self {
            config: default_config_path()?,
            saved_queries: default_saved_queries_path()?,
            exports: dir.join("exports"),
            log: dir.join(LOG_FILE),
        })
    }

    #[cfg(test)]
    fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join("config.toml"),
            saved_queries: dir.join("saved_queries.toml"),
            exports: dir.join("exports"),
            log: dir.join(LOG_FILE),
        }
    }
}

/// Logs go to a file so the alternate screen stays clean. `ASKDB_LOG`
/// takes an `EnvFilter` directive, `info` by default.
fn init_logging(log_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    let filter = EnvFilter::try_from_env("ASKDB_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|error| error as Box<dyn std::error::Error>)?;
    Ok(())
}

fn run_app(
    paths: &AppPaths,
    run_tui: impl FnOnce(TuiOptions) -> Result<(), TuiError>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = DashboardConfig::load_from_path(&paths.config)?;
    info!(
        core = askdb_core::domain_name(),
        adapters = askdb_adapters::adapter_name(),
        ui = askdb_tui::ui_name(),
        config = %paths.config.display(),
        "starting dashboard"
    );
    run_tui(TuiOptions {
        config,
        saved_queries_path: paths.saved_queries.clone(),
        export_dir: paths.exports.clone(),
    })?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let paths = AppPaths::resolve()?;
    init_logging(&paths.log)?;
    run_app(&paths, askdb_tui::run)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;

    use tempfile::TempDir;

    use super::{init_logging, run_app, AppPaths};

    #[test]
    fn run_app_returns_ok_when_tui_runner_succeeds() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let paths = AppPaths::in_dir(temp_dir.path());

        let result = run_app(&paths, |options| {
            assert_eq!(options.config.table.page_size, 5);
            assert_eq!(options.export_dir, temp_dir.path().join("exports"));
            Ok(())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn run_app_propagates_tui_errors() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let paths = AppPaths::in_dir(temp_dir.path());

        let result = run_app(&paths, |_| {
            Err(askdb_tui::TuiError::Io(io::Error::other("boom")))
        });
        assert!(result.is_err());
    }

    #[test]
    fn init_logging_creates_the_log_file() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let log_path = temp_dir.path().join("logs").join("askdb.log");

        init_logging(&log_path).expect("logging should install once");
        tracing::info!("logging installed");
        assert!(log_path.exists());
    }

    #[test]
    fn run_app_rejects_invalid_config_before_starting_the_tui() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let paths = AppPaths::in_dir(temp_dir.path());
        fs::write(&paths.config, "[table]\npage_size = 0\n").expect("failed to write config");

        let result = run_app(&paths, |_| panic!("tui should not start"));
        assert!(result.is_err());
    }
}
