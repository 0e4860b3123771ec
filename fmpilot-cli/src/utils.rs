use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so stdout carries only the JSON result. `level` comes
/// from `--log-level` or `LOG_LEVEL`.
pub fn init_logging(level: Option<&str>) -> Result<()> {
    let log_level = level
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    Ok(())
}

/// JSON given inline, or the path of a file holding it.
pub fn load_json_input(arg: &str) -> Result<Value> {
    let trimmed = arg.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).context("invalid inline JSON");
    }
    let path = Path::new(arg);
    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot read input file {}", path.display()))?;
    // Files written by Windows tools often start with a BOM.
    let content = content.trim_start_matches('\u{feff}');
    serde_json::from_str(content).with_context(|| format!("invalid JSON in {}", path.display()))
}
