//! Logging setup
//!
//! One-shot commands log to stderr. The dashboard owns the terminal, so it
//! logs to a daily rolling file instead.

use std::path::Path;
use tracing_subscriber::EnvFilter;

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_stderr_logger(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn init_file_logger(level: &str, log_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "messbook.log");
    tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_target(false)
        .with_ansi(false)
        .with_writer(file_appender)
        .init();
    Ok(())
}
