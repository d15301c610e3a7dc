//! Runtime configuration

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Quiet period before a burst of change events triggers one aggregation.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
/// Cached snapshots older than this are not shown optimistically.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_MESS_ID: &str = "home";

/// `~/.messbook`
pub fn default_data_dir() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home_dir.join(".messbook"))
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root of the record store and snapshot cache. `None` means `~/.messbook`.
    pub data_dir: Option<PathBuf>,
    pub mess_id: String,
    pub debounce: Duration,
    pub cache_ttl: Duration,
    /// tracing filter directive, e.g. "info" or "messbook_core=debug"
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            mess_id: DEFAULT_MESS_ID.to_string(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `MESSBOOK_*` variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup("MESSBOOK_DATA_DIR").map(PathBuf::from),
            mess_id: lookup("MESSBOOK_MESS").unwrap_or(defaults.mess_id),
            debounce: lookup("MESSBOOK_DEBOUNCE_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.debounce),
            cache_ttl: lookup("MESSBOOK_CACHE_TTL_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            log_level: lookup("MESSBOOK_LOG").unwrap_or(defaults.log_level),
        }
    }
}
