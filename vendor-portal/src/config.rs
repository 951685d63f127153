//! Application configuration
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | PORTAL_API_BASE | http://localhost:5000/api | API base including `/api` |
//! | PORTAL_DATA_DIR | ./.vendor-portal | Session file directory |
//! | PORTAL_REQUEST_TIMEOUT_SECS | 30 | REST request timeout |
//! | PORTAL_NOTICE_TTL_MS | 5000 | How long notices stay visible |
//! | LOG_LEVEL | info | Level or filter directive |
//! | LOG_DIR | (unset) | Daily rolling log files instead of console |

use portal_client::{DEFAULT_API_BASE, PortalConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base: String,
    pub data_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub notice_ttl: Duration,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load from the environment (after `.env`, if present).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values use defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_base: lookup("PORTAL_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()),
            data_dir: lookup("PORTAL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./.vendor-portal")),
            request_timeout_secs: lookup("PORTAL_REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            notice_ttl: lookup("PORTAL_NOTICE_TTL_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_secs(5)),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_dir: lookup("LOG_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn portal_config(&self) -> PortalConfig {
        PortalConfig::new(&self.api_base)
            .with_timeout(self.request_timeout_secs)
            .with_data_dir(&self.data_dir)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
