//! Client configuration

use std::path::PathBuf;

use crate::session::SessionStore;

/// Default API base, matching the backend's development server
pub const DEFAULT_API_BASE: &str = "http://localhost:5000/api";

/// Client configuration for talking to the vendor API
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// API base URL including the `/api` prefix (e.g., "https://shop.example.com/api")
    pub base_url: String,

    /// Bearer token; when unset the session store is consulted per request
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Directory holding the persisted session file
    pub data_dir: PathBuf,
}

impl PortalConfig {
    /// Create a new configuration for the given API base
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: 30,
            data_dir: PathBuf::from(".vendor-portal"),
        }
    }

    /// Set a fixed bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Set the session directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Absolute URL for an API path
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Session store rooted at `data_dir`
    pub fn session_store(&self) -> SessionStore {
        SessionStore::new(&self.data_dir)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}
