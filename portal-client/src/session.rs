//! Persisted vendor session
//!
//! A small JSON key-value file that keeps the same key names the web
//! dashboard keeps in browser storage, so tooling can share a session.

use serde_json::{Map, Value};
use shared::VendorProfile;
use std::fs;
use std::path::{Path, PathBuf};

/// Bearer credential key
pub const TOKEN_KEY: &str = "vendor_token";
/// JSON-serialized vendor profile key
pub const USER_KEY: &str = "vendor_user";

const SESSION_FILE: &str = "session.json";

/// Anything that can hand out the current bearer token.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// A token that never changes (tests, one-shot tools)
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Session storage
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a session store inside `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SESSION_FILE),
        }
    }

    /// Read one key
    pub fn get(&self, key: &str) -> Option<String> {
        self.load()
            .remove(key)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Write one key
    pub fn set(&self, key: &str, value: &str) -> std::io::Result<()> {
        let mut entries = self.load();
        entries.insert(key.to_string(), Value::String(value.to_string()));
        self.save(&entries)
    }

    /// Delete one key
    pub fn remove(&self, key: &str) -> std::io::Result<()> {
        let mut entries = self.load();
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }

    /// Store a fresh login
    pub fn save_login(&self, token: &str, vendor: &VendorProfile) -> std::io::Result<()> {
        let mut entries = self.load();
        entries.insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        entries.insert(
            USER_KEY.to_string(),
            Value::String(serde_json::to_string(vendor)?),
        );
        self.save(&entries)
    }

    /// Forget the session
    pub fn clear(&self) -> std::io::Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Stored vendor profile, if present and parseable
    pub fn vendor(&self) -> Option<VendorProfile> {
        let raw = self.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(vendor) => Some(vendor),
            Err(e) => {
                tracing::warn!("Stored vendor profile is not valid JSON: {}", e);
                None
            }
        }
    }

    /// Id of the signed-in vendor
    pub fn vendor_id(&self) -> Option<String> {
        self.vendor().map(|v| v.id).filter(|id| !id.is_empty())
    }

    pub fn is_signed_in(&self) -> bool {
        TokenSource::token(self).is_some()
    }

    /// Path of the session file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Map<String, Value> {
        let Ok(json) = fs::read_to_string(&self.path) else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&json) {
            Ok(Value::Object(entries)) => entries,
            Ok(_) | Err(_) => {
                tracing::warn!("Ignoring malformed session file {}", self.path.display());
                Map::new()
            }
        }
    }

    fn save(&self, entries: &Map<String, Value>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json)
    }
}

impl TokenSource for SessionStore {
    fn token(&self) -> Option<String> {
        self.get(TOKEN_KEY).filter(|t| !t.trim().is_empty())
    }
}
