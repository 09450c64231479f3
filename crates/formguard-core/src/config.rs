//! User settings and the stores they are read from.
//!
//! Settings are read-only to the scanning pipeline. Stores publish every
//! change on a `watch` channel so long-lived consumers (the log level
//! follower, a continuous-mode tracker) can react without polling.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{Result, ScanError};

/// Placeholder written over redacted secrets unless configured otherwise.
pub const DEFAULT_REDACT_TEXT: &str = "REDACTED";

/// Extension settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the scan API (e.g. `https://api.gitguardian.com`).
    pub scan_endpoint_url: String,
    pub api_key: String,
    /// Scan automatically on load and on every field change.
    pub continuous_mode: bool,
    pub auto_redact: bool,
    pub redact_text: String,
    /// Verbose diagnostics.
    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            scan_endpoint_url: String::new(),
            api_key: String::new(),
            continuous_mode: false,
            auto_redact: true,
            redact_text: DEFAULT_REDACT_TEXT.to_string(),
            debug_mode: false,
        }
    }
}

impl Settings {
    /// Create settings for a given endpoint and key, other values defaulted.
    pub fn new(scan_endpoint_url: &str, api_key: &str) -> Self {
        Settings {
            scan_endpoint_url: scan_endpoint_url.to_string(),
            api_key: api_key.to_string(),
            ..Settings::default()
        }
    }

    /// Parse TOML settings; missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Both endpoint and key are set (ignoring surrounding whitespace).
    pub fn is_active(&self) -> bool {
        !self.scan_endpoint_url.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    /// Credentials for the scanner, or [`ScanError::MissingCredentials`].
    pub fn credentials(&self) -> Result<ScanCredentials> {
        ScanCredentials::new(&self.scan_endpoint_url, &self.api_key)
    }

    /// Placeholder text, falling back to [`DEFAULT_REDACT_TEXT`] when blank.
    pub fn redact_placeholder(&self) -> &str {
        if self.redact_text.is_empty() {
            DEFAULT_REDACT_TEXT
        } else {
            &self.redact_text
        }
    }
}

/// Validated endpoint URL and API key.
#[derive(Clone, PartialEq, Eq)]
pub struct ScanCredentials {
    api_url: String,
    api_key: String,
}

impl ScanCredentials {
    pub fn new(api_url: &str, api_key: &str) -> Result<Self> {
        let api_url = api_url.trim();
        let api_key = api_key.trim();
        if api_url.is_empty() || api_key.is_empty() {
            return Err(ScanError::MissingCredentials);
        }
        Ok(Self {
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for ScanCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanCredentials")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Source of settings with change notification.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Current settings.
    async fn load(&self) -> Result<Settings>;

    /// Receiver that observes every published change.
    fn subscribe(&self) -> watch::Receiver<Settings>;
}

/// Settings held in memory.
#[derive(Debug)]
pub struct MemorySettingsStore {
    tx: watch::Sender<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(settings);
        Self { tx }
    }

    /// Apply `f` to the settings and notify subscribers.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Settings),
    {
        self.tx.send_modify(f);
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<Settings> {
        Ok(self.tx.borrow().clone())
    }

    fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }
}

/// Settings persisted in a TOML file.
///
/// The file is read on [`FileSettingsStore::open`] and again on every
/// [`FileSettingsStore::reload`]; subscribers are notified only when the
/// parsed settings differ from the current ones.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    tx: watch::Sender<Settings>,
}

impl FileSettingsStore {
    /// Open the store. A missing file yields default settings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = read_settings_file(&path)?;
        let (tx, _rx) = watch::channel(settings);
        Ok(Self { path, tx })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file. Returns whether the settings changed.
    pub fn reload(&self) -> Result<bool> {
        let fresh = read_settings_file(&self.path)?;
        let changed = self.tx.send_if_modified(|current| {
            if *current == fresh {
                false
            } else {
                *current = fresh;
                true
            }
        });
        if changed {
            info!(path = %self.path.display(), "settings changed");
        }
        Ok(changed)
    }

    /// Write `settings` to the file and publish them.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let content =
            toml::to_string_pretty(settings).map_err(|e| ScanError::Settings(e.to_string()))?;
        std::fs::write(&self.path, content)?;
        self.tx.send_replace(settings.clone());
        Ok(())
    }
}

fn read_settings_file(path: &Path) -> Result<Settings> {
    match std::fs::read_to_string(path) {
        Ok(content) => Settings::from_toml(&content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "settings file not found, using defaults");
            Ok(Settings::default())
        }
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Result<Settings> {
        Ok(self.tx.borrow().clone())
    }

    fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }
}
