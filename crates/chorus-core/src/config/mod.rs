//! Provider configuration file
//!
//! One JSON file at `~/.chorus/providers.json` holds per-provider entries
//! (API key, enabled flag, optional base-URL override) plus global settings.
//! The file holds secrets, so saves are atomic (temp file + rename) with
//! 0600 permissions on Unix.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::ai::providers::{builtin_providers, ProviderId};
use crate::constants;
use crate::error::ConfigError;
use crate::paths;

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    constants::http::REQUEST_TIMEOUT.as_secs()
}

fn default_max_attempts() -> u32 {
    constants::retry::MAX_ATTEMPTS
}

/// Per-provider entry in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for ProviderEntry {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            enabled: true,
            base_url: None,
        }
    }
}

/// Global settings in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Total attempts per provider call (first try included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Optional overall deadline in seconds across the whole dispatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_timeout_secs: Option<u64>,
    /// Providers to use when `--providers` is not given (empty = all configured)
    #[serde(default)]
    pub default_providers: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            overall_timeout_secs: None,
            default_providers: Vec::new(),
        }
    }
}

/// Loaded configuration: provider entries keyed by storage key, plus settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChorusConfig {
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
    #[serde(default)]
    pub settings: Settings,
}

impl ChorusConfig {
    /// Default configuration: one entry per built-in provider, empty keys
    pub fn init_default() -> Self {
        let providers = builtin_providers()
            .iter()
            .map(|spec| (spec.id.storage_key().to_string(), ProviderEntry::default()))
            .collect();
        Self {
            providers,
            settings: Settings::default(),
        }
    }

    /// Load from the default location; missing file is `NotInitialized`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&paths::config_file())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotInitialized(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        let config: ChorusConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&paths::config_file())
    }

    /// Save to a specific path
    ///
    /// Writes to a temp file in the same directory, then renames over the
    /// original, so a crash never leaves a partial file. On Unix the file is
    /// restricted to 0600 since it holds API keys.
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&temp_path, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut permissions = fs::metadata(&temp_path)?.permissions();
            permissions.set_mode(0o600);
            fs::set_permissions(&temp_path, permissions)?;
        }

        fs::rename(&temp_path, path)?;
        tracing::debug!("config saved to {:?}", path);
        Ok(())
    }

    /// API key for a provider; empty keys count as absent
    pub fn api_key(&self, id: ProviderId) -> Option<&str> {
        self.providers
            .get(id.storage_key())
            .map(|entry| entry.api_key.as_str())
            .filter(|key| !key.trim().is_empty())
    }

    /// Store an API key and enable the provider
    pub fn set_api_key(&mut self, id: ProviderId, key: String) {
        let entry = self
            .providers
            .entry(id.storage_key().to_string())
            .or_default();
        entry.api_key = key;
        entry.enabled = true;
    }

    /// Whether a provider is enabled (absent entries default to enabled)
    pub fn is_enabled(&self, id: ProviderId) -> bool {
        self.providers
            .get(id.storage_key())
            .map(|entry| entry.enabled)
            .unwrap_or(true)
    }

    pub fn set_enabled(&mut self, id: ProviderId, enabled: bool) {
        self.providers
            .entry(id.storage_key().to_string())
            .or_default()
            .enabled = enabled;
    }

    /// Base-URL override for a provider, when set
    pub fn base_url_override(&self, id: ProviderId) -> Option<&String> {
        self.providers
            .get(id.storage_key())
            .and_then(|entry| entry.base_url.as_ref())
    }

    pub fn set_base_url(&mut self, id: ProviderId, base_url: Option<String>) {
        self.providers
            .entry(id.storage_key().to_string())
            .or_default()
            .base_url = base_url;
    }

    /// All providers with a non-empty key, in priority order
    pub fn configured_providers(&self) -> Vec<ProviderId> {
        ProviderId::all()
            .iter()
            .filter(|&&id| self.api_key(id).is_some())
            .copied()
            .collect()
    }

    /// Per-request timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.request_timeout_secs)
    }

    /// Overall dispatch deadline, when configured
    pub fn overall_timeout(&self) -> Option<Duration> {
        self.settings.overall_timeout_secs.map(Duration::from_secs)
    }
}
