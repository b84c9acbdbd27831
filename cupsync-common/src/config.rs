//! Configuration loading and resolution
//!
//! Config file resolution priority:
//! 1. Explicit path (command-line argument, highest priority)
//! 2. `CUPSYNC_CONFIG` environment variable
//! 3. Platform config dir (`~/.config/cupsync/config.toml` on Linux)
//! 4. Compiled defaults (fallback)
//!
//! The session cookie can additionally be supplied via `CUPSYNC_COOKIE`,
//! which takes priority over the TOML value.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "CUPSYNC_CONFIG";
/// Environment variable carrying the session cookie.
pub const COOKIE_ENV_VAR: &str = "CUPSYNC_COOKIE";

/// Pipeline configuration, one instance per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Base URL of the record and identifier APIs
    pub api_base_url: String,
    /// Base URL of the public site, used to build record source URLs
    pub site_base_url: String,
    /// Club whose campaigns are archived
    pub club_id: String,
    /// CSV export URL of the override sheet; no URL means no overrides
    pub overrides_url: Option<String>,
    /// Session cookie forwarded to the APIs, needed once the host starts
    /// challenging anonymous callers
    pub cookie: Option<String>,
    /// User-Agent header for all remote calls
    pub user_agent: String,
    /// Pacing delay between consecutive campaign fetches (milliseconds)
    pub fetch_pace_ms: u64,
    /// Pacing delay between consecutive identifier resolutions (milliseconds)
    pub resolve_pace_ms: u64,
    /// Cooldown before the single rate-limit retry (seconds)
    pub cooldown_secs: u64,
    /// Archive document location
    pub data_file: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://trackmania.io/api".to_string(),
            site_base_url: "https://trackmania.io".to_string(),
            club_id: "26830".to_string(),
            overrides_url: None,
            cookie: None,
            user_agent: concat!(
                "cupsync/",
                env!("CARGO_PKG_VERSION"),
                " (+https://github.com/cupsync/cupsync)"
            )
            .to_string(),
            fetch_pace_ms: 250,
            resolve_pace_ms: 600,
            cooldown_secs: 60,
            data_file: PathBuf::from("cup_archive.json"),
        }
    }
}

impl IngestConfig {
    /// Resolve and load the configuration.
    ///
    /// A config file named explicitly or via the environment must exist and
    /// parse; a missing file at the default platform location just means
    /// compiled defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(explicit_path) {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) if explicit_path.is_some() || std::env::var(CONFIG_ENV_VAR).is_ok() => {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            _ => {
                debug!("No config file found, using compiled defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {} failed: {e}", path.display())))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("parse {} failed: {e}", path.display())))?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(cookie) = std::env::var(COOKIE_ENV_VAR) {
            if !cookie.trim().is_empty() {
                if self.cookie.is_some() {
                    warn!(
                        "Session cookie found in both {COOKIE_ENV_VAR} and the config file; \
                         using the environment value"
                    );
                }
                self.cookie = Some(cookie);
            }
        }
    }
}

/// Locate the config file, if any: explicit path, then environment, then
/// the platform config directory.
fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("cupsync").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = IngestConfig::default();
        assert!(config.api_base_url.starts_with("https://"));
        assert!(config.overrides_url.is_none());
        assert_eq!(config.cooldown_secs, 60);
        assert!(config.fetch_pace_ms < config.resolve_pace_ms);
    }

    #[test]
    fn partial_toml_keeps_defaults_for_the_rest() {
        let toml = r#"
            club_id = "4242"
            overrides_url = "https://sheets.example.org/export?format=csv"
            fetch_pace_ms = 1500
        "#;
        let config: IngestConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.club_id, "4242");
        assert_eq!(config.fetch_pace_ms, 1500);
        assert_eq!(config.resolve_pace_ms, IngestConfig::default().resolve_pace_ms);
        assert_eq!(config.data_file, PathBuf::from("cup_archive.json"));
    }

    #[test]
    fn explicit_path_wins_over_platform_default() {
        let path = PathBuf::from("/tmp/some-config.toml");
        assert_eq!(resolve_config_path(Some(&path)), Some(path));
    }
}
