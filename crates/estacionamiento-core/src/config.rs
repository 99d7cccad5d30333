//! Configuration loaded from `estacionamiento.yml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::activity_log::ActivityLog;
use crate::devices::SimulatedDiscovery;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub activity_log: ActivityLogConfig,
    pub conversation: ConversationConfig,
    pub bluetooth: BluetoothConfig,
}

impl AppConfig {
    /// Load config from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse YAML text. Empty text yields the defaults.
    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }
}

/// Telegram transport and polling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token. Falls back to `ESTACIONAMIENTO_TELEGRAM_BOT_TOKEN`.
    pub bot_token: Option<String>,
    /// Server-side long-poll window passed to `getUpdates`.
    pub poll_timeout_secs: u32,
    /// Minimum wait before retrying after a failed fetch.
    pub retry_delay_secs: u64,
    /// Where the last processed update id is persisted.
    pub state_file: PathBuf,
    /// Bot API base URL, for a self-hosted Bot API server.
    pub api_url: Option<String>,
}

impl TelegramConfig {
    pub const TOKEN_ENV: &'static str = "ESTACIONAMIENTO_TELEGRAM_BOT_TOKEN";
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            poll_timeout_secs: 60,
            retry_delay_secs: 5,
            state_file: PathBuf::from(".estacionamiento/telegram-state.json"),
            api_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityLogConfig {
    /// Maximum retained entries; older ones are evicted.
    pub capacity: usize,
}

impl Default for ActivityLogConfig {
    fn default() -> Self {
        Self {
            capacity: ActivityLog::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Idle time after which an unfinished guest registration is dropped.
    /// `0` keeps it forever.
    pub idle_timeout_secs: u64,
}

impl ConversationConfig {
    pub fn idle_timeout(&self) -> Option<chrono::Duration> {
        if self.idle_timeout_secs == 0 {
            return None;
        }
        i64::try_from(self.idle_timeout_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 15 * 60,
        }
    }
}

/// Device-scan settings. Discovery is simulated from the scripted sightings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    pub radio_enabled: bool,
    pub permissions_granted: bool,
    pub low_energy: Vec<SimulatedDiscovery>,
    pub classic: Vec<SimulatedDiscovery>,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            radio_enabled: true,
            permissions_granted: true,
            low_energy: Vec::new(),
            classic: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.yml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.telegram.poll_timeout_secs, 60);
        assert_eq!(config.telegram.retry_delay_secs, 5);
        assert_eq!(config.activity_log.capacity, ActivityLog::DEFAULT_CAPACITY);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = AppConfig::parse(
            "telegram:\n  bot_token: abc\n  poll_timeout_secs: 30\nconversation:\n  idle_timeout_secs: 0\n",
        )
        .unwrap();
        assert_eq!(config.telegram.bot_token.as_deref(), Some("abc"));
        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert_eq!(config.telegram.retry_delay_secs, 5);
        assert!(config.conversation.idle_timeout().is_none());
        assert!(config.bluetooth.radio_enabled);
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(AppConfig::parse("  \n").unwrap(), AppConfig::default());
    }

    #[test]
    fn bluetooth_script_parses() {
        let yaml = r"
bluetooth:
  low_energy:
    - name: Barrera
      address: 'AA:01'
      rssi: -55
      after_ms: 200
  classic:
    - address: 'BB:02'
";
        let config = AppConfig::parse(yaml).unwrap();
        assert_eq!(config.bluetooth.low_energy.len(), 1);
        assert_eq!(config.bluetooth.low_energy[0].rssi, Some(-55));
        assert_eq!(config.bluetooth.classic[0].name, None);
        assert_eq!(config.bluetooth.classic[0].after_ms, 0);
    }

    #[test]
    fn invalid_yaml_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yml");
        std::fs::write(&path, "telegram: [unclosed").unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.yml"));
    }

    #[test]
    fn default_idle_timeout_is_fifteen_minutes() {
        let timeout = ConversationConfig::default().idle_timeout().unwrap();
        assert_eq!(timeout.num_minutes(), 15);
    }
}
