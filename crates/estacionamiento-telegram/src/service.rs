use std::fmt;
use std::sync::Arc;

use estacionamiento_core::{ConversationConfig, ConversationEngine, SystemStatus, TelegramConfig};

use crate::api::TelegramBot;
use crate::error::{TelegramError, TelegramResult};
use crate::offset::FileOffsetStore;
use crate::poller::{PollSettings, UpdatePoller};

/// Builds the production bot, offset store and poller from configuration.
pub struct TelegramService {
    bot_token: String,
    config: TelegramConfig,
}

impl TelegramService {
    /// Create a new TelegramService.
    ///
    /// Resolves the bot token from config or the
    /// `ESTACIONAMIENTO_TELEGRAM_BOT_TOKEN` env var.
    pub fn new(config: &TelegramConfig) -> TelegramResult<Self> {
        let resolved_token = config
            .bot_token
            .clone()
            .or_else(|| std::env::var(TelegramConfig::TOKEN_ENV).ok())
            .filter(|t| !t.trim().is_empty())
            .ok_or(TelegramError::MissingBotToken)?;

        Ok(Self {
            bot_token: resolved_token,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    /// Get the bot token masked for logging.
    pub fn bot_token_masked(&self) -> String {
        let chars: Vec<char> = self.bot_token.chars().collect();
        if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{head}...{tail}")
        } else {
            "****".to_string()
        }
    }

    pub fn bot(&self) -> TelegramResult<TelegramBot> {
        let bot = TelegramBot::new(&self.bot_token, self.config.poll_timeout_secs)?;
        match &self.config.api_url {
            Some(url) => bot.with_api_url(url),
            None => Ok(bot),
        }
    }

    pub fn offset_store(&self) -> FileOffsetStore {
        FileOffsetStore::new(&self.config.state_file)
    }

    /// Assemble the polling loop reporting into `status`.
    pub fn poller(
        &self,
        status: Arc<SystemStatus>,
        conversation: &ConversationConfig,
    ) -> TelegramResult<UpdatePoller> {
        let bot = self.bot()?.with_activity_log(Arc::clone(status.log()));
        Ok(UpdatePoller::new(
            Arc::new(bot),
            Arc::new(self.offset_store()),
            status,
            ConversationEngine::new(conversation.idle_timeout()),
            PollSettings::from(&self.config),
        ))
    }
}

impl fmt::Debug for TelegramService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramService")
            .field("bot_token", &self.bot_token_masked())
            .field("state_file", &self.config.state_file)
            .field("poll_timeout_secs", &self.config.poll_timeout_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_with_token(token: &str) -> TelegramConfig {
        TelegramConfig {
            bot_token: Some(token.to_string()),
            ..TelegramConfig::default()
        }
    }

    #[test]
    fn new_with_explicit_token() {
        let service = TelegramService::new(&config_with_token("test-token-12345"));
        assert!(service.is_ok());
    }

    #[test]
    fn new_without_token_fails() {
        // Only run this test when the env var is not set,
        // to avoid needing unsafe remove_var
        if std::env::var(TelegramConfig::TOKEN_ENV).is_ok() {
            return;
        }

        let service = TelegramService::new(&TelegramConfig::default());
        assert!(matches!(service, Err(TelegramError::MissingBotToken)));
    }

    #[test]
    fn blank_token_counts_as_missing() {
        if std::env::var(TelegramConfig::TOKEN_ENV).is_ok() {
            return;
        }

        let service = TelegramService::new(&config_with_token("   "));
        assert!(service.is_err());
    }

    #[test]
    fn bot_token_masked_long() {
        let service = TelegramService::new(&config_with_token("123456:ABCDEF-xyz")).unwrap();
        assert_eq!(service.bot_token_masked(), "1234...-xyz");
    }

    #[test]
    fn bot_token_masked_short() {
        let service = TelegramService::new(&config_with_token("short")).unwrap();
        assert_eq!(service.bot_token_masked(), "****");
    }

    #[test]
    fn bot_token_masked_counts_characters() {
        let service = TelegramService::new(&config_with_token("aññññññ")).unwrap();
        assert_eq!(service.bot_token_masked(), "****");

        let service = TelegramService::new(&config_with_token("ñandú:1234-señal")).unwrap();
        assert_eq!(service.bot_token_masked(), "ñand...eñal");
        assert!(format!("{service:?}").contains("ñand...eñal"));
    }

    #[test]
    fn bad_api_url_fails_bot_construction() {
        let config = TelegramConfig {
            api_url: Some("::nope".into()),
            ..config_with_token("123456:test-token")
        };
        let service = TelegramService::new(&config).unwrap();
        assert!(matches!(service.bot(), Err(TelegramError::Startup(_))));
    }

    #[test]
    fn debug_does_not_leak_token() {
        let service = TelegramService::new(&config_with_token("123456:SECRETSECRET")).unwrap();
        let debug = format!("{service:?}");
        assert!(!debug.contains("SECRETSECRET"));
    }

    #[test]
    fn offset_store_uses_configured_path() {
        let dir = TempDir::new().unwrap();
        let config = TelegramConfig {
            state_file: dir.path().join("offset.json"),
            ..config_with_token("test-token-12345")
        };
        let service = TelegramService::new(&config).unwrap();
        assert_eq!(service.offset_store().path(), dir.path().join("offset.json"));
    }

    #[test]
    fn poller_starts_at_zero() {
        let service = TelegramService::new(&config_with_token("123456:test-token")).unwrap();
        let poller = service
            .poller(Arc::new(SystemStatus::default()), &ConversationConfig::default())
            .unwrap();
        assert_eq!(poller.last_update_id(), 0);
    }
}
