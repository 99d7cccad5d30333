use std::time::Duration;

use estacionamiento_core::LogSource;
use thiserror::Error;

/// Result type alias for telegram operations.
pub type TelegramResult<T> = std::result::Result<T, TelegramError>;

/// Errors that can occur during Telegram bot operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Bot token is missing from config and environment.
    #[error(
        "telegram bot token not found: set ESTACIONAMIENTO_TELEGRAM_BOT_TOKEN or configure telegram.bot_token"
    )]
    MissingBotToken,

    /// Failed to build the bot client.
    #[error("failed to start telegram bot: {0}")]
    Startup(String),

    /// The request timed out at the transport layer.
    #[error("telegram request timed out")]
    Timeout,

    /// The Bot API answered `ok=false`.
    #[error("telegram API rejected the request: {0}")]
    Rejected(String),

    /// The Bot API asked for a pause before the next request.
    #[error("telegram asked to retry after {}s", .0.as_secs())]
    RetryAfter(Duration),

    /// The HTTP layer failed: an error status, or a body that is not a Bot
    /// API response (a proxy error page, for instance).
    #[error("server error: {0}")]
    Http(String),

    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// Anything else, such as an undecodable response body.
    #[error("unexpected telegram error: {0}")]
    Unexpected(String),

    /// Failed to read or write state file.
    #[error("state persistence error: {0}")]
    State(#[from] std::io::Error),

    /// Failed to parse state JSON.
    #[error("state parse error: {0}")]
    StateParse(#[from] serde_json::Error),
}

impl TelegramError {
    /// Activity-log source this failure is reported under.
    pub fn log_source(&self) -> LogSource {
        match self {
            TelegramError::Http(_) => LogSource::Server,
            TelegramError::Rejected(_) | TelegramError::RetryAfter(_) => LogSource::Telegram,
            _ => LogSource::System,
        }
    }

    /// Whether this is a benign long-poll expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TelegramError::Timeout)
    }

    /// Wait requested by the Bot API, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TelegramError::RetryAfter(wait) => Some(*wait),
            _ => None,
        }
    }
}

impl From<teloxide::RequestError> for TelegramError {
    fn from(err: teloxide::RequestError) -> Self {
        use teloxide::RequestError;

        match &err {
            RequestError::RetryAfter(secs) => TelegramError::RetryAfter(secs.duration()),
            RequestError::Api(_) | RequestError::MigrateToChatId(_) => {
                TelegramError::Rejected(err.to_string())
            }
            RequestError::Network(inner) if inner.is_timeout() => TelegramError::Timeout,
            RequestError::Network(inner) => match inner.status() {
                Some(status) => TelegramError::Http(format!("HTTP {status}")),
                None => TelegramError::Network(err.to_string()),
            },
            // teloxide parses the body whatever the status code, so an error
            // page from the server or a proxy surfaces here.
            RequestError::InvalidJson { .. } => TelegramError::Http(err.to_string()),
            _ => TelegramError::Network(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_failures_report_as_server() {
        assert_eq!(
            TelegramError::Http("HTTP 502 Bad Gateway".into()).log_source(),
            LogSource::Server
        );
    }

    #[test]
    fn undecodable_body_is_an_http_failure() {
        let json_err = serde_json::from_str::<serde_json::Value>("<html>Bad Gateway</html>")
            .unwrap_err();
        let err = TelegramError::from(teloxide::RequestError::InvalidJson {
            source: json_err,
            raw: "<html>Bad Gateway</html>".into(),
        });
        assert!(matches!(err, TelegramError::Http(_)), "{err:?}");
        assert_eq!(err.log_source(), LogSource::Server);
    }

    #[test]
    fn rejections_report_as_telegram() {
        assert_eq!(
            TelegramError::Rejected("Unauthorized".into()).log_source(),
            LogSource::Telegram
        );
    }

    #[test]
    fn flood_wait_keeps_requested_delay() {
        let err = TelegramError::from(teloxide::RequestError::RetryAfter(
            teloxide::types::Seconds::from_seconds(30),
        ));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(err.log_source(), LogSource::Telegram);
        assert_eq!(err.to_string(), "telegram asked to retry after 30s");
    }

    #[test]
    fn everything_else_reports_as_system() {
        for err in [
            TelegramError::Network("reset".into()),
            TelegramError::Unexpected("bad json".into()),
            TelegramError::Timeout,
            TelegramError::MissingBotToken,
        ] {
            assert_eq!(err.log_source(), LogSource::System, "{err}");
        }
    }

    #[test]
    fn only_flood_wait_carries_a_delay() {
        assert_eq!(TelegramError::Network("reset".into()).retry_after(), None);
        assert_eq!(TelegramError::Rejected("Forbidden".into()).retry_after(), None);
    }
}
