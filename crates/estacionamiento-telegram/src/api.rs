use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use estacionamiento_core::{ActivityLog, LogSource};
use tracing::debug;

use crate::error::{TelegramError, TelegramResult};

/// Slack added to the client timeout on top of the long-poll window, so the
/// server closes an idle poll before the client gives up on it.
const CLIENT_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// One entry returned by `getUpdates`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub update_id: i64,
    /// `None` for non-message updates and messages without text.
    pub message: Option<Message>,
}

/// A text message received from a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub chat_id: i64,
    pub text: String,
    pub sender: Option<String>,
    pub date: DateTime<Utc>,
}

impl Message {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            sender: None,
            date: Utc::now(),
        }
    }
}

/// Trait abstracting Telegram bot operations for testability.
///
/// Production code uses [`TelegramBot`]; tests can provide a mock implementation.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Long-poll for updates with `update_id >= offset`.
    ///
    /// A transport timeout is not an error: it yields an empty batch.
    async fn get_updates(&self, offset: i64, timeout_secs: u32) -> TelegramResult<Vec<Update>>;

    /// Send a plain-text message to the given chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> TelegramResult<()>;
}

/// Wraps a `teloxide::Bot` configured for long polling.
pub struct TelegramBot {
    bot: teloxide::Bot,
    activity: Option<Arc<ActivityLog>>,
}

impl TelegramBot {
    /// Create a bot whose HTTP client outlives a `poll_timeout_secs` long poll.
    pub fn new(token: &str, poll_timeout_secs: u32) -> TelegramResult<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(Duration::from_secs(u64::from(poll_timeout_secs)) + CLIENT_TIMEOUT_MARGIN)
            .build()
            .map_err(|e| TelegramError::Startup(e.to_string()))?;

        Ok(Self {
            bot: teloxide::Bot::with_client(token, client),
            activity: None,
        })
    }

    /// Send requests to `url` instead of `https://api.telegram.org`.
    pub fn with_api_url(mut self, url: &str) -> TelegramResult<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| TelegramError::Startup(format!("invalid api_url {url}: {e}")))?;
        self.bot = self.bot.set_api_url(parsed);
        Ok(self)
    }

    /// Report successful fetches to `log`.
    #[must_use]
    pub fn with_activity_log(mut self, log: Arc<ActivityLog>) -> Self {
        self.activity = Some(log);
        self
    }

    fn convert(update: teloxide::types::Update) -> Update {
        use teloxide::types::UpdateKind;

        let message = match update.kind {
            UpdateKind::Message(ref msg) => msg.text().map(|text| Message {
                chat_id: msg.chat.id.0,
                text: text.to_string(),
                sender: msg.chat.username().map(str::to_string),
                date: msg.date,
            }),
            _ => None,
        };

        Update {
            update_id: i64::from(update.id.0),
            message,
        }
    }
}

#[async_trait]
impl BotApi for TelegramBot {
    async fn get_updates(&self, offset: i64, timeout_secs: u32) -> TelegramResult<Vec<Update>> {
        use teloxide::payloads::GetUpdatesSetters;
        use teloxide::requests::Requester;

        let offset = i32::try_from(offset)
            .map_err(|_| TelegramError::Unexpected(format!("offset {offset} out of range")))?;

        let result = self
            .bot
            .get_updates()
            .offset(offset)
            .timeout(timeout_secs)
            .await;

        let updates = match result {
            Ok(updates) => updates,
            Err(e) => match TelegramError::from(e) {
                TelegramError::Timeout => {
                    debug!("Long poll timed out with no updates");
                    return Ok(Vec::new());
                }
                other => return Err(other),
            },
        };

        if !updates.is_empty()
            && let Some(log) = &self.activity
        {
            log.success(
                LogSource::Telegram,
                format!("Se recibieron {} actualizaciones.", updates.len()),
            );
        }

        Ok(updates.into_iter().map(Self::convert).collect())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> TelegramResult<()> {
        use teloxide::requests::Requester;

        self.bot
            .send_message(teloxide::types::ChatId(chat_id), text)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_builds_without_network() {
        let bot = TelegramBot::new("123456:test-token", 60);
        assert!(bot.is_ok());
    }

    /// Answers every request with `502 Bad Gateway` and an HTML page.
    async fn bad_gateway_server() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 4096];
                    loop {
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        if n == 0 {
                            return;
                        }
                        request.extend_from_slice(&buf[..n]);
                        if request_complete(&request) {
                            break;
                        }
                    }
                    let body = "<html>Bad Gateway</html>";
                    let response = format!(
                        "HTTP/1.1 502 Bad Gateway\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}/")
    }

    /// Headers received and, if announced, the whole body too.
    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..head_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        request.len() >= head_end + 4 + content_length
    }

    #[tokio::test]
    async fn bad_gateway_page_is_reported_as_server_failure() {
        let url = bad_gateway_server().await;
        let bot = TelegramBot::new("123456:test-token", 1)
            .unwrap()
            .with_api_url(&url)
            .unwrap();

        let err = bot.get_updates(1, 1).await.unwrap_err();

        assert!(matches!(err, TelegramError::Http(_)), "{err:?}");
        assert_eq!(err.log_source(), LogSource::Server);
        assert!(err.to_string().contains("Bad Gateway"), "{err}");
    }

    #[tokio::test]
    async fn send_through_bad_gateway_is_reported_as_server_failure() {
        let url = bad_gateway_server().await;
        let bot = TelegramBot::new("123456:test-token", 1)
            .unwrap()
            .with_api_url(&url)
            .unwrap();

        let err = bot.send_message(7, "REPORTE").await.unwrap_err();
        assert_eq!(err.log_source(), LogSource::Server);
    }

    #[test]
    fn malformed_api_url_is_a_startup_error() {
        let bot = TelegramBot::new("123456:test-token", 1).unwrap();
        assert!(matches!(
            bot.with_api_url("not a url"),
            Err(TelegramError::Startup(_))
        ));
    }

    #[test]
    fn message_new_has_no_sender() {
        let msg = Message::new(7, "INICIO");
        assert_eq!(msg.chat_id, 7);
        assert_eq!(msg.text, "INICIO");
        assert!(msg.sender.is_none());
    }
}
