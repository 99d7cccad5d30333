//! The long-polling update loop.
//!
//! Each cycle asks for updates after the last handled id, keeps only those
//! strictly newer, advances and persists the offset once per batch, then
//! answers every message in delivery order. Failures are reported and retried
//! after a delay; only cancellation ends the loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use estacionamiento_core::{
    ConversationEngine, LogSource, ServiceStatus, SystemStatus, TelegramConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{BotApi, Message, Update};
use crate::error::TelegramError;
use crate::offset::OffsetStore;

/// Timing knobs for [`UpdatePoller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Server-side long-poll window.
    pub poll_timeout_secs: u32,
    /// Wait after a failed fetch before the next attempt.
    pub retry_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from(&TelegramConfig::default())
    }
}

impl From<&TelegramConfig> for PollSettings {
    fn from(config: &TelegramConfig) -> Self {
        Self {
            poll_timeout_secs: config.poll_timeout_secs,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        }
    }
}

/// Fetches updates and feeds their messages through a [`ConversationEngine`].
pub struct UpdatePoller {
    bot: Arc<dyn BotApi>,
    offsets: Arc<dyn OffsetStore>,
    status: Arc<SystemStatus>,
    engine: ConversationEngine,
    settings: PollSettings,
    last_update_id: i64,
}

impl UpdatePoller {
    pub fn new(
        bot: Arc<dyn BotApi>,
        offsets: Arc<dyn OffsetStore>,
        status: Arc<SystemStatus>,
        engine: ConversationEngine,
        settings: PollSettings,
    ) -> Self {
        Self {
            bot,
            offsets,
            status,
            engine,
            settings,
            last_update_id: 0,
        }
    }

    /// Highest update id handled so far.
    pub fn last_update_id(&self) -> i64 {
        self.last_update_id
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    /// Run until `cancel` fires.
    ///
    /// Cancellation does not wait for an in-flight `getUpdates` call to
    /// return: the long poll is dropped mid-request, so stopping never blocks
    /// for up to a full poll window. Nothing has been applied at that point;
    /// the same offset is requested on the next start. A batch already
    /// fetched is answered in full first, and the retry wait is cut short.
    ///
    /// When this future completes or is dropped, every status returns to its
    /// default and the running flag is cleared.
    pub async fn run(mut self, cancel: CancellationToken) {
        let _reset = scopeguard::guard(Arc::clone(&self.status), |status| {
            status.reset_all();
            info!("Telegram polling stopped, status reset");
        });

        self.status.set_telegram_status(ServiceStatus::Starting);
        self.load_offset();
        self.status.set_telegram_status(ServiceStatus::Active);
        self.status.log().info(
            LogSource::Telegram,
            "Escuchando comandos de Telegram...",
        );

        loop {
            let offset = self.last_update_id + 1;
            debug!(offset, "Fetching updates");

            let fetched = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = self.bot.get_updates(offset, self.settings.poll_timeout_secs) => result,
            };

            match fetched {
                Ok(updates) => {
                    if self.status.snapshot().telegram_status != ServiceStatus::Active {
                        self.status.set_telegram_status(ServiceStatus::Active);
                    }
                    self.process_batch(updates).await;
                    self.engine.prune_expired(Local::now().naive_local());
                }
                Err(e) => {
                    self.status.log().error(
                        e.log_source(),
                        format!("Fallo al obtener actualizaciones: {e}"),
                    );
                    self.status.set_telegram_status(ServiceStatus::Error);

                    let wait = self.retry_wait(&e);
                    debug!(?wait, "Waiting before next fetch");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }

    /// Configured retry delay, or Telegram's flood wait when that is longer.
    fn retry_wait(&self, err: &TelegramError) -> Duration {
        err.retry_after()
            .map_or(self.settings.retry_delay, |wait| wait.max(self.settings.retry_delay))
    }

    /// Handle one fetched batch. Returns how many updates were new.
    ///
    /// Updates at or below the current offset are ignored, so delivering the
    /// same batch twice has no further effect.
    pub async fn process_batch(&mut self, updates: Vec<Update>) -> usize {
        let fresh: Vec<Update> = updates
            .into_iter()
            .filter(|u| u.update_id > self.last_update_id)
            .collect();

        let Some(newest) = fresh.iter().map(|u| u.update_id).max() else {
            return 0;
        };

        self.last_update_id = newest;
        if let Err(e) = self.offsets.set_last_update_id(newest) {
            warn!(error = %e, newest, "Failed to persist update offset");
            self.status.log().warning(
                LogSource::System,
                format!("No se pudo guardar el último update_id: {e}"),
            );
        }

        self.status.log().info(
            LogSource::Telegram,
            format!("Se recibieron {} nuevos mensajes de Telegram.", fresh.len()),
        );

        let count = fresh.len();
        for update in fresh {
            if let Some(message) = update.message {
                self.handle_message(message).await;
            }
        }
        count
    }

    async fn handle_message(&mut self, message: Message) {
        let now = Local::now().naive_local();
        let reply = self.engine.handle(message.chat_id, &message.text, now);
        debug!(chat_id = message.chat_id, "Replying to message");

        if let Err(e) = self.bot.send_message(message.chat_id, &reply).await {
            self.status.log().error(
                e.log_source(),
                format!("Error al enviar mensaje a Telegram: {e}"),
            );
        }
    }

    fn load_offset(&mut self) {
        match self.offsets.last_update_id() {
            Ok(id) => {
                self.last_update_id = id;
                info!(last_update_id = id, "Loaded update offset");
            }
            Err(e) => {
                warn!(error = %e, "Failed to load update offset, starting from 0");
                self.status.log().warning(
                    LogSource::System,
                    format!("No se pudo leer el último update_id: {e}"),
                );
            }
        }
    }
}

impl std::fmt::Debug for UpdatePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdatePoller")
            .field("settings", &self.settings)
            .field("last_update_id", &self.last_update_id)
            .finish_non_exhaustive()
    }
}
