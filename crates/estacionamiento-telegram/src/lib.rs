//! # estacionamiento-telegram
//!
//! Telegram long-polling for the parking monitor.
//!
//! - [`BotApi`] / [`TelegramBot`]: `getUpdates` and `sendMessage` over teloxide,
//!   with failures classified into [`TelegramError`]
//! - [`OffsetStore`]: durable last-handled update id
//! - [`UpdatePoller`]: the fetch, filter, persist and reply loop
//! - [`TelegramService`]: wiring from configuration

mod api;
mod error;
pub mod offset;
pub mod poller;
mod service;

pub use api::{BotApi, Message, TelegramBot, Update};
pub use error::{TelegramError, TelegramResult};
pub use offset::{FileOffsetStore, MemoryOffsetStore, OffsetState, OffsetStore};
pub use poller::{PollSettings, UpdatePoller};
pub use service::TelegramService;
