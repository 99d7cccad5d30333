//! `send` and `status` commands.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use estacionamiento_core::{AppConfig, TelegramConfig};
use estacionamiento_telegram::{BotApi, FileOffsetStore, TelegramService};

use crate::output::{print_error, print_header, print_status, print_success, print_warning};

#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Target chat id
    #[arg(long, allow_negative_numbers = true)]
    pub chat_id: i64,

    /// Message text
    pub text: String,
}

pub async fn send(config: &AppConfig, args: SendArgs, use_colors: bool) -> Result<()> {
    let service = TelegramService::new(&config.telegram).context(
        "No bot token available. Set ESTACIONAMIENTO_TELEGRAM_BOT_TOKEN or telegram.bot_token",
    )?;
    let bot = service.bot().context("Failed to create Telegram client")?;

    print!("  Sending message to chat {}...", args.chat_id);
    io::stdout().flush()?;

    match bot.send_message(args.chat_id, &args.text).await {
        Ok(()) => {
            println!();
            print_success(use_colors, "Message sent!");
            Ok(())
        }
        Err(e) => {
            println!();
            print_error(use_colors, &format!("Failed to send message: {e}"));
            anyhow::bail!("Send failed");
        }
    }
}

pub fn status(config_path: &Path, config: &AppConfig, use_colors: bool) -> Result<()> {
    print_header(use_colors, "Monitor de Estacionamiento");

    if config_path.exists() {
        print_success(use_colors, &format!("Config: {}", config_path.display()));
    } else {
        print_status(
            use_colors,
            &format!("Config: {} not found, using defaults", config_path.display()),
        );
    }

    let has_env = std::env::var(TelegramConfig::TOKEN_ENV).is_ok();
    match TelegramService::new(&config.telegram) {
        Ok(service) => {
            let origin = if config
                .telegram
                .bot_token
                .as_deref()
                .is_some_and(|t| !t.trim().is_empty())
            {
                "config"
            } else {
                "env"
            };
            print_success(
                use_colors,
                &format!("Bot token ({origin}): {}", service.bot_token_masked()),
            );
        }
        Err(_) => print_error(
            use_colors,
            &format!(
                "Bot token: not configured ({} {})",
                TelegramConfig::TOKEN_ENV,
                if has_env { "set but empty" } else { "not set" }
            ),
        ),
    }

    print_status(
        use_colors,
        &format!(
            "Polling: {}s long poll, {}s retry delay",
            config.telegram.poll_timeout_secs, config.telegram.retry_delay_secs
        ),
    );
    if let Some(url) = &config.telegram.api_url {
        print_status(use_colors, &format!("Bot API server: {url}"));
    }

    let store = FileOffsetStore::new(&config.telegram.state_file);
    match store.load() {
        Ok(Some(state)) => print_success(
            use_colors,
            &format!(
                "Offset: last_update_id = {} (updated {})",
                state.last_update_id,
                state.updated.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        ),
        Ok(None) => print_status(
            use_colors,
            &format!(
                "Offset: {} not found, polling starts from 0",
                store.path().display()
            ),
        ),
        Err(e) => print_warning(use_colors, &format!("Offset: unreadable state file: {e}")),
    }

    match config.conversation.idle_timeout() {
        Some(ttl) => print_status(
            use_colors,
            &format!("Guest registrations expire after {} min idle", ttl.num_minutes()),
        ),
        None => print_status(use_colors, "Guest registrations never expire"),
    }
    print_status(
        use_colors,
        &format!("Activity log keeps {} entries", config.activity_log.capacity),
    );

    let bluetooth = &config.bluetooth;
    if !bluetooth.permissions_granted {
        print_warning(use_colors, "Bluetooth: permissions not granted");
    } else if !bluetooth.radio_enabled {
        print_warning(use_colors, "Bluetooth: radio disabled");
    } else {
        print_status(
            use_colors,
            &format!(
                "Bluetooth: {} BLE and {} classic scripted sightings",
                bluetooth.low_energy.len(),
                bluetooth.classic.len()
            ),
        );
    }

    Ok(())
}
