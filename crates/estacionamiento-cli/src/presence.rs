//! Persistent terminal indicator shown while monitoring runs.

use std::time::Duration;

use anyhow::{Context, Result};
use estacionamiento_core::{ServiceStatus, SystemState};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const TITLE: &str = "Monitor de Estacionamiento Activo";
const LISTENING: &str = "Escuchando comandos de Telegram...";

/// Spinner that mirrors the Telegram status until dropped or finished.
pub struct ForegroundPresence {
    spinner: ProgressBar,
    updater: JoinHandle<()>,
}

impl ForegroundPresence {
    pub fn show(mut states: watch::Receiver<SystemState>) -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .context("invalid spinner template")?,
        );
        spinner.set_message(presence_message(&states.borrow_and_update()));
        spinner.enable_steady_tick(Duration::from_millis(100));

        let bar = spinner.clone();
        let updater = tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let message = presence_message(&states.borrow_and_update());
                bar.set_message(message);
            }
        });

        Ok(Self { spinner, updater })
    }

    /// Print a line above the spinner without tearing it.
    pub fn println(&self, line: impl AsRef<str>) {
        self.spinner.println(line);
    }

    pub fn finish(self) {
        self.updater.abort();
        self.spinner.finish_and_clear();
    }
}

/// Spinner text for a status snapshot.
pub fn presence_message(state: &SystemState) -> String {
    match state.telegram_status {
        ServiceStatus::Active => format!("{TITLE}: {LISTENING}"),
        ServiceStatus::Starting => format!("{TITLE}: conectando con Telegram..."),
        ServiceStatus::Error => {
            format!("{TITLE}: error de conexión con Telegram, reintentando...")
        }
        ServiceStatus::Inactive => format!("{TITLE}: detenido"),
    }
}
