//! `run` command: start monitoring, stop on Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use estacionamiento_core::{
    ActivityLog, AppConfig, EnqueueOutcome, LogSource, SchedulerError, SystemStatus,
    WorkScheduler,
};
use estacionamiento_telegram::{TelegramService, UpdatePoller};
use tracing::{info, warn};

use crate::presence::ForegroundPresence;

/// Name under which the polling loop is scheduled.
pub const POLLING_WORK: &str = "telegram_polling_work";

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(config: AppConfig) -> Result<()> {
    let log = Arc::new(ActivityLog::new(config.activity_log.capacity));
    let status = Arc::new(SystemStatus::new(log));

    let service = TelegramService::new(&config.telegram).context(
        "No bot token available. Set ESTACIONAMIENTO_TELEGRAM_BOT_TOKEN or telegram.bot_token",
    )?;
    info!(?service, "Starting parking monitor");
    let poller = service
        .poller(Arc::clone(&status), &config.conversation)
        .context("Failed to create Telegram client")?;

    let scheduler = WorkScheduler::new();
    start_monitoring(&scheduler, &status, poller);
    let presence = ForegroundPresence::show(status.subscribe())?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    presence.println("Deteniendo monitoreo...");
    let stopped = stop_monitoring(&scheduler, &status).await;
    presence.finish();
    stopped?;

    info!("Parking monitor stopped");
    Ok(())
}

/// Schedule the polling loop unless it is already running, and mark the
/// system as running either way.
pub fn start_monitoring(
    scheduler: &WorkScheduler,
    status: &SystemStatus,
    poller: UpdatePoller,
) -> EnqueueOutcome {
    let outcome = scheduler.enqueue_unique(POLLING_WORK, move |cancel| poller.run(cancel));
    status.set_system_running(true);
    if outcome == EnqueueOutcome::AlreadyScheduled {
        status
            .log()
            .info(LogSource::System, "El monitoreo ya está en ejecución.");
    }
    outcome
}

/// Cancel the polling loop and wait for it to wind down.
pub async fn stop_monitoring(scheduler: &WorkScheduler, status: &SystemStatus) -> Result<()> {
    status.set_system_running(false);
    if !scheduler.cancel(POLLING_WORK) {
        return Ok(());
    }

    match scheduler.join(POLLING_WORK, STOP_TIMEOUT).await {
        Ok(()) => Ok(()),
        Err(e @ SchedulerError::StopTimeout { .. }) => {
            warn!(error = %e, "Polling loop aborted");
            Ok(())
        }
        Err(e) => Err(e).context("Polling loop failed"),
    }
}
