//! Aggregated service health.
//!
//! [`SystemStatus`] is the single owner of [`SystemState`]. Writers replace the
//! whole value under the channel lock, so an observer never sees a partially
//! applied update.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::activity_log::ActivityLog;

/// Coarse health of one subsystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Active,
    #[default]
    Inactive,
    Error,
    Starting,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServiceStatus::Active => "ACTIVE",
            ServiceStatus::Inactive => "INACTIVE",
            ServiceStatus::Error => "ERROR",
            ServiceStatus::Starting => "STARTING",
        })
    }
}

/// Snapshot of every service's health plus the "monitoring running" flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemState {
    pub telegram_status: ServiceStatus,
    pub bluetooth_status: ServiceStatus,
    pub api_server_status: ServiceStatus,
    pub is_system_running: bool,
}

/// Owner of the shared [`SystemState`] and the activity log.
pub struct SystemStatus {
    state: watch::Sender<SystemState>,
    log: Arc<ActivityLog>,
}

impl SystemStatus {
    pub fn new(log: Arc<ActivityLog>) -> Self {
        let (state, _) = watch::channel(SystemState::default());
        Self { state, log }
    }

    /// The activity log shared with every component reporting through us.
    pub fn log(&self) -> &Arc<ActivityLog> {
        &self.log
    }

    pub fn subscribe(&self) -> watch::Receiver<SystemState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SystemState {
        *self.state.borrow()
    }

    pub fn set_telegram_status(&self, status: ServiceStatus) {
        self.replace_with(|s| SystemState {
            telegram_status: status,
            ..s
        });
    }

    pub fn set_bluetooth_status(&self, status: ServiceStatus) {
        self.replace_with(|s| SystemState {
            bluetooth_status: status,
            ..s
        });
    }

    pub fn set_api_server_status(&self, status: ServiceStatus) {
        self.replace_with(|s| SystemState {
            api_server_status: status,
            ..s
        });
    }

    pub fn set_system_running(&self, running: bool) {
        self.replace_with(|s| SystemState {
            is_system_running: running,
            ..s
        });
    }

    pub fn is_system_running(&self) -> bool {
        self.state.borrow().is_system_running
    }

    /// Restore every field to its default in a single store.
    pub fn reset_all(&self) {
        self.state.send_replace(SystemState::default());
    }

    fn replace_with(&self, f: impl FnOnce(SystemState) -> SystemState) {
        self.state.send_modify(|current| *current = f(*current));
    }
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self::new(Arc::new(ActivityLog::default()))
    }
}

impl fmt::Debug for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemStatus")
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn all_active() -> SystemState {
        SystemState {
            telegram_status: ServiceStatus::Active,
            bluetooth_status: ServiceStatus::Active,
            api_server_status: ServiceStatus::Active,
            is_system_running: true,
        }
    }

    #[test]
    fn defaults_are_inactive_and_stopped() {
        let status = SystemStatus::default();
        let state = status.snapshot();
        assert_eq!(state.telegram_status, ServiceStatus::Inactive);
        assert_eq!(state.bluetooth_status, ServiceStatus::Inactive);
        assert_eq!(state.api_server_status, ServiceStatus::Inactive);
        assert!(!state.is_system_running);
    }

    #[test]
    fn setters_touch_only_their_field() {
        let status = SystemStatus::default();
        status.set_telegram_status(ServiceStatus::Starting);
        status.set_bluetooth_status(ServiceStatus::Error);
        status.set_api_server_status(ServiceStatus::Active);
        status.set_system_running(true);

        let state = status.snapshot();
        assert_eq!(state.telegram_status, ServiceStatus::Starting);
        assert_eq!(state.bluetooth_status, ServiceStatus::Error);
        assert_eq!(state.api_server_status, ServiceStatus::Active);
        assert!(status.is_system_running());
    }

    #[test]
    fn reset_all_restores_defaults() {
        let status = SystemStatus::default();
        status.state.send_replace(all_active());
        status.reset_all();
        assert_eq!(status.snapshot(), SystemState::default());
    }

    #[tokio::test]
    async fn reset_all_is_a_single_observed_change() {
        let status = SystemStatus::default();
        status.state.send_replace(all_active());

        let mut rx = status.subscribe();
        assert!(!rx.has_changed().unwrap());

        status.reset_all();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SystemState::default());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn concurrent_readers_never_see_torn_reset() {
        let status = Arc::new(SystemStatus::default());
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let status = Arc::clone(&status);
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    while !done.load(Ordering::Relaxed) {
                        let s = status.snapshot();
                        assert!(
                            s == SystemState::default() || s == all_active(),
                            "observed torn state: {s:?}"
                        );
                    }
                })
            })
            .collect();

        for _ in 0..2_000 {
            status.state.send_replace(all_active());
            status.reset_all();
        }
        done.store(true, Ordering::Relaxed);

        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn status_display_is_upper_case() {
        assert_eq!(ServiceStatus::Starting.to_string(), "STARTING");
        assert_eq!(ServiceStatus::default().to_string(), "INACTIVE");
    }
}
