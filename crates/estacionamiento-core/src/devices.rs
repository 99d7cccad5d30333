//! Bluetooth device-scan façade.
//!
//! Two differently paced discovery sources (a balanced-mode low-energy scan and
//! classic discovery) feed one [`DeviceRegistry`]. The registry keeps a single
//! entry per address: the first sighting wins and later events for the same
//! address are dropped. The list is kept sorted by name, descending.
//!
//! No pairing or connection is ever attempted; this is scan-and-list only.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::activity_log::LogSource;
use crate::status::{ServiceStatus, SystemStatus};

/// RSSI recorded for classic-discovery sightings, which carry no signal value.
pub const CLASSIC_DEFAULT_RSSI: i32 = -100;

/// A discovered device. `address` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothDevice {
    pub name: Option<String>,
    pub address: String,
    pub rssi: i32,
}

/// Errors raised by discovery sources.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The source was not running when asked to stop.
    #[error("{0} scan already stopped")]
    AlreadyStopped(SourceKind),

    /// The platform scanner reported a failure code.
    #[error("{kind} scan failed with code {code}")]
    Failed { kind: SourceKind, code: i32 },
}

/// Which discovery mechanism produced a sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    LowEnergy,
    Classic,
}

impl SourceKind {
    fn unnamed_placeholder(self) -> &'static str {
        match self {
            SourceKind::LowEnergy => "Dispositivo sin Nombre",
            SourceKind::Classic => "Dispositivo Clásico sin Nombre",
        }
    }

    /// Build the domain record for a raw sighting from this source.
    pub fn sighting(self, name: Option<String>, address: &str, rssi: Option<i32>) -> BluetoothDevice {
        let name = name.unwrap_or_else(|| self.unnamed_placeholder().to_string());
        let rssi = match self {
            SourceKind::LowEnergy => rssi.unwrap_or(CLASSIC_DEFAULT_RSSI),
            SourceKind::Classic => CLASSIC_DEFAULT_RSSI,
        };
        BluetoothDevice {
            name: Some(name),
            address: address.to_string(),
            rssi,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SourceKind::LowEnergy => "BLE",
            SourceKind::Classic => "classic",
        })
    }
}

/// De-duplicated, observable device list.
pub struct DeviceRegistry {
    devices: watch::Sender<Vec<BluetoothDevice>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let (devices, _) = watch::channel(Vec::new());
        Self { devices }
    }

    /// Insert `device` unless its address is already known.
    ///
    /// The presence check and the insert happen under one lock, so two
    /// simultaneous sightings of a new address insert it once. Returns `true`
    /// if the device was added.
    pub fn add_if_new(&self, device: BluetoothDevice) -> bool {
        self.devices.send_if_modified(|list| {
            if list.iter().any(|d| d.address == device.address) {
                return false;
            }
            list.push(device);
            list.sort_by(|a, b| b.name.cmp(&a.name));
            true
        })
    }

    pub fn clear(&self) {
        self.devices.send_replace(Vec::new());
    }

    pub fn snapshot(&self) -> Vec<BluetoothDevice> {
        self.devices.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.devices.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.borrow().is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<BluetoothDevice>> {
        self.devices.subscribe()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A discovery mechanism that reports sightings into a registry.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Begin reporting sightings into `registry`.
    async fn start(&self, registry: Arc<DeviceRegistry>) -> Result<(), ScanError>;

    /// Stop reporting. Returns [`ScanError::AlreadyStopped`] if not running.
    async fn stop(&self) -> Result<(), ScanError>;
}

/// Preconditions for scanning: an enabled radio and granted permissions.
pub trait ScanCapability: Send + Sync {
    fn radio_enabled(&self) -> bool;
    fn permissions_granted(&self) -> bool;
}

/// Fixed capability answers, taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct StaticCapability {
    pub radio_enabled: bool,
    pub permissions_granted: bool,
}

impl ScanCapability for StaticCapability {
    fn radio_enabled(&self) -> bool {
        self.radio_enabled
    }

    fn permissions_granted(&self) -> bool {
        self.permissions_granted
    }
}

/// Coalesces both discovery sources into one [`DeviceRegistry`].
pub struct DeviceScanner {
    registry: Arc<DeviceRegistry>,
    low_energy: Arc<dyn DiscoverySource>,
    classic: Arc<dyn DiscoverySource>,
    capability: Arc<dyn ScanCapability>,
    status: Arc<SystemStatus>,
    scanning: Mutex<bool>,
}

impl DeviceScanner {
    pub fn new(
        low_energy: Arc<dyn DiscoverySource>,
        classic: Arc<dyn DiscoverySource>,
        capability: Arc<dyn ScanCapability>,
        status: Arc<SystemStatus>,
    ) -> Self {
        Self {
            registry: Arc::new(DeviceRegistry::new()),
            low_energy,
            classic,
            capability,
            status,
            scanning: Mutex::new(false),
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn devices(&self) -> watch::Receiver<Vec<BluetoothDevice>> {
        self.registry.subscribe()
    }

    pub async fn is_scanning(&self) -> bool {
        *self.scanning.lock().await
    }

    /// Start both sources. No-op if already scanning or if the capability
    /// check fails. Returns `true` if this call started a scan.
    pub async fn start(&self) -> bool {
        let log = self.status.log();

        if !self.capability.permissions_granted() {
            log.error(
                LogSource::Bluetooth,
                "Faltan permisos de Bluetooth/Localización.",
            );
            return false;
        }
        if !self.capability.radio_enabled() {
            log.warning(LogSource::Bluetooth, "Bluetooth está desactivado.");
            return false;
        }

        let mut scanning = self.scanning.lock().await;
        if *scanning {
            debug!("Scan already running");
            return false;
        }
        *scanning = true;

        self.status.set_bluetooth_status(ServiceStatus::Starting);
        self.registry.clear();
        log.info(
            LogSource::Bluetooth,
            "Iniciando escaneo DUAL (BLE + Clásico)...",
        );

        let (le, classic) = tokio::join!(
            self.low_energy.start(Arc::clone(&self.registry)),
            self.classic.start(Arc::clone(&self.registry)),
        );

        let mut started = 0;
        for result in [le, classic] {
            match result {
                Ok(()) => started += 1,
                Err(e) => log.error(LogSource::Bluetooth, format!("Fallo en escaneo: {e}")),
            }
        }

        self.status.set_bluetooth_status(if started > 0 {
            ServiceStatus::Active
        } else {
            ServiceStatus::Error
        });
        true
    }

    /// Stop both sources. Tolerates sources that already stopped.
    pub async fn stop(&self) {
        let mut scanning = self.scanning.lock().await;
        if !*scanning {
            return;
        }
        *scanning = false;

        self.status
            .log()
            .info(LogSource::Bluetooth, "Deteniendo escaneos...");

        let (le, classic) = tokio::join!(self.low_energy.stop(), self.classic.stop());
        for (kind, result) in [(self.low_energy.kind(), le), (self.classic.kind(), classic)] {
            if let Err(e) = result {
                debug!(source = %kind, error = %e, "Ignoring stop failure");
            }
        }

        self.status.set_bluetooth_status(ServiceStatus::Inactive);
        info!(devices = self.registry.len(), "Scan stopped");
    }
}

/// One scripted sighting for [`SimulatedSource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedDiscovery {
    #[serde(default)]
    pub name: Option<String>,
    pub address: String,
    #[serde(default)]
    pub rssi: Option<i32>,
    /// Delay after the previous sighting.
    #[serde(default)]
    pub after_ms: u64,
}

/// A discovery source that replays a fixed script of sightings.
///
/// Stands in for the platform radio on hosts without one.
pub struct SimulatedSource {
    kind: SourceKind,
    script: Vec<SimulatedDiscovery>,
    running: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl SimulatedSource {
    pub fn new(kind: SourceKind, script: Vec<SimulatedDiscovery>) -> Self {
        Self {
            kind,
            script,
            running: Mutex::new(None),
        }
    }
}

#[async_trait]
impl DiscoverySource for SimulatedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn start(&self, registry: Arc<DeviceRegistry>) -> Result<(), ScanError> {
        let mut running = self.running.lock().await;
        if let Some((token, _)) = running.take() {
            token.cancel();
        }

        let token = CancellationToken::new();
        let child = token.clone();
        let kind = self.kind;
        let script = self.script.clone();

        let handle = tokio::spawn(async move {
            for step in script {
                tokio::select! {
                    () = child.cancelled() => return,
                    () = tokio::time::sleep(Duration::from_millis(step.after_ms)) => {}
                }
                let device = kind.sighting(step.name, &step.address, step.rssi);
                debug!(%kind, address = %device.address, "Device sighted");
                registry.add_if_new(device);
            }
        });

        *running = Some((token, handle));
        Ok(())
    }

    async fn stop(&self) -> Result<(), ScanError> {
        match self.running.lock().await.take() {
            Some((token, handle)) => {
                token.cancel();
                let _ = handle.await;
                Ok(())
            }
            None => Err(ScanError::AlreadyStopped(self.kind)),
        }
    }
}
