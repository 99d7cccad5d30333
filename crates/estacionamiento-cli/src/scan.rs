//! `scan` command: run the device-scan façade and list what it found.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use estacionamiento_core::{
    ActivityLog, AppConfig, BluetoothConfig, BluetoothDevice, DeviceScanner, SimulatedSource,
    SourceKind, StaticCapability, SystemStatus,
};

use crate::output::{print_header, print_status, print_warning};

#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// How long to scan, in seconds
    #[arg(long, default_value_t = 10)]
    pub seconds: u64,
}

pub async fn run(config: &AppConfig, args: ScanArgs, use_colors: bool) -> Result<()> {
    let status = Arc::new(SystemStatus::new(Arc::new(ActivityLog::new(
        config.activity_log.capacity,
    ))));
    let scanner = scanner_from_config(&config.bluetooth, Arc::clone(&status));

    if !scanner.start().await {
        for entry in status.log().recent(1) {
            print_warning(use_colors, &entry.message);
        }
        return Ok(());
    }

    tokio::select! {
        () = tokio::time::sleep(Duration::from_secs(args.seconds)) => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    scanner.stop().await;

    let devices = scanner.registry().snapshot();
    print_header(use_colors, &format!("Dispositivos encontrados: {}", devices.len()));
    for device in &devices {
        print_status(use_colors, &device_line(device));
    }
    Ok(())
}

pub fn scanner_from_config(config: &BluetoothConfig, status: Arc<SystemStatus>) -> DeviceScanner {
    DeviceScanner::new(
        Arc::new(SimulatedSource::new(
            SourceKind::LowEnergy,
            config.low_energy.clone(),
        )),
        Arc::new(SimulatedSource::new(SourceKind::Classic, config.classic.clone())),
        Arc::new(StaticCapability {
            radio_enabled: config.radio_enabled,
            permissions_granted: config.permissions_granted,
        }),
        status,
    )
}

fn device_line(device: &BluetoothDevice) -> String {
    format!(
        "{:<32} {:<18} {:>4} dBm",
        device.name.as_deref().unwrap_or("-"),
        device.address,
        device.rssi
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use estacionamiento_core::{LogLevel, ServiceStatus, SimulatedDiscovery};

    fn sighting(name: Option<&str>, address: &str, rssi: Option<i32>) -> SimulatedDiscovery {
        SimulatedDiscovery {
            name: name.map(str::to_string),
            address: address.to_string(),
            rssi,
            after_ms: 0,
        }
    }

    #[tokio::test]
    async fn configured_sightings_are_merged() {
        let config = BluetoothConfig {
            low_energy: vec![
                sighting(Some("Barrera"), "AA:01", Some(-50)),
                sighting(None, "AA:02", Some(-70)),
            ],
            classic: vec![sighting(Some("Barrera copia"), "AA:01", None)],
            ..BluetoothConfig::default()
        };
        let status = Arc::new(SystemStatus::default());
        let scanner = scanner_from_config(&config, Arc::clone(&status));

        assert!(scanner.start().await);
        let mut devices = scanner.devices();
        tokio::time::timeout(Duration::from_secs(2), devices.wait_for(|d| d.len() == 2))
            .await
            .unwrap()
            .unwrap();
        scanner.stop().await;

        assert_eq!(scanner.registry().len(), 2);
        assert_eq!(status.snapshot().bluetooth_status, ServiceStatus::Inactive);
    }

    #[tokio::test]
    async fn disabled_radio_is_reported() {
        let config = BluetoothConfig {
            radio_enabled: false,
            ..BluetoothConfig::default()
        };
        let status = Arc::new(SystemStatus::default());
        let scanner = scanner_from_config(&config, Arc::clone(&status));

        assert!(!scanner.start().await);
        assert_eq!(status.log().recent(1)[0].level, LogLevel::Warning);
    }

    #[test]
    fn device_line_lists_fields() {
        let line = device_line(&BluetoothDevice {
            name: Some("Barrera".into()),
            address: "AA:01".into(),
            rssi: -55,
        });
        assert!(line.starts_with("Barrera"));
        assert!(line.contains("AA:01"));
        assert!(line.ends_with("-55 dBm"));
    }
}
