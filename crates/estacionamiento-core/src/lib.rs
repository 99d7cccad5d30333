//! # estacionamiento-core
//!
//! Transport-agnostic core of the parking access monitor.
//!
//! This crate provides:
//! - The shared service-health aggregate observed by presentation layers
//! - A bounded, newest-first activity log
//! - The per-chat guest-registration conversation and the shift command table
//! - The Bluetooth device-scan façade that merges two discovery sources
//! - Unique named work scheduling with cancel-by-name
//! - YAML configuration loading

pub mod activity_log;
pub mod commands;
mod config;
pub mod conversation;
pub mod devices;
mod engine;
pub mod scheduler;
pub mod status;

pub use activity_log::{ActivityLog, LogEntry, LogLevel, LogSource};
pub use commands::{Command, RecognitionLabel, ShiftState};
pub use config::{
    ActivityLogConfig, AppConfig, BluetoothConfig, ConfigError, ConversationConfig,
    TelegramConfig,
};
pub use conversation::{ConversationState, ConversationStore, GuestDraft};
pub use devices::{
    BluetoothDevice, DeviceRegistry, DeviceScanner, DiscoverySource, ScanCapability, ScanError,
    SimulatedDiscovery, SimulatedSource, SourceKind, StaticCapability,
};
pub use engine::ConversationEngine;
pub use scheduler::{EnqueueOutcome, SchedulerError, WorkScheduler};
pub use status::{ServiceStatus, SystemState, SystemStatus};
