// MIT License - Copyright (c) 2026 Peter Wright
// Pulson alarm panel state over MQTT
//
//! # pulson-alarm
//!
//! Live state of a Pulson alarm panel's inputs (lines) and partitions,
//! aggregated from the panel's MQTT topic namespace, plus the arm, disarm
//! and line-block commands the panel accepts.
//!
//! The panel publishes every field of every entity on its own topic,
//! `system/{serial}/{inputs|partitions}/{id}/{field}`. This crate keeps the
//! latest raw value of each field, tells observers when something changed,
//! and offers lenient typed readers on top of the raw text.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pulson_alarm::{Category, ConnectionConfig, PulsonPanel};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConnectionConfig::builder()
//!         .host("mqtt.example.net")
//!         .username("installer")
//!         .password("secret")
//!         .serial_number("PS0001")
//!         .build();
//!
//!     let panel = PulsonPanel::new(config);
//!     let mut events = panel.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     panel.start_with_retry().await?;
//!     panel.disarm("1", Some("1234")).await;
//!
//!     tokio::signal::ctrl_c().await?;
//!     for id in panel.list_ids(Category::Partitions) {
//!         println!("partition {id}: {}", panel.partition(&id).state());
//!     }
//!     panel.stop().await;
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod command;
pub mod config;
pub mod devices;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod panel;
pub mod processor;
pub mod store;
pub mod topic;
pub mod transport;

// Re-exports for convenience
pub use aggregator::{Aggregator, Snapshot};
pub use command::{CodeFormat, Command};
pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use devices::{AlarmPanelState, InputView, LineStatus, PartitionState, PartitionView};
pub use error::{PulsonError, Result};
pub use event::{AlarmEvent, EventReceiver};
pub use panel::PulsonPanel;
pub use processor::{Disposition, DropReason, StreamProcessor};
pub use store::FieldMap;
pub use topic::{Category, ParsedUpdate};
pub use transport::{MessageHandler, MqttConnection};
