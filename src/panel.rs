// MIT License - Copyright (c) 2026 Peter Wright
// Owning lifecycle for one alarm panel

use std::sync::Arc;

use rumqttc::QoS;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};

use crate::aggregator::{Aggregator, Snapshot};
use crate::command::{CodeFormat, Command};
use crate::config::ConnectionConfig;
use crate::devices::{InputView, PartitionView};
use crate::error::{PulsonError, Result};
use crate::event::EventReceiver;
use crate::processor::StreamProcessor;
use crate::store::FieldMap;
use crate::topic::Category;
use crate::transport::MqttConnection;

/// One Pulson alarm panel as seen through its MQTT broker.
///
/// Owns the aggregator, the stream processor that feeds it and the broker
/// connection. Reads and observer registration work whether or not the
/// session is up; commands are dropped with a warning while disconnected.
///
/// # Example
///
/// ```no_run
/// use pulson_alarm::{Category, ConnectionConfig, PulsonPanel};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ConnectionConfig::builder()
///         .host("mqtt.example.net")
///         .username("installer")
///         .password("secret")
///         .serial_number("PS0001")
///         .build();
///
///     let panel = PulsonPanel::new(config);
///     panel.register_added(Category::Inputs, |id| println!("new input {id}"));
///     panel.start_with_retry().await?;
///
///     panel.arm("1", None).await;
///
///     tokio::signal::ctrl_c().await?;
///     panel.stop().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct PulsonPanel {
    aggregator: Arc<Aggregator>,
    processor: Arc<StreamProcessor>,
    connection: MqttConnection,
}

impl PulsonPanel {
    pub fn new(config: ConnectionConfig) -> Self {
        let aggregator = Arc::new(Aggregator::new());
        let processor = Arc::new(StreamProcessor::new(
            Arc::clone(&aggregator),
            config.serial_number.clone(),
        ));
        let connection = MqttConnection::new(config, aggregator.event_sender());
        Self {
            aggregator,
            processor,
            connection,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        self.connection.config()
    }

    // --- Lifecycle ---

    /// Single start attempt without retries.
    pub async fn start(&self) -> Result<()> {
        self.connection.start(Arc::clone(&self.processor)).await
    }

    /// Start, retrying transient errors with exponential backoff.
    ///
    /// The base delay is `reconnect_delay_ms` from the config and the maximum
    /// number of retries is `max_connect_retries`.
    pub async fn start_with_retry(&self) -> Result<()> {
        let max_retries = self.config().max_connect_retries;
        let base_delay_ms = self.config().reconnect_delay_ms;

        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay_ms = base_delay_ms * (1 << (attempt - 1).min(4));
                warn!(
                    "Connection attempt {} failed, retrying in {:.1}s...",
                    attempt,
                    delay_ms as f64 / 1000.0
                );
                sleep(Duration::from_millis(delay_ms)).await;
            }

            match self.start().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if !e.is_retryable() || attempt == max_retries {
                        return Err(e);
                    }
                    warn!("Connection error (attempt {}): {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(PulsonError::NotConnected))
    }

    /// Tear down the current session and open a new one. Known state is kept.
    pub async fn reconnect(&self) -> Result<()> {
        info!("Reconnecting to MQTT broker");
        self.connection.stop().await;
        self.start().await
    }

    pub async fn stop(&self) {
        self.connection.stop().await;
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    // --- Commands ---

    /// Send a command, authorized with `code` or the configured user code.
    ///
    /// Returns whether the command was handed to the transport. A sent block
    /// command is also applied to local state right away.
    pub async fn send(&self, command: &Command, code: Option<&str>) -> bool {
        let subtopic = command.subtopic();
        let sent = match command.code_format() {
            CodeFormat::Slashed => {
                self.connection
                    .publish_with_code(
                        &subtopic,
                        command.value(),
                        command.retain(),
                        QoS::AtMostOnce,
                        code,
                    )
                    .await
            }
            CodeFormat::Concatenated => {
                let code = code.unwrap_or(&self.config().user_code);
                self.connection
                    .publish(
                        &subtopic,
                        &command.payload(code),
                        command.retain(),
                        QoS::AtMostOnce,
                    )
                    .await
            }
        };

        if sent {
            info!("Sent {command:?}");
            if let Some((field, value)) = command.expected_field() {
                self.aggregator
                    .update(command.category(), command.target(), field, value);
            }
        }
        sent
    }

    pub async fn arm(&self, partition: &str, code: Option<&str>) -> bool {
        let command = Command::Arm {
            partition: partition.to_string(),
        };
        self.send(&command, code).await
    }

    pub async fn arm_night(&self, partition: &str, code: Option<&str>) -> bool {
        let command = Command::ArmNight {
            partition: partition.to_string(),
        };
        self.send(&command, code).await
    }

    pub async fn disarm(&self, partition: &str, code: Option<&str>) -> bool {
        let command = Command::Disarm {
            partition: partition.to_string(),
        };
        self.send(&command, code).await
    }

    /// Block or unblock an input line with the configured user code.
    pub async fn set_input_block(&self, input: &str, blocked: bool) -> bool {
        let command = Command::Block {
            input: input.to_string(),
            blocked,
        };
        self.send(&command, None).await
    }

    // --- Boundary API ---

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn get_state(&self, category: Category, id: &str) -> FieldMap {
        self.aggregator.get_state(category, id)
    }

    pub fn list_ids(&self, category: Category) -> Vec<String> {
        self.aggregator.list_ids(category)
    }

    pub fn input(&self, id: &str) -> InputView {
        self.aggregator.input(id)
    }

    pub fn partition(&self, id: &str) -> PartitionView {
        self.aggregator.partition(id)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.aggregator.snapshot()
    }

    pub fn register_entity_changed<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.aggregator.register_entity_changed(callback);
    }

    pub fn register_added<F>(&self, category: Category, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.aggregator.register_added(category, callback);
    }

    /// Subscribe to panel events.
    pub fn subscribe(&self) -> EventReceiver {
        self.aggregator.subscribe()
    }
}
