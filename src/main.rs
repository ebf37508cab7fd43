// MIT License - Copyright (c) 2026 Peter Wright
// Monitor daemon and operator commands

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Duration, interval, sleep};
use tracing::{debug, error, info, warn};

use pulson_alarm::{AlarmEvent, Category, ConnectionConfig, PulsonPanel};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "pulson-alarm")]
#[command(about = "Track and control a Pulson alarm panel over MQTT")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Follow panel state until interrupted (default)
    Monitor,
    /// Arm a partition
    Arm {
        partition: String,
        /// Night arm instead of full arm
        #[arg(long)]
        night: bool,
        /// User code (defaults to the configured one)
        #[arg(long)]
        code: Option<String>,
    },
    /// Disarm a partition
    Disarm {
        partition: String,
        #[arg(long)]
        code: Option<String>,
    },
    /// Block an input line
    Block {
        input: String,
        /// Unblock instead
        #[arg(long)]
        off: bool,
    },
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    mqtt: MqttToml,
    #[serde(default)]
    monitor: MonitorToml,
}

#[derive(Debug, Deserialize)]
struct MqttToml {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    serial_number: String,
    #[serde(default = "default_user_code")]
    user_code: String,
    #[serde(default)]
    client_id: String,
    #[serde(default = "default_tls")]
    tls: bool,
    #[serde(default = "default_keep_alive")]
    keep_alive_secs: u64,
    #[serde(default = "default_connect_timeout")]
    connect_timeout_ms: u64,
    #[serde(default = "default_reconnect_delay")]
    reconnect_delay_ms: u64,
    #[serde(default = "default_max_connect_retries")]
    max_connect_retries: u32,
}

fn default_port() -> u16 {
    pulson_alarm::config::DEFAULT_PORT
}
fn default_user_code() -> String {
    pulson_alarm::config::DEFAULT_USER_CODE.to_string()
}
fn default_tls() -> bool {
    true
}
fn default_keep_alive() -> u64 {
    60
}
fn default_connect_timeout() -> u64 {
    5000
}
fn default_reconnect_delay() -> u64 {
    5000
}
fn default_max_connect_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize)]
struct MonitorToml {
    #[serde(default = "default_snapshot_interval")]
    snapshot_interval_secs: u64,
}

impl Default for MonitorToml {
    fn default() -> Self {
        Self {
            snapshot_interval_secs: default_snapshot_interval(),
        }
    }
}

fn default_snapshot_interval() -> u64 {
    60
}

fn build_connection_config(toml: &MqttToml) -> Result<ConnectionConfig> {
    let config = ConnectionConfig::builder()
        .host(&toml.host)
        .port(toml.port)
        .username(&toml.username)
        .password(&toml.password)
        .serial_number(&toml.serial_number)
        .user_code(&toml.user_code)
        .client_id(&toml.client_id)
        .tls(toml.tls)
        .keep_alive_secs(toml.keep_alive_secs)
        .connect_timeout_ms(toml.connect_timeout_ms)
        .reconnect_delay_ms(toml.reconnect_delay_ms)
        .max_connect_retries(toml.max_connect_retries)
        .build();
    config.validate()?;
    Ok(config)
}

fn load_config(path: &str) -> Result<(ConnectionConfig, MonitorToml)> {
    let text = std::fs::read_to_string(path).context("Failed to read config file")?;
    let config: Config = toml::from_str(&text).context("Failed to parse config file")?;
    let connection = build_connection_config(&config.mqtt).context("Invalid [mqtt] config")?;
    Ok((connection, config.monitor))
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

fn log_snapshot(panel: &PulsonPanel) {
    match serde_json::to_string(&panel.snapshot()) {
        Ok(json) => info!("Snapshot: {json}"),
        Err(e) => error!("Failed to serialize snapshot: {e}"),
    }
}

/// Re-run `start` until it succeeds. Never gives up.
async fn reconnect_forever(panel: &PulsonPanel) {
    let base_delay_ms = panel.config().reconnect_delay_ms;
    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            let delay_ms = base_delay_ms * (1u64 << (attempt - 1).min(4));
            error!(
                "Reconnection attempt {attempt} failed. Retrying in {:.1}s...",
                delay_ms as f64 / 1000.0
            );
            sleep(Duration::from_millis(delay_ms)).await;
        }
        attempt += 1;

        info!("Attempting MQTT reconnection (attempt {attempt})...");
        match panel.start().await {
            Ok(()) => {
                info!("MQTT reconnected successfully");
                return;
            }
            Err(e) => warn!("Reconnection error: {e}"),
        }
    }
}

fn register_observers(panel: &PulsonPanel) {
    for category in Category::ALL {
        panel.register_added(category, move |id| {
            info!("Discovered {category} {id}");
        });
    }
}

async fn run_monitor(cli: &Cli) -> Result<()> {
    let (mut connection_config, mut monitor) = load_config(&cli.config)?;

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        info!(
            "Connecting to MQTT broker at {}:{} for panel {}",
            connection_config.host, connection_config.port, connection_config.serial_number
        );
        let panel = Arc::new(PulsonPanel::new(connection_config.clone()));
        register_observers(&panel);
        let event_rx = panel.subscribe();

        panel
            .start_with_retry()
            .await
            .context("Failed to connect to MQTT broker")?;

        // Task 1: panel events
        let panel_events = Arc::clone(&panel);
        let event_handle = tokio::spawn(async move {
            let mut rx = event_rx;
            loop {
                match rx.recv().await {
                    Ok(AlarmEvent::Disconnected { requested: false }) => {
                        warn!("MQTT session lost, will attempt reconnection");
                        reconnect_forever(&panel_events).await;
                    }
                    Ok(AlarmEvent::Disconnected { requested: true }) => {
                        debug!("MQTT session closed");
                    }
                    Ok(AlarmEvent::Connected) => {
                        info!("MQTT session up");
                    }
                    Ok(AlarmEvent::EntityAdded { .. }) => {}
                    Ok(AlarmEvent::FieldUpdated {
                        category,
                        id,
                        field,
                        value,
                    }) => {
                        debug!("Changed: {category}/{id}/{field} = {value}");
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Event receiver lagged, missed {n} events");
                    }
                    Err(RecvError::Closed) => {
                        info!("Event channel closed");
                        break;
                    }
                }
            }
        });

        // Task 2: periodic snapshot
        let panel_snap = Arc::clone(&panel);
        let snapshot_interval_secs = monitor.snapshot_interval_secs.max(1);
        let snap_handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(snapshot_interval_secs));
            // First tick fires immediately; the state is still empty then
            ticker.tick().await;
            loop {
                ticker.tick().await;
                log_snapshot(&panel_snap);
            }
        });

        info!("Monitor running. Send SIGHUP to reload, SIGINT/SIGTERM to stop.");
        let restart = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
                false
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                false
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading config and reconnecting...");
                true
            }
        };

        event_handle.abort();
        snap_handle.abort();
        panel.stop().await;
        log_snapshot(&panel);

        if !restart {
            break;
        }

        // Reload config from disk; keep previous config on failure
        info!("Reloading config from {}", cli.config);
        match load_config(&cli.config) {
            Ok((new_connection, new_monitor)) => {
                connection_config = new_connection;
                monitor = new_monitor;
                info!("Config reloaded successfully");
            }
            Err(e) => warn!("Failed to reload config, keeping previous: {e:#}"),
        }
    }

    info!("Shutdown complete");
    Ok(())
}

// ---------------------------------------------------------------------------
// One-shot commands
// ---------------------------------------------------------------------------

async fn run_once(cli: &Cli, command: &CliCommand) -> Result<()> {
    let (connection_config, _) = load_config(&cli.config)?;
    let panel = PulsonPanel::new(connection_config);
    panel
        .start_with_retry()
        .await
        .context("Failed to connect to MQTT broker")?;

    let sent = match command {
        CliCommand::Arm {
            partition,
            night: false,
            code,
        } => panel.arm(partition, code.as_deref()).await,
        CliCommand::Arm {
            partition,
            night: true,
            code,
        } => panel.arm_night(partition, code.as_deref()).await,
        CliCommand::Disarm { partition, code } => panel.disarm(partition, code.as_deref()).await,
        CliCommand::Block { input, off } => panel.set_input_block(input, !off).await,
        CliCommand::Monitor => true,
    };

    panel.stop().await;
    if !sent {
        anyhow::bail!("Command was not sent");
    }
    info!("Command sent");
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=pulson_alarm=debug).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();

    match &cli.command {
        None | Some(CliCommand::Monitor) => run_monitor(&cli).await,
        Some(command) => run_once(&cli, command).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [mqtt]
            host = "mqtt.example.net"
            serial_number = "PS0001"
            "#,
        )
        .unwrap();
        assert_eq!(config.monitor.snapshot_interval_secs, 60);

        let connection = build_connection_config(&config.mqtt).unwrap();
        assert_eq!(connection.port, 8883);
        assert_eq!(connection.user_code, "8888");
        assert!(connection.tls);
        assert_eq!(connection.effective_client_id(), "pulson-alarm-PS0001");
    }

    #[test]
    fn test_config_overrides() {
        let config: Config = toml::from_str(
            r#"
            [mqtt]
            host = "10.0.0.5"
            port = 1883
            username = "u"
            password = "p"
            serial_number = "PS2"
            user_code = "1234"
            tls = false

            [monitor]
            snapshot_interval_secs = 5
            "#,
        )
        .unwrap();
        let connection = build_connection_config(&config.mqtt).unwrap();
        assert_eq!(connection.port, 1883);
        assert_eq!(connection.user_code, "1234");
        assert!(!connection.tls);
        assert_eq!(config.monitor.snapshot_interval_secs, 5);
    }

    #[test]
    fn test_invalid_serial_is_rejected() {
        let config: Config = toml::from_str(
            r#"
            [mqtt]
            host = "broker"
            serial_number = "PS/+"
            "#,
        )
        .unwrap();
        assert!(build_connection_config(&config.mqtt).is_err());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["pulson-alarm", "arm", "2", "--night", "--code", "4321"]);
        assert!(matches!(
            cli.command,
            Some(CliCommand::Arm { ref partition, night: true, code: Some(ref c) })
                if partition == "2" && c == "4321"
        ));

        let cli = Cli::parse_from(["pulson-alarm", "--config", "/etc/pulson.toml"]);
        assert_eq!(cli.config, "/etc/pulson.toml");
        assert!(cli.command.is_none());
    }
}
