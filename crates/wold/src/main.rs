// # wold - Wake-on-LAN MQTT Daemon
//
// This daemon is a THIN integration layer:
// - DO NOT add wake, retry or heartbeat logic here
// - All bridge logic lives in wol-core
// - Configuration is via environment variables ONLY
//
// The wold daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Setting up logging (stdout + daily-rotating file)
// 3. Initializing the runtime
// 4. Wiring the MQTT transport and the helper sender into the bridge
// 5. Turning SIGINT/SIGTERM into a graceful shutdown
//
// ## Configuration
//
// ### Broker
// - `MQTT_BROKER`: Broker hostname (default: mqtt.local)
// - `MQTT_PORT`: Broker port (default: 1883)
// - `MQTT_USER`: Username (default: mqtt)
// - `MQTT_PASSWORD`: Password (default: password)
//
// ### Bridge
// - `UPDATE_INTERVAL`: Seconds between `online` heartbeats (default: 60, at most 86400)
// - `WOL_HELPER`: Wake helper program (default: wakeonlan)
//
// ### Logging
// - `WOL_LOG_DIR`: Directory for `wol-mqtt.*.log` files (default: /var/log)
// - `WOL_LOG_LEVEL`: trace, debug, info, warn or error (default: debug)
//
// ## Example
//
// ```bash
// export MQTT_BROKER=broker.lan
// export MQTT_USER=wol
// export MQTT_PASSWORD=secret
// export WOL_LOG_DIR=/var/log/wol
//
// wold
// ```

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use wol_core::config::{BridgeConfig, MAX_HEARTBEAT_INTERVAL_SECS};
use wol_core::WolBridge;
use wol_sender_helper::HelperPacketSender;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Log file name prefix; files are `wol-mqtt.<date>.log`
const LOG_FILE_PREFIX: &str = "wol-mqtt";

/// Number of rotated log files kept
const LOG_FILES_KEPT: usize = 7;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    update_interval: u64,
    broker_host: String,
    broker_port: u16,
    username: String,
    password: String,
    helper: String,
    log_dir: PathBuf,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for unset keys
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            update_interval: parse_number(&lookup, "UPDATE_INTERVAL", 60)?,
            broker_host: text("MQTT_BROKER", "mqtt.local"),
            broker_port: parse_number(&lookup, "MQTT_PORT", 1883)?,
            username: text("MQTT_USER", "mqtt"),
            password: text("MQTT_PASSWORD", "password"),
            helper: text("WOL_HELPER", wol_sender_helper::DEFAULT_HELPER),
            log_dir: PathBuf::from(text("WOL_LOG_DIR", "/var/log")),
            log_level: text("WOL_LOG_LEVEL", "debug"),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.update_interval == 0 {
            anyhow::bail!("UPDATE_INTERVAL must be greater than 0");
        }

        if self.update_interval > MAX_HEARTBEAT_INTERVAL_SECS {
            anyhow::bail!(
                "UPDATE_INTERVAL must be at most {} seconds",
                MAX_HEARTBEAT_INTERVAL_SECS
            );
        }

        if self.broker_host.trim().is_empty() {
            anyhow::bail!(
                "MQTT_BROKER cannot be empty. \
                Set it via: export MQTT_BROKER=mqtt.local"
            );
        }

        if self.broker_port == 0 {
            anyhow::bail!("MQTT_PORT must be between 1 and 65535");
        }

        if self.helper.trim().is_empty() {
            anyhow::bail!("WOL_HELPER cannot be empty");
        }

        if self.log_dir.as_os_str().is_empty() {
            anyhow::bail!("WOL_LOG_DIR cannot be empty");
        }

        parse_level(&self.log_level)?;

        Ok(())
    }

    /// Build the bridge configuration
    fn bridge_config(&self) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.broker.host = self.broker_host.clone();
        config.broker.port = self.broker_port;
        config.broker.username = self.username.clone();
        config.broker.password = self.password.clone();
        config.heartbeat.interval_secs = self.update_interval;
        config.wake.helper = self.helper.clone();
        config
    }
}

/// Parse a numeric variable; unset means `default`, unparseable is an error
fn parse_number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", key, value)),
        None => Ok(default),
    }
}

fn parse_level(level: &str) -> Result<LevelFilter> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        _ => anyhow::bail!(
            "WOL_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

/// Daily-rotating log file in `dir`
fn file_appender(dir: &Path) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(LOG_FILES_KEPT)
        .build(dir)
        .with_context(|| format!("Failed to open log directory {}", dir.display()))
}

/// Install the global subscriber: stdout plus the rotating file
///
/// The returned guard flushes the file writer on drop and must live until exit.
fn init_logging(config: &Config) -> Result<WorkerGuard> {
    let level = parse_level(&config.log_level)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender(&config.log_dir)?);

    tracing_subscriber::registry()
        .with(level)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .try_init()
        .context("Failed to set tracing subscriber")?;

    Ok(guard)
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DaemonExitCode::ConfigError.into();
    }

    let bridge_config = config.bridge_config();
    if let Err(e) = bridge_config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    // Held until main returns so buffered log lines reach the file
    let _log_guard = match init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Logging setup error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    info!(
        "Configuration loaded: broker {}, heartbeat every {}s",
        bridge_config.broker.address(),
        bridge_config.heartbeat.interval_secs
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(bridge_config).await {
            error!("Daemon error: {:#}", e);
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: BridgeConfig) -> Result<()> {
    let sender = Arc::new(HelperPacketSender::from_config(&config.wake));
    let (client, link) = wol_broker_mqtt::connect(&config);

    let (bridge, mut events) = WolBridge::new(Arc::new(client), Box::new(link), sender, config)?;

    let shutdown = CancellationToken::new();

    let signal_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match wait_for_shutdown().await {
                Ok(signal) => info!("Received shutdown signal: {}", signal),
                Err(e) => error!("Shutdown signal error: {:#}", e),
            }
            shutdown.cancel();
        })
    };

    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Bridge event: {:?}", event);
        }
    });

    let result = bridge.run(shutdown).await;

    signal_task.abort();
    // Ends once the bridge has dropped its event senders
    let _ = event_task.await;

    result?;
    info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
