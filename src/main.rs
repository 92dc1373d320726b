mod actions;
mod app_data;
mod ble;
mod ble_ctl;
mod error;
mod gatt_const;
mod status;

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use log::{error, info, warn};
use tokio::signal::unix::{signal, SignalKind};

use actions::XdotoolExecutor;
use app_data::ConfigStore;
use ble::BluezTransport;
use ble_ctl::{ConnectionSupervisor, SupervisorSettings};
use error::Result;
use status::{Severity, StatusBroadcaster, StatusEvent, StatusSubscriber};

/// Below this uptime the BLE stack is assumed to be still starting.
const BOOT_UPTIME_SECS: f64 = 180.0;
const BOOT_STARTUP_DELAY: Duration = Duration::from_secs(8);

#[derive(Parser, Debug)]
#[command(name = "remote-switch-bridge")]
#[command(version, about = "Turns Remote-Switch button presses into hotkeys")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds to wait before the first scan, overrides the boot detection
    #[arg(long)]
    startup_delay: Option<u64>,

    /// Advertised name of the remote
    #[arg(long)]
    device_name: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn report_status(status: &StatusBroadcaster) {
    match status.current_state() {
        Some((state, message)) => info!("Status: [{}] {}", state, message),
        None => info!("Status: unknown"),
    }
    match status.battery() {
        Some(percent) => info!("Remote battery: {}%", percent),
        None => info!("Remote battery: unknown"),
    }
}

fn parse_uptime(raw: &str) -> Option<f64> {
    raw.split_whitespace().next()?.parse().ok()
}

async fn startup_delay(args: &Args) -> Duration {
    if let Some(secs) = args.startup_delay {
        return Duration::from_secs(secs);
    }

    match tokio::fs::read_to_string("/proc/uptime").await {
        Ok(raw) => match parse_uptime(&raw) {
            Some(uptime) if uptime < BOOT_UPTIME_SECS => {
                info!("Started {:.0}s after boot, delaying first scan", uptime);
                BOOT_STARTUP_DELAY
            }
            _ => Duration::ZERO,
        },
        Err(e) => {
            warn!("Cannot read uptime: {}", e);
            Duration::ZERO
        }
    }
}

async fn log_status(mut events: StatusSubscriber) {
    while let Some(event) = events.recv().await {
        match event {
            StatusEvent::StateChanged { state, message, severity } => {
                match severity {
                    Severity::Info => info!("[{}] {}", state, message),
                    Severity::Warning => warn!("[{}] {}", state, message),
                    Severity::Error => error!("[{}] {}", state, message),
                }
            }
            StatusEvent::BatteryUpdated { percent } => {
                info!("Remote battery: {}%", percent)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .init();

    info!("Starting remote switch bridge");

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => app_data::default_config_path()?,
    };
    let config_store = ConfigStore::open(&config_path).await?;
    info!("Using config {}", config_store.path().display());
    let config = config_store.config();

    let mut settings = SupervisorSettings::default();
    if let Some(name) = args.device_name.clone().or(config.device_name.clone()) {
        settings.device_name = name;
    }
    if let Some(scan_timeout) = config.scan_timeout() {
        settings.scan_timeout = scan_timeout;
    }
    settings.retry.initial_delay = startup_delay(&args).await;

    let session = bluer::Session::new().await?;
    let adapter = session.default_adapter().await?;
    info!("Using Bluetooth adapter {}", adapter.name());
    if let Err(e) = adapter.set_powered(true).await {
        warn!("Failed to power on {}: {}", adapter.name(), e);
    }

    let broadcaster = StatusBroadcaster::new();
    let status_task = tokio::spawn(log_status(broadcaster.subscribe()));

    let supervisor = ConnectionSupervisor::new(
        BluezTransport::new(adapter),
        settings,
        broadcaster.clone(),
        config_store.clone(),
        XdotoolExecutor::new(),
    );
    let handle = supervisor.start();

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;

    info!("Bridge ready. Send SIGHUP to reload the config and report status.");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = terminate.recv() => break,
            _ = hangup.recv() => {
                if let Err(e) = config_store.reload().await {
                    error!("Config reload failed, keeping current bindings: {:?}", e);
                }
                report_status(&broadcaster);
            }
        }
    }

    info!("Shutdown signal received, stopping...");
    handle.stop().await?;
    status_task.abort();

    info!("Remote switch bridge stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uptime() {
        assert_eq!(parse_uptime("95.21 301.77\n"), Some(95.21));
        assert_eq!(parse_uptime(""), None);
        assert_eq!(parse_uptime("abc 1.0"), None);
    }

    #[tokio::test]
    async fn test_explicit_startup_delay_wins() {
        let args = Args::parse_from(["remote-switch-bridge", "--startup-delay", "3"]);

        assert_eq!(startup_delay(&args).await, Duration::from_secs(3));
    }

    #[test]
    fn test_args() {
        let args = Args::parse_from([
            "remote-switch-bridge",
            "-c",
            "/tmp/remote.json",
            "--device-name",
            "Clicker",
            "-v",
        ]);

        assert_eq!(args.config, Some(PathBuf::from("/tmp/remote.json")));
        assert_eq!(args.device_name.as_deref(), Some("Clicker"));
        assert_eq!(args.startup_delay, None);
        assert!(args.verbose);
    }
}
