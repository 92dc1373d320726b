//! Connection supervisor for the remote.
//!
//! A single task owns the transport and the connection state. It scans for
//! the remote by name, connects, subscribes to the notification
//! characteristics and dispatches what arrives, then starts over after
//! every failure or disconnect. It only ends on a shutdown request.

mod conn_state;
mod settings;

pub use conn_state::ConnectionState;
pub use settings::SupervisorSettings;

use std::{future::Future, time::Duration};

use log::{debug, error, info, warn};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::actions::{self, ActionExecutor, BindingSource};
use crate::ble::{
    codec, AttemptId, BleTransport, DeviceHandle, LinkEvent, RemoteChar,
    ScanOutcome, Scanner,
};
use crate::error::{Result, TransportError};
use crate::status::{Severity, StatusBroadcaster, StatusEvent};

const LINK_BUFFER_SIZE: usize = 64;

#[derive(Debug)]
struct ShutdownRequested;

type Step<T> = std::result::Result<T, ShutdownRequested>;

async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    //a dropped handle counts as a shutdown request
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn until_shutdown<F: Future>(
    shutdown: &mut watch::Receiver<bool>, fut: F,
) -> Step<F::Output> {
    tokio::select! {
        biased;

        _ = stop_requested(shutdown) => Err(ShutdownRequested),
        output = fut => Ok(output),
    }
}

async fn bounded<T>(
    shutdown: &mut watch::Receiver<bool>, operation: &'static str,
    limit: Duration, fut: impl Future<Output = Result<T>>,
) -> Step<Result<T>> {
    until_shutdown(shutdown, async move {
        match time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout { operation, limit }.into()),
        }
    })
    .await
}

/// Controls a running supervisor task.
pub struct SupervisorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Aborts whatever the supervisor is waiting on, releases the link and
    /// waits for the task to end in `Stopped`.
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.task.await?;
        Ok(())
    }
}

pub struct ConnectionSupervisor<T, B, E> {
    transport: T,
    bindings: B,
    executor: E,
    status: StatusBroadcaster,
    scanner: Scanner,
    settings: SupervisorSettings,
    state: ConnectionState,
    message: String,
    attempts: u64,
    link_held: bool,
    link_tx: mpsc::Sender<LinkEvent>,
    link_rx: mpsc::Receiver<LinkEvent>,
}

impl<T, B, E> ConnectionSupervisor<T, B, E>
where
    T: BleTransport,
    B: BindingSource,
    E: ActionExecutor,
{
    pub fn new(
        transport: T, settings: SupervisorSettings, status: StatusBroadcaster,
        bindings: B, executor: E,
    ) -> Self {
        let (link_tx, link_rx) = mpsc::channel(LINK_BUFFER_SIZE);
        let scanner =
            Scanner::new(settings.device_name.clone(), settings.scan_timeout);
        let message = "Idle".to_string();

        status.publish(StatusEvent::StateChanged {
            state: ConnectionState::Idle,
            message: message.clone(),
            severity: Severity::Info,
        });

        Self {
            transport,
            bindings,
            executor,
            status,
            scanner,
            settings,
            state: ConnectionState::Idle,
            message,
            attempts: 0,
            link_held: false,
            link_tx,
            link_rx,
        }
    }

    /// Spawns the supervisor loop.
    pub fn start(self) -> SupervisorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));

        SupervisorHandle { shutdown_tx, task }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Connection supervisor started for {}", self.scanner.device_name());

        if self.warm_up(&mut shutdown).await.is_ok() {
            while self.cycle(&mut shutdown).await.is_ok() {}
        }

        self.release().await;
        self.transition(ConnectionState::Stopped, "Stopped", Severity::Info);
        info!("Connection supervisor stopped");
    }

    fn transition(
        &mut self, next: ConnectionState, message: impl Into<String>,
        severity: Severity,
    ) {
        let message = message.into();

        if !self.state.permits(next) {
            error!("Refusing transition {} -> {}", self.state, next);
            return;
        }
        if next == self.state && message == self.message {
            return;
        }

        info!("{} -> {}: {}", self.state, next, message);
        self.state = next;
        self.message = message.clone();
        self.status.publish(StatusEvent::StateChanged {
            state: next,
            message,
            severity,
        });
    }

    /// Waits out the boot delay and probes until discovery works. Gives up
    /// quietly after the configured attempts.
    async fn warm_up(&mut self, shutdown: &mut watch::Receiver<bool>) -> Step<()> {
        let retry = self.settings.retry.clone();
        let max = retry.max_scan_readiness_attempts;

        if !retry.initial_delay.is_zero() {
            self.transition(
                ConnectionState::Idle,
                format!("Waiting {}s for Bluetooth...", retry.initial_delay.as_secs()),
                Severity::Warning,
            );
            until_shutdown(shutdown, time::sleep(retry.initial_delay)).await?;
        }

        for attempt in 1..=max {
            let probe = bounded(
                shutdown,
                "readiness probe",
                self.settings.operation_timeout,
                self.scanner.probe(&mut self.transport, retry.readiness_probe_window),
            )
            .await?;

            match probe {
                Ok(()) => {
                    debug!("Bluetooth ready after {} probe(s)", attempt);
                    return Ok(());
                }
                Err(e) if attempt < max => {
                    warn!("Bluetooth not ready ({}/{}): {:?}", attempt, max, e);
                    self.transition(
                        ConnectionState::Idle,
                        format!("Bluetooth not ready yet... ({attempt}/{max})"),
                        Severity::Warning,
                    );
                    until_shutdown(shutdown, time::sleep(retry.readiness_probe_delay))
                        .await?;
                }
                Err(e) => {
                    error!("Bluetooth still not ready, continuing anyway: {:?}", e);
                    self.transition(
                        ConnectionState::Idle,
                        "Bluetooth problem! Retrying...",
                        Severity::Error,
                    );
                }
            }
        }

        Ok(())
    }

    /// One scan, and the connection that follows if the remote shows up.
    async fn cycle(&mut self, shutdown: &mut watch::Receiver<bool>) -> Step<()> {
        let name = self.scanner.device_name().to_string();
        self.transition(
            ConnectionState::Scanning,
            format!("Scanning for {name}..."),
            Severity::Warning,
        );

        let scan_limit = self.settings.scan_timeout + self.settings.operation_timeout;
        let found = bounded(
            shutdown,
            "scan",
            scan_limit,
            self.scanner.find(&mut self.transport),
        )
        .await?;

        match found {
            Ok(ScanOutcome::Found(device)) => {
                self.connect_and_serve(shutdown, device).await?
            }
            Ok(ScanOutcome::NotFound) => debug!("{} not found", name),
            Err(e) => {
                warn!("Scan error: {:?}", e);
                self.transition(
                    ConnectionState::Error,
                    format!("Scan failed. Retry in {}s...", self.retry_secs()),
                    Severity::Error,
                );
            }
        }

        until_shutdown(shutdown, time::sleep(self.settings.retry.per_attempt_delay))
            .await
    }

    async fn connect_and_serve(
        &mut self, shutdown: &mut watch::Receiver<bool>, device: DeviceHandle,
    ) -> Step<()> {
        self.transition(
            ConnectionState::Connecting,
            "Found! Connecting...",
            Severity::Info,
        );

        self.attempts += 1;
        let attempt = AttemptId(self.attempts);
        let limit = self.settings.operation_timeout;
        debug!("Link {} to {} ({})", attempt, device.name, device.address);

        self.link_held = true;
        let link = self.link_tx.clone();
        let connected = bounded(
            shutdown,
            "connect",
            limit,
            self.transport.connect(&device, attempt, link),
        )
        .await?;
        if let Err(e) = connected {
            self.abort_attempt(attempt, e).await;
            return Ok(());
        }

        let buttons = bounded(
            shutdown,
            "button subscription",
            limit,
            self.transport.subscribe(RemoteChar::Button),
        )
        .await?;
        if let Err(e) = buttons {
            self.abort_attempt(attempt, e).await;
            return Ok(());
        }

        let battery = bounded(
            shutdown,
            "battery subscription",
            limit,
            self.transport.subscribe(RemoteChar::Battery),
        )
        .await?;
        if let Err(e) = battery {
            warn!("No battery updates on link {}: {:?}", attempt, e);
        }

        self.transition(
            ConnectionState::Connected,
            "Connected & ready",
            Severity::Info,
        );
        self.serve(shutdown, attempt).await
    }

    async fn abort_attempt(&mut self, attempt: AttemptId, e: anyhow::Error) {
        error!("Link {} failed: {:?}", attempt, e);
        self.transition(
            ConnectionState::Error,
            format!("Connection error. Retry in {}s...", self.retry_secs()),
            Severity::Error,
        );
        self.release().await;
    }

    /// Dispatches link events until the link `attempt` goes away.
    async fn serve(
        &mut self, shutdown: &mut watch::Receiver<bool>, attempt: AttemptId,
    ) -> Step<()> {
        let period = self.settings.liveness_interval;
        let mut liveness = time::interval_at(time::Instant::now() + period, period);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                biased;

                _ = stop_requested(shutdown) => return Err(ShutdownRequested),

                event = self.link_rx.recv() => match event {
                    Some(LinkEvent::Notification { attempt: from, characteristic, data })
                        if from == attempt =>
                    {
                        self.on_notification(characteristic, &data)
                    }
                    Some(LinkEvent::Disconnected { attempt: from }) if from == attempt => {
                        break "Connection lost.";
                    }
                    Some(stale) => {
                        debug!("Ignoring {:?} from link {}", stale, stale.attempt())
                    }
                    None => break "Link channel closed.",
                },

                _ = liveness.tick() => {
                    let alive = bounded(
                        shutdown,
                        "liveness poll",
                        self.settings.operation_timeout,
                        self.transport.is_connected(),
                    )
                    .await?;

                    match alive {
                        Ok(true) => {}
                        Ok(false) => break "Connection lost.",
                        Err(e) => {
                            warn!("Liveness poll on link {} failed: {:?}", attempt, e);
                            break "Connection lost.";
                        }
                    }
                }
            }
        };

        warn!("Link {}: {}", attempt, reason);
        self.transition(ConnectionState::Disconnected, reason, Severity::Error);
        self.release().await;

        Ok(())
    }

    fn on_notification(&self, characteristic: RemoteChar, data: &[u8]) {
        match characteristic {
            RemoteChar::Button => match codec::decode_button(data) {
                Ok(event) => self.dispatch(event.button_id),
                Err(e) => warn!("Dropping button notification {:02X?}: {}", data, e),
            },
            RemoteChar::Battery => match codec::decode_battery(data) {
                Ok(reading) => {
                    debug!("Battery at {}%", reading.percent);
                    self.status.publish(StatusEvent::BatteryUpdated {
                        percent: reading.percent,
                    });
                }
                Err(e) => warn!("Dropping battery notification {:02X?}: {}", data, e),
            },
        }
    }

    fn dispatch(&self, button_id: u32) {
        let bindings = self.bindings.snapshot();

        match actions::resolve(button_id, &bindings) {
            Some(action) => {
                info!("Button {} -> {}", button_id, action);
                self.executor.execute(action);
            }
            None => debug!("No action bound to button {}", button_id),
        }
    }

    async fn release(&mut self) {
        if !self.link_held {
            return;
        }
        self.link_held = false;

        let limit = self.settings.operation_timeout;
        match time::timeout(limit, self.transport.disconnect()).await {
            Ok(Ok(())) => debug!("Link released"),
            Ok(Err(e)) => warn!("Failed to release link: {:?}", e),
            Err(_) => warn!("Timed out releasing link after {:?}", limit),
        }
    }

    fn retry_secs(&self) -> u64 {
        self.settings.retry.per_attempt_delay.as_secs()
    }
}
