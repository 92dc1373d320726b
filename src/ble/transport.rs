use std::fmt;

use async_trait::async_trait;
use bluer::Uuid;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::gatt_const::{REMOTE_CHAR_BATTERY_UUID, REMOTE_CHAR_BUTTON_UUID};

#[cfg(test)]
use mockall::automock;

/// A peripheral seen during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub name: String,
    pub address: String,
}

/// Identifies one connection attempt, so link events from an older
/// connection can be told apart from the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Notification characteristics of the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteChar {
    Button,
    Battery,
}

impl RemoteChar {
    pub fn uuid(self) -> Uuid {
        match self {
            RemoteChar::Button => REMOTE_CHAR_BUTTON_UUID,
            RemoteChar::Battery => REMOTE_CHAR_BATTERY_UUID,
        }
    }
}

/// Everything the transport pushes back to the supervisor travels through
/// one ordered channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Notification {
        attempt: AttemptId,
        characteristic: RemoteChar,
        data: Vec<u8>,
    },

    Disconnected {
        attempt: AttemptId,
    },
}

impl LinkEvent {
    pub fn attempt(&self) -> AttemptId {
        match self {
            LinkEvent::Notification { attempt, .. } => *attempt,
            LinkEvent::Disconnected { attempt } => *attempt,
        }
    }
}

pub type LinkSender = mpsc::Sender<LinkEvent>;
pub type AdvertReceiver = mpsc::Receiver<DeviceHandle>;

/// The operations the connection supervisor needs from a BLE stack.
///
/// Only one connection is managed at a time: `connect` replaces nothing,
/// the supervisor always calls `disconnect` before the next attempt.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BleTransport: Send + Sync + 'static {
    /// Starts a discovery session. Every advertising peripheral with a
    /// name is pushed to the returned receiver; dropping the receiver ends
    /// the session.
    async fn scan(&mut self) -> Result<AdvertReceiver>;

    /// Opens the link to `device`. Disconnects observed later are reported
    /// on `link` tagged with `attempt`.
    async fn connect(
        &mut self, device: &DeviceHandle, attempt: AttemptId, link: LinkSender,
    ) -> Result<()>;

    /// Enables notifications for `characteristic` on the open link.
    async fn subscribe(&mut self, characteristic: RemoteChar) -> Result<()>;

    /// Liveness poll of the open link.
    async fn is_connected(&mut self) -> Result<bool>;

    /// Releases the link and every notification session bound to it.
    async fn disconnect(&mut self) -> Result<()>;
}
