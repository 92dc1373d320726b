use std::time::Duration;

use log::{debug, trace};
use tokio::time;

use super::transport::{BleTransport, DeviceHandle};
use crate::error::Result;

#[derive(Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    Found(DeviceHandle),
    NotFound,
}

/// Name based discovery of the remote.
#[derive(Debug, Clone)]
pub struct Scanner {
    device_name: String,
    timeout: Duration,
}

impl Scanner {
    pub fn new(device_name: impl Into<String>, timeout: Duration) -> Self {
        Self { device_name: device_name.into(), timeout }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Runs one discovery window and returns the first peripheral whose
    /// advertised name matches exactly. Running out of time is `NotFound`,
    /// only a failure to start discovery is an error.
    pub async fn find<T>(&self, transport: &mut T) -> Result<ScanOutcome>
    where
        T: BleTransport + ?Sized,
    {
        let mut adverts = transport.scan().await?;

        let search = async {
            while let Some(device) = adverts.recv().await {
                trace!("Advertisement from {} ({})", device.name, device.address);
                if device.name == self.device_name {
                    return Some(device);
                }
            }
            None
        };

        match time::timeout(self.timeout, search).await {
            Ok(Some(device)) => {
                debug!("Found {} at {}", device.name, device.address);
                Ok(ScanOutcome::Found(device))
            }
            Ok(None) => {
                debug!("Discovery ended without {}", self.device_name);
                Ok(ScanOutcome::NotFound)
            }
            Err(_) => {
                debug!("{} not seen within {:?}", self.device_name, self.timeout);
                Ok(ScanOutcome::NotFound)
            }
        }
    }

    /// Checks that the host BLE stack can run discovery at all. Whatever is
    /// advertised during `window` is discarded.
    pub async fn probe<T>(&self, transport: &mut T, window: Duration) -> Result<()>
    where
        T: BleTransport + ?Sized,
    {
        let mut adverts = transport.scan().await?;
        let _ = time::timeout(window, async {
            while adverts.recv().await.is_some() {}
        })
        .await;

        Ok(())
    }
}
