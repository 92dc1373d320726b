//! `BleTransport` backed by BlueZ through bluer.
//!
//! Discovery, disconnect detection and notifications each run on their
//! own task and forward into the supervisor's channels. Tasks bound to a
//! link are aborted when the link is released.

use std::time::Duration;

use async_trait::async_trait;
use bluer::{
    gatt::remote::Characteristic, Adapter, AdapterEvent, Address, Device,
    DeviceEvent, DeviceProperty, Uuid,
};
use futures::{
    future, pin_mut,
    stream::{BoxStream, SelectAll},
    StreamExt,
};
use log::{debug, info, trace, warn};
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};

use super::transport::{
    AdvertReceiver, AttemptId, BleTransport, DeviceHandle, LinkEvent,
    LinkSender, RemoteChar,
};
use crate::error::{Result, TransportError};
use crate::gatt_const::REMOTE_SERV_UUID;

const ADVERT_BUFFER: usize = 32;
const SERVICES_POLL_INTERVAL: Duration = Duration::from_millis(100);

struct ActiveLink {
    device: Device,
    attempt: AttemptId,
    events: LinkSender,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for ActiveLink {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

pub struct BluezTransport {
    adapter: Adapter,
    link: Option<ActiveLink>,
}

impl BluezTransport {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter, link: None }
    }

    async fn release(&mut self) -> Result<()> {
        if let Some(link) = self.link.take() {
            debug!("Releasing link {} to {}", link.attempt, link.device.address());
            if link.device.is_connected().await? {
                link.device.disconnect().await?;
            }
        }
        Ok(())
    }
}

async fn advertised_name(
    adapter: &Adapter, addr: Address,
) -> bluer::Result<Option<String>> {
    adapter.device(addr)?.name().await
}

/// A device whose name arrives in a later property update, typically
/// from the scan response.
fn late_name(addr: Address, event: DeviceEvent) -> Option<DeviceHandle> {
    match event {
        DeviceEvent::PropertyChanged(DeviceProperty::Name(name)) => {
            Some(DeviceHandle { name, address: addr.to_string() })
        }
        _ => None,
    }
}

async fn watch_name(
    adapter: &Adapter, addr: Address,
) -> Result<BoxStream<'static, DeviceHandle>> {
    let device_events = adapter.device(addr)?.events().await?;

    Ok(device_events
        .filter_map(move |event| future::ready(late_name(addr, event)))
        .take(1)
        .boxed())
}

async fn watch_disconnect(
    device: &Device, attempt: AttemptId, link: LinkSender,
) -> Result<JoinHandle<()>> {
    let device_events = device.events().await?;

    Ok(tokio::spawn(async move {
        pin_mut!(device_events);
        while let Some(event) = device_events.next().await {
            if let DeviceEvent::PropertyChanged(DeviceProperty::Connected(false)) =
                event
            {
                info!("Peripheral dropped link {}", attempt);
                let _ = link.send(LinkEvent::Disconnected { attempt }).await;
                break;
            }
        }
    }))
}

async fn wait_services_resolved(device: &Device) -> Result<()> {
    while !device.is_services_resolved().await? {
        sleep(SERVICES_POLL_INTERVAL).await;
    }
    Ok(())
}

async fn find_characteristic(
    device: &Device, uuid: Uuid,
) -> Result<Characteristic> {
    for service in device.services().await? {
        if service.uuid().await? != REMOTE_SERV_UUID {
            continue;
        }

        for characteristic in service.characteristics().await? {
            if characteristic.uuid().await? == uuid {
                return Ok(characteristic);
            }
        }
    }

    Err(TransportError::MissingCharacteristic(uuid).into())
}

#[async_trait]
impl BleTransport for BluezTransport {
    async fn scan(&mut self) -> Result<AdvertReceiver> {
        let discovery = self.adapter.discover_devices().await?;
        let adapter = self.adapter.clone();
        let (advert_tx, advert_rx) = mpsc::channel(ADVERT_BUFFER);

        tokio::spawn(async move {
            pin_mut!(discovery);
            let mut renamed: SelectAll<BoxStream<'static, DeviceHandle>> =
                SelectAll::new();

            loop {
                tokio::select! {
                    _ = advert_tx.closed() => break,

                    Some(device) = renamed.next(), if !renamed.is_empty() => {
                        trace!("Late name {} for {}", device.name, device.address);
                        if advert_tx.send(device).await.is_err() {
                            break;
                        }
                    }

                    event = discovery.next() => match event {
                        Some(AdapterEvent::DeviceAdded(addr)) => {
                            match advertised_name(&adapter, addr).await {
                                Ok(Some(name)) => {
                                    let device = DeviceHandle {
                                        name,
                                        address: addr.to_string(),
                                    };
                                    if advert_tx.send(device).await.is_err() {
                                        break;
                                    }
                                }
                                Ok(None) => match watch_name(&adapter, addr).await {
                                    Ok(updates) => {
                                        trace!("Unnamed device {addr}, waiting for its name");
                                        renamed.push(updates);
                                    }
                                    Err(e) => debug!("Cannot watch {addr}: {e:?}"),
                                },
                                Err(e) => debug!("Cannot read name of {addr}: {e}"),
                            }
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
            }
            trace!("Discovery session closed");
        });

        Ok(advert_rx)
    }

    async fn connect(
        &mut self, device: &DeviceHandle, attempt: AttemptId, link: LinkSender,
    ) -> Result<()> {
        if let Err(e) = self.release().await {
            warn!("Failed to release previous link: {e:?}");
        }

        let address: Address = device
            .address
            .parse()
            .map_err(|_| TransportError::InvalidAddress(device.address.clone()))?;
        let peripheral = self.adapter.device(address)?;

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        info!("Link {} open to {}", attempt, address);

        let active = self.link.insert(ActiveLink {
            device: peripheral,
            attempt,
            events: link,
            tasks: Vec::new(),
        });
        let watcher =
            watch_disconnect(&active.device, attempt, active.events.clone()).await?;
        active.tasks.push(watcher);

        Ok(())
    }

    async fn subscribe(&mut self, characteristic: RemoteChar) -> Result<()> {
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;

        wait_services_resolved(&link.device).await?;
        let gatt_char =
            find_characteristic(&link.device, characteristic.uuid()).await?;
        let notifications = gatt_char.notify().await?;

        let events = link.events.clone();
        let attempt = link.attempt;
        link.tasks.push(tokio::spawn(async move {
            pin_mut!(notifications);
            while let Some(data) = notifications.next().await {
                let event =
                    LinkEvent::Notification { attempt, characteristic, data };
                if events.send(event).await.is_err() {
                    return;
                }
            }
            //the notify session only ends with the link
            let _ = events.send(LinkEvent::Disconnected { attempt }).await;
        }));

        debug!("Subscribed to {:?} on link {}", characteristic, attempt);
        Ok(())
    }

    async fn is_connected(&mut self) -> Result<bool> {
        match &self.link {
            Some(link) => Ok(link.device.is_connected().await?),
            None => Ok(false),
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.release().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> Address {
        Address::new([0x24, 0x0A, 0xC4, 0x00, 0x00, 0x01])
    }

    #[test]
    fn test_late_name_from_property_update() {
        let event = DeviceEvent::PropertyChanged(DeviceProperty::Name(
            "Remote-Switch".to_string(),
        ));

        assert_eq!(
            late_name(addr(), event),
            Some(DeviceHandle {
                name: "Remote-Switch".to_string(),
                address: "24:0A:C4:00:00:01".to_string(),
            })
        );
    }

    #[test]
    fn test_other_property_updates_are_skipped() {
        let event = DeviceEvent::PropertyChanged(DeviceProperty::Rssi(-60));

        assert_eq!(late_name(addr(), event), None);
    }
}
