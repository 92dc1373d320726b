//! Fan-out of connection and battery status to any number of observers.
//!
//! Each subscriber owns an unbounded queue, so publishing never blocks the
//! supervisor and no event is dropped for a slow reader. A new subscriber
//! first receives the latest state change and battery reading.

use std::{
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard},
    task::{Context, Poll},
};

use futures::Stream;
use log::trace;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::ble_ctl::ConnectionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    StateChanged {
        state: ConnectionState,
        message: String,
        severity: Severity,
    },

    BatteryUpdated {
        percent: u8,
    },
}

#[derive(Default)]
struct Hub {
    last_state: Option<StatusEvent>,
    last_battery: Option<StatusEvent>,
    subscribers: Vec<mpsc::UnboundedSender<StatusEvent>>,
}

#[derive(Clone, Default)]
pub struct StatusBroadcaster {
    hub: Arc<Mutex<Hub>>,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn hub(&self) -> MutexGuard<'_, Hub> {
        //the hub is never left half updated, so a poisoned lock is usable
        self.hub.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn publish(&self, event: StatusEvent) {
        let mut hub = self.hub();

        match &event {
            StatusEvent::StateChanged { .. } => {
                hub.last_state = Some(event.clone())
            }
            StatusEvent::BatteryUpdated { .. } => {
                hub.last_battery = Some(event.clone())
            }
        }

        hub.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        trace!("Published {:?} to {} subscribers", event, hub.subscribers.len());
    }

    pub fn subscribe(&self) -> StatusSubscriber {
        let mut hub = self.hub();
        let (tx, rx) = mpsc::unbounded_channel();

        for replay in [&hub.last_state, &hub.last_battery].into_iter().flatten() {
            let _ = tx.send(replay.clone());
        }
        hub.subscribers.push(tx);

        StatusSubscriber { events: UnboundedReceiverStream::new(rx) }
    }

    pub fn current_state(&self) -> Option<(ConnectionState, String)> {
        match &self.hub().last_state {
            Some(StatusEvent::StateChanged { state, message, .. }) => {
                Some((*state, message.clone()))
            }
            _ => None,
        }
    }

    pub fn battery(&self) -> Option<u8> {
        match &self.hub().last_battery {
            Some(StatusEvent::BatteryUpdated { percent }) => Some(*percent),
            _ => None,
        }
    }
}

/// Receiving end of a status subscription.
pub struct StatusSubscriber {
    events: UnboundedReceiverStream<StatusEvent>,
}

impl StatusSubscriber {
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        self.events.as_mut().recv().await
    }
}

impl Stream for StatusSubscriber {
    type Item = StatusEvent;

    fn poll_next(
        mut self: Pin<&mut Self>, cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}
