//! In-memory transport for tests and examples.
//!
//! Records every request it receives and lets the test inject
//! [`TransportEvent`]s at chosen moments, so link scenarios can be
//! driven deterministically without a radio.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::transport::{CharacteristicId, DeviceId, Transport, TransportEvent, WriteMode};

/// One request the core issued against the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportRequest {
    Connect,
    Disconnect,
    Read(CharacteristicId),
    Write {
        characteristic: CharacteristicId,
        data: Vec<u8>,
        mode: WriteMode,
    },
    SetNotify {
        characteristic: CharacteristicId,
        enabled: bool,
    },
}

#[derive(Default)]
struct MockState {
    requests: Vec<(DeviceId, TransportRequest)>,
    subscribers: HashMap<DeviceId, Vec<mpsc::UnboundedSender<TransportEvent>>>,
    fail_requests: Option<String>,
}

/// Instrumented fake transport.
///
/// Cloning shares the underlying state, so a test can keep one handle
/// while the device owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request issued so far, for any device, in issue order.
    pub fn requests(&self) -> Vec<(DeviceId, TransportRequest)> {
        self.state.lock().requests.clone()
    }

    /// Requests issued for one device, in issue order.
    pub fn requests_for(&self, device: DeviceId) -> Vec<TransportRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(id, _)| *id == device)
            .map(|(_, req)| req.clone())
            .collect()
    }

    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    /// Make every subsequent request fail with the given reason.
    pub fn fail_requests(&self, reason: impl Into<String>) {
        self.state.lock().fail_requests = Some(reason.into());
    }

    /// Deliver an event to every subscriber of the device.
    pub fn emit(&self, device: DeviceId, event: TransportEvent) {
        let state = self.state.lock();
        if let Some(senders) = state.subscribers.get(&device) {
            for sender in senders {
                let _ = sender.send(event.clone());
            }
        }
    }

    fn record(&self, device: DeviceId, request: TransportRequest) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.fail_requests {
            return Err(Error::Transport(reason.clone()));
        }
        state.requests.push((device, request));
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn subscribe(&self, device: DeviceId) -> mpsc::UnboundedReceiver<TransportEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .lock()
            .subscribers
            .entry(device)
            .or_default()
            .push(tx);
        rx
    }

    async fn connect(&self, device: DeviceId) -> Result<()> {
        self.record(device, TransportRequest::Connect)
    }

    async fn disconnect(&self, device: DeviceId) -> Result<()> {
        self.record(device, TransportRequest::Disconnect)
    }

    async fn read(&self, device: DeviceId, characteristic: CharacteristicId) -> Result<()> {
        self.record(device, TransportRequest::Read(characteristic))
    }

    async fn write(
        &self,
        device: DeviceId,
        characteristic: CharacteristicId,
        data: Vec<u8>,
        mode: WriteMode,
    ) -> Result<()> {
        self.record(
            device,
            TransportRequest::Write {
                characteristic,
                data,
                mode,
            },
        )
    }

    async fn set_notify(
        &self,
        device: DeviceId,
        characteristic: CharacteristicId,
        enabled: bool,
    ) -> Result<()> {
        self.record(
            device,
            TransportRequest::SetNotify {
                characteristic,
                enabled,
            },
        )
    }
}
