//! Device handle: link lifecycle plus characteristic I/O for one
//! peripheral.
//!
//! A [`Device`] is built by the external finder from a
//! [`DeviceDescriptor`] and a transport handle. It owns the link state
//! machine and the I/O gateway, pumps the transport's event stream into
//! them from a background task, and exposes the observer stream via
//! [`Device::next_event`].

pub mod events;
mod gateway;
mod link;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;
use crate::transport::{
    AdvertisementData, CharacteristicId, DeviceDescriptor, DeviceId, Transport, TransportEvent,
};

pub use events::DeviceEvent;
pub use gateway::BATTERY_LEVEL_CHARACTERISTIC;
pub use link::LinkState;

use gateway::CharacteristicIoGateway;
use link::LinkStateMachine;

/// Handle for one Bluetooth Low Energy peripheral, central role.
///
/// Intentionally not `Clone`: the handle owns the pump task and the
/// at-most-one link lifecycle for its peripheral. Wrap it in `Arc` to
/// share it across tasks. Distinct devices are fully independent.
pub struct Device {
    descriptor: DeviceDescriptor,
    link: Arc<Mutex<LinkStateMachine>>,
    gateway: Arc<CharacteristicIoGateway>,
    /// Default used by [`Device::link`]; `None` disables the timeout.
    default_timeout: SyncMutex<Option<Duration>>,
    events: Mutex<mpsc::UnboundedReceiver<DeviceEvent>>,
    pump: JoinHandle<()>,
}

impl Device {
    /// Build a device handle from a discovery descriptor and a transport.
    ///
    /// Must be called within a tokio runtime; the handle spawns one task
    /// pumping the transport's event stream for this device. The
    /// observer stream exists from construction, so no event can be
    /// missed between construction and the first `link()`.
    pub fn new(descriptor: DeviceDescriptor, transport: Arc<dyn Transport>) -> Self {
        let (observer, events) = mpsc::unbounded_channel();
        let link = Arc::new(Mutex::new(LinkStateMachine::new(
            descriptor.id,
            transport.clone(),
            observer.clone(),
        )));
        let gateway = Arc::new(CharacteristicIoGateway::new(
            descriptor.id,
            transport.clone(),
            link.clone(),
            observer,
        ));

        let transport_events = transport.subscribe(descriptor.id);
        let pump = tokio::spawn(Self::pump_events(
            descriptor.id,
            transport_events,
            link.clone(),
            gateway.clone(),
        ));

        Self {
            descriptor,
            link,
            gateway,
            default_timeout: SyncMutex::new(None),
            events: Mutex::new(events),
            pump,
        }
    }

    /// Serialize transport events into state transitions. This task and
    /// the caller-facing API contend on the same state lock, so no two
    /// transitions can ever be applied concurrently.
    async fn pump_events(
        device: DeviceId,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        link: Arc<Mutex<LinkStateMachine>>,
        gateway: Arc<CharacteristicIoGateway>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::ConnectSucceeded => {
                    let established = link.lock().await.connect_succeeded();
                    if established {
                        gateway.start_battery_updates().await;
                    }
                }
                TransportEvent::ConnectFailed { reason } => {
                    link.lock().await.connect_failed(reason);
                }
                TransportEvent::LinkLost { reason } => {
                    link.lock().await.link_lost(reason);
                }
                TransportEvent::DataReceived {
                    characteristic,
                    data,
                } => {
                    gateway.handle_data(characteristic, data);
                }
            }
        }
        debug!(device = %device, "transport event stream ended");
    }

    /// Start a link attempt using the device's default timeout.
    pub async fn link(&self) {
        let timeout = *self.default_timeout.lock();
        LinkStateMachine::link(&self.link, timeout).await;
    }

    /// Start a link attempt with a per-call timeout override; `None`
    /// disables the timeout for this attempt.
    pub async fn link_with_timeout(&self, timeout: Option<Duration>) {
        LinkStateMachine::link(&self.link, timeout).await;
    }

    /// Tear the link down. Cancelling an attempt still in progress is
    /// reported as `FailedToLink(LinkingCancelled)`; an established link
    /// ends with `Unlinked(None)` once the transport confirms.
    pub async fn unlink(&self) {
        self.link.lock().await.unlink().await;
    }

    /// Request a characteristic value read; the value arrives later as
    /// [`DeviceEvent::ReceivedData`].
    pub async fn read(&self, characteristic: CharacteristicId) -> Result<()> {
        self.gateway.read(characteristic).await
    }

    /// Request an acknowledged write.
    pub async fn write(&self, characteristic: CharacteristicId, data: Vec<u8>) -> Result<()> {
        self.gateway.write(characteristic, data).await
    }

    /// Request a fire-and-forget write; no completion is expected.
    pub async fn write_without_response(
        &self,
        characteristic: CharacteristicId,
        data: Vec<u8>,
    ) -> Result<()> {
        self.gateway.write_without_response(characteristic, data).await
    }

    /// Enable notification delivery for a characteristic.
    pub async fn subscribe(&self, characteristic: CharacteristicId) -> Result<()> {
        self.gateway.subscribe(characteristic).await
    }

    /// Disable notification delivery for a characteristic.
    pub async fn unsubscribe(&self, characteristic: CharacteristicId) -> Result<()> {
        self.gateway.unsubscribe(characteristic).await
    }

    pub fn id(&self) -> DeviceId {
        self.descriptor.id
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Advertisement payload captured at discovery time, read-only.
    pub fn advertisement_data(&self) -> &AdvertisementData {
        &self.descriptor.advertisement
    }

    /// Battery percentage last reported by the peripheral, if any.
    pub fn battery_level(&self) -> Option<u8> {
        self.gateway.battery_level()
    }

    /// Current lifecycle state.
    pub async fn link_state(&self) -> LinkState {
        self.link.lock().await.state()
    }

    /// Default timeout applied by [`Device::link`].
    pub fn timeout(&self) -> Option<Duration> {
        *self.default_timeout.lock()
    }

    /// Change the default timeout; `None` disables it.
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        *self.default_timeout.lock() = timeout;
    }

    /// Next observer event, in causal order, at most one per causing
    /// occurrence. Returns `None` once the device is defunct.
    pub async fn next_event(&self) -> Option<DeviceEvent> {
        self.events.lock().await.recv().await
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.descriptor.id)
            .field("name", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}
