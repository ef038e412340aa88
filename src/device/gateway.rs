//! Characteristic I/O gateway.
//!
//! Forwards read/write/subscribe requests to the transport, gated on
//! the link being up, and routes inbound data back to the observer
//! tagged with the originating characteristic. Nothing is buffered,
//! coalesced or reordered; delivery order is transport order.

use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::device::events::DeviceEvent;
use crate::device::link::{LinkState, LinkStateMachine};
use crate::error::{Error, Result};
use crate::transport::{CharacteristicId, DeviceId, Transport, WriteMode};

/// Standard GATT Battery Level characteristic (org.bluetooth.characteristic.battery_level).
pub const BATTERY_LEVEL_CHARACTERISTIC: CharacteristicId =
    Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

pub(crate) struct CharacteristicIoGateway {
    device: DeviceId,
    transport: Arc<dyn Transport>,
    link: Arc<Mutex<LinkStateMachine>>,
    observer: mpsc::UnboundedSender<DeviceEvent>,
    /// Last battery percentage reported by the peripheral, if any.
    battery_level: Arc<SyncMutex<Option<u8>>>,
}

impl CharacteristicIoGateway {
    pub(crate) fn new(
        device: DeviceId,
        transport: Arc<dyn Transport>,
        link: Arc<Mutex<LinkStateMachine>>,
        observer: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Self {
        Self {
            device,
            transport,
            link,
            observer,
            battery_level: Arc::new(SyncMutex::new(None)),
        }
    }

    pub(crate) fn battery_level(&self) -> Option<u8> {
        *self.battery_level.lock()
    }

    /// Every outgoing operation requires an established link; anything
    /// else is rejected synchronously and never reaches the transport.
    async fn ensure_linked(&self) -> Result<()> {
        if self.link.lock().await.state() == LinkState::Linked {
            Ok(())
        } else {
            Err(Error::NotLinked)
        }
    }

    pub(crate) async fn read(&self, characteristic: CharacteristicId) -> Result<()> {
        self.ensure_linked().await?;
        self.transport.read(self.device, characteristic).await
    }

    pub(crate) async fn write(&self, characteristic: CharacteristicId, data: Vec<u8>) -> Result<()> {
        self.ensure_linked().await?;
        self.transport
            .write(self.device, characteristic, data, WriteMode::WithResponse)
            .await
    }

    pub(crate) async fn write_without_response(
        &self,
        characteristic: CharacteristicId,
        data: Vec<u8>,
    ) -> Result<()> {
        self.ensure_linked().await?;
        self.transport
            .write(self.device, characteristic, data, WriteMode::WithoutResponse)
            .await
    }

    pub(crate) async fn subscribe(&self, characteristic: CharacteristicId) -> Result<()> {
        self.ensure_linked().await?;
        self.transport
            .set_notify(self.device, characteristic, true)
            .await
    }

    pub(crate) async fn unsubscribe(&self, characteristic: CharacteristicId) -> Result<()> {
        self.ensure_linked().await?;
        self.transport
            .set_notify(self.device, characteristic, false)
            .await
    }

    /// Best-effort battery plumbing, kicked off when the link comes up:
    /// subscribe to battery notifications and request an initial value.
    /// Failures are logged and otherwise ignored; not every peripheral
    /// exposes the battery service.
    pub(crate) async fn start_battery_updates(&self) {
        if let Err(e) = self
            .transport
            .set_notify(self.device, BATTERY_LEVEL_CHARACTERISTIC, true)
            .await
        {
            debug!(device = %self.device, error = %e, "battery subscribe failed");
            return;
        }
        if let Err(e) = self
            .transport
            .read(self.device, BATTERY_LEVEL_CHARACTERISTIC)
            .await
        {
            debug!(device = %self.device, error = %e, "battery read failed");
        }
    }

    /// Route one inbound data event to the observer. Battery data also
    /// refreshes the cached level before it is forwarded.
    pub(crate) fn handle_data(&self, characteristic: CharacteristicId, data: Vec<u8>) {
        if characteristic == BATTERY_LEVEL_CHARACTERISTIC {
            match data.first() {
                Some(&level) => {
                    *self.battery_level.lock() = Some(level.min(100));
                    trace!(device = %self.device, level, "battery level updated");
                }
                None => {
                    warn!(device = %self.device, "empty battery level payload");
                }
            }
        }
        let _ = self.observer.send(DeviceEvent::ReceivedData {
            characteristic,
            data,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, TransportRequest};

    async fn gateway(
        transport: &MockTransport,
    ) -> (
        DeviceId,
        CharacteristicIoGateway,
        Arc<Mutex<LinkStateMachine>>,
        mpsc::UnboundedReceiver<DeviceEvent>,
    ) {
        let device = DeviceId::random();
        let (tx, rx) = mpsc::unbounded_channel();
        let link = Arc::new(Mutex::new(LinkStateMachine::new(
            device,
            Arc::new(transport.clone()),
            tx.clone(),
        )));
        let gateway =
            CharacteristicIoGateway::new(device, Arc::new(transport.clone()), link.clone(), tx);
        (device, gateway, link, rx)
    }

    async fn establish(link: &Arc<Mutex<LinkStateMachine>>) {
        LinkStateMachine::link(link, None).await;
        link.lock().await.connect_succeeded();
    }

    #[tokio::test]
    async fn io_rejected_while_unlinked() {
        let transport = MockTransport::new();
        let (device, gateway, _link, _rx) = gateway(&transport).await;
        let characteristic = Uuid::new_v4();

        assert!(matches!(
            gateway.read(characteristic).await,
            Err(Error::NotLinked)
        ));
        assert!(matches!(
            gateway.write(characteristic, vec![1]).await,
            Err(Error::NotLinked)
        ));
        assert!(matches!(
            gateway.subscribe(characteristic).await,
            Err(Error::NotLinked)
        ));
        assert!(transport.requests_for(device).is_empty());
    }

    #[tokio::test]
    async fn io_forwarded_while_linked() {
        let transport = MockTransport::new();
        let (device, gateway, link, _rx) = gateway(&transport).await;
        establish(&link).await;
        transport.clear_requests();

        let characteristic = Uuid::new_v4();
        gateway.read(characteristic).await.unwrap();
        gateway.write(characteristic, vec![0xAA]).await.unwrap();
        gateway
            .write_without_response(characteristic, vec![0xBB])
            .await
            .unwrap();
        gateway.subscribe(characteristic).await.unwrap();
        gateway.unsubscribe(characteristic).await.unwrap();

        assert_eq!(
            transport.requests_for(device),
            vec![
                TransportRequest::Read(characteristic),
                TransportRequest::Write {
                    characteristic,
                    data: vec![0xAA],
                    mode: WriteMode::WithResponse,
                },
                TransportRequest::Write {
                    characteristic,
                    data: vec![0xBB],
                    mode: WriteMode::WithoutResponse,
                },
                TransportRequest::SetNotify {
                    characteristic,
                    enabled: true,
                },
                TransportRequest::SetNotify {
                    characteristic,
                    enabled: false,
                },
            ]
        );
    }

    #[tokio::test]
    async fn inbound_data_reaches_observer_tagged() {
        let transport = MockTransport::new();
        let (_, gateway, _link, mut rx) = gateway(&transport).await;
        let characteristic = Uuid::new_v4();

        gateway.handle_data(characteristic, vec![1, 2, 3]);

        assert_eq!(
            rx.try_recv().unwrap(),
            DeviceEvent::ReceivedData {
                characteristic,
                data: vec![1, 2, 3],
            }
        );
    }

    #[tokio::test]
    async fn battery_data_updates_cache_and_is_forwarded() {
        let transport = MockTransport::new();
        let (_, gateway, _link, mut rx) = gateway(&transport).await;

        assert_eq!(gateway.battery_level(), None);
        gateway.handle_data(BATTERY_LEVEL_CHARACTERISTIC, vec![87]);

        assert_eq!(gateway.battery_level(), Some(87));
        assert!(matches!(
            rx.try_recv().unwrap(),
            DeviceEvent::ReceivedData { .. }
        ));
    }

    #[tokio::test]
    async fn battery_level_is_clamped_to_percent() {
        let transport = MockTransport::new();
        let (_, gateway, _link, _rx) = gateway(&transport).await;

        gateway.handle_data(BATTERY_LEVEL_CHARACTERISTIC, vec![201]);
        assert_eq!(gateway.battery_level(), Some(100));
    }

    #[tokio::test]
    async fn battery_updates_requested_best_effort() {
        let transport = MockTransport::new();
        let (device, gateway, _link, _rx) = gateway(&transport).await;

        gateway.start_battery_updates().await;
        assert_eq!(
            transport.requests_for(device),
            vec![
                TransportRequest::SetNotify {
                    characteristic: BATTERY_LEVEL_CHARACTERISTIC,
                    enabled: true,
                },
                TransportRequest::Read(BATTERY_LEVEL_CHARACTERISTIC),
            ]
        );

        // A transport that rejects the request only produces a log line.
        transport.fail_requests("no battery service");
        gateway.start_battery_updates().await;
    }
}
