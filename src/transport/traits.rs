//! Transport trait definition

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::transport::{CharacteristicId, DeviceId, TransportEvent, WriteMode};

/// Core transport trait - what any radio stack adapter must provide.
///
/// Every method is a request; completions and spontaneous signals come
/// back on the stream returned by [`Transport::subscribe`]. Requests
/// must not block; a returned `Err` means the request was never issued.
/// Implementations are shared across devices and must be thread-safe.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Obtain the event stream for one device. Called once per device
    /// handle, before any request for that device is issued.
    fn subscribe(&self, device: DeviceId) -> mpsc::UnboundedReceiver<TransportEvent>;

    /// Request a connection to the peripheral.
    async fn connect(&self, device: DeviceId) -> Result<()>;

    /// Request a disconnect, or abort a connect still in flight.
    async fn disconnect(&self, device: DeviceId) -> Result<()>;

    /// Request a characteristic value read.
    async fn read(&self, device: DeviceId, characteristic: CharacteristicId) -> Result<()>;

    /// Request a characteristic write in the given mode.
    async fn write(
        &self,
        device: DeviceId,
        characteristic: CharacteristicId,
        data: Vec<u8>,
        mode: WriteMode,
    ) -> Result<()>;

    /// Enable or disable notification delivery for a characteristic.
    async fn set_notify(
        &self,
        device: DeviceId,
        characteristic: CharacteristicId,
        enabled: bool,
    ) -> Result<()>;
}
