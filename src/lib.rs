//! blelink - link lifecycle and characteristic I/O for a single
//! Bluetooth Low Energy peripheral, central role.
//!
//! The crate is split along the spec's two collaborating units:
//! - device: the public `Device` handle, the link state machine and the
//!   characteristic I/O gateway behind it
//! - transport: the contract with the external radio stack, plus an
//!   instrumented in-memory transport for tests
//! - error: synchronous API errors and the observer-facing link errors
//!
//! Scanning, device discovery and the radio itself are external
//! collaborators: a finder builds a [`DeviceDescriptor`] per discovered
//! peripheral and hands it to [`Device::new`] together with a
//! [`Transport`] implementation.
//!
//! ```no_run
//! use std::sync::Arc;
//! use blelink::{Device, DeviceDescriptor, DeviceEvent, DeviceId, MockTransport};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let transport = Arc::new(MockTransport::new());
//! let descriptor = DeviceDescriptor::new(DeviceId::random(), "HR Strap");
//! let device = Device::new(descriptor, transport);
//!
//! device.link().await;
//! while let Some(event) = device.next_event().await {
//!     match event {
//!         DeviceEvent::LinkedSuccessfully => break,
//!         DeviceEvent::FailedToLink(err) => panic!("link failed: {err}"),
//!         _ => {}
//!     }
//! }
//! # }
//! ```

pub mod device;
pub mod error;
pub mod transport;

// Re-export commonly used types for easy access
pub use device::{Device, DeviceEvent, LinkState, BATTERY_LEVEL_CHARACTERISTIC};
pub use error::{Error, LinkError, Result};
pub use transport::{
    AdvertisementData, CharacteristicId, DeviceDescriptor, DeviceId, MockTransport, Transport,
    TransportEvent, TransportRequest, WriteMode,
};
