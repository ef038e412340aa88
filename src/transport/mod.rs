//! Transport layer contract for blelink
//!
//! This module defines the interface the link core needs from the
//! underlying radio stack:
//! - Device identity types handed over by the external finder
//! - The [`Transport`] trait with the connect/disconnect/read/write/notify
//!   primitives
//! - The [`TransportEvent`] stream those primitives complete through
//!
//! The crate never talks to a radio itself; a platform adapter (or the
//! in-memory [`MockTransport`] in tests) implements [`Transport`] and
//! delivers events attributed to a [`DeviceId`].

pub mod mock;
pub mod traits;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use mock::{MockTransport, TransportRequest};
pub use traits::Transport;

/// Identifier of one characteristic exposed by the peripheral.
pub type CharacteristicId = Uuid;

/// Stable, opaque identifier of one peripheral.
///
/// Assigned by the platform stack at discovery time and immutable for
/// the life of the device handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub Uuid);

impl DeviceId {
    /// Random identifier, handy for tests and simulated finders.
    pub fn random() -> Self {
        DeviceId(Uuid::new_v4())
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Advertisement payload captured at discovery time.
///
/// Keyed by the stack's advertisement keys (manufacturer data, service
/// data, local name, ...). Read-only from this crate's point of view.
pub type AdvertisementData = HashMap<String, Vec<u8>>;

/// Everything the external finder knows about a discovered peripheral.
///
/// This is the construction interface between the finder and
/// [`Device`](crate::device::Device): the finder scans, builds one of
/// these per advertisement, and hands it over together with the
/// transport handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub name: String,
    pub advertisement: AdvertisementData,
}

impl DeviceDescriptor {
    pub fn new(id: DeviceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            advertisement: AdvertisementData::new(),
        }
    }

    pub fn with_advertisement(mut self, advertisement: AdvertisementData) -> Self {
        self.advertisement = advertisement;
        self
    }
}

/// Write acknowledgement mode for characteristic writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    /// Acknowledged write; the stack reports failures.
    WithResponse,
    /// Fire-and-forget write; no completion is expected.
    WithoutResponse,
}

/// Events delivered by the transport for one device.
///
/// All events are asynchronous completions or spontaneous signals from
/// the radio stack. An ambient radio-power loss shows up as
/// `ConnectFailed` or `LinkLost` like any other stack failure; it is
/// never special-cased.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connect requested via [`Transport::connect`] completed.
    ConnectSucceeded,
    /// The connect requested via [`Transport::connect`] failed.
    ConnectFailed { reason: String },
    /// An established connection ended, whether requested or not.
    LinkLost { reason: Option<String> },
    /// A read completed or a notification arrived. The two share one
    /// shape: both mean "data arrived for this characteristic".
    DataReceived {
        characteristic: CharacteristicId,
        data: Vec<u8>,
    },
}
