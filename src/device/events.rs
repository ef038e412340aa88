//! Observer-facing device events.

use crate::error::LinkError;
use crate::transport::CharacteristicId;

/// Notifications delivered to the device observer.
///
/// Exactly one event is emitted per causing occurrence, in causal
/// order, over the stream drained by
/// [`Device::next_event`](crate::device::Device::next_event).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The link attempt completed; the device is now linked.
    LinkedSuccessfully,

    /// A link attempt ended without establishing a link. Fires only
    /// for failures during linking, including caller cancellation
    /// (`LinkError::LinkingCancelled`) and timeout.
    FailedToLink(LinkError),

    /// An established link ended. `None` when the caller requested the
    /// unlink, `Some(LinkError::LinkLost(..))` when the link dropped on
    /// its own. Never fires for a link that was still being set up.
    Unlinked(Option<LinkError>),

    /// Data arrived for a characteristic, either as a read response or
    /// as a notification; the two are indistinguishable by design.
    ReceivedData {
        characteristic: CharacteristicId,
        data: Vec<u8>,
    },
}
