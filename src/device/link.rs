//! Link lifecycle state machine.
//!
//! One [`LinkStateMachine`] owns the lifecycle of one peripheral. It
//! turns caller requests (`link`, `unlink`) and transport signals
//! (connect success/failure, link loss, timer fire) into state
//! transitions and observer events. All entry points run under one
//! `tokio::sync::Mutex`, so no two transitions can interleave; whichever
//! of a cancel, a timer fire or a transport event takes the lock first
//! while `Linking` wins and the rest observe a changed state and no-op.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::device::events::DeviceEvent;
use crate::error::LinkError;
use crate::transport::{DeviceId, Transport};

/// Lifecycle state of one device link. Exactly one is active at any
/// instant; I/O is only valid in `Linked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    Unlinked,
    Linking,
    Linked,
    Unlinking,
}

pub(crate) struct LinkStateMachine {
    device: DeviceId,
    state: LinkState,
    transport: Arc<dyn Transport>,
    observer: mpsc::UnboundedSender<DeviceEvent>,
    /// At most one outstanding connect timer, armed only in `Linking`.
    timer: Option<JoinHandle<()>>,
    /// Bumped on every exit from `Linking`; a timer fire carrying an
    /// older generation is stale and must not act. The `abort` on the
    /// handle already prevents the race in practice, the generation
    /// check is the safety net.
    generation: u64,
}

impl LinkStateMachine {
    pub(crate) fn new(
        device: DeviceId,
        transport: Arc<dyn Transport>,
        observer: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Self {
        Self {
            device,
            state: LinkState::Unlinked,
            transport,
            observer,
            timer: None,
            generation: 0,
        }
    }

    pub(crate) fn state(&self) -> LinkState {
        self.state
    }

    /// Begin a link attempt. Valid only from `Unlinked`; any other state
    /// makes this a warn-logged no-op, so a second `link()` produces
    /// none of its effects.
    pub(crate) async fn link(machine: &Arc<Mutex<Self>>, timeout: Option<Duration>) {
        let mut m = machine.lock().await;
        if m.state != LinkState::Unlinked {
            warn!(device = %m.device, state = ?m.state, "link ignored: already in progress or linked");
            return;
        }
        m.state = LinkState::Linking;
        debug!(device = %m.device, ?timeout, "linking");

        if let Some(duration) = timeout {
            let generation = m.generation;
            let weak = Arc::downgrade(machine);
            m.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                let Some(machine) = weak.upgrade() else {
                    return;
                };
                let mut m = machine.lock().await;
                m.timer_fired(generation).await;
            }));
        }

        let device = m.device;
        let requested = m.transport.connect(device).await;
        if let Err(e) = requested {
            // The request never left the stack; fold it into the same
            // path a reported connect failure takes.
            m.connect_failed(e.to_string());
        }
    }

    /// Tear the link down. From `Linking` this cancels the attempt and
    /// reports through the failure channel; from `Linked` it starts an
    /// orderly unlink confirmed by the transport; otherwise a no-op.
    pub(crate) async fn unlink(&mut self) {
        match self.state {
            LinkState::Linking => {
                self.cancel_timer();
                self.state = LinkState::Unlinked;
                debug!(device = %self.device, "link attempt cancelled");
                if let Err(e) = self.transport.disconnect(self.device).await {
                    warn!(device = %self.device, error = %e, "abort request failed");
                }
                self.notify(DeviceEvent::FailedToLink(LinkError::LinkingCancelled));
            }
            LinkState::Linked => {
                self.state = LinkState::Unlinking;
                debug!(device = %self.device, "unlinking");
                if let Err(e) = self.transport.disconnect(self.device).await {
                    // No confirmation will ever arrive; complete the
                    // unlink locally instead of stranding `Unlinking`.
                    warn!(device = %self.device, error = %e, "disconnect request failed, completing unlink locally");
                    self.state = LinkState::Unlinked;
                    self.notify(DeviceEvent::Unlinked(None));
                }
            }
            LinkState::Unlinked | LinkState::Unlinking => {}
        }
    }

    /// Transport reported the connect completed. Returns true when this
    /// established the link (stale occurrences return false).
    pub(crate) fn connect_succeeded(&mut self) -> bool {
        if self.state != LinkState::Linking {
            debug!(device = %self.device, state = ?self.state, "stale connect success ignored");
            return false;
        }
        self.cancel_timer();
        self.state = LinkState::Linked;
        info!(device = %self.device, "linked");
        self.notify(DeviceEvent::LinkedSuccessfully);
        true
    }

    /// Transport reported the connect failed.
    pub(crate) fn connect_failed(&mut self, reason: String) {
        if self.state != LinkState::Linking {
            debug!(device = %self.device, state = ?self.state, "stale connect failure ignored");
            return;
        }
        self.cancel_timer();
        self.state = LinkState::Unlinked;
        info!(device = %self.device, reason = %reason, "link attempt failed");
        self.notify(DeviceEvent::FailedToLink(LinkError::ConnectFailed(reason)));
    }

    /// The connect timer fired. Acts only while still `Linking` and only
    /// for the generation that armed it.
    pub(crate) async fn timer_fired(&mut self, generation: u64) {
        if self.state != LinkState::Linking || generation != self.generation {
            debug!(device = %self.device, "stale timer fire ignored");
            return;
        }
        self.timer = None;
        self.generation += 1;
        if let Err(e) = self.transport.disconnect(self.device).await {
            warn!(device = %self.device, error = %e, "abort request failed after timeout");
        }
        self.state = LinkState::Unlinked;
        info!(device = %self.device, "link attempt timed out");
        self.notify(DeviceEvent::FailedToLink(LinkError::LinkingTimedOut));
    }

    /// Transport reported the connection ended. In `Unlinking` this is
    /// the confirmation of a caller-requested unlink and carries no
    /// error; in `Linked` it is a spontaneous loss.
    pub(crate) fn link_lost(&mut self, reason: Option<String>) {
        match self.state {
            LinkState::Linked => {
                self.state = LinkState::Unlinked;
                info!(device = %self.device, reason = ?reason, "link lost");
                self.notify(DeviceEvent::Unlinked(Some(LinkError::LinkLost(reason))));
            }
            LinkState::Unlinking => {
                self.state = LinkState::Unlinked;
                debug!(device = %self.device, "unlinked");
                self.notify(DeviceEvent::Unlinked(None));
            }
            LinkState::Unlinked | LinkState::Linking => {
                debug!(device = %self.device, state = ?self.state, "stale link loss ignored");
            }
        }
    }

    /// Abort the pending timer and invalidate its generation. Must run
    /// on every non-timer exit from `Linking`, while the state lock is
    /// held and before any observer event goes out.
    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
        self.generation += 1;
    }

    fn notify(&self, event: DeviceEvent) {
        let _ = self.observer.send(event);
    }
}

impl Drop for LinkStateMachine {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}
