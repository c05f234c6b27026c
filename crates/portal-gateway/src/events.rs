//! Session events
//!
//! The gateway owns session validity but not what happens afterwards:
//! when a refresh fails for good, UI and routing layers need to wipe
//! local state and send the user back to a login surface. That hand-off
//! is a broadcast subscription rather than a callback so any number of
//! listeners can attach without the gateway knowing them.

use tokio::sync::broadcast;
use tracing::debug;

/// Subscriber buffer size. Listeners react to a single terminal event,
/// so a small buffer is plenty.
const EVENT_CAPACITY: usize = 16;

/// Process-wide session lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session is irrecoverably invalid: the refresh credential was
    /// rejected or lost. Subscribers should drop local session state and
    /// route the user to a login surface.
    Unauthorized,
}

/// Broadcast fan-out for session events, owned by the gateway.
pub(crate) struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Emit the unauthorized signal. A refresh failure emits this exactly
    /// once, however many requests were parked behind the refresh.
    pub(crate) fn emit_unauthorized(&self) {
        // send only fails when no subscriber exists; the signal is
        // advisory, so that is not an error.
        if self.sender.send(SessionEvent::Unauthorized).is_err() {
            debug!("unauthorized event emitted with no subscribers");
        }
    }
}
