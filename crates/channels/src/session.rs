//! Session lifecycle as seen from outside the client library.
//!
//! The library drives `disconnected → qr pending → authenticated → ready`
//! and back to `disconnected`; [`SessionNotifier`] records the latest phase
//! and fans every event out to subscribers.

use {
    serde::Serialize,
    tokio::sync::{broadcast, watch},
    tracing::debug,
};

/// Buffered events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 32;

/// A lifecycle notification emitted by the messaging client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new login code is waiting to be scanned.
    Qr(String),
    Authenticated,
    AuthFailure(String),
    Ready,
    Disconnected(String),
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Qr(_) => "qr",
            Self::Authenticated => "authenticated",
            Self::AuthFailure(_) => "auth_failure",
            Self::Ready => "ready",
            Self::Disconnected(_) => "disconnected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Disconnected,
    QrPending,
    Authenticated,
    Ready,
    AuthFailed,
}

impl SessionPhase {
    /// Phase after observing `event`.
    pub fn after(self, event: &SessionEvent) -> Self {
        match event {
            SessionEvent::Qr(_) => Self::QrPending,
            SessionEvent::Authenticated => Self::Authenticated,
            SessionEvent::AuthFailure(_) => Self::AuthFailed,
            SessionEvent::Ready => Self::Ready,
            SessionEvent::Disconnected(_) => Self::Disconnected,
        }
    }

    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::QrPending => "qr_pending",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::AuthFailed => "auth_failed",
        }
    }
}

/// Current phase plus a broadcast of every lifecycle event.
pub struct SessionNotifier {
    phase: watch::Sender<SessionPhase>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SessionNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionNotifier {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(SessionPhase::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { phase, events }
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Record `event`: the phase moves first so a subscriber woken by the
    /// event never reads a stale phase.
    pub fn emit(&self, event: SessionEvent) {
        self.phase.send_modify(|phase| *phase = phase.after(&event));
        debug!(event = event.name(), phase = self.phase().as_str(), "session event");
        // No subscribers is fine, the phase is still recorded.
        let _ = self.events.send(event);
    }
}
