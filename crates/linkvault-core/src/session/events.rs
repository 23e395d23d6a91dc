//! Session events
//!
//! The session publishes what happened over an unbounded tokio channel. Nobody
//! has to listen: with no receiver, or a dropped one, events are discarded.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::models::{Link, Settings};

/// Events emitted by the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A vault was unlocked
    SessionStarted,
    /// Periodic heartbeat while unlocked
    SessionTick { remaining: Duration },
    /// The session is about to lock
    SessionStopping,
    /// The session locked; carries the settings that were in effect
    SessionStopped { settings: Settings },
    LinkAdded(Link),
    LinkUpdated(Link),
    LinkRemoved(Link),
    SettingsUpdated(Settings),
    /// The unsaved-changes flag flipped
    DataUpdatedChanged { dirty: bool },
}

/// Sending half of the event channel
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
    /// Sink that drops every event
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Create a sink and the receiver that observes it
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Publish an event
    pub fn emit(&self, event: SessionEvent) {
        if let Some(ref tx) = self.tx {
            // A closed receiver just means nobody is listening
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_reach_receiver() {
        let (sink, mut rx) = EventSink::channel();
        sink.emit(SessionEvent::SessionStarted);
        sink.emit(SessionEvent::DataUpdatedChanged { dirty: true });

        assert_eq!(rx.try_recv().unwrap(), SessionEvent::SessionStarted);
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::DataUpdatedChanged { dirty: true }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_without_listener_is_fine() {
        EventSink::disabled().emit(SessionEvent::SessionStopping);

        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(SessionEvent::SessionStopping);
    }
}
