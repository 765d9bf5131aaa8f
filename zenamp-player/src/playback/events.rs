//! Player events
//!
//! The transport publishes [`PlayerEvent`]s on a tokio broadcast channel.
//! Front ends subscribe to show track changes, transient "skipped" notices
//! and device failures. Events emitted with no subscriber are dropped.

use crate::playback::buffer::PlaybackStatus;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::trace;

/// Something the front end may want to show
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A queue entry was loaded and playback started
    TrackStarted {
        index: usize,
        path: PathBuf,
        duration_seconds: f64,
    },

    /// The current entry played to its end
    TrackFinished { index: usize },

    /// Transport status changed
    StateChanged { status: PlaybackStatus },

    /// An entry could not be loaded and is being skipped
    ///
    /// Meant as a transient notice, not a modal error.
    LoadFailed { index: usize, path: PathBuf, reason: String },

    /// Nothing left to play
    QueueExhausted,

    /// The output device failed; playback is stopped
    DeviceError { message: String },
}

/// Broadcast sender wrapper
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// # Arguments
    /// * `capacity` - Events buffered per slow subscriber before the oldest are dropped
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Send to all current subscribers
    pub fn emit(&self, event: PlayerEvent) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            trace!("No subscribers for {:?}", event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit(PlayerEvent::QueueExhausted);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_receives_events() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.emit(PlayerEvent::TrackFinished { index: 3 });
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::TrackFinished { index: 3 });
    }
}
