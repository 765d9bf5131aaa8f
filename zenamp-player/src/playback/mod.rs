//! Playback engine and queue management

pub mod buffer;
pub mod callback_monitor;
pub mod events;
pub mod mixer;
pub mod queue;
pub mod transport;
pub mod visualizer;

pub use buffer::{PlaybackBuffer, PlaybackStatus};
pub use events::{EventBus, PlayerEvent};
pub use mixer::Mixer;
pub use queue::{PlayQueue, QueueEntry};
pub use transport::{Player, PlayerOptions};
pub use visualizer::{level_meter, LevelMeter, VisualizerFeed, VisualizerReader};
