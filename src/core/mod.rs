//! Core engine modules - player, looper, observers, frame worker, engine
//!
//! These modules form the playback engine, independent of any host UI.

pub mod engine;
pub mod events;
pub mod looper;
pub mod observers;
pub mod player;
pub mod surface;
pub mod workers;

// Re-exports for convenience
pub use engine::{EngineState, PlaybackEngine};
pub use events::{ItemInfo, PlaybackCommand, PlayerEvent, TimeTick};
pub use looper::Looper;
pub use observers::{EventBridge, ObserverSet};
pub use player::{ItemStatus, QueuePlayer, TimeControlStatus};
pub use surface::{HeadlessSurface, PresentationSurface};
pub use workers::{FrameRequest, FrameWorker};
