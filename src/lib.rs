//! LOOPVIEW - self-looping video playback engine library
//!
//! Re-exports all modules for use by the binary target and by hosts.

// Core engine (player, looper, observers, frame worker)
pub mod core;

// Media, configuration, filters
pub mod entities;

pub mod cli;
pub mod error;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use crate::core::{
    EngineState, HeadlessSurface, PlaybackEngine, PlayerEvent, PresentationSurface, TimeTick,
};
pub use entities::{
    AssetLocator, Configuration, Directive, Frame, Gravity, MediaBackend, NativeBackend,
};
pub use error::{ErrorKind, MediaError};
