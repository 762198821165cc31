//! Entities module - media, configuration and frame types
//!
//! Plain data plus the pure operations on it (resolution, merge, filtering).
//! Nothing here owns threads or talks to the player.

pub mod asset;
pub mod composition;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod filters;
pub mod frame;
pub mod gravity;
pub mod media;
pub mod settings;
pub mod subtitles;

pub use asset::{AssetLocator, DirBundle, MediaAddress, MediaHandle, ResourceBundle};
pub use composition::{ComposedAsset, Playable};
pub use filters::{FilterChain, FilterDescriptor, FrameFilter};
pub use frame::{Frame, PixelFormat};
pub use gravity::{Gravity, Placement};
pub use media::{MediaAsset, MediaBackend, NativeBackend, TrackKind};
pub use settings::{Configuration, Directive};
