//! Event vocabulary of the engine.
//!
//! Two channels leave the engine:
//! - discrete `PlayerEvent`s, at most one per underlying transition
//! - continuous `TimeTick`s from the periodic time watcher
//!
//! `PlaybackCommand` is not an event: it is the last accepted transport
//! action, kept in a single slot.

use uuid::Uuid;

use crate::entities::asset::MediaAddress;
use crate::entities::filters::FilterDescriptor;
use crate::error::ErrorKind;

/// Identity of a player item as seen by consumers
#[derive(Debug, Clone, PartialEq)]
pub struct ItemInfo {
    pub id: Uuid,
    pub address: MediaAddress,
    /// Known duration when the item became current
    pub duration: Option<f64>,
}

/// Discrete engine event
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Error(ErrorKind),
    /// Seek finished (`success = false` when interrupted or unplayable)
    Seek { success: bool, time: f64 },
    Paused,
    WaitingToPlayAtSpecifiedRate,
    Playing,
    CurrentItemChanged(Option<ItemInfo>),
    CurrentItemRemoved,
    VolumeChanged(f32),
    /// Subtitle text existed but could not be merged; playback continues
    SubtitlesDropped,
}

/// Elapsed playback time of the current item, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeTick(pub f64);

impl TimeTick {
    pub fn seconds(&self) -> f64 {
        self.0
    }
}

/// Last transport action accepted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    Seek(f64),
    SetMuted(bool),
    SetRate(f32),
    SetVolume(f32),
    SetFilters(Vec<FilterDescriptor>),
    SetBrightness(f32),
    SetContrast(f32),
}

impl PlaybackCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackCommand::Play => "play",
            PlaybackCommand::Pause => "pause",
            PlaybackCommand::Seek(_) => "seek",
            PlaybackCommand::SetMuted(_) => "setMuted",
            PlaybackCommand::SetRate(_) => "setRate",
            PlaybackCommand::SetVolume(_) => "setVolume",
            PlaybackCommand::SetFilters(_) => "setFilters",
            PlaybackCommand::SetBrightness(_) => "setBrightness",
            PlaybackCommand::SetContrast(_) => "setContrast",
        }
    }
}
