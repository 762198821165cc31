//! Composed assets: one video/audio source plus an optional subtitle text track
//!
//! `merge` builds a new composition whose tracks all span the video source's
//! full duration `[0, duration)`. Video and audio are essential: if either
//! cannot be copied the merge is discarded. Subtitles are not: a text track
//! that fails to copy is dropped and the rest of the composition is returned.
//!
//! The text track stays a separate, selectable track of cues. Nothing here
//! renders text into pixels.

use log::{debug, warn};
use std::sync::Arc;
use uuid::Uuid;

use super::asset::{MediaAddress, MediaHandle};
use super::media::{MediaAsset, SourceTrack, TimeRange, TrackKind};
use super::subtitles::{self, Cue};
use crate::error::MediaError;

/// Track inside a composition, pointing back into its source
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionTrack {
    pub kind: TrackKind,
    pub source: MediaHandle,
    pub source_track: u32,
    /// Window read from the source
    pub source_range: TimeRange,
    /// Where the window sits in composition time
    pub range: TimeRange,
    pub language: Option<String>,
    pub cues: Arc<Vec<Cue>>,
}

impl CompositionTrack {
    /// Source time for composition time `t`, if `t` is inside the track
    pub fn source_time(&self, t: f64) -> Option<f64> {
        self.range
            .contains(t)
            .then(|| self.source_range.start + (t - self.range.start))
    }
}

/// Immutable aggregate of up to three tracks (video, audio, text)
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedAsset {
    id: Uuid,
    source: MediaHandle,
    duration: f64,
    tracks: Vec<CompositionTrack>,
}

impl ComposedAsset {
    fn new(source: MediaHandle, duration: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            duration,
            tracks: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Handle of the video/audio source
    pub fn source(&self) -> &MediaHandle {
        &self.source
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn tracks(&self) -> &[CompositionTrack] {
        &self.tracks
    }

    pub fn track(&self, kind: TrackKind) -> Option<&CompositionTrack> {
        self.tracks.iter().find(|t| t.kind == kind)
    }

    pub fn kinds(&self) -> Vec<TrackKind> {
        self.tracks.iter().map(|t| t.kind).collect()
    }

    /// Video source handle and source time for composition time `t`
    pub fn video_at(&self, t: f64) -> Option<(&MediaHandle, f64)> {
        let track = self.track(TrackKind::Video)?;
        Some((&track.source, track.source_time(t)?))
    }

    /// Subtitle cue shown at composition time `t`
    pub fn cue_at(&self, t: f64) -> Option<&Cue> {
        let track = self.track(TrackKind::Text)?;
        subtitles::cue_at(&track.cues, track.source_time(t)?)
    }

    /// Copy `window` of `track` from `source` to composition time 0.
    fn insert(
        &mut self,
        source: &MediaHandle,
        track: &SourceTrack,
        window: TimeRange,
    ) -> Result<(), MediaError> {
        if !track.decodable {
            return Err(MediaError::Unsupported(format!(
                "{:?} track {} of {}",
                track.kind, track.id, source
            )));
        }
        if !window.is_valid() {
            return Err(MediaError::Malformed(format!(
                "invalid window {:?} for {:?} track of {}",
                window, track.kind, source
            )));
        }
        self.tracks.push(CompositionTrack {
            kind: track.kind,
            source: source.clone(),
            source_track: track.id,
            source_range: window,
            range: TimeRange::from_zero(window.duration),
            language: track.language.clone(),
            cues: Arc::clone(&track.cues),
        });
        Ok(())
    }
}

/// Merge a video/audio asset with an optional subtitle asset.
///
/// Returns None when an essential track fails to copy or when the source has
/// neither video nor audio.
pub fn merge(video: &MediaAsset, subtitle: Option<&MediaAsset>) -> Option<ComposedAsset> {
    let window = TimeRange::from_zero(video.duration);
    let mut composed = ComposedAsset::new(video.handle.clone(), video.duration);

    for kind in [TrackKind::Video, TrackKind::Audio] {
        if let Some(track) = video.primary_track(kind) {
            if let Err(e) = composed.insert(&video.handle, track, window) {
                warn!("Merge of {} discarded: {}", video.handle, e);
                return None;
            }
        }
    }
    if composed.tracks.is_empty() {
        warn!("Merge of {} discarded: no video or audio track", video.handle);
        return None;
    }

    if let Some(sub) = subtitle {
        match sub.primary_track(TrackKind::Text) {
            Some(track) => {
                if let Err(e) = composed.insert(&sub.handle, track, window) {
                    warn!("Subtitle track dropped from {}: {}", video.handle, e);
                }
            }
            None => debug!("{} has no text track, merging without subtitles", sub.handle),
        }
    }

    debug!(
        "Merged {} -> {} ({:?}, {:.3}s)",
        video.handle,
        composed.id,
        composed.kinds(),
        composed.duration
    );
    Some(composed)
}

/// What a player item plays: a plain handle or a composition
#[derive(Debug, Clone, PartialEq)]
pub enum Playable {
    Media(MediaHandle),
    Composed(Arc<ComposedAsset>),
}

impl Playable {
    /// Address of the underlying video/audio source
    pub fn address(&self) -> &MediaAddress {
        match self {
            Playable::Media(handle) => handle.address(),
            Playable::Composed(asset) => asset.source().address(),
        }
    }

    pub fn handle(&self) -> &MediaHandle {
        match self {
            Playable::Media(handle) => handle,
            Playable::Composed(asset) => asset.source(),
        }
    }
}

impl From<MediaHandle> for Playable {
    fn from(handle: MediaHandle) -> Self {
        Playable::Media(handle)
    }
}
