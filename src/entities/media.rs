//! Probed media: tracks, time ranges and the backend seam
//!
//! `MediaBackend` is the platform collaborator that knows how to read a
//! handle: what tracks it carries (probe) and what picture it shows at a given
//! time (decode). The engine never touches files directly.
//!
//! `NativeBackend` reads WebVTT natively; audio/video containers need the
//! `ffmpeg` feature.

use log::debug;
use std::sync::Arc;

use super::asset::{MediaAddress, MediaHandle};
use super::frame::Frame;
use super::subtitles::{self, Cue};
use crate::error::MediaError;
use crate::utils::media::{is_subtitle, is_video};

/// Half-open time range `[start, start + duration)` in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub duration: f64,
}

impl TimeRange {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    /// `[0, duration)`
    pub fn from_zero(duration: f64) -> Self {
        Self::new(0.0, duration)
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end()
    }

    pub fn is_valid(&self) -> bool {
        self.start.is_finite()
            && self.duration.is_finite()
            && self.start >= 0.0
            && self.duration > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
    Text,
}

/// One track as found in a source file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTrack {
    pub id: u32,
    pub kind: TrackKind,
    pub range: TimeRange,
    /// Backend can decode this track
    pub decodable: bool,
    pub language: Option<String>,
    /// Parsed cues for text tracks, empty otherwise
    pub cues: Arc<Vec<Cue>>,
}

impl SourceTrack {
    pub fn new(id: u32, kind: TrackKind, range: TimeRange) -> Self {
        Self {
            id,
            kind,
            range,
            decodable: true,
            language: None,
            cues: Arc::new(Vec::new()),
        }
    }
}

/// Result of probing a handle
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    pub handle: MediaHandle,
    pub duration: f64,
    pub tracks: Vec<SourceTrack>,
}

impl MediaAsset {
    /// First track of `kind`
    pub fn primary_track(&self, kind: TrackKind) -> Option<&SourceTrack> {
        self.tracks.iter().find(|t| t.kind == kind)
    }

    pub fn has_track(&self, kind: TrackKind) -> bool {
        self.primary_track(kind).is_some()
    }
}

/// Platform media access: probing and per-time frame decoding.
///
/// Implementations must be callable from the frame worker thread.
pub trait MediaBackend: Send + Sync {
    /// Read duration and tracks
    fn probe(&self, handle: &MediaHandle) -> Result<MediaAsset, MediaError>;

    /// Picture of the primary video track at `seconds`, or None if unavailable
    fn frame_at(&self, handle: &MediaHandle, seconds: f64) -> Option<Frame>;
}

/// Filesystem backend. WebVTT always, containers with `ffmpeg` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }

    fn probe_subtitle(handle: &MediaHandle) -> Result<MediaAsset, MediaError> {
        let path = handle
            .path()
            .ok_or_else(|| MediaError::RemoteUnavailable(handle.to_string()))?;
        let text = std::fs::read_to_string(path).map_err(|e| MediaError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let cues = subtitles::parse_vtt(&text)?;
        let duration = cues.iter().map(|c| c.end).fold(0.0, f64::max);
        debug!("Parsed {} cues from {} ({:.3}s)", cues.len(), path.display(), duration);

        let mut track = SourceTrack::new(1, TrackKind::Text, TimeRange::from_zero(duration));
        track.cues = Arc::new(cues);
        Ok(MediaAsset {
            handle: handle.clone(),
            duration,
            tracks: vec![track],
        })
    }
}

impl MediaBackend for NativeBackend {
    fn probe(&self, handle: &MediaHandle) -> Result<MediaAsset, MediaError> {
        let path = match handle.address() {
            MediaAddress::Remote(url) => return Err(MediaError::RemoteUnavailable(url.clone())),
            MediaAddress::File(path) => path,
        };
        if is_subtitle(path) {
            return Self::probe_subtitle(handle);
        }
        if !is_video(path) {
            return Err(MediaError::Unsupported(path.display().to_string()));
        }

        #[cfg(feature = "ffmpeg")]
        {
            super::ffmpeg::probe(handle, path)
        }
        #[cfg(not(feature = "ffmpeg"))]
        {
            Err(MediaError::Unsupported(format!(
                "{} (build with --features ffmpeg)",
                path.display()
            )))
        }
    }

    fn frame_at(&self, handle: &MediaHandle, seconds: f64) -> Option<Frame> {
        let path = handle.path()?;
        if is_subtitle(path) {
            return None;
        }

        #[cfg(feature = "ffmpeg")]
        {
            super::ffmpeg::decode_at(path, seconds)
                .map_err(|e| log::debug!("Decode failed at {:.3}s: {}", seconds, e))
                .ok()
        }
        #[cfg(not(feature = "ffmpeg"))]
        {
            let _ = seconds;
            None
        }
    }
}
