//! Test doubles: scripted media backend and recording surface.

use crossbeam_channel::{Receiver, Sender, unbounded};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::surface::PresentationSurface;
use crate::entities::asset::{MediaAddress, MediaHandle};
use crate::entities::frame::{Frame, PixelFormat};
use crate::entities::gravity::{Gravity, Placement};
use crate::entities::media::{MediaAsset, MediaBackend, SourceTrack, TimeRange, TrackKind};
use crate::entities::subtitles::Cue;
use crate::error::MediaError;

/// Backend answering probes from a table
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    assets: Mutex<HashMap<MediaAddress, MediaAsset>>,
    probes: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, asset: MediaAsset) {
        self.assets
            .lock()
            .unwrap()
            .insert(asset.handle.address().clone(), asset);
    }

    /// Video + audio source of `duration` seconds
    pub fn add_video(&self, handle: &MediaHandle, duration: f64) {
        self.add(video_asset(handle, duration));
    }

    /// Subtitle source with one cue per `(start, end, text)`
    pub fn add_subtitle(&self, handle: &MediaHandle, cues: &[(f64, f64, &str)]) {
        let cues: Vec<Cue> = cues
            .iter()
            .map(|&(start, end, text)| Cue {
                id: None,
                start,
                end,
                text: text.to_string(),
            })
            .collect();
        let duration = cues.iter().map(|c| c.end).fold(0.0, f64::max);
        let mut track = SourceTrack::new(1, TrackKind::Text, TimeRange::from_zero(duration));
        track.cues = Arc::new(cues);
        self.add(MediaAsset {
            handle: handle.clone(),
            duration,
            tracks: vec![track],
        });
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

pub(crate) fn video_asset(handle: &MediaHandle, duration: f64) -> MediaAsset {
    MediaAsset {
        handle: handle.clone(),
        duration,
        tracks: vec![
            SourceTrack::new(0, TrackKind::Video, TimeRange::from_zero(duration)),
            SourceTrack::new(1, TrackKind::Audio, TimeRange::from_zero(duration)),
        ],
    }
}

impl MediaBackend for ScriptedBackend {
    fn probe(&self, handle: &MediaHandle) -> Result<MediaAsset, MediaError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.assets
            .lock()
            .unwrap()
            .get(handle.address())
            .cloned()
            .ok_or_else(|| MediaError::Unsupported(handle.to_string()))
    }

    fn frame_at(&self, handle: &MediaHandle, seconds: f64) -> Option<Frame> {
        let assets = self.assets.lock().unwrap();
        let asset = assets.get(handle.address())?;
        let video = asset.primary_track(TrackKind::Video)?;
        if !(0.0..=asset.duration).contains(&seconds) || !video.decodable {
            return None;
        }
        Some(Frame::solid(4, 2, [0.5, 0.5, 0.5, 1.0], PixelFormat::Rgba8))
    }
}

/// Surface forwarding every presented frame to a channel
pub(crate) struct RecordingSurface {
    bounds: (usize, usize),
    tx: Sender<(Frame, Placement)>,
    rx: Receiver<(Frame, Placement)>,
    gravity: Mutex<Gravity>,
    detached: AtomicUsize,
}

impl RecordingSurface {
    pub fn new(bounds: (usize, usize)) -> Arc<Self> {
        let (tx, rx) = unbounded();
        Arc::new(Self {
            bounds,
            tx,
            rx,
            gravity: Mutex::new(Gravity::default()),
            detached: AtomicUsize::new(0),
        })
    }

    pub fn wait_frame(&self, timeout: Duration) -> Option<(Frame, Placement)> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn gravity(&self) -> Gravity {
        *self.gravity.lock().unwrap()
    }

    pub fn detach_count(&self) -> usize {
        self.detached.load(Ordering::SeqCst)
    }
}

impl PresentationSurface for RecordingSurface {
    fn present(&self, frame: Frame, placement: Placement) {
        let _ = self.tx.send((frame, placement));
    }

    fn bounds(&self) -> (usize, usize) {
        self.bounds
    }

    fn set_gravity(&self, gravity: Gravity) {
        *self.gravity.lock().unwrap() = gravity;
    }

    fn detach(&self) {
        self.detached.fetch_add(1, Ordering::SeqCst);
    }
}

/// Temporary bundle directory containing empty files with the given names
pub(crate) fn bundle_dir(files: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in files {
        std::fs::write(dir.path().join(name), b"").unwrap();
    }
    dir
}

pub(crate) fn handle_in(dir: &Path, file: &str) -> MediaHandle {
    MediaHandle::file(dir.join(file))
}
