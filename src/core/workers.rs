//! Frame worker: the asynchronous per-frame path.
//!
//! One dedicated thread fed by a bounded channel of capacity 1. The owning
//! context submits with `try_send` and never blocks: if the worker is still
//! busy with the previous frame the new request is dropped and counted.
//!
//! For each request the worker decodes the picture through the media
//! backend, runs the request's `FilterChain` snapshot, places the result with
//! the request's gravity inside the surface bounds and presents it. A panic
//! inside the filter chain is caught here and the unfiltered frame is shown.
//! The worker never touches engine state.

use crossbeam_channel::{Sender, TrySendError, bounded};
use log::{trace, warn};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use super::surface::PresentationSurface;
use crate::entities::composition::Playable;
use crate::entities::filters::{self, FilterChain};
use crate::entities::gravity::Gravity;
use crate::entities::media::MediaBackend;

/// Everything the worker needs for one frame
#[derive(Debug, Clone)]
pub struct FrameRequest {
    pub playable: Playable,
    pub time: f64,
    pub chain: Arc<FilterChain>,
    pub gravity: Gravity,
}

#[derive(Debug, Default)]
struct Counters {
    presented: AtomicU64,
    dropped: AtomicU64,
}

pub struct FrameWorker {
    tx: Option<Sender<FrameRequest>>,
    handle: Option<thread::JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl FrameWorker {
    /// Spawn the worker thread
    pub fn spawn(
        backend: Arc<dyn MediaBackend>,
        surface: Arc<dyn PresentationSurface>,
    ) -> std::io::Result<Self> {
        let (tx, rx) = bounded::<FrameRequest>(1);
        let counters = Arc::new(Counters::default());
        let worker_counters = Arc::clone(&counters);

        let handle = thread::Builder::new()
            .name("loopview-frames".to_string())
            .spawn(move || {
                trace!("Frame worker started");
                for request in rx.iter() {
                    if render(backend.as_ref(), surface.as_ref(), request) {
                        worker_counters.presented.fetch_add(1, Ordering::Relaxed);
                    }
                }
                trace!("Frame worker stopped");
            })?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            counters,
        })
    }

    /// Hand a frame to the worker without blocking. False if dropped.
    pub fn submit(&self, request: FrameRequest) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(request)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                trace!("Frame path busy, dropped frame at {:.3}s", request.time);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Frames presented so far
    pub fn presented(&self) -> u64 {
        self.counters.presented.load(Ordering::Relaxed)
    }

    /// Frames dropped because the worker was busy
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.tx.is_some()
    }

    /// Close the channel and join the thread. Idempotent.
    pub fn shutdown(&mut self) {
        self.tx = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Frame worker panicked");
            }
            trace!(
                "Frame worker joined: {} presented, {} dropped",
                self.presented(),
                self.dropped()
            );
        }
    }
}

impl Drop for FrameWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decode, filter, place, present. False if there was nothing to show.
fn render(
    backend: &dyn MediaBackend,
    surface: &dyn PresentationSurface,
    request: FrameRequest,
) -> bool {
    let (handle, time) = match &request.playable {
        Playable::Media(handle) => (handle, request.time),
        Playable::Composed(asset) => match asset.video_at(request.time) {
            Some(target) => target,
            None => return false,
        },
    };
    let Some(frame) = backend.frame_at(handle, time) else {
        trace!("No frame for {} at {:.3}s", handle, time);
        return false;
    };

    let chain = Arc::clone(&request.chain);
    let filtered = catch_unwind(AssertUnwindSafe(|| filters::apply(&frame, &chain)))
        .unwrap_or_else(|_| {
            warn!("Filter chain panicked at {:.3}s, presenting unfiltered frame", time);
            frame.clone()
        });

    let placement = request.gravity.place(filtered.resolution(), surface.bounds());
    surface.present(filtered, placement);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::asset::MediaHandle;
    use crate::entities::filters::configure;
    use crate::entities::frame::EdgeMode;
    use crate::testing::{RecordingSurface, ScriptedBackend};
    use std::time::Duration;

    fn request(handle: &MediaHandle, chain: FilterChain) -> FrameRequest {
        FrameRequest {
            playable: Playable::Media(handle.clone()),
            time: 0.5,
            chain: Arc::new(chain),
            gravity: Gravity::ResizeAspect,
        }
    }

    #[test]
    fn test_presents_filtered_frame() {
        let backend = ScriptedBackend::new();
        let handle = MediaHandle::file("clip.mp4");
        backend.add_video(&handle, 2.0);
        let surface = RecordingSurface::new((16, 16));
        let mut worker = FrameWorker::spawn(backend, surface.clone()).unwrap();

        assert!(worker.submit(request(&handle, configure(&[], 0.0, 1.0))));
        let (frame, placement) = surface.wait_frame(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.edge_mode(), EdgeMode::Clamp);
        assert_eq!(placement.width, 16.0);

        worker.shutdown();
        worker.shutdown();
        assert!(!worker.is_running());
        assert!(!worker.submit(request(&handle, FilterChain::default())));
        assert_eq!(worker.presented(), 1);
    }

    #[test]
    fn test_missing_frame_is_not_presented() {
        let backend = ScriptedBackend::new();
        let surface = RecordingSurface::new((16, 16));
        let mut worker = FrameWorker::spawn(backend, surface.clone()).unwrap();
        worker.submit(request(&MediaHandle::file("none.mp4"), FilterChain::default()));
        worker.shutdown();
        assert_eq!(worker.presented(), 0);
        assert!(surface.wait_frame(Duration::from_millis(50)).is_none());
    }
}
