//! Presentation surface: where filtered frames end up.
//!
//! The engine only needs a sink that accepts a frame with its placement and
//! reports its bounds. Each host realizes it once (a window layer, a texture,
//! an offscreen buffer); the engine and its lifecycle code stay the same.

use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::entities::frame::Frame;
use crate::entities::gravity::{Gravity, Placement};

/// Frame sink. `present` is called from the frame worker thread.
pub trait PresentationSurface: Send + Sync {
    /// Show `frame` at `placement` (surface coordinates)
    fn present(&self, frame: Frame, placement: Placement);

    /// Current drawable size in pixels
    fn bounds(&self) -> (usize, usize);

    fn set_gravity(&self, gravity: Gravity);

    /// Engine is (re)starting to present into this surface
    fn attach(&self) {}

    /// Engine released the surface; nothing is presented afterwards
    fn detach(&self);
}

/// Offscreen surface keeping the last presented frame
#[derive(Debug)]
pub struct HeadlessSurface {
    bounds: (usize, usize),
    gravity: Mutex<Gravity>,
    last: Mutex<Option<(Frame, Placement)>>,
    attached: AtomicBool,
}

impl HeadlessSurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            bounds: (width, height),
            gravity: Mutex::new(Gravity::default()),
            last: Mutex::new(None),
            attached: AtomicBool::new(true),
        }
    }

    /// Last frame presented, with its placement
    pub fn last_frame(&self) -> Option<(Frame, Placement)> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn gravity(&self) -> Gravity {
        *self.gravity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}

impl PresentationSurface for HeadlessSurface {
    fn present(&self, frame: Frame, placement: Placement) {
        if !self.is_attached() {
            return;
        }
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some((frame, placement));
    }

    fn bounds(&self) -> (usize, usize) {
        self.bounds
    }

    fn set_gravity(&self, gravity: Gravity) {
        *self.gravity.lock().unwrap_or_else(PoisonError::into_inner) = gravity;
    }

    fn attach(&self) {
        self.attached.store(true, Ordering::Release);
    }

    fn detach(&self) {
        if self.attached.swap(false, Ordering::AcqRel) {
            debug!("Headless surface detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::frame::PixelFormat;

    #[test]
    fn test_detached_surface_ignores_frames() {
        let surface = HeadlessSurface::new(8, 8);
        let frame = Frame::new(2, 2, PixelFormat::Rgba8);
        let placement = Gravity::Resize.place(frame.resolution(), surface.bounds());

        surface.present(frame.clone(), placement);
        assert!(surface.last_frame().is_some());

        surface.detach();
        *surface.last.lock().unwrap() = None;
        surface.present(frame, placement);
        assert!(surface.last_frame().is_none());
    }
}
