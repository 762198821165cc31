//! Display gravity: how a frame is fitted into the presentation bounds.

use serde::{Deserialize, Serialize};

/// Fitting mode, mirrors the usual video-layer gravities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Gravity {
    /// Keep aspect, fit inside bounds (letterbox)
    #[default]
    ResizeAspect,
    /// Keep aspect, fill bounds (edges cropped)
    ResizeAspectFill,
    /// Stretch to bounds
    Resize,
}

/// Destination rectangle in surface coordinates. May extend past the bounds
/// for `ResizeAspectFill`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Gravity {
    /// Place a `frame` sized image inside `bounds`, centred.
    pub fn place(self, frame: (usize, usize), bounds: (usize, usize)) -> Placement {
        let (fw, fh) = (frame.0 as f32, frame.1 as f32);
        let (bw, bh) = (bounds.0 as f32, bounds.1 as f32);

        if fw <= 0.0 || fh <= 0.0 || bw <= 0.0 || bh <= 0.0 {
            return Placement { x: 0.0, y: 0.0, width: 0.0, height: 0.0 };
        }

        let scale = match self {
            Gravity::Resize => {
                return Placement { x: 0.0, y: 0.0, width: bw, height: bh };
            }
            Gravity::ResizeAspect => (bw / fw).min(bh / fh),
            Gravity::ResizeAspectFill => (bw / fw).max(bh / fh),
        };

        let width = fw * scale;
        let height = fh * scale;
        Placement {
            x: (bw - width) / 2.0,
            y: (bh - height) / 2.0,
            width,
            height,
        }
    }
}
