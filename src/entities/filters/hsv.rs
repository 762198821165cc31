//! Hue/saturation/value adjustment.
//!
//! RGB -> HSV, `H += hue_shift` (wrapping), `S *= saturation`,
//! `V *= value`, back to RGB. Value may exceed 1 for float frames.

use serde::{Deserialize, Serialize};

use super::FrameFilter;
use crate::entities::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HueSaturation {
    /// Degrees, -180..180
    pub hue_shift: f32,
    pub saturation: f32,
    pub value: f32,
}

impl Default for HueSaturation {
    fn default() -> Self {
        Self {
            hue_shift: 0.0,
            saturation: 1.0,
            value: 1.0,
        }
    }
}

impl FrameFilter for HueSaturation {
    fn name(&self) -> &'static str {
        "HueSaturation"
    }

    fn is_identity(&self) -> bool {
        self.hue_shift.abs() < 0.01
            && (self.saturation - 1.0).abs() < 0.001
            && (self.value - 1.0).abs() < 0.001
    }

    fn process(&self, frame: &Frame) -> Option<Frame> {
        let params = [self.hue_shift, self.saturation, self.value];
        if frame.is_empty() || params.iter().any(|p| !p.is_finite()) {
            return None;
        }
        let (shift, sat, val) = (self.hue_shift, self.saturation.max(0.0), self.value.max(0.0));
        Some(frame.map_rgb(|[r, g, b]| {
            let (h, s, v) = rgb_to_hsv(r, g, b);
            let (r, g, b) = hsv_to_rgb(
                (h + shift).rem_euclid(360.0),
                (s * sat).clamp(0.0, 1.0),
                v * val,
            );
            [r, g, b]
        }))
    }
}

/// H in 0..360, S in 0..1, V = max component
fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { delta / max } else { 0.0 };
    let h = if delta.abs() < 1e-4 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    (h, s, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    if s <= 0.0 {
        return (v, v, v);
    }
    let h = h.rem_euclid(360.0);
    let c = v * s;
    let h_prime = h / 60.0;
    let x = c * (1.0 - ((h_prime % 2.0) - 1.0).abs());
    let m = v - c;

    let (r1, g1, b1) = match h_prime as i32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    (r1 + m, g1 + m, b1 + m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::frame::PixelFormat;

    #[test]
    fn test_hue_shift_red_to_green() {
        let frame = Frame::solid(1, 1, [1.0, 0.0, 0.0, 1.0], PixelFormat::RgbaF32);
        let filter = HueSaturation {
            hue_shift: 120.0,
            ..Default::default()
        };
        let [r, g, b, _] = filter.process(&frame).unwrap().sample(0, 0);
        assert!(g > 0.99 && r < 0.01 && b < 0.01);
    }

    #[test]
    fn test_desaturate_to_gray() {
        let frame = Frame::solid(1, 1, [0.8, 0.2, 0.4, 1.0], PixelFormat::RgbaF32);
        let filter = HueSaturation {
            saturation: 0.0,
            ..Default::default()
        };
        let [r, g, b, _] = filter.process(&frame).unwrap().sample(0, 0);
        assert!((r - 0.8).abs() < 1e-5 && r == g && g == b);
    }

    #[test]
    fn test_gray_ignores_hue() {
        let (h, s, v) = rgb_to_hsv(0.5, 0.5, 0.5);
        assert!(s < 0.01);
        let (r, g, b) = hsv_to_rgb(h + 180.0, s, v);
        assert!((r - 0.5).abs() < 0.01 && (g - 0.5).abs() < 0.01 && (b - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_default_is_identity() {
        assert!(HueSaturation::default().is_identity());
    }
}
