//! Brightness and contrast adjustments.
//!
//! `Brightness`: `v + amount`. `Contrast`: `(v - 0.5) * factor + 0.5`.
//! Alpha is untouched. U8 output is clamped, float output keeps HDR range.

use serde::{Deserialize, Serialize};

use super::FrameFilter;
use crate::entities::frame::Frame;

const EPS: f32 = 1e-4;

/// Additive brightness offset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Brightness {
    pub amount: f32,
}

impl Brightness {
    pub fn new(amount: f32) -> Self {
        Self { amount }
    }
}

impl FrameFilter for Brightness {
    fn name(&self) -> &'static str {
        "Brightness"
    }

    fn is_identity(&self) -> bool {
        self.amount.abs() < EPS
    }

    fn process(&self, frame: &Frame) -> Option<Frame> {
        if frame.is_empty() || !self.amount.is_finite() {
            return None;
        }
        let amount = self.amount;
        Some(frame.map_rgb(|rgb| rgb.map(|v| v + amount)))
    }
}

/// Contrast scale around mid-grey
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contrast {
    pub factor: f32,
}

impl Contrast {
    pub fn new(factor: f32) -> Self {
        Self { factor }
    }
}

impl FrameFilter for Contrast {
    fn name(&self) -> &'static str {
        "Contrast"
    }

    fn is_identity(&self) -> bool {
        (self.factor - 1.0).abs() < EPS
    }

    fn process(&self, frame: &Frame) -> Option<Frame> {
        if frame.is_empty() || !self.factor.is_finite() {
            return None;
        }
        let cf = self.factor;
        Some(frame.map_rgb(|rgb| rgb.map(|v| (v - 0.5) * cf + 0.5)))
    }
}
