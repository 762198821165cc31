//! Separable Gaussian blur.
//!
//! Two passes (horizontal, vertical), rows processed in parallel. Taps that
//! fall outside the frame are resolved by the frame's edge mode, so a frame
//! clamped to its extent blurs without dark borders.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::FrameFilter;
use crate::entities::frame::{EdgeMode, Frame};

/// Largest accepted radius in pixels; larger radii produce no output
pub const MAX_RADIUS: f32 = 512.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianBlur {
    /// Pixels; 0 disables
    pub radius: f32,
}

impl GaussianBlur {
    pub fn new(radius: f32) -> Self {
        Self { radius }
    }
}

impl FrameFilter for GaussianBlur {
    fn name(&self) -> &'static str {
        "GaussianBlur"
    }

    fn is_identity(&self) -> bool {
        self.radius <= 0.0
    }

    fn process(&self, frame: &Frame) -> Option<Frame> {
        if frame.is_empty() || !self.radius.is_finite() || self.radius > MAX_RADIUS {
            return None;
        }
        let (width, height) = frame.resolution();
        let kernel = gaussian_kernel(self.radius)?;

        let horizontal = convolve(frame, &kernel, |x, y, k| (x + k, y));
        let mut temp = Frame::from_f32_buffer(horizontal, width, height);
        if frame.edge_mode() == EdgeMode::Clamp {
            temp = temp.clamped_to_extent();
        }
        let vertical = convolve(&temp, &kernel, |x, y, k| (x, y + k));

        let out = Frame::from_f32_rgba(vertical, frame.pixel_format(), width, height);
        Some(match frame.edge_mode() {
            EdgeMode::Clamp => out.clamped_to_extent(),
            EdgeMode::Transparent => out,
        })
    }
}

/// One convolution pass; `tap` maps (x, y, kernel offset) to the sample position
fn convolve<F>(src: &Frame, kernel: &[f32], tap: F) -> Vec<f32>
where
    F: Fn(isize, isize, isize) -> (isize, isize) + Sync,
{
    let (width, height) = src.resolution();
    let half = (kernel.len() / 2) as isize;
    let mut dst = vec![0.0f32; width * height * 4];

    dst.par_chunks_mut(width * 4).enumerate().for_each(|(y, row)| {
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let mut acc = [0.0f32; 4];
            for (ki, &weight) in kernel.iter().enumerate() {
                let (sx, sy) = tap(x as isize, y as isize, ki as isize - half);
                let s = src.sample(sx, sy);
                for c in 0..4 {
                    acc[c] += s[c] * weight;
                }
            }
            px.copy_from_slice(&acc);
        }
    });
    dst
}

/// Normalised 1D kernel, `2 * ceil(2r) + 1` taps, sigma = r / 2.
/// None when the radius is too small to give a usable sigma.
fn gaussian_kernel(radius: f32) -> Option<Vec<f32>> {
    let half_size = (radius.min(MAX_RADIUS) * 2.0).ceil() as i32;
    let sigma2 = (radius / 2.0).powi(2);
    if !sigma2.is_normal() {
        return None;
    }

    let mut kernel: Vec<f32> = (-half_size..=half_size)
        .map(|i| {
            let d = i as f32;
            (-(d * d) / (2.0 * sigma2)).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return None;
    }
    for w in &mut kernel {
        *w /= sum;
    }
    Some(kernel)
}
