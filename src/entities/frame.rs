//! Displayed video frames with multi-format pixel buffers (U8, F16, F32)
//!
//! **Why**: decoders hand out 8-bit RGBA, HDR sources hand out half or full
//! float. Filters run on whatever arrives and return the same format.
//!
//! **Used by**: media backends (decode), filter kernels, frame worker,
//! presentation surfaces.
//!
//! # Extent and edge mode
//!
//! A frame covers `[0, width) x [0, height)`. Samples requested outside that
//! extent follow the frame's `EdgeMode`:
//! - `Transparent`: zero (the default for decoded frames)
//! - `Clamp`: nearest edge pixel, i.e. the image behaves as if extended
//!   infinitely. The filter pipeline clamps every frame before filtering so
//!   neighbourhood filters (blur) do not pull transparent black in at the
//!   borders.
//!
//! Buffers are shared behind `Arc`, so cloning a frame or changing its edge
//! mode never copies pixels.

use half::f16 as F16;
use rayon::prelude::*;
use std::sync::Arc;

/// Pixel buffer format - stores different precision levels
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    U8(Vec<u8>),   // LDR decoded video - 8-bit per channel
    F16(Vec<F16>), // HDR half-precision - 16-bit float per channel
    F32(Vec<f32>), // HDR full-precision - 32-bit float per channel
}

/// Pixel format type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,   // 8-bit RGBA (LDR)
    RgbaF16, // 16-bit half-float RGBA (HDR)
    RgbaF32, // 32-bit float RGBA (HDR)
}

/// How samples outside the frame extent are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeMode {
    #[default]
    Transparent,
    Clamp,
}

/// Single RGBA frame. Immutable; every operation returns a new frame.
#[derive(Debug, Clone)]
pub struct Frame {
    buffer: Arc<PixelBuffer>,
    width: usize,
    height: usize,
    edge: EdgeMode,
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.edge == other.edge
            && (Arc::ptr_eq(&self.buffer, &other.buffer) || self.buffer == other.buffer)
    }
}

impl Frame {
    /// Create transparent black frame of given format
    pub fn new(width: usize, height: usize, format: PixelFormat) -> Self {
        let len = width * height * 4;
        let buffer = match format {
            PixelFormat::Rgba8 => PixelBuffer::U8(vec![0; len]),
            PixelFormat::RgbaF16 => PixelBuffer::F16(vec![F16::ZERO; len]),
            PixelFormat::RgbaF32 => PixelBuffer::F32(vec![0.0; len]),
        };
        Self::from_buffer(buffer, width, height)
    }

    /// Wrap an existing buffer. Buffer length must be `width * height * 4`;
    /// a mismatched buffer yields an empty frame.
    pub fn from_buffer(buffer: PixelBuffer, width: usize, height: usize) -> Self {
        let len = match &buffer {
            PixelBuffer::U8(d) => d.len(),
            PixelBuffer::F16(d) => d.len(),
            PixelBuffer::F32(d) => d.len(),
        };
        if len != width * height * 4 {
            log::warn!(
                "Frame buffer size mismatch: {} values for {}x{}",
                len,
                width,
                height
            );
            return Self {
                buffer: Arc::new(PixelBuffer::U8(Vec::new())),
                width: 0,
                height: 0,
                edge: EdgeMode::Transparent,
            };
        }
        Self {
            buffer: Arc::new(buffer),
            width,
            height,
            edge: EdgeMode::Transparent,
        }
    }

    pub fn from_u8_buffer(data: Vec<u8>, width: usize, height: usize) -> Self {
        Self::from_buffer(PixelBuffer::U8(data), width, height)
    }

    pub fn from_f32_buffer(data: Vec<f32>, width: usize, height: usize) -> Self {
        Self::from_buffer(PixelBuffer::F32(data), width, height)
    }

    /// Solid-colour frame (RGBA in 0..1), mostly for tests and placeholders
    pub fn solid(width: usize, height: usize, rgba: [f32; 4], format: PixelFormat) -> Self {
        let data: Vec<f32> = (0..width * height).flat_map(|_| rgba).collect();
        Self::from_f32_rgba(data, format, width, height)
    }

    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (w, h) = img.dimensions();
        Self::from_u8_buffer(img.into_raw(), w as usize, h as usize)
    }

    /// Convert to 8-bit image (float formats are clamped to 0..1)
    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        let data: Vec<u8> = match self.buffer.as_ref() {
            PixelBuffer::U8(d) => d.clone(),
            _ => self
                .to_f32_rgba()
                .iter()
                .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
                .collect(),
        };
        image::RgbaImage::from_raw(self.width as u32, self.height as u32, data)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn buffer(&self) -> &Arc<PixelBuffer> {
        &self.buffer
    }

    pub fn pixel_format(&self) -> PixelFormat {
        match self.buffer.as_ref() {
            PixelBuffer::U8(_) => PixelFormat::Rgba8,
            PixelBuffer::F16(_) => PixelFormat::RgbaF16,
            PixelBuffer::F32(_) => PixelFormat::RgbaF32,
        }
    }

    pub fn edge_mode(&self) -> EdgeMode {
        self.edge
    }

    /// Same pixels, edge samples replicated infinitely
    pub fn clamped_to_extent(&self) -> Frame {
        Frame {
            edge: EdgeMode::Clamp,
            ..self.clone()
        }
    }

    /// All channels as f32 (U8 normalised to 0..1)
    pub fn to_f32_rgba(&self) -> Vec<f32> {
        match self.buffer.as_ref() {
            PixelBuffer::U8(d) => d.iter().map(|&v| v as f32 / 255.0).collect(),
            PixelBuffer::F16(d) => d.iter().map(|v| v.to_f32()).collect(),
            PixelBuffer::F32(d) => d.clone(),
        }
    }

    /// Build a frame of `format` from f32 RGBA data (U8 is clamped and rounded)
    pub fn from_f32_rgba(data: Vec<f32>, format: PixelFormat, width: usize, height: usize) -> Self {
        let buffer = match format {
            PixelFormat::Rgba8 => PixelBuffer::U8(
                data.iter()
                    .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
                    .collect(),
            ),
            PixelFormat::RgbaF16 => {
                PixelBuffer::F16(data.iter().map(|&v| F16::from_f32(v)).collect())
            }
            PixelFormat::RgbaF32 => PixelBuffer::F32(data),
        };
        Self::from_buffer(buffer, width, height)
    }

    /// Same extent and edge mode, new pixels
    pub fn with_buffer(&self, buffer: PixelBuffer) -> Frame {
        let mut out = Frame::from_buffer(buffer, self.width, self.height);
        out.edge = self.edge;
        out
    }

    /// Apply a per-pixel colour transform to RGB, alpha untouched.
    ///
    /// `f` receives and returns channels in 0..1 space. U8 output is clamped,
    /// float output is not (HDR values may leave 0..1).
    pub fn map_rgb<F>(&self, f: F) -> Frame
    where
        F: Fn([f32; 3]) -> [f32; 3] + Sync,
    {
        let buffer = match self.buffer.as_ref() {
            PixelBuffer::U8(data) => {
                let mut out = data.clone();
                out.par_chunks_exact_mut(4).for_each(|px| {
                    let rgb = f([
                        px[0] as f32 / 255.0,
                        px[1] as f32 / 255.0,
                        px[2] as f32 / 255.0,
                    ]);
                    for c in 0..3 {
                        px[c] = (rgb[c].clamp(0.0, 1.0) * 255.0).round() as u8;
                    }
                });
                PixelBuffer::U8(out)
            }
            PixelBuffer::F16(data) => {
                let mut out = data.clone();
                out.par_chunks_exact_mut(4).for_each(|px| {
                    let rgb = f([px[0].to_f32(), px[1].to_f32(), px[2].to_f32()]);
                    for c in 0..3 {
                        px[c] = F16::from_f32(rgb[c]);
                    }
                });
                PixelBuffer::F16(out)
            }
            PixelBuffer::F32(data) => {
                let mut out = data.clone();
                out.par_chunks_exact_mut(4).for_each(|px| {
                    let rgb = f([px[0], px[1], px[2]]);
                    px[..3].copy_from_slice(&rgb);
                });
                PixelBuffer::F32(out)
            }
        };
        self.with_buffer(buffer)
    }

    /// Read one pixel as f32 RGBA, resolving out-of-extent coordinates by edge mode
    pub fn sample(&self, x: isize, y: isize) -> [f32; 4] {
        if self.is_empty() {
            return [0.0; 4];
        }
        let inside = x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height;
        let (sx, sy) = match (inside, self.edge) {
            (true, _) => (x as usize, y as usize),
            (false, EdgeMode::Transparent) => return [0.0; 4],
            (false, EdgeMode::Clamp) => (
                x.clamp(0, self.width as isize - 1) as usize,
                y.clamp(0, self.height as isize - 1) as usize,
            ),
        };
        let i = (sy * self.width + sx) * 4;
        match self.buffer.as_ref() {
            PixelBuffer::U8(d) => [
                d[i] as f32 / 255.0,
                d[i + 1] as f32 / 255.0,
                d[i + 2] as f32 / 255.0,
                d[i + 3] as f32 / 255.0,
            ],
            PixelBuffer::F16(d) => [
                d[i].to_f32(),
                d[i + 1].to_f32(),
                d[i + 2].to_f32(),
                d[i + 3].to_f32(),
            ],
            PixelBuffer::F32(d) => [d[i], d[i + 1], d[i + 2], d[i + 3]],
        }
    }
}
