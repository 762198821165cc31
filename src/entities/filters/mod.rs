//! Per-frame filter pipeline.
//!
//! A `FilterChain` is an immutable, ordered list of filter descriptors:
//! caller filters first, then the synthesized brightness and contrast
//! adjustments. It is rebuilt whenever any of those inputs change and handed
//! to the frame path as an `Arc` snapshot, so the frame path never sees a
//! half-updated chain.
//!
//! # Application
//!
//! ```text
//! apply(frame, chain):
//!   image = frame.clamped_to_extent()
//!   for filter in chain:
//!       image = filter(image)?.clamped_to_extent()   // None => keep image
//! ```
//!
//! Clamping makes the image behave as infinitely extended, so neighbourhood
//! filters do not pull transparent black in at the borders. A filter that
//! produces no output is skipped; the frame is never dropped.
//!
//! # Filter kinds
//!
//! | Kind | Parameters | Identity |
//! |------|------------|----------|
//! | **Brightness** | `amount` (additive) | 0 |
//! | **Contrast** | `factor` around mid-grey | 1 |
//! | **HueSaturation** | `hue_shift` deg, `saturation`, `value` | 0 / 1 / 1 |
//! | **GaussianBlur** | `radius` px | 0 |

pub mod blur;
pub mod brightness;
pub mod hsv;

use enum_dispatch::enum_dispatch;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

pub use blur::GaussianBlur;
pub use brightness::{Brightness, Contrast};
pub use hsv::HueSaturation;

use super::frame::Frame;

/// One image transform of the chain
#[enum_dispatch]
pub trait FrameFilter {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Parameters leave every pixel unchanged
    fn is_identity(&self) -> bool;

    /// Transformed frame, or None when the filter cannot process it
    /// (empty frame, non-finite parameters)
    fn process(&self, frame: &Frame) -> Option<Frame>;
}

/// Serializable filter description
#[enum_dispatch(FrameFilter)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FilterDescriptor {
    Brightness(Brightness),
    Contrast(Contrast),
    HueSaturation(HueSaturation),
    GaussianBlur(GaussianBlur),
}

/// Immutable ordered filter list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterChain {
    filters: Vec<FilterDescriptor>,
}

impl FilterChain {
    pub fn filters(&self) -> &[FilterDescriptor] {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Every filter is an identity
    pub fn is_identity(&self) -> bool {
        self.filters.iter().all(|f| f.is_identity())
    }
}

/// Build the chain: caller filters, then brightness, then contrast.
pub fn configure(filters: &[FilterDescriptor], brightness: f32, contrast: f32) -> FilterChain {
    let mut list = filters.to_vec();
    list.push(Brightness::new(brightness).into());
    list.push(Contrast::new(contrast).into());
    debug!(
        "Filter chain: {} caller filters, brightness {}, contrast {}",
        filters.len(),
        brightness,
        contrast
    );
    FilterChain { filters: list }
}

/// Run `frame` through `chain`. Never fails: filters without output are skipped.
pub fn apply(frame: &Frame, chain: &FilterChain) -> Frame {
    let mut image = frame.clamped_to_extent();
    for filter in chain.filters() {
        if filter.is_identity() {
            continue;
        }
        match filter.process(&image) {
            Some(out) => image = out.clamped_to_extent(),
            None => trace!("Filter {} produced no output, skipped", filter.name()),
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::frame::PixelFormat;

    #[test]
    fn test_configure_appends_adjustments() {
        let chain = configure(&[GaussianBlur::new(2.0).into()], 0.1, 1.2);
        let names: Vec<_> = chain.filters().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["GaussianBlur", "Brightness", "Contrast"]);
    }

    #[test]
    fn test_identity_chain_returns_clamped_input() {
        let frame = Frame::solid(4, 3, [0.2, 0.4, 0.6, 1.0], PixelFormat::Rgba8);
        let chain = configure(&[], 0.0, 1.0);
        assert!(chain.is_identity());
        assert_eq!(apply(&frame, &chain), frame.clamped_to_extent());
    }

    #[test]
    fn test_filters_applied_in_order() {
        let frame = Frame::solid(2, 2, [0.5, 0.5, 0.5, 1.0], PixelFormat::RgbaF32);
        // brightness first then contrast: (0.5 + 0.25 - 0.5) * 2 + 0.5 = 1.0
        let out = apply(&frame, &configure(&[], 0.25, 2.0));
        assert!((out.sample(0, 0)[0] - 1.0).abs() < 1e-6);
        assert_eq!(out.sample(0, 0)[3], 1.0);
    }

    #[test]
    fn test_failing_filter_skipped() {
        let frame = Frame::solid(2, 2, [0.5, 0.5, 0.5, 1.0], PixelFormat::RgbaF32);
        let broken: FilterDescriptor = Brightness::new(f32::NAN).into();
        let out = apply(&frame, &configure(&[broken], 0.0, 1.0));
        assert_eq!(out, frame.clamped_to_extent());
    }

    #[test]
    fn test_descriptor_json() {
        let json = r#"[{"type":"gaussianBlur","radius":3.0},{"type":"hueSaturation","hue_shift":90.0,"saturation":1.0,"value":1.0}]"#;
        let filters: Vec<FilterDescriptor> = serde_json::from_str(json).unwrap();
        assert_eq!(filters[0], GaussianBlur::new(3.0).into());
        assert_eq!(filters[1].name(), "HueSaturation");
    }
}
