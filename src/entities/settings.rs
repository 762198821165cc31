//! Playback configuration built from an ordered list of directives.
//!
//! **Why directives**: hosts describe the widget as a flat list
//! (`[Name("intro"), Loop, Mute]`) instead of filling a struct. The list is
//! resolved once into an immutable `Configuration`.
//!
//! # Resolution rules
//!
//! - Scalar fields take the first directive of their kind, else the default
//!   (name "", ext "mp4", subtitle "", gravity `ResizeAspect`, error colour
//!   red, error font size 17, no time publishing).
//! - Flags (`Loop`, `Mute`, `NotAutoPlay`, `ErrorWidgetOff`) are presence tests.
//! - Construction never fails. A kind appearing twice only clears
//!   `are_unique`; `AssetLocator::detect_error` reports it at activation.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use super::asset::{AssetLocator, MediaHandle};
use super::gravity::Gravity;
use crate::utils::media::DEFAULT_EXT;

/// Default error label font size (points)
pub const DEFAULT_ERROR_FONT_SIZE: f32 = 17.0;

/// RGBA colour, 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::RED
    }
}

/// One configuration statement. Order matters only for duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Directive {
    /// Resource name or fully-qualified reference
    Name(String),
    /// Fallback container extension
    Ext(String),
    /// Subtitle resource name (looked up as `.vtt`)
    Subtitle(String),
    Loop,
    Mute,
    NotAutoPlay,
    /// Periodic time tick interval in seconds
    TimePublishing(f64),
    Gravity(Gravity),
    ErrorColor(Color),
    ErrorFontSize(f32),
    ErrorWidgetOff,
}

/// Discriminant of a `Directive`, used for uniqueness checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Name,
    Ext,
    Subtitle,
    Loop,
    Mute,
    NotAutoPlay,
    TimePublishing,
    Gravity,
    ErrorColor,
    ErrorFontSize,
    ErrorWidgetOff,
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::Name(_) => DirectiveKind::Name,
            Directive::Ext(_) => DirectiveKind::Ext,
            Directive::Subtitle(_) => DirectiveKind::Subtitle,
            Directive::Loop => DirectiveKind::Loop,
            Directive::Mute => DirectiveKind::Mute,
            Directive::NotAutoPlay => DirectiveKind::NotAutoPlay,
            Directive::TimePublishing(_) => DirectiveKind::TimePublishing,
            Directive::Gravity(_) => DirectiveKind::Gravity,
            Directive::ErrorColor(_) => DirectiveKind::ErrorColor,
            Directive::ErrorFontSize(_) => DirectiveKind::ErrorFontSize,
            Directive::ErrorWidgetOff => DirectiveKind::ErrorWidgetOff,
        }
    }
}

/// How the external error widget should present `PlayerEvent::Error`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorStyle {
    pub color: Color,
    pub font_size: f32,
    /// Host should not show its error widget at all
    pub widget_off: bool,
}

/// Immutable playback configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    name: String,
    ext: String,
    subtitle: String,
    looping: bool,
    muted: bool,
    autoplay: bool,
    time_publishing: Option<Duration>,
    gravity: Gravity,
    error_style: ErrorStyle,
    are_unique: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::build(&[])
    }
}

impl Configuration {
    /// Resolve a directive list. Never fails.
    pub fn build(directives: &[Directive]) -> Self {
        let kinds: HashSet<DirectiveKind> = directives.iter().map(Directive::kind).collect();
        let are_unique = kinds.len() == directives.len();
        if !are_unique {
            debug!(
                "Directive list has duplicates: {} directives, {} kinds",
                directives.len(),
                kinds.len()
            );
        }

        let has = |kind: DirectiveKind| kinds.contains(&kind);

        let name = directives
            .iter()
            .find_map(|d| match d {
                Directive::Name(v) => Some(v.clone()),
                _ => None,
            })
            .unwrap_or_default();
        let ext = directives
            .iter()
            .find_map(|d| match d {
                Directive::Ext(v) => Some(v.clone()),
                _ => None,
            })
            .unwrap_or_else(|| DEFAULT_EXT.to_string());
        let subtitle = directives
            .iter()
            .find_map(|d| match d {
                Directive::Subtitle(v) => Some(v.clone()),
                _ => None,
            })
            .unwrap_or_default();
        let time_publishing = directives
            .iter()
            .find_map(|d| match d {
                Directive::TimePublishing(secs) => Some(*secs),
                _ => None,
            })
            .and_then(|secs| {
                let interval = Duration::try_from_secs_f64(secs).ok().filter(|d| !d.is_zero());
                if interval.is_none() {
                    warn!("Ignoring time publishing interval {}", secs);
                }
                interval
            });
        let gravity = directives
            .iter()
            .find_map(|d| match d {
                Directive::Gravity(g) => Some(*g),
                _ => None,
            })
            .unwrap_or_default();
        let color = directives
            .iter()
            .find_map(|d| match d {
                Directive::ErrorColor(c) => Some(*c),
                _ => None,
            })
            .unwrap_or_default();
        let font_size = directives
            .iter()
            .find_map(|d| match d {
                Directive::ErrorFontSize(s) => Some(*s),
                _ => None,
            })
            .unwrap_or(DEFAULT_ERROR_FONT_SIZE);

        Self {
            name,
            ext,
            subtitle,
            looping: has(DirectiveKind::Loop),
            muted: has(DirectiveKind::Mute),
            autoplay: !has(DirectiveKind::NotAutoPlay),
            time_publishing,
            gravity,
            error_style: ErrorStyle {
                color,
                font_size,
                widget_off: has(DirectiveKind::ErrorWidgetOff),
            },
            are_unique,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    pub fn subtitle(&self) -> &str {
        &self.subtitle
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn autoplay(&self) -> bool {
        self.autoplay
    }

    pub fn time_publishing(&self) -> Option<Duration> {
        self.time_publishing
    }

    pub fn gravity(&self) -> Gravity {
        self.gravity
    }

    pub fn error_style(&self) -> ErrorStyle {
        self.error_style
    }

    pub fn are_unique(&self) -> bool {
        self.are_unique
    }

    /// Copy with looping and autoplay off; everything else identical
    pub fn without_autoplay(&self) -> Self {
        Self {
            looping: false,
            autoplay: false,
            ..self.clone()
        }
    }

    /// Freshly resolved handle, but only if it differs from `prior`.
    pub fn changed_asset(
        &self,
        prior: Option<&MediaHandle>,
        locator: &AssetLocator,
    ) -> Option<MediaHandle> {
        let fresh = locator.locate(self)?;
        match prior {
            Some(prior) if prior.address() == fresh.address() => None,
            _ => Some(fresh),
        }
    }
}

/// Read a JSON directive file without resolving it
pub fn load_directives(path: &Path) -> Result<Vec<Directive>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read directives: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid directive list: {}", path.display()))
}
