use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::entities::filters::{FilterDescriptor, GaussianBlur, HueSaturation};
use crate::entities::gravity::Gravity;
use crate::entities::settings::{Directive, load_directives};

// Video backend info (compile-time)
#[cfg(feature = "ffmpeg")]
const VIDEO_BACKEND: &str = "playa-ffmpeg 8.0 (static)";
#[cfg(not(feature = "ffmpeg"))]
const VIDEO_BACKEND: &str = "none (WebVTT only)";

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Video:  ", VIDEO_BACKEND, "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Headless self-looping video player
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Resource name (`clip`, `clip.mov`) or external reference (`https://...`)
    #[arg(value_name = "NAME")]
    pub name: Option<String>,

    /// Directory searched for bundled resources
    #[arg(short = 'b', long = "bundle", value_name = "DIR", default_value = ".")]
    pub bundle: PathBuf,

    /// Fallback container extension (default: mp4)
    #[arg(short = 'e', long = "ext", value_name = "EXT")]
    pub ext: Option<String>,

    /// Subtitle resource name, looked up as .vtt
    #[arg(short = 's', long = "subtitle", value_name = "NAME")]
    pub subtitle: Option<String>,

    /// Loop forever
    #[arg(short = 'o', long = "loop")]
    pub looping: bool,

    /// Start muted
    #[arg(short = 'm', long = "mute")]
    pub mute: bool,

    /// Do not start playback on activation
    #[arg(long = "no-autoplay")]
    pub no_autoplay: bool,

    /// Publish playback time every N seconds
    #[arg(short = 't', long = "time-publishing", value_name = "SECS")]
    pub time_publishing: Option<f64>,

    /// Fitting mode: resizeAspect, resizeAspectFill, resize
    #[arg(short = 'g', long = "gravity", value_name = "MODE", value_parser = parse_gravity)]
    pub gravity: Option<Gravity>,

    /// JSON directive list, applied before the flags above
    #[arg(short = 'd', long = "directives", value_name = "FILE")]
    pub directives: Option<PathBuf>,

    /// Seconds of playback to run
    #[arg(long = "seconds", value_name = "N", default_value_t = 5.0)]
    pub seconds: f64,

    /// Surface size
    #[arg(
        long = "size",
        value_names = ["W", "H"],
        num_args = 2,
        default_values_t = [1280usize, 720]
    )]
    pub size: Vec<usize>,

    /// Write the last presented frame to this PNG
    #[arg(long = "snapshot", value_name = "PNG")]
    pub snapshot: Option<PathBuf>,

    /// Additive brightness
    #[arg(
        long = "brightness",
        value_name = "AMOUNT",
        default_value_t = 0.0,
        allow_hyphen_values = true
    )]
    pub brightness: f32,

    /// Contrast factor around mid-grey
    #[arg(long = "contrast", value_name = "FACTOR", default_value_t = 1.0)]
    pub contrast: f32,

    /// Saturation multiplier
    #[arg(long = "saturation", value_name = "FACTOR")]
    pub saturation: Option<f32>,

    /// Gaussian blur radius in pixels
    #[arg(long = "blur", value_name = "RADIUS")]
    pub blur: Option<f32>,

    /// Enable debug logging to file (default: loopview.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

fn parse_gravity(s: &str) -> Result<Gravity, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown gravity '{}' (resizeAspect, resizeAspectFill, resize)", s))
}

impl Args {
    /// Directive list: file directives first, then flags in declaration order
    pub fn to_directives(&self) -> Result<Vec<Directive>> {
        let mut list = match &self.directives {
            Some(path) => load_directives(path)?,
            None => Vec::new(),
        };
        if let Some(name) = &self.name {
            list.push(Directive::Name(name.clone()));
        }
        if let Some(ext) = &self.ext {
            list.push(Directive::Ext(ext.clone()));
        }
        if let Some(subtitle) = &self.subtitle {
            list.push(Directive::Subtitle(subtitle.clone()));
        }
        if self.looping {
            list.push(Directive::Loop);
        }
        if self.mute {
            list.push(Directive::Mute);
        }
        if self.no_autoplay {
            list.push(Directive::NotAutoPlay);
        }
        if let Some(secs) = self.time_publishing {
            list.push(Directive::TimePublishing(secs));
        }
        if let Some(gravity) = self.gravity {
            list.push(Directive::Gravity(gravity));
        }
        Ok(list)
    }

    /// Caller filters (brightness and contrast are set separately)
    pub fn filters(&self) -> Vec<FilterDescriptor> {
        let mut filters = Vec::new();
        if let Some(saturation) = self.saturation {
            filters.push(
                HueSaturation {
                    saturation,
                    ..Default::default()
                }
                .into(),
            );
        }
        if let Some(radius) = self.blur {
            filters.push(GaussianBlur::new(radius).into());
        }
        filters
    }

    pub fn surface_size(&self) -> (usize, usize) {
        match self.size.as_slice() {
            [w, h] => (*w, *h),
            _ => (1280, 720),
        }
    }
}
