//! Media handles and resource resolution
//!
//! A `MediaHandle` is an opaque, read-only reference to something playable:
//! either a file found in a resource bundle or an externally addressed URL.
//! Two handles are the same asset iff their addresses are equal, which is
//! what hot-swap detection compares.
//!
//! # Resolution order (`AssetLocator::locate`)
//!
//! 1. `name` parses as a fully-qualified reference (`scheme://...`) → wrap it.
//!    `file://` references become local paths.
//! 2. Otherwise look `name` up in the bundle. A trailing `.<token>` in the
//!    name wins over the configured extension: `"clip.mov"` looks for
//!    `clip` + `mov` even when `ext` is `mp4`.
//! 3. Nothing matched → `None` (recoverable; `detect_error` reports it).

use log::{debug, trace};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use super::settings::Configuration;
use crate::error::ErrorKind;
use crate::utils::media::SUBTITLE_EXT;

/// `scheme://rest` with an RFC 3986 scheme
static EXTERNAL_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://\S+$").expect("valid regex"));

/// `stem.token` where token is alphanumeric
static NAME_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<stem>.+)\.(?P<ext>[A-Za-z0-9]+)$").expect("valid regex"));

/// Where a handle points
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaAddress {
    File(PathBuf),
    Remote(String),
}

impl fmt::Display for MediaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaAddress::File(path) => write!(f, "{}", path.display()),
            MediaAddress::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Opaque playable reference. Compared by address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaHandle {
    address: MediaAddress,
}

impl MediaHandle {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            address: MediaAddress::File(path.into()),
        }
    }

    /// Wrap an external reference. `file://` becomes a local path.
    pub fn external(reference: &str) -> Self {
        match reference.strip_prefix("file://") {
            Some(path) => Self::file(path),
            None => Self {
                address: MediaAddress::Remote(reference.to_string()),
            },
        }
    }

    pub fn address(&self) -> &MediaAddress {
        &self.address
    }

    /// Local path, if the handle is file-backed
    pub fn path(&self) -> Option<&Path> {
        match &self.address {
            MediaAddress::File(p) => Some(p),
            MediaAddress::Remote(_) => None,
        }
    }

    /// Lowercase extension of the addressed resource, if any
    pub fn extension(&self) -> Option<String> {
        let name = match &self.address {
            MediaAddress::File(p) => p.file_name()?.to_str()?.to_string(),
            MediaAddress::Remote(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                path.rsplit('/').next()?.to_string()
            }
        };
        NAME_SUFFIX
            .captures(&name)
            .map(|c| c["ext"].to_lowercase())
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.address.fmt(f)
    }
}

/// Lookup of bundle-local resources by name and extension.
pub trait ResourceBundle: Send + Sync {
    /// Path of `name.ext` if the bundle contains it
    fn resource(&self, name: &str, ext: &str) -> Option<PathBuf>;
}

/// Bundle rooted at a directory on disk
#[derive(Debug, Clone)]
pub struct DirBundle {
    root: PathBuf,
}

impl DirBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceBundle for DirBundle {
    fn resource(&self, name: &str, ext: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }
        let path = self.root.join(format!("{}.{}", name, ext));
        trace!("Bundle lookup: {}", path.display());
        path.is_file().then_some(path)
    }
}

/// Resolves configuration names into media handles.
#[derive(Clone)]
pub struct AssetLocator {
    bundle: Arc<dyn ResourceBundle>,
}

impl fmt::Debug for AssetLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetLocator").finish_non_exhaustive()
    }
}

impl AssetLocator {
    pub fn new(bundle: Arc<dyn ResourceBundle>) -> Self {
        Self { bundle }
    }

    /// Locator over a directory bundle
    pub fn with_dir(root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(DirBundle::new(root)))
    }

    /// Resolve the configured media source. Idempotent.
    pub fn locate(&self, config: &Configuration) -> Option<MediaHandle> {
        self.resolve(config.name(), config.ext())
    }

    /// Resolve the configured subtitle source (always `.vtt`).
    /// Empty subtitle identifier means "no subtitles".
    pub fn locate_subtitle(&self, config: &Configuration) -> Option<MediaHandle> {
        if config.subtitle().is_empty() {
            return None;
        }
        self.resolve(config.subtitle(), SUBTITLE_EXT)
    }

    /// Error to surface for this activation, if any.
    ///
    /// Non-unique settings win over a missing source.
    pub fn detect_error(
        &self,
        config: &Configuration,
        handle: Option<&MediaHandle>,
    ) -> Option<ErrorKind> {
        if !config.are_unique() {
            return Some(ErrorKind::SettingsNotUnique);
        }
        if handle.is_none() {
            return Some(ErrorKind::SourceNotFound(config.name().to_string()));
        }
        None
    }

    fn resolve(&self, name: &str, fallback_ext: &str) -> Option<MediaHandle> {
        if name.is_empty() {
            return None;
        }
        if EXTERNAL_REF.is_match(name) {
            debug!("Resolved external reference: {}", name);
            return Some(MediaHandle::external(name));
        }

        let (stem, ext) = match NAME_SUFFIX.captures(name) {
            Some(caps) => (
                caps.name("stem").map_or(name, |m| m.as_str()),
                caps.name("ext").map_or(fallback_ext, |m| m.as_str()),
            ),
            None => (name, fallback_ext),
        };

        let found = self.bundle.resource(stem, ext).map(MediaHandle::file);
        match &found {
            Some(handle) => debug!("Resolved bundled resource: {}", handle),
            None => debug!("No bundled resource for {}.{}", stem, ext),
        }
        found
    }
}
