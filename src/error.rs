//! Error kinds surfaced by the playback engine and its media backends.
//!
//! **Why two enums**: `ErrorKind` is what consumers see on the discrete event
//! channel (one observation point for health). `MediaError` stays inside a
//! backend and is folded into `ErrorKind::PlaybackFailed` when an item fails
//! to load.
//!
//! Seek failure has no variant here: it travels as `success = false` inside
//! `PlayerEvent::Seek`.

use std::path::PathBuf;

/// Externally visible failure, delivered as `PlayerEvent::Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The directive list contained the same directive kind twice
    SettingsNotUnique,
    /// Neither an external reference nor a bundled resource matched the name
    SourceNotFound(String),
    /// Copying the video or audio track into the composition failed
    MergeFailed,
    /// Transport command issued with no active item or in failed state
    TransportRejected(&'static str),
    /// The current item could not be loaded or decoded
    PlaybackFailed(String),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::SettingsNotUnique => write!(f, "Settings are not unique"),
            ErrorKind::SourceNotFound(name) => write!(f, "Source not found: {}", name),
            ErrorKind::MergeFailed => write!(f, "Failed to merge video and subtitle tracks"),
            ErrorKind::TransportRejected(cmd) => {
                write!(f, "Transport command rejected: {}", cmd)
            }
            ErrorKind::PlaybackFailed(reason) => write!(f, "Playback failed: {}", reason),
        }
    }
}

impl std::error::Error for ErrorKind {}

/// Backend-level probe/decode failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// File could not be opened or read
    Io { path: PathBuf, reason: String },
    /// Container/codec not handled by this backend
    Unsupported(String),
    /// Data was read but could not be parsed
    Malformed(String),
    /// Remote references need a backend with network support
    RemoteUnavailable(String),
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaError::Io { path, reason } => {
                write!(f, "I/O error on {}: {}", path.display(), reason)
            }
            MediaError::Unsupported(what) => write!(f, "Unsupported media: {}", what),
            MediaError::Malformed(what) => write!(f, "Malformed media: {}", what),
            MediaError::RemoteUnavailable(url) => write!(f, "Remote media unavailable: {}", url),
        }
    }
}

impl std::error::Error for MediaError {}

impl From<MediaError> for ErrorKind {
    fn from(err: MediaError) -> Self {
        ErrorKind::PlaybackFailed(err.to_string())
    }
}
