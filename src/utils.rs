//! Utility functions and constants
//!
//! **Used by**: asset locator, media backends, CLI

/// Media file type detection
pub mod media {
    use std::path::Path;

    /// Container extensions handed to the video decoder
    pub const VIDEO_EXTS: &[&str] = &["mp4", "m4v", "mov", "avi", "mkv", "webm"];

    /// Extension used for subtitle lookups
    pub const SUBTITLE_EXT: &str = "vtt";

    /// Default container extension when none is configured
    pub const DEFAULT_EXT: &str = "mp4";

    /// Check if file is a video container
    pub fn is_video(path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|s| VIDEO_EXTS.contains(&s.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Check if file is a WebVTT subtitle file
    pub fn is_subtitle(path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case(SUBTITLE_EXT))
            .unwrap_or(false)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_detection() {
            assert!(is_video(Path::new("a/clip.MP4")));
            assert!(!is_video(Path::new("clip.vtt")));
            assert!(is_subtitle(Path::new("clip.VTT")));
            assert!(!is_subtitle(Path::new("clip")));
        }
    }
}
