//! WebVTT subtitle reader
//!
//! Parses the subset of WebVTT needed for a selectable text track:
//! header, cue timings, cue text. Cue settings, STYLE, REGION and NOTE blocks
//! are skipped. Styling/positioning is not modelled.
//!
//! ```text
//! WEBVTT
//!
//! intro
//! 00:00.000 --> 00:02.500 align:start
//! Hello
//! ```

use regex::Regex;
use std::sync::LazyLock;

use crate::error::MediaError;

/// `[hh:]mm:ss.ttt`
static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<h>\d+):)?(?P<m>\d{2}):(?P<s>\d{2})\.(?P<ms>\d{3})$").expect("valid regex")
});

/// One timed subtitle cue (seconds)
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub id: Option<String>,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Parse WebVTT text into cues, in file order
pub fn parse_vtt(text: &str) -> Result<Vec<Cue>, MediaError> {
    let text = text.trim_start_matches('\u{feff}');
    let normalized = text.replace("\r\n", "\n");
    let mut blocks = normalized.split("\n\n");

    let header = blocks.next().unwrap_or_default();
    if !header.starts_with("WEBVTT") {
        return Err(MediaError::Malformed("missing WEBVTT header".to_string()));
    }

    let mut cues = Vec::new();
    for block in blocks {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty()).peekable();
        let Some(first) = lines.peek().copied() else {
            continue;
        };
        if first.starts_with("NOTE") || first.starts_with("STYLE") || first.starts_with("REGION") {
            continue;
        }

        let id = if first.contains("-->") {
            None
        } else {
            lines.next();
            Some(first.trim().to_string())
        };

        let Some(timing) = lines.next() else {
            return Err(MediaError::Malformed(format!("cue {:?} has no timing", id)));
        };
        let (start, end) = parse_timing(timing)?;
        let text = lines.collect::<Vec<_>>().join("\n");

        cues.push(Cue { id, start, end, text });
    }
    Ok(cues)
}

/// `start --> end [settings]`
fn parse_timing(line: &str) -> Result<(f64, f64), MediaError> {
    let (start, rest) = line
        .split_once("-->")
        .ok_or_else(|| MediaError::Malformed(format!("bad cue timing: {}", line)))?;
    let end = rest.split_whitespace().next().unwrap_or_default();

    let start = parse_timestamp(start.trim())?;
    let end = parse_timestamp(end)?;
    if end < start {
        return Err(MediaError::Malformed(format!("cue ends before it starts: {}", line)));
    }
    Ok((start, end))
}

fn parse_timestamp(ts: &str) -> Result<f64, MediaError> {
    let caps = TIMESTAMP
        .captures(ts)
        .ok_or_else(|| MediaError::Malformed(format!("bad timestamp: {}", ts)))?;
    let field = |name: &str| -> f64 {
        caps.name(name)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };
    Ok(field("h") * 3600.0 + field("m") * 60.0 + field("s") + field("ms") / 1000.0)
}

/// Cue visible at `seconds`, if any
pub fn cue_at(cues: &[Cue], seconds: f64) -> Option<&Cue> {
    cues.iter().find(|c| seconds >= c.start && seconds < c.end)
}
