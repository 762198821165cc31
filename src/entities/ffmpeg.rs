//! FFmpeg probing and frame decoding (feature `ffmpeg`)
//!
//! Probe reads container duration plus the best video/audio streams.
//! Decode seeks to the nearest keyframe before the target time and decodes
//! forward until the first frame at or after it, scaled to RGBA8.

use log::{trace, warn};
use playa_ffmpeg as ffmpeg;
use std::path::Path;
use std::sync::Once;

use super::asset::MediaHandle;
use super::frame::Frame;
use super::media::{MediaAsset, SourceTrack, TimeRange, TrackKind};
use crate::error::MediaError;

static FFMPEG_LOG_INIT: Once = Once::new();

/// AV_TIME_BASE: container durations are in microseconds
const CONTAINER_TIME_BASE: f64 = 1_000_000.0;

fn init_ffmpeg_logging() {
    FFMPEG_LOG_INIT.call_once(|| unsafe {
        ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_QUIET);
    });
}

fn open(path: &Path) -> Result<ffmpeg::format::context::Input, MediaError> {
    init_ffmpeg_logging();
    ffmpeg::format::input(path).map_err(|e| MediaError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn seconds(ts: i64, tb: ffmpeg::Rational) -> f64 {
    if tb.denominator() == 0 {
        return 0.0;
    }
    ts as f64 * tb.numerator() as f64 / tb.denominator() as f64
}

fn stream_track(
    id: u32,
    kind: TrackKind,
    stream: &ffmpeg::format::stream::Stream,
    fallback: f64,
) -> SourceTrack {
    let start = seconds(stream.start_time().max(0), stream.time_base());
    let duration = match stream.duration() {
        d if d > 0 => seconds(d, stream.time_base()),
        _ => fallback,
    };
    let decodable = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .map(|ctx| ffmpeg::codec::decoder::find(ctx.id()).is_some())
        .unwrap_or(false);

    let mut track = SourceTrack::new(id, kind, TimeRange::new(start, duration));
    track.decodable = decodable;
    track.language = stream.metadata().get("language").map(str::to_string);
    track
}

/// Duration and best video/audio streams of a container
pub fn probe(handle: &MediaHandle, path: &Path) -> Result<MediaAsset, MediaError> {
    let ictx = open(path)?;
    let duration = ictx.duration().max(0) as f64 / CONTAINER_TIME_BASE;

    let mut tracks = Vec::new();
    if let Some(stream) = ictx.streams().best(ffmpeg::media::Type::Video) {
        tracks.push(stream_track(stream.index() as u32, TrackKind::Video, &stream, duration));
    }
    if let Some(stream) = ictx.streams().best(ffmpeg::media::Type::Audio) {
        tracks.push(stream_track(stream.index() as u32, TrackKind::Audio, &stream, duration));
    }
    if tracks.is_empty() {
        return Err(MediaError::Malformed(format!(
            "{}: no audio or video stream",
            path.display()
        )));
    }

    trace!("Probed {}: {:.3}s, {} tracks", path.display(), duration, tracks.len());
    Ok(MediaAsset {
        handle: handle.clone(),
        duration,
        tracks,
    })
}

/// First frame at or after `at` seconds, as RGBA8
pub fn decode_at(path: &Path, at: f64) -> Result<Frame, MediaError> {
    let mut ictx = open(path)?;
    let malformed =
        |what: &str, e: ffmpeg::Error| MediaError::Malformed(format!("{}: {}", what, e));

    let stream = ictx
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or_else(|| MediaError::Malformed("no video stream".to_string()))?;
    let stream_idx = stream.index();
    let time_base = stream.time_base();

    let mut decoder_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .map_err(|e| malformed("decoder context", e))?;
    unsafe {
        (*decoder_ctx.as_mut_ptr()).thread_type = ffmpeg::ffi::FF_THREAD_FRAME;
        (*decoder_ctx.as_mut_ptr()).thread_count = 0;
    }
    let mut decoder = decoder_ctx
        .decoder()
        .video()
        .map_err(|e| malformed("video decoder", e))?;

    let (width, height) = (decoder.width(), decoder.height());
    let mut scaler = ffmpeg::software::scaling::Context::get(
        decoder.format(),
        width,
        height,
        ffmpeg::format::Pixel::RGBA,
        width,
        height,
        ffmpeg::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| malformed("scaler", e))?;

    let target_ts = if time_base.numerator() > 0 {
        (at.max(0.0) * time_base.denominator() as f64 / time_base.numerator() as f64) as i64
    } else {
        0
    };
    let seek_ret = unsafe {
        ffmpeg::ffi::av_seek_frame(
            ictx.as_mut_ptr(),
            stream_idx as i32,
            target_ts,
            ffmpeg::ffi::AVSEEK_FLAG_BACKWARD,
        )
    };
    if seek_ret < 0 {
        warn!("Video seek failed (ret={}), decoding from start", seek_ret);
    }

    for (stream, packet) in ictx.packets() {
        if stream.index() != stream_idx {
            continue;
        }
        decoder
            .send_packet(&packet)
            .map_err(|e| malformed("send packet", e))?;
        if let Some(frame) = receive_target(&mut decoder, &mut scaler, target_ts)? {
            return Ok(frame);
        }
    }

    // Drain frames still held for reordering at end of stream
    decoder.send_eof().map_err(|e| malformed("send eof", e))?;
    if let Some(frame) = receive_target(&mut decoder, &mut scaler, target_ts)? {
        return Ok(frame);
    }

    Err(MediaError::Malformed(format!(
        "no frame at {:.3}s in {}",
        at,
        path.display()
    )))
}

/// Pull decoded frames until one reaches `target_ts`, converted to RGBA8
fn receive_target(
    decoder: &mut ffmpeg::decoder::Video,
    scaler: &mut ffmpeg::software::scaling::Context,
    target_ts: i64,
) -> Result<Option<Frame>, MediaError> {
    let mut decoded = ffmpeg::util::frame::video::Video::empty();
    while decoder.receive_frame(&mut decoded).is_ok() {
        if !reaches(decoded.pts(), target_ts) {
            continue;
        }
        let mut rgba = ffmpeg::util::frame::video::Video::empty();
        scaler
            .run(&decoded, &mut rgba)
            .map_err(|e| MediaError::Malformed(format!("scale frame: {}", e)))?;

        let (width, height) = (rgba.width() as usize, rgba.height() as usize);
        let output = pack_rows(rgba.data(0), rgba.stride(0), width * 4, height);
        return Ok(Some(Frame::from_u8_buffer(output, width, height)));
    }
    Ok(None)
}

/// Frames without a pts are accepted
fn reaches(pts: Option<i64>, target_ts: i64) -> bool {
    pts.is_none_or(|pts| pts >= target_ts)
}

/// Copy `height` rows of `row_bytes` out of a padded plane
fn pack_rows(data: &[u8], stride: usize, row_bytes: usize, height: usize) -> Vec<u8> {
    let mut output = vec![0u8; row_bytes * height];
    for (y, row) in output.chunks_exact_mut(row_bytes).enumerate() {
        row.copy_from_slice(&data[y * stride..y * stride + row_bytes]);
    }
    output
}
