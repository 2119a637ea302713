//! Output size estimation.
//!
//! Two models share one curve: the normalized quality position `t` is bent by
//! [`QUALITY_CURVE_EXPONENT`] before interpolating. With measured anchors the
//! curve interpolates between the two sampled bitrates; without them it
//! interpolates a bits-per-pixel budget.

use tinytv_media_model::{CalibrationAnchors, DeviceFormat, Quality, SourceFile, TargetFps};

/// Exponent shaping the quality curve.
pub const QUALITY_CURVE_EXPONENT: f64 = 0.7;

/// Bytes per pixel at the worst quality (closed-form model).
pub const MIN_BYTES_PER_PIXEL: f64 = 0.06;

/// Bytes per pixel at the best quality (closed-form model).
pub const MAX_BYTES_PER_PIXEL: f64 = 0.28;

/// Container overhead applied to the closed-form video rate.
pub const CONTAINER_OVERHEAD: f64 = 1.03;

/// Frame rate assumed for sources whose rate cannot be probed.
pub const ASSUMED_SOURCE_FPS: f64 = 12.0;

fn curve(quality: Quality) -> f64 {
    quality.position().powf(QUALITY_CURVE_EXPONENT)
}

/// Video bytes per second interpolated between measured anchors.
pub fn calibrated_video_bps(anchors: &CalibrationAnchors, quality: Quality) -> f64 {
    anchors.worst_bps + (anchors.best_bps - anchors.worst_bps) * curve(quality)
}

/// Video bytes per second from the bits-per-pixel model.
pub fn closed_form_video_bps(format: &DeviceFormat, fps: TargetFps, quality: Quality) -> f64 {
    let bpp = MIN_BYTES_PER_PIXEL + (MAX_BYTES_PER_PIXEL - MIN_BYTES_PER_PIXEL) * curve(quality);
    let bytes_per_frame = (format.width as f64 * format.height as f64 * bpp).trunc();
    (bytes_per_frame * fps.as_f64()).trunc() * CONTAINER_OVERHEAD
}

/// Estimated output size in bytes, or `None` when the duration is unknown
/// or not positive.
pub fn estimate_output_bytes(
    format: &DeviceFormat,
    fps: TargetFps,
    quality: Quality,
    duration_secs: Option<f64>,
    anchors: Option<&CalibrationAnchors>,
) -> Option<u64> {
    let duration = duration_secs.filter(|d| d.is_finite() && *d > 0.0)?;
    let audio_bytes = (format.audio_bytes_per_sec() * duration).trunc();
    let video_bps = match anchors {
        Some(anchors) => calibrated_video_bps(anchors, quality),
        None => closed_form_video_bps(format, fps, quality),
    };
    let video_bytes = (video_bps * duration).trunc().max(0.0);
    Some(video_bytes as u64 + audio_bytes as u64)
}

/// Rough size of a combined output, scaling each input by the frame-rate
/// change it will undergo.
///
/// `probe_fps` is called for every file; unknown rates count as
/// [`ASSUMED_SOURCE_FPS`] and unreadable sizes as zero.
pub fn combined_size_estimate(
    files: &[SourceFile],
    target: TargetFps,
    mut probe_fps: impl FnMut(&SourceFile) -> Option<f64>,
) -> u64 {
    files
        .iter()
        .map(|file| {
            let Some(size) = file.size_bytes() else {
                return 0;
            };
            let src_fps = probe_fps(file).unwrap_or(ASSUMED_SOURCE_FPS);
            let ratio = (target.as_f64() / src_fps.max(0.1)).max(0.1);
            (size as f64 * ratio).trunc() as u64
        })
        .sum()
}
