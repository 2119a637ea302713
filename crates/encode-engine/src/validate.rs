//! Post-encode conformance checks and the single repair pass.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tinytv_media_model::{DeviceFormat, EncodeProfile, TargetFps};

use crate::command::{convert_args, EncodePass};
use crate::probe::{ProbeReport, Prober};
use crate::runner::{LogSink, ProcessRunner};

/// Largest accepted gap between `nb_frames / fps` and the stream duration.
pub const FRAME_COUNT_TOLERANCE_SECS: f64 = 0.25;

/// Codec tags accepted for the video stream (compared upper-cased).
const ACCEPTED_VIDEO_TAGS: [&str; 2] = ["MJPG", "MJPG0"];

/// One way an encoded file deviates from the device format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConformanceIssue {
    MissingVideo,
    FrameRate {
        field: &'static str,
        expected: String,
        found: Option<String>,
    },
    CodecTag {
        found: String,
    },
    FrameCount {
        frames: u64,
        duration_secs: f64,
    },
    AudioCodec {
        found: String,
    },
    AudioSampleRate {
        found: u32,
    },
    AudioChannels {
        found: u32,
    },
}

impl fmt::Display for ConformanceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVideo => write!(f, "no video stream"),
            Self::FrameRate {
                field,
                expected,
                found,
            } => write!(
                f,
                "{field} is {} (expected {expected})",
                found.as_deref().unwrap_or("unknown")
            ),
            Self::CodecTag { found } => write!(f, "codec tag {found}"),
            Self::FrameCount {
                frames,
                duration_secs,
            } => write!(f, "{frames} frames do not match {duration_secs:.3}s"),
            Self::AudioCodec { found } => write!(f, "audio codec {found}"),
            Self::AudioSampleRate { found } => write!(f, "audio rate {found}Hz"),
            Self::AudioChannels { found } => write!(f, "audio channels {found}"),
        }
    }
}

/// Result of checking one probe report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conformance {
    pub issues: Vec<ConformanceIssue>,
    /// Compact description of what the prober saw, for log lines.
    pub summary: String,
}

impl Conformance {
    pub fn is_conforming(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Compare a probe report against the device format at `fps`.
///
/// Unknown fields pass, except the two frame-rate fields which must be
/// present and exactly `<fps>/1`.
pub fn check_conformance(report: &ProbeReport, format: &DeviceFormat, fps: TargetFps) -> Conformance {
    let expected_rate = fps.as_rational();
    let mut issues = Vec::new();

    match &report.video {
        None => issues.push(ConformanceIssue::MissingVideo),
        Some(video) => {
            for (field, value) in [
                ("r_frame_rate", &video.r_frame_rate),
                ("avg_frame_rate", &video.avg_frame_rate),
            ] {
                if value.as_deref().map(str::trim) != Some(expected_rate.as_str()) {
                    issues.push(ConformanceIssue::FrameRate {
                        field,
                        expected: expected_rate.clone(),
                        found: value.clone(),
                    });
                }
            }

            if let Some(tag) = &video.codec_tag_string {
                let tag = tag.trim().to_ascii_uppercase();
                if !tag.is_empty() && !ACCEPTED_VIDEO_TAGS.contains(&tag.as_str()) {
                    issues.push(ConformanceIssue::CodecTag { found: tag });
                }
            }

            if let (Some(frames), Some(duration)) = (video.nb_frames, report.video_duration()) {
                let expected_secs = frames as f64 / fps.as_f64();
                if (expected_secs - duration).abs() >= FRAME_COUNT_TOLERANCE_SECS {
                    issues.push(ConformanceIssue::FrameCount {
                        frames,
                        duration_secs: duration,
                    });
                }
            }
        }
    }

    if let Some(audio) = &report.audio {
        if let Some(codec) = &audio.codec_name {
            if !codec.eq_ignore_ascii_case(format.audio_codec) {
                issues.push(ConformanceIssue::AudioCodec {
                    found: codec.clone(),
                });
            }
        }
        if let Some(rate) = audio.sample_rate.filter(|r| *r != format.audio_sample_rate) {
            issues.push(ConformanceIssue::AudioSampleRate { found: rate });
        }
        if let Some(ch) = audio.channels.filter(|c| *c != format.audio_channels) {
            issues.push(ConformanceIssue::AudioChannels { found: ch });
        }
    }

    Conformance {
        issues,
        summary: summarize(report),
    }
}

fn summarize(report: &ProbeReport) -> String {
    fn or_unknown<T: ToString>(v: Option<T>) -> String {
        v.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string())
    }
    let video = report.video.as_ref();
    let audio = report.audio.as_ref();
    format!(
        "v r={}, avg={}, tag={}; a {} {}Hz ch{}",
        or_unknown(video.and_then(|v| v.r_frame_rate.as_deref())),
        or_unknown(video.and_then(|v| v.avg_frame_rate.as_deref())),
        or_unknown(video.and_then(|v| v.codec_tag_string.as_deref())),
        or_unknown(audio.and_then(|a| a.codec_name.as_deref())),
        or_unknown(audio.and_then(|a| a.sample_rate)),
        or_unknown(audio.and_then(|a| a.channels)),
    )
}

/// What happened to an encoded file after validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// Conforming as encoded.
    Valid,
    /// Nonconforming, re-encoded once and now conforming.
    Repaired,
    /// Still nonconforming after the repair pass; kept anyway.
    AcceptedWithWarning,
    /// The repair pass itself failed.
    Failed { reason: String },
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Scratch file used by the repair pass: `<dir>/<stem>.tmp_fix.avi`.
pub fn repair_path(dst: &Path) -> PathBuf {
    let stem = dst
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    dst.with_file_name(format!("{stem}.tmp_fix.avi"))
}

/// Validates converted files and repairs them at most once.
#[derive(Clone)]
pub struct Validator {
    runner: Arc<dyn ProcessRunner>,
    ffmpeg: PathBuf,
    prober: Prober,
}

impl Validator {
    pub fn new(runner: Arc<dyn ProcessRunner>, ffmpeg: impl Into<PathBuf>, prober: Prober) -> Self {
        Self {
            runner,
            ffmpeg: ffmpeg.into(),
            prober,
        }
    }

    /// Probe and check `path`.
    pub fn check(&self, path: &Path, profile: &EncodeProfile) -> Conformance {
        check_conformance(&self.prober.report(path), &profile.format, profile.fps)
    }

    /// Validate `dst`; when nonconforming, re-encode `src` once with
    /// timestamp regeneration and swap the result in.
    pub fn validate_and_repair(
        &self,
        profile: &EncodeProfile,
        src: &Path,
        dst: &Path,
        sink: &dyn LogSink,
    ) -> ValidationOutcome {
        let name = file_name(dst);
        let first = self.check(dst, profile);
        if first.is_conforming() {
            sink.line(&format!("[ok] Validated {name} ({})", first.summary));
            return ValidationOutcome::Valid;
        }

        tracing::info!(
            output = %dst.display(),
            issues = ?first.issues,
            "Output failed validation, repairing"
        );
        sink.line(&format!(
            "[warn] Validation failed for {name} ({}); re-encoding with PTS fix...",
            first.summary
        ));

        let tmp = repair_path(dst);
        let args = convert_args(profile, src, &tmp, EncodePass::Repair);
        let code = self.runner.run(&self.ffmpeg, &args, sink);
        if code != 0 || !tmp.exists() {
            sink.line(&format!("[ERROR] Re-encode with PTS fix failed for {name}"));
            remove_if_exists(&tmp);
            return ValidationOutcome::Failed {
                reason: format!("repair encode failed (exit code {code})"),
            };
        }

        if let Err(e) = replace_file(&tmp, dst) {
            sink.line(&format!("[ERROR] Could not replace original with fixed file: {e}"));
            remove_if_exists(&tmp);
            return ValidationOutcome::Failed {
                reason: format!("could not replace output: {e}"),
            };
        }

        let second = self.check(dst, profile);
        if second.is_conforming() {
            sink.line(&format!("[ok] Fixed & validated {name} ({})", second.summary));
            ValidationOutcome::Repaired
        } else {
            tracing::warn!(
                output = %dst.display(),
                issues = ?second.issues,
                "Output still nonconforming after repair"
            );
            sink.line(&format!(
                "[warn] File still looks odd after fix ({}). Proceeding anyway.",
                second.summary
            ));
            ValidationOutcome::AcceptedWithWarning
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn replace_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(to) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::fs::rename(from, to)
}

fn remove_if_exists(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
        }
    }
}
