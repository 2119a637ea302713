//! Media probing via `ffprobe`.
//!
//! The prober's `default` writer emits `[STREAM]` / `[FORMAT]` sections of
//! `key=value` lines. Parsing is permissive: missing, `N/A` or malformed
//! values become `None` and never abort the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::runner::ProcessRunner;

/// Video stream fields relevant to validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoStreamInfo {
    pub codec_name: Option<String>,
    pub codec_tag_string: Option<String>,
    pub r_frame_rate: Option<String>,
    pub avg_frame_rate: Option<String>,
    pub nb_frames: Option<u64>,
    pub duration: Option<f64>,
}

/// Audio stream fields relevant to validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AudioStreamInfo {
    pub codec_name: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

/// Parsed prober report for one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProbeReport {
    /// First video stream.
    pub video: Option<VideoStreamInfo>,
    /// First audio stream.
    pub audio: Option<AudioStreamInfo>,
    /// Container duration in seconds.
    pub format_duration: Option<f64>,
}

impl ProbeReport {
    /// Video stream duration, falling back to the container duration.
    pub fn video_duration(&self) -> Option<f64> {
        self.video
            .as_ref()
            .and_then(|v| v.duration)
            .or(self.format_duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Stream,
    Format,
    Other,
}

#[derive(Debug, Default)]
struct RawStream {
    codec_type: Option<String>,
    fields: Vec<(String, String)>,
}

impl RawStream {
    fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse the output of `ffprobe -show_streams -show_format -of default`.
///
/// Lines outside any section are treated as belonging to a stream of unknown
/// type, which fills the video slot if nothing else does.
pub fn parse_probe_report(text: &str) -> ProbeReport {
    let mut streams: Vec<RawStream> = Vec::new();
    let mut loose = RawStream::default();
    let mut format_duration = None;
    let mut section = Section::None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "[STREAM]" => {
                section = Section::Stream;
                streams.push(RawStream::default());
                continue;
            }
            "[FORMAT]" => {
                section = Section::Format;
                continue;
            }
            _ if line.starts_with("[/") => {
                section = Section::None;
                continue;
            }
            _ if line.starts_with('[') && line.ends_with(']') => {
                section = Section::Other;
                continue;
            }
            _ => {}
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        match section {
            Section::Stream => {
                if let Some(stream) = streams.last_mut() {
                    push_field(stream, key, value);
                }
            }
            Section::Format => {
                if key == "duration" {
                    format_duration = parse_f64(value);
                }
            }
            Section::None => push_field(&mut loose, key, value),
            Section::Other => {}
        }
    }

    let mut video = None;
    let mut audio = None;
    for stream in &streams {
        match stream.codec_type.as_deref() {
            Some("video") if video.is_none() => video = Some(video_info(stream)),
            Some("audio") if audio.is_none() => audio = Some(audio_info(stream)),
            _ => {}
        }
    }
    if video.is_none() && !loose.fields.is_empty() {
        if loose.codec_type.as_deref() == Some("audio") {
            audio = audio.or_else(|| Some(audio_info(&loose)));
        } else {
            video = Some(video_info(&loose));
        }
    }

    ProbeReport {
        video,
        audio,
        format_duration,
    }
}

fn push_field(stream: &mut RawStream, key: &str, value: &str) {
    if key == "codec_type" {
        stream.codec_type = Some(value.to_string());
    }
    stream.fields.push((key.to_string(), value.to_string()));
}

fn video_info(stream: &RawStream) -> VideoStreamInfo {
    VideoStreamInfo {
        codec_name: stream.get("codec_name").and_then(parse_text),
        codec_tag_string: stream.get("codec_tag_string").and_then(parse_text),
        r_frame_rate: stream.get("r_frame_rate").and_then(parse_text),
        avg_frame_rate: stream.get("avg_frame_rate").and_then(parse_text),
        nb_frames: stream.get("nb_frames").and_then(parse_count),
        duration: stream.get("duration").and_then(parse_f64),
    }
}

fn audio_info(stream: &RawStream) -> AudioStreamInfo {
    AudioStreamInfo {
        codec_name: stream.get("codec_name").and_then(parse_text),
        sample_rate: stream.get("sample_rate").and_then(|v| v.parse().ok()),
        channels: stream.get("channels").and_then(|v| v.parse().ok()),
    }
}

fn parse_text(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value == "N/A" {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_count(value: &str) -> Option<u64> {
    let value = value.trim();
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        value.parse().ok()
    } else {
        None
    }
}

fn parse_f64(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a frame rate token such as `30000/1001` or `24`.
///
/// Returns `None` for `0/0`, zero denominators and non-positive rates.
pub fn parse_frame_rate(token: &str) -> Option<f64> {
    let token = token.trim();
    let fps = match token.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => token.parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Pick a rate from keyed `r_frame_rate=` / `avg_frame_rate=` lines.
///
/// The prober writes `r_frame_rate` first regardless of the requested order,
/// so the keys decide: a positive average rate wins, the nominal rate is the
/// fallback.
pub fn pick_frame_rate(text: &str) -> Option<f64> {
    let mut nominal = None;
    let mut average = None;
    for line in text.lines() {
        match line.trim().split_once('=') {
            Some(("avg_frame_rate", value)) => average = average.or(parse_frame_rate(value)),
            Some(("r_frame_rate", value)) => nominal = nominal.or(parse_frame_rate(value)),
            _ => {}
        }
    }
    average.or(nominal)
}

/// Runs the prober through a [`ProcessRunner`].
#[derive(Clone)]
pub struct Prober {
    runner: Arc<dyn ProcessRunner>,
    ffprobe: PathBuf,
}

impl std::fmt::Debug for Prober {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober")
            .field("ffprobe", &self.ffprobe)
            .finish()
    }
}

impl Prober {
    pub fn new(runner: Arc<dyn ProcessRunner>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            ffprobe: ffprobe.into(),
        }
    }

    /// Container duration in seconds.
    pub fn duration(&self, path: &Path) -> Option<f64> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.display().to_string(),
        ];
        let out = self.runner.capture(&self.ffprobe, &args)?;
        out.lines().find_map(parse_f64)
    }

    /// Frame rate of the first video stream, preferring the average rate.
    pub fn frame_rate(&self, path: &Path) -> Option<f64> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-show_entries".to_string(),
            "stream=avg_frame_rate,r_frame_rate".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1".to_string(),
            path.display().to_string(),
        ];
        let out = self.runner.capture(&self.ffprobe, &args)?;
        pick_frame_rate(&out)
    }

    /// Full stream/format report. An unreadable file yields an empty report.
    pub fn report(&self, path: &Path) -> ProbeReport {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_streams".to_string(),
            "-show_format".to_string(),
            "-of".to_string(),
            "default".to_string(),
            path.display().to_string(),
        ];
        match self.runner.capture(&self.ffprobe, &args) {
            Some(out) => parse_probe_report(&out),
            None => {
                tracing::warn!(path = %path.display(), "Probe returned no output");
                ProbeReport::default()
            }
        }
    }
}
