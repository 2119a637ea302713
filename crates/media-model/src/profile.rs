//! Device format and encode profile types.
//!
//! The device format is fixed: every encode targets the same small MJPEG/PCM
//! container. What varies per job is captured in [`EncodeProfile`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The fixed output format the target device plays back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFormat {
    /// Output resolution in pixels.
    pub width: u32,
    pub height: u32,

    /// Pixel format passed to the encoder (`-pix_fmt`).
    pub pixel_format: &'static str,

    /// Video encoder name (`-c:v`).
    pub video_codec: &'static str,

    /// FourCC written into the container (`-vtag`).
    pub video_tag: &'static str,

    /// Audio encoder name (`-c:a`).
    pub audio_codec: &'static str,

    /// Raw sample format matching `audio_codec`, used by `aformat`.
    pub audio_sample_format: &'static str,

    /// Audio sample rate in Hz.
    pub audio_sample_rate: u32,

    /// Audio channel count.
    pub audio_channels: u32,
}

impl DeviceFormat {
    /// 210x135 MJPEG with unsigned 8-bit mono PCM at 10 kHz.
    pub const TINYTV: DeviceFormat = DeviceFormat {
        width: 210,
        height: 135,
        pixel_format: "yuv420p",
        video_codec: "mjpeg",
        video_tag: "MJPG",
        audio_codec: "pcm_u8",
        audio_sample_format: "u8",
        audio_sample_rate: 10_000,
        audio_channels: 1,
    };

    /// Channel layout name for `aformat` filters.
    pub fn channel_layout(&self) -> &'static str {
        if self.audio_channels == 1 {
            "mono"
        } else {
            "stereo"
        }
    }

    /// Raw PCM bytes produced per second of audio.
    ///
    /// Assumes one byte per sample, which holds for `pcm_u8`.
    pub fn audio_bytes_per_sec(&self) -> f64 {
        self.audio_sample_rate as f64 * self.audio_channels as f64
    }
}

impl Default for DeviceFormat {
    fn default() -> Self {
        Self::TINYTV
    }
}

/// Supported output frame rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum TargetFps {
    Twelve,
    #[default]
    TwentyFour,
}

impl TargetFps {
    pub fn as_u32(self) -> u32 {
        match self {
            TargetFps::Twelve => 12,
            TargetFps::TwentyFour => 24,
        }
    }

    pub fn as_f64(self) -> f64 {
        self.as_u32() as f64
    }

    /// Rational form reported by the prober for a conforming stream, e.g. `12/1`.
    pub fn as_rational(self) -> String {
        format!("{}/1", self.as_u32())
    }
}

impl TryFrom<u32> for TargetFps {
    type Error = ModelError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            12 => Ok(TargetFps::Twelve),
            24 => Ok(TargetFps::TwentyFour),
            other => Err(ModelError::UnsupportedFps(other)),
        }
    }
}

impl From<TargetFps> for u32 {
    fn from(fps: TargetFps) -> Self {
        fps.as_u32()
    }
}

impl fmt::Display for TargetFps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// Encoder quality value (`-q:v`).
///
/// The scale is **inverted**: [`Quality::BEST`] (2) produces the largest,
/// highest-fidelity output and [`Quality::WORST`] (31) the smallest. Values
/// outside the range are clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const BEST: Quality = Quality(2);
    pub const WORST: Quality = Quality(31);

    /// Create a quality value, clamping into `2..=31`.
    pub fn new(q: u8) -> Self {
        Self(q.clamp(Self::BEST.0, Self::WORST.0))
    }

    /// Raw quantizer value.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Normalized position on the quality range: 1.0 at best, 0.0 at worst.
    pub fn position(self) -> f64 {
        let span = (Self::WORST.0 - Self::BEST.0) as f64;
        (Self::WORST.0 - self.0) as f64 / span
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality(5)
    }
}

impl From<u8> for Quality {
    fn from(q: u8) -> Self {
        Quality::new(q)
    }
}

impl From<Quality> for u8 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How source frames are fitted into the device resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMode {
    /// Letterbox: fit inside, pad the remainder.
    Contain,
    /// Fill the frame and crop the overflow.
    #[default]
    Cover,
    /// Ignore aspect ratio.
    Stretch,
}

impl ScaleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScaleMode::Contain => "contain",
            ScaleMode::Cover => "cover",
            ScaleMode::Stretch => "stretch",
        }
    }
}

impl FromStr for ScaleMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contain" => Ok(ScaleMode::Contain),
            "cover" => Ok(ScaleMode::Cover),
            "stretch" => Ok(ScaleMode::Stretch),
            other => Err(ModelError::UnknownScaleMode(other.to_string())),
        }
    }
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-digit channel number prepended to output file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelPrefix(String);

impl ChannelPrefix {
    /// Parse user text. Blank means "no prefix"; otherwise one or two ASCII
    /// digits, zero-padded to two (`"7"` becomes `"07"`).
    pub fn parse(text: &str) -> Result<Option<Self>, ModelError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if trimmed.len() > 2 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ModelError::InvalidChannel(trimmed.to_string()));
        }
        let n: u8 = trimmed
            .parse()
            .map_err(|_| ModelError::InvalidChannel(trimmed.to_string()))?;
        Ok(Some(Self(format!("{n:02}"))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything needed to encode one file for the device.
///
/// Immutable for the duration of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeProfile {
    /// Fixed output container/codec parameters.
    pub format: DeviceFormat,

    /// Output frame rate.
    pub fps: TargetFps,

    /// Video quality (2 = best/largest, 31 = worst/smallest).
    pub quality: Quality,

    /// Scaling behaviour for mismatched aspect ratios.
    pub scale_mode: ScaleMode,

    /// Apply loudness normalization to the audio track.
    pub normalize_audio: bool,

    /// Optional channel number prepended to output names.
    pub channel_prefix: Option<ChannelPrefix>,
}

impl Default for EncodeProfile {
    fn default() -> Self {
        Self {
            format: DeviceFormat::TINYTV,
            fps: TargetFps::default(),
            quality: Quality::default(),
            scale_mode: ScaleMode::default(),
            normalize_audio: false,
            channel_prefix: None,
        }
    }
}

/// Errors raised while building model values from user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Channel must be a number (e.g. 01) or left blank, got {0:?}")]
    InvalidChannel(String),

    #[error("Unsupported frame rate {0}; expected 12 or 24")]
    UnsupportedFps(u32),

    #[error("Unknown scale mode {0:?}; expected contain, cover or stretch")]
    UnknownScaleMode(String),
}
