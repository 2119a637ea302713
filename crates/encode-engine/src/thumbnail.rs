//! Preview frame extraction.

use std::path::{Path, PathBuf};

use tinytv_media_model::Quality;

use crate::command::thumbnail_args;
use crate::runner::ProcessRunner;

/// Image format of an extracted preview frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StillFormat {
    /// Lossy; honours the encode quality.
    #[default]
    Jpeg,
    /// Lossless.
    Png,
}

impl StillFormat {
    pub fn extension(self) -> &'static str {
        match self {
            StillFormat::Jpeg => ".jpg",
            StillFormat::Png => ".png",
        }
    }
}

/// Grab one frame one second into `src`, passed through `filter_chain`.
///
/// The image is written to a temporary file that is kept; the caller owns
/// it from here on. Returns `None` if the file cannot be created or the
/// encoder fails.
pub fn extract_thumbnail(
    runner: &dyn ProcessRunner,
    ffmpeg: &Path,
    src: &Path,
    filter_chain: &str,
    quality: Quality,
    still: StillFormat,
) -> Option<PathBuf> {
    let tmp = tempfile::Builder::new()
        .prefix("tinytv_thumb_")
        .suffix(still.extension())
        .tempfile()
        .map_err(|e| tracing::warn!(error = %e, "Failed to create thumbnail file"))
        .ok()?
        .into_temp_path();

    let jpeg_quality = (still == StillFormat::Jpeg).then_some(quality);
    let args = thumbnail_args(src, filter_chain, jpeg_quality, &tmp);
    let sink = |line: &str| tracing::debug!(target: "tinytv::thumbnail", "{line}");
    let code = runner.run(ffmpeg, &args, &sink);

    let written = std::fs::metadata(&tmp).map(|m| m.len() > 0).unwrap_or(false);
    if code != 0 || !written {
        tracing::debug!(src = %src.display(), code, "Thumbnail extraction failed");
        return None;
    }
    match tmp.keep() {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to keep thumbnail file");
            None
        }
    }
}
