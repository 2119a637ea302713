//! Convert and combine job descriptions.

use std::path::{Path, PathBuf};

use crate::profile::{ChannelPrefix, EncodeProfile, Quality, TargetFps};
use crate::source::SourceFile;

/// Container extension for every output.
pub const OUTPUT_EXTENSION: &str = "avi";

/// Output base name used when a combine request leaves it blank.
pub const DEFAULT_COMBINE_NAME: &str = "combined_episodes";

/// Largest single file a FAT32 volume can hold (2^32 - 1 bytes).
pub const FAT32_MAX_FILE_BYTES: u64 = u32::MAX as u64;

/// A batch of files converted one by one into the device format.
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Inputs in processing order.
    pub files: Vec<SourceFile>,

    /// Encode settings shared by every item.
    pub profile: EncodeProfile,

    /// Directory receiving the converted files.
    pub output_dir: PathBuf,
}

impl BatchJob {
    /// Number of items in the batch.
    pub fn total(&self) -> usize {
        self.files.len()
    }

    /// Destination for one source: `<dir>/<prefix>_<stem>.avi`.
    pub fn destination_for(&self, source: &SourceFile) -> PathBuf {
        self.output_dir.join(prefixed_file_name(
            self.profile.channel_prefix.as_ref(),
            &source.stem(),
        ))
    }
}

/// Several files joined into one output.
#[derive(Debug, Clone)]
pub struct CombineJob {
    /// Inputs in playback order.
    pub files: Vec<SourceFile>,

    /// Final output file.
    pub output_path: PathBuf,

    /// Output frame rate.
    pub fps: TargetFps,

    /// Video quality of the re-encode.
    pub quality: Quality,
}

impl CombineJob {
    /// Number of inputs.
    pub fn total(&self) -> usize {
        self.files.len()
    }
}

/// Output file for a combine job: `<dir>/<prefix>_<name>.avi`.
///
/// A blank name falls back to [`DEFAULT_COMBINE_NAME`]; a trailing `.avi`
/// typed by the user is not doubled.
pub fn combine_output_path(
    output_dir: &Path,
    name: Option<&str>,
    prefix: Option<&ChannelPrefix>,
) -> PathBuf {
    let mut base = name.map(str::trim).unwrap_or_default();
    if let Some(cut) = base.len().checked_sub(4) {
        if base
            .get(cut..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(".avi"))
        {
            base = base[..cut].trim_end();
        }
    }
    if base.is_empty() {
        base = DEFAULT_COMBINE_NAME;
    }
    output_dir.join(prefixed_file_name(prefix, base))
}

fn prefixed_file_name(prefix: Option<&ChannelPrefix>, base: &str) -> String {
    match prefix {
        Some(p) => format!("{p}_{base}.{OUTPUT_EXTENSION}"),
        None => format!("{base}.{OUTPUT_EXTENSION}"),
    }
}

/// Position within a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobProgress {
    /// Items finished so far (1-based once the first item completes).
    pub current: usize,
    /// Items in the job.
    pub total: usize,
}

impl JobProgress {
    /// Completed fraction in `[0.0, 1.0]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64
        }
    }
}
