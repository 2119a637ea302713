//! Source files queued for a job.

use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

/// File extensions offered as video inputs.
pub const VIDEO_EXTENSIONS: [&str; 10] = [
    "mp4", "mov", "mkv", "avi", "webm", "wmv", "m4v", "mpg", "mpeg", "flv",
];

/// Whether `path` has one of the [`VIDEO_EXTENSIONS`] (case-insensitive).
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
}

/// An input video with lazily cached probe results.
///
/// Probing is expensive (it spawns the prober), so each value is computed at
/// most once per entry. Removing the entry from its job drops the cache with
/// it.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    duration_secs: OnceLock<Option<f64>>,
    frame_rate: OnceLock<Option<f64>>,
    size_bytes: OnceLock<Option<u64>>,
}

impl SourceFile {
    /// Create an entry for `path`, made absolute against the working directory.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: absolutize(path.as_ref()),
            duration_secs: OnceLock::new(),
            frame_rate: OnceLock::new(),
            size_bytes: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name for log lines.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// File stem used to derive output names.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string())
    }

    /// Duration in seconds, probing on first use.
    pub fn duration_with(&self, probe: impl FnOnce(&Path) -> Option<f64>) -> Option<f64> {
        *self.duration_secs.get_or_init(|| probe(&self.path))
    }

    /// Frame rate in frames per second, probing on first use.
    pub fn frame_rate_with(&self, probe: impl FnOnce(&Path) -> Option<f64>) -> Option<f64> {
        *self.frame_rate.get_or_init(|| probe(&self.path))
    }

    /// Size on disk in bytes, read on first use.
    pub fn size_bytes(&self) -> Option<u64> {
        *self
            .size_bytes
            .get_or_init(|| std::fs::metadata(&self.path).ok().map(|m| m.len()))
    }
}

impl PartialEq for SourceFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

/// Absolute, lexically cleaned form of `path` (no filesystem access).
pub fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut cleaned = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// Normalized string form of a path for use as a cache key.
///
/// Case is folded on Windows where the filesystem is case-insensitive.
pub fn normalize_path_key(path: &Path) -> String {
    let text = absolutize(path).to_string_lossy().into_owned();
    if cfg!(windows) {
        text.to_lowercase()
    } else {
        text
    }
}
