//! Combine strategy selection and the concat list file.

use std::io::Write;
use std::path::Path;

use tempfile::TempPath;
use tinytv_common::{TinytvError, TinytvResult};

/// From this many inputs on, files are joined through a list file instead
/// of one `-i` per input, keeping the command line short.
pub const CONCAT_LIST_THRESHOLD: usize = 50;

/// How a combine job joins its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineStrategy {
    /// A single input, re-encoded without concatenation.
    Direct,
    /// Normalize and concatenate inside one filter graph.
    FilterGraph,
    /// Concat demuxer reading a temporary list file.
    ConcatList,
}

impl CombineStrategy {
    /// Pick the strategy for `count` inputs. Zero inputs is an error.
    pub fn select(count: usize) -> TinytvResult<Self> {
        match count {
            0 => Err(TinytvError::input("No input files provided.")),
            1 => Ok(CombineStrategy::Direct),
            n if n >= CONCAT_LIST_THRESHOLD => Ok(CombineStrategy::ConcatList),
            _ => Ok(CombineStrategy::FilterGraph),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CombineStrategy::Direct => "direct",
            CombineStrategy::FilterGraph => "filter-graph",
            CombineStrategy::ConcatList => "concat-list",
        }
    }
}

impl std::fmt::Display for CombineStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `file '<path>'` entry with single quotes escaped.
///
/// Windows separators become forward slashes; elsewhere a backslash is part
/// of the file name and is kept.
pub fn concat_list_entry(path: &Path) -> String {
    let text = path.to_string_lossy();
    let posix = if cfg!(windows) {
        text.replace('\\', "/")
    } else {
        text.into_owned()
    };
    format!("file '{}'\n", posix.replace('\'', "'\\''"))
}

/// Write a UTF-8 concat list into the temp directory.
///
/// The returned path deletes the file when dropped, whatever the outcome of
/// the encode that reads it.
pub fn write_concat_list<'a>(paths: impl IntoIterator<Item = &'a Path>) -> TinytvResult<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix("tinytv_concat_")
        .suffix(".txt")
        .tempfile()?;
    let body: String = paths.into_iter().map(concat_list_entry).collect();
    file.write_all(body.as_bytes())?;
    file.flush()?;
    Ok(file.into_temp_path())
}
