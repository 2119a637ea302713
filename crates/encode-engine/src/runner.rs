//! External process execution.
//!
//! Every encoder and prober invocation goes through a [`ProcessRunner`], so
//! the rest of the engine never touches `std::process` directly and tests
//! can substitute a scripted runner.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tinytv_common::config::ToolPaths;

/// Exit code reported when the process could not be started or was killed
/// by a signal.
pub const SYNTHETIC_FAILURE_EXIT_CODE: i32 = -1;

/// Receives diagnostic lines as they are produced.
pub trait LogSink: Send + Sync {
    fn line(&self, line: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn line(&self, line: &str) {
        self(line)
    }
}

/// A sink that drops everything.
pub fn discard(_line: &str) {}

/// Spawns external tools.
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args`, discarding stdout and forwarding each
    /// stderr line to `sink` as it arrives. Returns the exit code; start-up
    /// failures are logged to `sink` and reported as
    /// [`SYNTHETIC_FAILURE_EXIT_CODE`].
    fn run(&self, program: &Path, args: &[String], sink: &dyn LogSink) -> i32;

    /// Run `program` with `args` and capture stdout. `None` when the process
    /// cannot be started or exits unsuccessfully.
    fn capture(&self, program: &Path, args: &[String]) -> Option<String>;
}

/// Runner backed by real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[String], sink: &dyn LogSink) -> i32 {
        tracing::debug!(program = %program.display(), ?args, "Spawning process");
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        no_console_window(&mut cmd);

        let start = std::time::Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(program = %program.display(), error = %e, "Failed to start process");
                sink.line(&format!("[ERROR] Failed to start {}: {e}", program.display()));
                return SYNTHETIC_FAILURE_EXIT_CODE;
            }
        };
        tracing::debug!(pid = child.id(), "Process started");

        if let Some(stderr) = child.stderr.take() {
            if let Err(e) = for_each_line(BufReader::new(stderr), |line| sink.line(line)) {
                tracing::warn!(error = %e, "Failed reading process diagnostics");
            }
        }

        let status = match child.wait() {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(program = %program.display(), error = %e, "Failed to wait on process");
                sink.line(&format!("[ERROR] Failed to wait on {}: {e}", program.display()));
                return SYNTHETIC_FAILURE_EXIT_CODE;
            }
        };

        let code = status.code().unwrap_or(SYNTHETIC_FAILURE_EXIT_CODE);
        tracing::debug!(
            program = %program.display(),
            code,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Process exited"
        );
        code
    }

    fn capture(&self, program: &Path, args: &[String]) -> Option<String> {
        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null());
        no_console_window(&mut cmd);

        let output = match cmd.output() {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(program = %program.display(), error = %e, "Failed to start process");
                return None;
            }
        };
        if !output.status.success() {
            tracing::debug!(
                program = %program.display(),
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Process exited unsuccessfully"
            );
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(windows)]
fn no_console_window(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn no_console_window(_cmd: &mut Command) {}

/// Split a byte stream into trimmed, non-empty lines on `\n` or `\r`.
///
/// The encoder rewrites its `-stats` line with bare carriage returns, so both
/// separators end a line. Invalid UTF-8 is replaced rather than rejected.
pub fn for_each_line<R: Read>(mut reader: R, mut f: impl FnMut(&str)) -> std::io::Result<()> {
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                flush_line(&mut pending, &mut f);
                return Err(e);
            }
        };
        for &byte in &chunk[..n] {
            if byte == b'\n' || byte == b'\r' {
                flush_line(&mut pending, &mut f);
            } else {
                pending.push(byte);
            }
        }
    }
    flush_line(&mut pending, &mut f);
    Ok(())
}

fn flush_line(pending: &mut Vec<u8>, f: &mut impl FnMut(&str)) {
    let text = String::from_utf8_lossy(pending);
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        f(trimmed);
    }
    pending.clear();
}

/// Resolved encoder and prober executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

/// Availability of one tool.
#[derive(Debug, Clone)]
pub struct ToolStatus {
    pub name: &'static str,
    pub configured: PathBuf,
    pub resolved: Option<PathBuf>,
}

impl Toolchain {
    pub fn from_config(tools: &ToolPaths) -> Self {
        Self {
            ffmpeg: tools.ffmpeg.clone(),
            ffprobe: tools.resolved_ffprobe(),
        }
    }

    /// Look both tools up on disk / `PATH`.
    pub fn check(&self) -> Vec<ToolStatus> {
        [("ffmpeg", &self.ffmpeg), ("ffprobe", &self.ffprobe)]
            .into_iter()
            .map(|(name, configured)| ToolStatus {
                name,
                configured: configured.clone(),
                resolved: which::which(configured).ok(),
            })
            .collect()
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        Self::from_config(&ToolPaths::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    fn collect(input: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for_each_line(Cursor::new(input.to_vec()), |l| lines.push(l.to_string())).unwrap();
        lines
    }

    #[test]
    fn test_splits_on_newlines_and_carriage_returns() {
        let lines = collect(b"Input #0\nframe=  10 fps=0.0\rframe=  20 fps=9.5\r\nDone\n");
        assert_eq!(lines, vec!["Input #0", "frame=  10 fps=0.0", "frame=  20 fps=9.5", "Done"]);
    }

    #[test]
    fn test_flushes_trailing_partial_line() {
        assert_eq!(collect(b"no newline at end"), vec!["no newline at end"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let lines = collect(b"bad \xff byte\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("bad"));
    }

    #[test]
    fn test_spawn_failure_is_reported_not_raised() {
        let captured = Mutex::new(Vec::<String>::new());
        let sink = |line: &str| captured.lock().unwrap().push(line.to_string());
        let code = SystemRunner::new().run(
            Path::new("definitely-not-a-real-encoder-xyz"),
            &["-version".to_string()],
            &sink,
        );
        assert_eq!(code, SYNTHETIC_FAILURE_EXIT_CODE);
        let lines = captured.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("[ERROR] Failed to start"));
    }

    #[test]
    fn test_capture_of_missing_tool_is_none() {
        let out = SystemRunner::new().capture(Path::new("definitely-not-a-real-prober-xyz"), &[]);
        assert!(out.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_stderr_lines_stream_to_sink() {
        let captured = Mutex::new(Vec::<String>::new());
        let sink = |line: &str| captured.lock().unwrap().push(line.to_string());
        let code = SystemRunner::new().run(
            Path::new("sh"),
            &["-c".to_string(), "echo out; echo one >&2; echo two >&2; exit 3".to_string()],
            &sink,
        );
        assert_eq!(code, 3);
        assert_eq!(*captured.lock().unwrap(), vec!["one", "two"]);
    }
}
