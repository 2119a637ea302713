//! Scripted process runner shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tinytv_encode_engine::{Engine, JobEvent, LogSink, ProcessRunner, Toolchain};

/// Records every invocation and plays back canned results.
///
/// `run` writes a small file at the last argument (the output path) when it
/// reports success. Stream reports are consumed in order; the last one keeps
/// being returned once the queue is down to it.
#[derive(Default)]
pub struct FakeRunner {
    runs: Mutex<Vec<Vec<String>>>,
    captures: Mutex<Vec<Vec<String>>>,
    failing_runs: Vec<usize>,
    skip_output: bool,
    reports: Mutex<VecDeque<String>>,
    frame_rate: Option<String>,
    concat_lists: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`th `run` call (1-based) exit with code 1.
    pub fn failing_run(mut self, n: usize) -> Self {
        self.failing_runs.push(n);
        self
    }

    /// Report success without writing any output.
    pub fn without_output(mut self) -> Self {
        self.skip_output = true;
        self
    }

    pub fn with_reports(self, reports: impl IntoIterator<Item = String>) -> Self {
        *self.reports.lock().unwrap() = reports.into_iter().collect();
        self
    }

    pub fn with_frame_rate(mut self, rate: &str) -> Self {
        self.frame_rate = Some(rate.to_string());
        self
    }

    pub fn runs(&self) -> Vec<Vec<String>> {
        self.runs.lock().unwrap().clone()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    pub fn captures(&self) -> Vec<Vec<String>> {
        self.captures.lock().unwrap().clone()
    }

    /// Contents of every concat list file seen while it still existed.
    pub fn concat_lists(&self) -> Vec<String> {
        self.concat_lists.lock().unwrap().clone()
    }

    pub fn into_engine(self) -> (Engine, Arc<FakeRunner>) {
        let runner = Arc::new(self);
        let toolchain = Toolchain {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        };
        (Engine::new(toolchain, runner.clone(), 2.0), runner)
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, _program: &Path, args: &[String], sink: &dyn LogSink) -> i32 {
        let n = {
            let mut runs = self.runs.lock().unwrap();
            runs.push(args.to_vec());
            runs.len()
        };

        if let Some(pos) = args.iter().position(|a| a == "concat") {
            if let Some(list) = args[pos..].iter().skip_while(|a| *a != "-i").nth(1) {
                let text = std::fs::read_to_string(list).unwrap_or_default();
                self.concat_lists.lock().unwrap().push(text);
            }
        }

        sink.line("frame=   12 fps=0.0 q=5.0 size=       8kB time=00:00:01.00");
        if self.failing_runs.contains(&n) {
            sink.line("Conversion failed!");
            return 1;
        }
        if !self.skip_output {
            if let Some(out) = args.last() {
                std::fs::write(out, b"RIFF....AVI ").unwrap();
            }
        }
        0
    }

    fn capture(&self, _program: &Path, args: &[String]) -> Option<String> {
        self.captures.lock().unwrap().push(args.to_vec());
        if args.iter().any(|a| a == "-show_streams") {
            let mut reports = self.reports.lock().unwrap();
            return if reports.len() > 1 {
                reports.pop_front()
            } else {
                reports.front().cloned()
            };
        }
        if args.iter().any(|a| a == "format=duration") {
            return Some("10.000000\n".to_string());
        }
        if args.iter().any(|a| a.contains("avg_frame_rate")) {
            return self
                .frame_rate
                .as_ref()
                .map(|r| format!("r_frame_rate={r}\navg_frame_rate={r}\n"));
        }
        None
    }
}

/// Prober output for a file that matches the device format at `fps`.
pub fn conforming_report(fps: u32) -> String {
    report(fps, "MJPG", fps * 10, 10.0)
}

/// Prober output with arbitrary video fields.
pub fn report(fps: u32, tag: &str, frames: u32, duration: f64) -> String {
    format!(
        "[STREAM]\n\
         codec_name=mjpeg\n\
         codec_type=video\n\
         codec_tag_string={tag}\n\
         r_frame_rate={fps}/1\n\
         avg_frame_rate={fps}/1\n\
         nb_frames={frames}\n\
         duration={duration}\n\
         [/STREAM]\n\
         [STREAM]\n\
         codec_name=pcm_u8\n\
         codec_type=audio\n\
         sample_rate=10000\n\
         channels=1\n\
         [/STREAM]\n\
         [FORMAT]\n\
         duration={duration}\n\
         [/FORMAT]\n"
    )
}

/// Prober output whose frame rate fields disagree with the target.
pub fn variable_rate_report() -> String {
    "[STREAM]\n\
     codec_type=video\n\
     codec_tag_string=MJPG\n\
     r_frame_rate=25/1\n\
     avg_frame_rate=2997/125\n\
     [/STREAM]\n"
        .to_string()
}

/// Create `count` small placeholder inputs in `dir`.
pub fn touch_inputs(dir: &Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("episode_{i:03}.mp4"));
            std::fs::write(&path, vec![0u8; 1024]).unwrap();
            path
        })
        .collect()
}

/// Log lines among `events`.
pub fn log_lines(events: &[JobEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Log(line) => Some(line.clone()),
            _ => None,
        })
        .collect()
}

/// Drain everything currently queued on a receiver.
pub fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
