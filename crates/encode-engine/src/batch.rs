//! Job preparation, execution and the background job API.
//!
//! Requests are validated synchronously; only a well-formed job ever reaches
//! a worker. Each job runs on one blocking task and processes its items
//! strictly in order, stopping at the first failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use tinytv_common::{fmt_bytes, AppConfig, TinytvError, TinytvResult};
use tinytv_media_model::{
    absolutize, combine_output_path, BatchJob, ChannelPrefix, CombineJob, DeviceFormat,
    EncodeProfile, JobProgress, Quality, ScaleMode, SourceFile, TargetFps, FAT32_MAX_FILE_BYTES,
};

use crate::calibrate::Calibrator;
use crate::command::{
    combine_direct_args, combine_filter_graph_args, combine_list_args, convert_args, video_filter,
    EncodePass,
};
use crate::estimate::combined_size_estimate;
use crate::probe::Prober;
use crate::runner::{LogSink, ProcessRunner, SystemRunner, Toolchain};
use crate::strategy::{write_concat_list, CombineStrategy};
use crate::thumbnail::{extract_thumbnail, StillFormat};
use crate::validate::{ValidationOutcome, Validator};

/// A request to convert files one by one.
#[derive(Debug, Clone, Default)]
pub struct ConvertRequest {
    pub files: Vec<PathBuf>,
    /// Required; there is no default destination for conversions.
    pub output_dir: Option<PathBuf>,
    pub fps: TargetFps,
    pub quality: Quality,
    pub scale_mode: ScaleMode,
    pub normalize_audio: bool,
    /// Raw channel text; blank for none.
    pub channel: String,
}

/// A request to join files into one output.
#[derive(Debug, Clone, Default)]
pub struct CombineRequest {
    pub files: Vec<PathBuf>,
    /// Defaults to the working directory.
    pub output_dir: Option<PathBuf>,
    /// Output base name; blank uses the default name.
    pub output_name: Option<String>,
    pub fps: TargetFps,
    pub quality: Quality,
    /// Raw channel text; blank for none.
    pub channel: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Convert,
    Combine,
}

/// Terminal state of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Every item finished; files written, in order.
    Succeeded { outputs: Vec<PathBuf> },
    /// Stopped at `item`; later items were not attempted.
    Failed { item: String, reason: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// Outcome plus timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub kind: JobKind,
    pub outcome: JobOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Messages published by a running job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// One user-facing log line.
    Log(String),
    /// An item finished (successfully or not).
    Progress(JobProgress),
    /// The job ended. Always the last event.
    Finished(JobReport),
}

/// Forwards job output to a channel and mirrors log lines to tracing.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<JobEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<JobEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink with no receiver; lines only reach tracing.
    pub fn detached() -> Self {
        Self { tx: None }
    }

    pub fn progress(&self, current: usize, total: usize) {
        self.emit(JobEvent::Progress(JobProgress { current, total }));
    }

    fn emit(&self, event: JobEvent) {
        if let Some(tx) = &self.tx {
            // The receiver may have been dropped; the job keeps going.
            let _ = tx.send(event);
        }
    }
}

impl LogSink for EventSink {
    fn line(&self, line: &str) {
        tracing::debug!(target: "tinytv::job", "{line}");
        self.emit(JobEvent::Log(line.to_string()));
    }
}

/// A job running in the background.
#[derive(Debug)]
pub struct JobHandle {
    events: UnboundedReceiver<JobEvent>,
    task: JoinHandle<JobReport>,
}

impl JobHandle {
    /// Run `job` on a blocking task of the current runtime.
    fn spawn<F>(job: F) -> TinytvResult<Self>
    where
        F: FnOnce(&EventSink) -> JobReport + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .context("Starting a job requires a tokio runtime")?;
        let (tx, events) = mpsc::unbounded_channel();
        let task = runtime.spawn_blocking(move || job(&EventSink::new(tx)));
        Ok(Self { events, task })
    }

    /// Next event, or `None` once the job has ended and all events were read.
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Drain events into `on_event` until the job ends, then return its report.
    pub async fn finish(mut self, mut on_event: impl FnMut(JobEvent)) -> TinytvResult<JobReport> {
        while let Some(event) = self.events.recv().await {
            on_event(event);
        }
        self.task
            .await
            .map_err(|e| TinytvError::process(format!("Job task failed: {e}")))
    }

    /// Wait for the report, discarding events.
    pub async fn wait(self) -> TinytvResult<JobReport> {
        self.finish(|_| {}).await
    }
}

/// Entry point for every encode operation.
#[derive(Clone)]
pub struct Engine {
    toolchain: Toolchain,
    format: DeviceFormat,
    runner: Arc<dyn ProcessRunner>,
    prober: Prober,
    calibrator: Calibrator,
    validator: Validator,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("toolchain", &self.toolchain)
            .field("calibrator", &self.calibrator)
            .finish()
    }
}

impl Engine {
    pub fn new(toolchain: Toolchain, runner: Arc<dyn ProcessRunner>, calibration_secs: f64) -> Self {
        let format = DeviceFormat::TINYTV;
        let prober = Prober::new(Arc::clone(&runner), toolchain.ffprobe.clone());
        let calibrator = Calibrator::new(
            Arc::clone(&runner),
            toolchain.ffmpeg.clone(),
            format,
            calibration_secs,
        );
        let validator = Validator::new(Arc::clone(&runner), toolchain.ffmpeg.clone(), prober.clone());
        Self {
            toolchain,
            format,
            runner,
            prober,
            calibrator,
            validator,
        }
    }

    /// Engine driving real processes with the configured tools.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Toolchain::from_config(&config.tools),
            Arc::new(SystemRunner::new()),
            config.calibration.sample_secs,
        )
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn format(&self) -> &DeviceFormat {
        &self.format
    }

    pub fn prober(&self) -> &Prober {
        &self.prober
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Video filter chain for a scale mode, as used by conversions.
    pub fn video_filter(&self, mode: ScaleMode, fps: TargetFps) -> String {
        video_filter(&self.format, mode, fps)
    }

    /// Probe a source's duration, caching it on the entry.
    pub fn source_duration(&self, source: &SourceFile) -> Option<f64> {
        source.duration_with(|p| self.prober.duration(p))
    }

    /// Probe a source's frame rate, caching it on the entry.
    pub fn source_frame_rate(&self, source: &SourceFile) -> Option<f64> {
        source.frame_rate_with(|p| self.prober.frame_rate(p))
    }

    /// Extract a preview frame of `src` as it would look on the device.
    pub fn thumbnail(
        &self,
        src: &Path,
        mode: ScaleMode,
        quality: Quality,
        still: StillFormat,
    ) -> Option<PathBuf> {
        let chain = crate::command::scale_filter(&self.format, mode);
        extract_thumbnail(self.runner.as_ref(), &self.toolchain.ffmpeg, src, &chain, quality, still)
    }

    /// Validate a convert request and build the job. Creates the output
    /// directory.
    pub fn prepare_convert(&self, request: ConvertRequest) -> TinytvResult<BatchJob> {
        if request.files.is_empty() {
            return Err(TinytvError::input("No input files provided."));
        }
        let channel_prefix = parse_channel(&request.channel)?;
        let output_dir = request
            .output_dir
            .filter(|d| !d.as_os_str().is_empty())
            .ok_or_else(|| TinytvError::input("Please choose an output folder."))?;
        let output_dir = absolutize(&output_dir);
        std::fs::create_dir_all(&output_dir)?;

        let profile = EncodeProfile {
            format: self.format,
            fps: request.fps,
            quality: request.quality,
            scale_mode: request.scale_mode,
            normalize_audio: request.normalize_audio,
            channel_prefix,
        };
        Ok(BatchJob {
            files: request.files.into_iter().map(SourceFile::new).collect(),
            profile,
            output_dir,
        })
    }

    /// Validate a combine request and build the job.
    ///
    /// Refuses jobs whose estimated output would not fit on a FAT32 volume.
    /// Probes each source's frame rate for the estimate. Creates the output
    /// directory.
    pub fn prepare_combine(&self, request: CombineRequest) -> TinytvResult<CombineJob> {
        if request.files.is_empty() {
            return Err(TinytvError::input("No input files provided."));
        }
        let channel_prefix = parse_channel(&request.channel)?;
        let output_dir = match request.output_dir.filter(|d| !d.as_os_str().is_empty()) {
            Some(dir) => absolutize(&dir),
            None => std::env::current_dir()?,
        };

        let files: Vec<SourceFile> = request.files.into_iter().map(SourceFile::new).collect();
        let estimate = combined_size_estimate(&files, request.fps, |f| self.source_frame_rate(f));
        tracing::info!(
            files = files.len(),
            estimate_bytes = estimate,
            fps = %request.fps,
            "Combined size estimate"
        );
        if estimate > FAT32_MAX_FILE_BYTES {
            return Err(TinytvError::precondition(format!(
                "Estimated output size {} exceeds the FAT32 limit of {}; combine fewer files",
                fmt_bytes(Some(estimate)),
                fmt_bytes(Some(FAT32_MAX_FILE_BYTES)),
            )));
        }

        std::fs::create_dir_all(&output_dir)?;
        Ok(CombineJob {
            output_path: combine_output_path(
                &output_dir,
                request.output_name.as_deref(),
                channel_prefix.as_ref(),
            ),
            files,
            fps: request.fps,
            quality: request.quality,
        })
    }

    /// Validate `request` and run it in the background.
    pub fn start_convert(&self, request: ConvertRequest) -> TinytvResult<JobHandle> {
        let job = self.prepare_convert(request)?;
        tracing::info!(
            files = job.total(),
            output_dir = %job.output_dir.display(),
            fps = %job.profile.fps,
            quality = %job.profile.quality,
            "Starting convert"
        );
        let engine = self.clone();
        JobHandle::spawn(move |events| engine.run_convert(&job, events))
    }

    /// Validate `request` and run it in the background.
    pub fn start_combine(&self, request: CombineRequest) -> TinytvResult<JobHandle> {
        let job = self.prepare_combine(request)?;
        tracing::info!(
            files = job.total(),
            output = %job.output_path.display(),
            fps = %job.fps,
            "Starting combine"
        );
        let engine = self.clone();
        JobHandle::spawn(move |events| engine.run_combine(&job, events))
    }

    /// Convert every file of `job` on the calling thread.
    pub fn run_convert(&self, job: &BatchJob, events: &EventSink) -> JobReport {
        let started_at = Utc::now();
        let outcome = self.convert_items(job, events);
        finish_report(JobKind::Convert, started_at, outcome, events)
    }

    /// Run a combine job on the calling thread.
    pub fn run_combine(&self, job: &CombineJob, events: &EventSink) -> JobReport {
        let started_at = Utc::now();
        let outcome = self.combine_items(job, events);
        finish_report(JobKind::Combine, started_at, outcome, events)
    }

    fn convert_items(&self, job: &BatchJob, events: &EventSink) -> JobOutcome {
        let total = job.total();
        let mut outputs = Vec::with_capacity(total);

        for (index, source) in job.files.iter().enumerate() {
            let dst = job.destination_for(source);
            events.line(&format!(
                "[*] Converting {} -> {}",
                source.display_name(),
                file_name(&dst)
            ));
            tracing::info!(
                source = %source.path().display(),
                output = %dst.display(),
                item = index + 1,
                total,
                "Converting"
            );

            let args = convert_args(&job.profile, source.path(), &dst, EncodePass::Initial);
            let code = self.runner.run(&self.toolchain.ffmpeg, &args, events);
            events.progress(index + 1, total);

            if code != 0 || !dst.exists() {
                events.line(&format!("[ERROR] Conversion failed: {}", source.path().display()));
                return JobOutcome::Failed {
                    item: source.display_name(),
                    reason: failure_reason(code, &dst),
                };
            }

            if let ValidationOutcome::Failed { reason } =
                self.validator
                    .validate_and_repair(&job.profile, source.path(), &dst, events)
            {
                return JobOutcome::Failed {
                    item: source.display_name(),
                    reason,
                };
            }
            outputs.push(dst);
        }

        events.line("[OK] Convert complete.");
        JobOutcome::Succeeded { outputs }
    }

    fn combine_items(&self, job: &CombineJob, events: &EventSink) -> JobOutcome {
        let total = job.total();
        let dst = &job.output_path;
        let name = file_name(dst);
        let fps = job.fps;

        let strategy = match CombineStrategy::select(total) {
            Ok(strategy) => strategy,
            Err(e) => {
                events.line("[ERROR] No input files provided.");
                return JobOutcome::Failed {
                    item: name,
                    reason: e.to_string(),
                };
            }
        };
        events.line(&format!("[*] Combining {total} file(s) @ {fps} fps -> {name}"));
        tracing::info!(%strategy, files = total, output = %dst.display(), "Combining");

        let code = match strategy {
            CombineStrategy::Direct => {
                events.line(&format!("[*] Transcoding single file @ {fps} fps -> {name}"));
                let args = combine_direct_args(&self.format, fps, job.quality, job.files[0].path(), dst);
                self.runner.run(&self.toolchain.ffmpeg, &args, events)
            }
            CombineStrategy::ConcatList => {
                events.line(&format!(
                    "[*] Using concat list ({total} files) with re-encode @ {fps} fps"
                ));
                let list = match write_concat_list(job.files.iter().map(SourceFile::path)) {
                    Ok(list) => list,
                    Err(e) => {
                        events.line(&format!("[ERROR] Could not write concat list: {e}"));
                        return JobOutcome::Failed {
                            item: name,
                            reason: e.to_string(),
                        };
                    }
                };
                let args = combine_list_args(&self.format, fps, job.quality, &list, dst);
                self.runner.run(&self.toolchain.ffmpeg, &args, events)
            }
            CombineStrategy::FilterGraph => {
                events.line(&format!(
                    "[*] Concat {total} inputs via filter_complex @ {fps} fps"
                ));
                let inputs: Vec<&Path> = job.files.iter().map(SourceFile::path).collect();
                let args = combine_filter_graph_args(&self.format, fps, job.quality, &inputs, dst);
                self.runner.run(&self.toolchain.ffmpeg, &args, events)
            }
        };
        events.progress(total, total);

        if code == 0 && dst.exists() {
            events.line("[OK] Combine complete.");
            JobOutcome::Succeeded {
                outputs: vec![dst.clone()],
            }
        } else {
            events.line("[ERROR] Combine failed.");
            JobOutcome::Failed {
                item: name,
                reason: failure_reason(code, dst),
            }
        }
    }
}

fn parse_channel(text: &str) -> TinytvResult<Option<ChannelPrefix>> {
    ChannelPrefix::parse(text).map_err(|e| TinytvError::input(e.to_string()))
}

fn finish_report(
    kind: JobKind,
    started_at: DateTime<Utc>,
    outcome: JobOutcome,
    events: &EventSink,
) -> JobReport {
    let report = JobReport {
        kind,
        outcome,
        started_at,
        finished_at: Utc::now(),
    };
    match &report.outcome {
        JobOutcome::Succeeded { outputs } => tracing::info!(
            ?kind,
            outputs = outputs.len(),
            elapsed_secs = report.elapsed_secs(),
            "Job finished"
        ),
        JobOutcome::Failed { item, reason } => tracing::error!(
            ?kind,
            %item,
            %reason,
            elapsed_secs = report.elapsed_secs(),
            "Job failed"
        ),
    }
    events.emit(JobEvent::Finished(report.clone()));
    report
}

fn failure_reason(code: i32, output: &Path) -> String {
    if code != 0 {
        format!("encoder exited with code {code}")
    } else {
        format!("encoder produced no output at {}", output.display())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverRuns;

    impl ProcessRunner for NeverRuns {
        fn run(&self, _program: &Path, _args: &[String], _sink: &dyn LogSink) -> i32 {
            panic!("no process should be started");
        }

        fn capture(&self, _program: &Path, _args: &[String]) -> Option<String> {
            None
        }
    }

    fn engine() -> Engine {
        Engine::new(Toolchain::default(), Arc::new(NeverRuns), 2.0)
    }

    #[test]
    fn test_convert_rejects_empty_list() {
        let err = engine()
            .prepare_convert(ConvertRequest {
                output_dir: Some(PathBuf::from("/tmp")),
                ..ConvertRequest::default()
            })
            .unwrap_err();
        assert!(matches!(err, TinytvError::Input { .. }));
    }

    #[test]
    fn test_convert_requires_output_dir() {
        let err = engine()
            .prepare_convert(ConvertRequest {
                files: vec![PathBuf::from("/v/a.mp4")],
                ..ConvertRequest::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("output folder"));
    }

    #[test]
    fn test_invalid_channel_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = engine()
            .prepare_combine(CombineRequest {
                files: vec![PathBuf::from("/v/a.mp4")],
                output_dir: Some(dir.path().to_path_buf()),
                channel: "abc".to_string(),
                ..CombineRequest::default()
            })
            .unwrap_err();
        assert!(matches!(err, TinytvError::Input { .. }));
        assert!(err.to_string().contains("Channel must be a number"));
    }

    #[test]
    fn test_prepare_convert_builds_profile_and_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out");
        let job = engine()
            .prepare_convert(ConvertRequest {
                files: vec![PathBuf::from("/v/Pilot.mkv")],
                output_dir: Some(out.clone()),
                fps: TargetFps::Twelve,
                quality: Quality::new(9),
                channel: "4".to_string(),
                ..ConvertRequest::default()
            })
            .unwrap();
        assert!(out.is_dir());
        assert_eq!(job.profile.quality.value(), 9);
        assert_eq!(job.destination_for(&job.files[0]), out.join("04_Pilot.avi"));
    }

    #[test]
    fn test_prepare_combine_names_output() {
        let dir = tempfile::tempdir().unwrap();
        let job = engine()
            .prepare_combine(CombineRequest {
                files: vec![PathBuf::from("/v/missing-a.mp4"), PathBuf::from("/v/missing-b.mp4")],
                output_dir: Some(dir.path().to_path_buf()),
                output_name: Some("Season 1.avi".to_string()),
                channel: "2".to_string(),
                ..CombineRequest::default()
            })
            .unwrap();
        assert_eq!(job.output_path, dir.path().join("02_Season 1.avi"));
        assert_eq!(job.total(), 2);
    }

    #[test]
    fn test_start_outside_runtime_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = engine().start_convert(ConvertRequest {
            files: vec![PathBuf::from("/v/a.mp4")],
            output_dir: Some(dir.path().to_path_buf()),
            ..ConvertRequest::default()
        });
        assert!(matches!(result, Err(TinytvError::Other(_))));
    }

    #[test]
    fn test_detached_sink_accepts_events() {
        let sink = EventSink::detached();
        sink.line("[*] nothing listens");
        sink.progress(1, 1);
    }
}
