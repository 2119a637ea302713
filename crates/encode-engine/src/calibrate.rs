//! Per-source bitrate calibration.
//!
//! A calibration encodes a short sample of the source at both quality
//! extremes and records the resulting video bitrates. Measurements run in the
//! background; estimates requested meanwhile fall back to the closed-form
//! model instead of waiting.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use tinytv_media_model::{CalibrationAnchors, CalibrationKey, DeviceFormat, Quality, TargetFps};

use crate::command::bitrate_sample_args;
use crate::estimate::estimate_output_bytes;
use crate::runner::ProcessRunner;

/// Default length of each calibration sample in seconds.
pub const DEFAULT_SAMPLE_SECS: f64 = 2.0;

/// Callback invoked once a calibration attempt ends, successful or not.
pub type AnchorsReady = Box<dyn FnOnce(Option<CalibrationAnchors>) + Send + 'static>;

#[derive(Default)]
struct CalibrationState {
    anchors: HashMap<CalibrationKey, CalibrationAnchors>,
    in_flight: HashSet<CalibrationKey>,
}

struct CalibratorInner {
    runner: Arc<dyn ProcessRunner>,
    ffmpeg: PathBuf,
    format: DeviceFormat,
    sample_secs: f64,
    state: Mutex<CalibrationState>,
}

/// Anchor cache plus the machinery to fill it. Cheap to clone; clones share
/// the cache.
#[derive(Clone)]
pub struct Calibrator {
    inner: Arc<CalibratorInner>,
}

impl std::fmt::Debug for Calibrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Calibrator")
            .field("ffmpeg", &self.inner.ffmpeg)
            .field("sample_secs", &self.inner.sample_secs)
            .field("cached", &state.anchors.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

/// Removes a key from the in-flight set when the measurement ends, even if
/// it unwinds.
struct InFlightGuard {
    inner: Arc<CalibratorInner>,
    key: CalibrationKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.state.lock().in_flight.remove(&self.key);
    }
}

impl Calibrator {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        ffmpeg: impl Into<PathBuf>,
        format: DeviceFormat,
        sample_secs: f64,
    ) -> Self {
        let sample_secs = if sample_secs.is_finite() && sample_secs > 0.0 {
            sample_secs
        } else {
            DEFAULT_SAMPLE_SECS
        };
        Self {
            inner: Arc::new(CalibratorInner {
                runner,
                ffmpeg: ffmpeg.into(),
                format,
                sample_secs,
                state: Mutex::new(CalibrationState::default()),
            }),
        }
    }

    pub fn sample_secs(&self) -> f64 {
        self.inner.sample_secs
    }

    /// Cached anchors for a key, if a measurement has completed.
    pub fn anchors(&self, source: &Path, filter_chain: &str, fps: TargetFps) -> Option<CalibrationAnchors> {
        let key = CalibrationKey::new(source, filter_chain, fps);
        self.inner.state.lock().anchors.get(&key).copied()
    }

    /// Whether a measurement for the key is currently running.
    pub fn is_in_flight(&self, source: &Path, filter_chain: &str, fps: TargetFps) -> bool {
        let key = CalibrationKey::new(source, filter_chain, fps);
        self.inner.state.lock().in_flight.contains(&key)
    }

    /// Start measuring anchors for `source` unless they are cached or
    /// already being measured.
    ///
    /// Returns the background task when one was started. `on_ready` runs
    /// after the attempt ends with the stored anchors, or `None` when a
    /// sample failed. Must be called from within a tokio runtime; otherwise
    /// nothing is measured and `on_ready` receives `None` immediately.
    pub fn ensure_anchors(
        &self,
        source: &Path,
        filter_chain: &str,
        fps: TargetFps,
        on_ready: Option<AnchorsReady>,
    ) -> Option<JoinHandle<Option<CalibrationAnchors>>> {
        let key = CalibrationKey::new(source, filter_chain, fps);
        {
            let mut state = self.inner.state.lock();
            if state.anchors.contains_key(&key) || state.in_flight.contains(&key) {
                return None;
            }
            state.in_flight.insert(key.clone());
        }

        let guard = InFlightGuard {
            inner: Arc::clone(&self.inner),
            key,
        };

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "Calibration requested outside a runtime");
                drop(guard);
                if let Some(on_ready) = on_ready {
                    on_ready(None);
                }
                return None;
            }
        };

        let calibrator = self.clone();
        let source = source.to_path_buf();
        let filter_chain = filter_chain.to_string();
        Some(handle.spawn_blocking(move || {
            let anchors = calibrator.measure(&source, &filter_chain, fps);
            if let Some(anchors) = anchors {
                calibrator
                    .inner
                    .state
                    .lock()
                    .anchors
                    .insert(guard.key.clone(), anchors);
            }
            drop(guard);
            if let Some(on_ready) = on_ready {
                on_ready(anchors);
            }
            anchors
        }))
    }

    /// Sample both quality extremes and build anchors. Blocking.
    fn measure(&self, source: &Path, filter_chain: &str, fps: TargetFps) -> Option<CalibrationAnchors> {
        tracing::debug!(source = %source.display(), %fps, "Calibrating bitrate anchors");
        let best = self.sample_video_bps(source, filter_chain, fps, Quality::BEST);
        let worst = self.sample_video_bps(source, filter_chain, fps, Quality::WORST);
        match (best, worst) {
            (Some(best), Some(worst)) => {
                let anchors = CalibrationAnchors::from_samples(best, worst);
                tracing::info!(
                    source = %source.display(),
                    best_bps = anchors.best_bps,
                    worst_bps = anchors.worst_bps,
                    "Calibration complete"
                );
                Some(anchors)
            }
            _ => {
                tracing::warn!(source = %source.display(), "Calibration sample failed");
                None
            }
        }
    }

    /// Encode a short video-only sample at `quality` and return its bitrate
    /// in bytes per second. The sample file is always removed.
    pub fn sample_video_bps(
        &self,
        source: &Path,
        filter_chain: &str,
        fps: TargetFps,
        quality: Quality,
    ) -> Option<f64> {
        let tmp = match tempfile::Builder::new()
            .prefix("tinytv_cal_")
            .suffix(".avi")
            .tempfile()
        {
            Ok(file) => file.into_temp_path(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create calibration sample file");
                return None;
            }
        };

        let secs = self.inner.sample_secs;
        let args = bitrate_sample_args(&self.inner.format, source, filter_chain, fps, quality, secs, &tmp);
        let sink = |line: &str| tracing::trace!(target: "tinytv::calibrate", "{line}");
        let code = self.inner.runner.run(&self.inner.ffmpeg, &args, &sink);
        if code != 0 {
            tracing::debug!(code, %quality, "Calibration encode failed");
            return None;
        }

        let size = std::fs::metadata(&tmp).ok()?.len();
        (size > 0).then(|| size as f64 / secs)
    }

    /// Estimated output size, using anchors for `(source, filter_chain)` when
    /// they have been measured and the closed-form model otherwise.
    pub fn estimate_bytes(
        &self,
        duration_secs: Option<f64>,
        quality: Quality,
        fps: TargetFps,
        calibration: Option<(&Path, &str)>,
    ) -> Option<u64> {
        let anchors = calibration.and_then(|(source, chain)| self.anchors(source, chain, fps));
        estimate_output_bytes(&self.inner.format, fps, quality, duration_secs, anchors.as_ref())
    }
}
