pub mod check;
pub mod combine;
pub mod config;
pub mod convert;
pub mod estimate;
pub mod probe;
pub mod thumbnail;

use std::path::PathBuf;

use tinytv_common::config::AppConfig;
use tinytv_encode_engine::{JobEvent, JobOutcome, JobReport};
use tinytv_media_model::{is_video_file, Quality, ScaleMode, TargetFps};

/// Encode settings after applying CLI overrides on top of the config.
pub struct EncodeChoices {
    pub fps: TargetFps,
    pub quality: Quality,
    pub scale_mode: ScaleMode,
}

pub fn encode_choices(
    config: &AppConfig,
    fps: Option<u32>,
    quality: Option<u8>,
    scale: Option<&str>,
) -> anyhow::Result<EncodeChoices> {
    let fps = TargetFps::try_from(fps.unwrap_or(config.device.fps))?;
    let quality = Quality::new(quality.unwrap_or(config.device.quality));
    let scale_mode = scale
        .unwrap_or(config.device.scale_mode.as_str())
        .parse::<ScaleMode>()?;
    Ok(EncodeChoices {
        fps,
        quality,
        scale_mode,
    })
}

/// Drop inputs that are not videos, warning about each one.
pub fn video_inputs(files: Vec<PathBuf>) -> Vec<PathBuf> {
    files
        .into_iter()
        .filter(|path| {
            let keep = is_video_file(path);
            if !keep {
                tracing::warn!(path = %path.display(), "Skipping non-video input");
            }
            keep
        })
        .collect()
}

pub fn print_event(event: JobEvent) {
    match event {
        JobEvent::Log(line) => println!("{line}"),
        JobEvent::Progress(p) => println!("  Progress: {}/{}", p.current, p.total),
        JobEvent::Finished(report) => println!("  Finished in {:.1}s", report.elapsed_secs()),
    }
}

/// Turn a failed job into an error exit.
pub fn into_result(report: JobReport) -> anyhow::Result<()> {
    match report.outcome {
        JobOutcome::Succeeded { outputs } => {
            for output in outputs {
                println!("  -> {}", output.display());
            }
            Ok(())
        }
        JobOutcome::Failed { item, reason } => {
            Err(anyhow::anyhow!("{:?} job failed at {item}: {reason}", report.kind))
        }
    }
}
