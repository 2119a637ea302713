//! Convert files one by one.

use std::path::PathBuf;

use tinytv_common::config::AppConfig;
use tinytv_encode_engine::{ConvertRequest, Engine};

use super::{encode_choices, into_result, print_event, video_inputs};

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: &AppConfig,
    files: Vec<PathBuf>,
    output: PathBuf,
    quality: Option<u8>,
    scale: Option<String>,
    fps: Option<u32>,
    normalize_audio: bool,
    channel: String,
) -> anyhow::Result<()> {
    let choices = encode_choices(config, fps, quality, scale.as_deref())?;
    let files = video_inputs(files);

    println!("Converting {} file(s)", files.len());
    println!("  Output: {}", output.display());
    println!(
        "  Settings: {} fps, quality {}, {}",
        choices.fps, choices.quality, choices.scale_mode
    );

    let engine = Engine::from_config(config);
    let handle = engine.start_convert(ConvertRequest {
        files,
        output_dir: Some(output),
        fps: choices.fps,
        quality: choices.quality,
        scale_mode: choices.scale_mode,
        normalize_audio: normalize_audio || config.device.normalize_audio,
        channel,
    })?;

    let report = handle.finish(print_event).await?;
    into_result(report)
}
