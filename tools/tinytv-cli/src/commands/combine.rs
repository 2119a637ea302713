//! Combine files into one output.

use std::path::PathBuf;

use tinytv_common::config::AppConfig;
use tinytv_encode_engine::{CombineRequest, Engine};

use super::{encode_choices, into_result, print_event, video_inputs};

pub async fn run(
    config: &AppConfig,
    files: Vec<PathBuf>,
    output: Option<PathBuf>,
    name: Option<String>,
    fps: Option<u32>,
    quality: Option<u8>,
    channel: String,
) -> anyhow::Result<()> {
    let choices = encode_choices(config, fps, quality, None)?;
    let files = video_inputs(files);

    println!("Combining {} file(s) @ {} fps", files.len(), choices.fps);

    let engine = Engine::from_config(config);
    let handle = engine.start_combine(CombineRequest {
        files,
        output_dir: output,
        output_name: name,
        fps: choices.fps,
        quality: choices.quality,
        channel,
    })?;

    let report = handle.finish(print_event).await?;
    into_result(report)
}
