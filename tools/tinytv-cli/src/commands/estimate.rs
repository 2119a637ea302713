//! Estimate converted output size.

use std::path::PathBuf;

use tinytv_common::config::AppConfig;
use tinytv_common::{fmt_bytes, fmt_hms};
use tinytv_encode_engine::command::scale_filter;
use tinytv_encode_engine::Engine;
use tinytv_media_model::{Quality, SourceFile, FAT32_MAX_FILE_BYTES};

use super::encode_choices;

/// Qualities shown in the calibrated sweep.
const SWEEP: [u8; 6] = [2, 5, 10, 15, 23, 31];

pub async fn run(
    config: &AppConfig,
    file: PathBuf,
    quality: Option<u8>,
    scale: Option<String>,
    fps: Option<u32>,
    calibrate: bool,
) -> anyhow::Result<()> {
    let choices = encode_choices(config, fps, quality, scale.as_deref())?;
    let engine = Engine::from_config(config);
    let source = SourceFile::new(&file);
    let duration = engine.source_duration(&source);

    println!("File: {}", source.display_name());
    println!("  Duration: {}", fmt_hms(duration));
    println!("  Source size: {}", fmt_bytes(source.size_bytes()));

    let chain = scale_filter(engine.format(), choices.scale_mode);
    let calibrator = engine.calibrator();
    let estimate = calibrator.estimate_bytes(duration, choices.quality, choices.fps, None);
    println!(
        "  Estimated @ q={} {} fps: {}",
        choices.quality,
        choices.fps,
        fmt_bytes(estimate)
    );
    if estimate.is_some_and(|bytes| bytes > FAT32_MAX_FILE_BYTES) {
        println!("  [warn] Larger than a FAT32 volume can hold");
    }

    if !calibrate {
        return Ok(());
    }

    println!(
        "Calibrating ({}s samples at q={} and q={})...",
        calibrator.sample_secs(),
        Quality::BEST,
        Quality::WORST
    );
    let anchors = match calibrator.ensure_anchors(source.path(), &chain, choices.fps, None) {
        Some(task) => task.await?,
        None => calibrator.anchors(source.path(), &chain, choices.fps),
    };
    if anchors.is_none() {
        anyhow::bail!("Calibration failed for {}", source.display_name());
    }

    println!("  Quality   Estimated size");
    for q in SWEEP.into_iter().map(Quality::new) {
        let bytes = calibrator.estimate_bytes(duration, q, choices.fps, Some((source.path(), chain.as_str())));
        println!("  {:>7}   {}", q.value(), fmt_bytes(bytes));
    }
    Ok(())
}
