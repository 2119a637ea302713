//! Inspect a file with the prober.

use std::path::PathBuf;

use tinytv_common::config::AppConfig;
use tinytv_common::fmt_hms;
use tinytv_encode_engine::{check_conformance, Engine};
use tinytv_media_model::TargetFps;

pub fn run(config: &AppConfig, file: PathBuf, fps: Option<u32>, json: bool) -> anyhow::Result<()> {
    let fps = TargetFps::try_from(fps.unwrap_or(config.device.fps))?;
    let engine = Engine::from_config(config);
    let report = engine.prober().report(&file);
    let conformance = check_conformance(&report, engine.format(), fps);

    if json {
        let value = serde_json::json!({
            "file": file,
            "report": report,
            "conformance": conformance,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    match &report.video {
        Some(v) => {
            println!(
                "  Video: {} (tag {})",
                v.codec_name.as_deref().unwrap_or("?"),
                v.codec_tag_string.as_deref().unwrap_or("?")
            );
            println!(
                "    r_frame_rate={} avg_frame_rate={}",
                v.r_frame_rate.as_deref().unwrap_or("?"),
                v.avg_frame_rate.as_deref().unwrap_or("?")
            );
            if let Some(frames) = v.nb_frames {
                println!("    frames={frames}");
            }
        }
        None => println!("  Video: none"),
    }
    match &report.audio {
        Some(a) => println!(
            "  Audio: {} {}Hz ch{}",
            a.codec_name.as_deref().unwrap_or("?"),
            a.sample_rate.map(|r| r.to_string()).unwrap_or_else(|| "?".to_string()),
            a.channels.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string())
        ),
        None => println!("  Audio: none"),
    }
    println!("  Duration: {}", fmt_hms(report.video_duration()));

    println!();
    if conformance.is_conforming() {
        println!("[OK] Matches the device format at {fps} fps");
    } else {
        println!("[WARN] Does not match the device format at {fps} fps:");
        for issue in &conformance.issues {
            println!("     - {issue}");
        }
    }
    Ok(())
}
