//! Extract a preview frame.

use std::path::PathBuf;

use anyhow::Context;
use tinytv_common::config::AppConfig;
use tinytv_encode_engine::{Engine, StillFormat};

use super::encode_choices;

pub fn run(
    config: &AppConfig,
    file: PathBuf,
    output: Option<PathBuf>,
    scale: Option<String>,
    quality: Option<u8>,
    png: bool,
) -> anyhow::Result<()> {
    let choices = encode_choices(config, None, quality, scale.as_deref())?;
    let still = if png { StillFormat::Png } else { StillFormat::Jpeg };
    let engine = Engine::from_config(config);

    let extracted = engine
        .thumbnail(&file, choices.scale_mode, choices.quality, still)
        .with_context(|| format!("Could not extract a frame from {}", file.display()))?;

    let path = match output {
        Some(dest) => {
            std::fs::copy(&extracted, &dest)
                .with_context(|| format!("Failed to write {}", dest.display()))?;
            std::fs::remove_file(&extracted).ok();
            dest
        }
        None => extracted,
    };
    println!("Thumbnail: {}", path.display());
    Ok(())
}
