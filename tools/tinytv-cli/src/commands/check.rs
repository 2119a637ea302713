//! Check toolchain availability.

use tinytv_common::config::AppConfig;
use tinytv_encode_engine::Toolchain;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("TinyTV System Check");
    println!("{}", "=".repeat(50));

    let toolchain = Toolchain::from_config(&config.tools);
    let statuses = toolchain.check();
    for status in &statuses {
        match &status.resolved {
            Some(path) => println!("[OK] {}: {}", status.name, path.display()),
            None => println!(
                "[MISSING] {}: {} not found",
                status.name,
                status.configured.display()
            ),
        }
    }

    println!();
    if statuses.iter().all(|s| s.resolved.is_some()) {
        println!("All tools are available. TinyTV is ready.");
    } else {
        println!("Install ffmpeg or set tools.ffmpeg in the config file.");
    }
    Ok(())
}
