//! Check system capabilities.

use framezoom_common::config::AppConfig;
use framezoom_render_engine::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("FrameZoom System Check");
    println!("{}", "=".repeat(50));

    let mut all_ok = true;
    for binary in ["ffmpeg", "ffprobe"] {
        if command_exists(binary) {
            println!("[OK] {binary} found on PATH");
        } else {
            println!("[FAIL] {binary} not found on PATH");
            all_ok = false;
        }
    }

    match config.validate() {
        Ok(()) => println!("[OK] Configuration is valid"),
        Err(e) => {
            println!("[FAIL] {e}");
            all_ok = false;
        }
    }

    match std::fs::create_dir_all(&config.scratch_dir) {
        Ok(()) => println!("[OK] Scratch directory: {}", config.scratch_dir.display()),
        Err(e) => {
            println!(
                "[FAIL] Scratch directory {} is not writable: {e}",
                config.scratch_dir.display()
            );
            all_ok = false;
        }
    }

    println!();
    println!("  Strategy: {}", config.transform.strategy.as_str());
    println!("  Encoder: {} (crf {}, {:?})", config.encoder.video_codec, config.encoder.crf, config.encoder.mode);
    println!("  Bind address: {}", config.server.bind);

    println!();
    if all_ok {
        println!("All required capabilities are available. FrameZoom is ready.");
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}
