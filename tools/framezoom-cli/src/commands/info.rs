//! Show video stream information.

use std::path::PathBuf;

use framezoom_render_engine::probe_video;

pub fn run(path: PathBuf, json: bool) -> anyhow::Result<()> {
    let info = probe_video(&path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Video: {}", info.path.display());
    println!("  Resolution: {}x{}", info.width, info.height);
    println!(
        "  Frame rate: {:.3} fps ({}/{})",
        info.fps(),
        info.fps_num,
        info.fps_den
    );
    if let Some(codec) = &info.codec {
        println!("  Codec: {codec}");
    }
    match info.duration_secs {
        Some(d) => println!("  Duration: {d:.2}s"),
        None => println!("  Duration: unknown"),
    }
    if let Some(frames) = info.frame_count {
        println!("  Frames: {frames}");
    }
    println!("  Audio: {}", if info.has_audio { "yes (dropped on render)" } else { "no" });

    Ok(())
}
