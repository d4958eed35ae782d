//! Validate a keyframe file.

use std::path::PathBuf;

use framezoom_keyframe_model::keyframe::{
    parse_keyframes, validate_keyframe_geometry, validate_keyframes,
};
use framezoom_processing_core::resolver::KeyframeResolver;

pub fn run(path: PathBuf, frame_size: Option<(u32, u32)>) -> anyhow::Result<()> {
    println!("Validating keyframes at: {}", path.display());

    let payload = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    let keyframes = parse_keyframes(&payload)?;
    validate_keyframes(&keyframes)?;
    if let Some((width, height)) = frame_size {
        validate_keyframe_geometry(&keyframes, width, height)?;
    }

    println!("  Keyframes: {}", keyframes.len());
    for (i, kf) in keyframes.iter().enumerate() {
        println!(
            "  [{i}] {:.2}s-{:.2}s zoom {:.2}->{:.2} at ({:.1}, {:.1})",
            kf.start_time, kf.end_time, kf.start_zoom, kf.end_zoom, kf.x, kf.y
        );
    }

    let resolver = KeyframeResolver::new(keyframes)?;
    let overlaps = resolver.overlapping_pairs();
    if overlaps.is_empty() {
        println!("\nKeyframes are valid.");
    } else {
        println!("\nOverlapping windows (the earlier keyframe wins):");
        for (a, b) in &overlaps {
            println!("  - [{a}] and [{b}]");
        }
        println!("\nKeyframes are valid, with {} overlap(s).", overlaps.len());
    }
    if let Some(end) = resolver.last_end_time() {
        println!("Last zoom ends at {end:.2}s.");
    }

    Ok(())
}
