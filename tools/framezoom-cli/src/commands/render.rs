//! Apply zoom keyframes to a video file.

use std::path::PathBuf;

use framezoom_common::config::{AppConfig, EncodeMode, TransformStrategy};
use framezoom_render_engine::ZoomJob;

pub async fn run(
    mut config: AppConfig,
    input: PathBuf,
    keyframes: PathBuf,
    output: PathBuf,
    strategy: Option<String>,
    encode: Option<String>,
) -> anyhow::Result<()> {
    if let Some(strategy) = strategy {
        config.transform.strategy = strategy.parse::<TransformStrategy>()?;
    }
    if let Some(encode) = encode {
        config.encoder.mode = encode.parse::<EncodeMode>()?;
    }
    config.validate()?;

    let payload = std::fs::read_to_string(&keyframes).map_err(|e| {
        anyhow::anyhow!("Failed to read keyframes {}: {e}", keyframes.display())
    })?;
    let job = ZoomJob::from_json(&payload, config)?;

    println!("Rendering: {}", input.display());
    println!("  Keyframes: {}", job.keyframes().len());
    println!("  Strategy: {}", job.config().transform.strategy.as_str());
    println!("  Output: {}", output.display());

    let cancel = job.cancellation();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling render");
            cancel.cancel();
        }
    });

    let report = tokio::task::spawn_blocking(move || job.run(&input, &output)).await?;
    ctrl_c.abort();

    match report {
        Ok(report) => {
            println!(
                "\nRender complete: {} ({} frames, {} zoomed, {:.1}s)",
                report.output.display(),
                report.frames_processed,
                report.frames_zoomed,
                report.elapsed_secs
            );
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Render failed: {e}")),
    }
}
