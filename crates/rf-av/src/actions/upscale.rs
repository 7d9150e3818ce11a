//! AI super-resolution with Real-ESRGAN (ncnn/Vulkan build).

use std::path::{Path, PathBuf};

use rf_core::config::UpscaleConfig;
use rf_core::{Error, Result, StageKind};
use tokio_util::sync::CancellationToken;

use super::frames::{assemble_frames, count_frames, extract_frames, source_frame_rate, Reassembly};
use crate::command::ToolCommand;
use crate::tools::{Tool, ToolResolver};
use crate::workspace::WorkingSet;

/// Upscale every frame of `input` and reassemble at the source frame rate.
///
/// Both frame directories are removed before returning, on success or
/// failure.
pub async fn upscale(
    input: &Path,
    ws: &WorkingSet,
    tools: &dyn ToolResolver,
    config: &UpscaleConfig,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let ffmpeg = tools.resolve(Tool::Ffmpeg)?;
    let upscaler = tools.resolve(Tool::Upscaler)?;
    let input = std::path::absolute(input)?;

    let frame_rate = source_frame_rate(tools, &input, &config.fallback_frame_rate, cancel).await?;

    let frames_in = ws.frame_dir("upscale_in")?;
    let frames_out = ws.frame_dir("upscale_out")?;

    let extracted = extract_frames(&ffmpeg, &input, frames_in.path(), cancel).await?;
    tracing::info!(
        "Upscaling {extracted} frames x{} with model {}",
        config.scale,
        config.model
    );

    let mut cmd = ToolCommand::from_config(&upscaler);
    cmd.arg("-i");
    cmd.path_arg(frames_in.path());
    cmd.arg("-o");
    cmd.path_arg(frames_out.path());
    cmd.args(["-s", &config.scale.to_string()]);
    cmd.args(["-n", &config.model]);
    cmd.args(["-f", "png"]);
    cmd.cancel_token(cancel.clone());
    cmd.execute().await?;

    drop(frames_in);

    let produced = count_frames(frames_out.path())?;
    if produced == 0 {
        return Err(Error::tool(upscaler.name, "produced no frames"));
    }
    if produced != extracted {
        tracing::warn!("{} wrote {produced} frames for {extracted} inputs", upscaler.name);
    }

    let output = ws.stage_output(StageKind::Upscale);
    let settings = Reassembly {
        frame_rate,
        audio_source: &input,
        crf: config.crf,
        preset: &config.preset,
    };
    if let Err(e) = assemble_frames(&ffmpeg, frames_out.path(), &settings, &output, cancel).await {
        ws.release(&output);
        return Err(e);
    }

    Ok(output)
}
