//! Frame interpolation with RIFE (ncnn/Vulkan build).

use std::path::{Path, PathBuf};

use rf_core::config::InterpolateConfig;
use rf_core::{Error, Result, StageKind};
use tokio_util::sync::CancellationToken;

use super::frames::{
    assemble_frames, count_frames, extract_frames, source_frame_rate, Reassembly, FRAME_PATTERN,
};
use crate::command::ToolCommand;
use crate::tools::{Tool, ToolResolver};
use crate::workspace::WorkingSet;

/// Interpolate `input` to a higher frame rate.
///
/// The output rate is the source rate scaled by the number of frames the
/// interpolator actually produced per input frame (2x for RIFE's default).
pub async fn interpolate(
    input: &Path,
    ws: &WorkingSet,
    tools: &dyn ToolResolver,
    config: &InterpolateConfig,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let ffmpeg = tools.resolve(Tool::Ffmpeg)?;
    let interpolator = tools.resolve(Tool::Interpolator)?;
    let input = std::path::absolute(input)?;

    let source_rate =
        source_frame_rate(tools, &input, &config.fallback_frame_rate, cancel).await?;

    let frames_in = ws.frame_dir("interpolate_in")?;
    let frames_out = ws.frame_dir("interpolate_out")?;

    let extracted = extract_frames(&ffmpeg, &input, frames_in.path(), cancel).await?;
    tracing::info!("Interpolating {extracted} frames at {source_rate} fps");

    let mut cmd = ToolCommand::from_config(&interpolator);
    cmd.arg("-i");
    cmd.path_arg(frames_in.path());
    cmd.arg("-o");
    cmd.path_arg(frames_out.path());
    cmd.args(["-f", FRAME_PATTERN]);
    if let Some(model) = &config.model {
        cmd.args(["-m", model]);
    }
    cmd.cancel_token(cancel.clone());
    cmd.execute().await?;

    drop(frames_in);

    let produced = count_frames(frames_out.path())?;
    if produced == 0 {
        return Err(Error::tool(interpolator.name, "produced no frames"));
    }

    let frame_rate = source_rate
        .scaled(produced as u64, extracted as u64)
        .ok_or_else(|| {
            Error::tool(
                interpolator.name.clone(),
                format!("cannot derive output rate from {extracted} -> {produced} frames"),
            )
        })?;
    tracing::info!("Interpolated {extracted} -> {produced} frames; output rate {frame_rate} fps");

    let output = ws.stage_output(StageKind::Interpolate);
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
