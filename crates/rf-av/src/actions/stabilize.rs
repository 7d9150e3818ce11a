//! Two-pass stabilization with ffmpeg's vid.stab filters.

use std::path::{Path, PathBuf};

use rf_core::config::StabilizeConfig;
use rf_core::{Result, StageKind};
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::tools::{Tool, ToolResolver};
use crate::workspace::WorkingSet;

/// Stabilize `input` into a new intermediate in the working set.
///
/// Pass 1 (`vidstabdetect`) writes camera motion to a transform file; pass 2
/// (`vidstabtransform`) re-encodes with the smoothed motion at constant
/// quality. The transform file is removed after pass 2 whatever the outcome,
/// and pass 2 never runs if pass 1 failed.
pub async fn stabilize(
    input: &Path,
    ws: &WorkingSet,
    tools: &dyn ToolResolver,
    config: &StabilizeConfig,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let ffmpeg = tools.resolve(Tool::Ffmpeg)?;
    let input = std::path::absolute(input)?;

    let transform = ws.transform_file()?;
    // Referenced relative to the job directory: filter option values
    // cannot carry drive letters or unescaped separators.
    let transform_name = transform
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| rf_core::Error::Internal("transform file has no name".into()))?;

    tracing::info!("stabilize pass 1 (detect): {:?}", input);

    let mut detect = ToolCommand::from_config(&ffmpeg);
    detect.args(["-y", "-v", "error", "-i"]);
    detect.path_arg(&input);
    detect.arg("-vf");
    detect.arg(format!(
        "vidstabdetect=shakiness={}:accuracy={}:result={transform_name}",
        config.shakiness, config.accuracy
    ));
    detect.args(["-f", "null", "-"]);
    detect.current_dir(ws.dir());
    detect.cancel_token(cancel.clone());
    detect.execute().await?;

    let output = ws.stage_output(StageKind::Stabilize);
    tracing::info!("stabilize pass 2 (transform): {:?} -> {:?}", input, output);

    let mut apply = ToolCommand::from_config(&ffmpeg);
    apply.args(["-y", "-v", "error", "-i"]);
    apply.path_arg(&input);
    apply.arg("-vf");
    apply.arg(format!(
        "vidstabtransform=input={transform_name}:smoothing={}:zoom=0,unsharp=5:5:0.8:3:3:0.4",
        config.smoothing
    ));
    apply.args(["-map", "0:v:0", "-map", "0:a?"]);
    apply.args(["-c:v", "libx264"]);
    apply.args(["-crf", &config.crf.to_string()]);
    apply.args(["-preset", &config.preset]);
    apply.args(["-pix_fmt", "yuv420p"]);
    apply.args(["-c:a", "copy"]);
    apply.path_arg(&output);
    apply.current_dir(ws.dir());
    apply.cancel_token(cancel.clone());
    let result = apply.execute().await;

    drop(transform);

    if let Err(e) = result {
        ws.release(&output);
        return Err(e);
    }
    Ok(output)
}
