//! Frame extraction and reassembly shared by the upscale and interpolate
//! actions.

use std::path::Path;

use rf_core::{Error, Result};
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::probe::{probe_video, FrameRate};
use crate::tools::{Tool, ToolConfig, ToolResolver};

/// File name pattern for extracted and processed frames.
pub const FRAME_PATTERN: &str = "frame_%08d.png";

/// Encoder settings for turning a frame directory back into a video.
#[derive(Debug, Clone)]
pub struct Reassembly<'a> {
    pub frame_rate: FrameRate,
    /// Video whose audio track is carried over, if it has one.
    pub audio_source: &'a Path,
    pub crf: u32,
    pub preset: &'a str,
}

/// Extract every frame of `input` into `frames_dir` as numbered PNGs.
///
/// Returns the number of frames written; zero frames is an error.
pub async fn extract_frames(
    ffmpeg: &ToolConfig,
    input: &Path,
    frames_dir: &Path,
    cancel: &CancellationToken,
) -> Result<usize> {
    tracing::debug!("extract frames: {:?} -> {:?}", input, frames_dir);

    let mut cmd = ToolCommand::from_config(ffmpeg);
    cmd.args(["-y", "-v", "error", "-i"]);
    cmd.path_arg(input);
    // One image per decoded frame, no duplication or dropping.
    cmd.args(["-fps_mode", "passthrough"]);
    cmd.path_arg(&frames_dir.join(FRAME_PATTERN));
    cmd.cancel_token(cancel.clone());
    cmd.execute().await?;

    let count = count_frames(frames_dir)?;
    if count == 0 {
        return Err(Error::tool(
            ffmpeg.name.clone(),
            format!("no frames extracted from {}", input.display()),
        ));
    }
    Ok(count)
}

/// Number of PNG frames in `dir`.
pub fn count_frames(dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        {
            count += 1;
        }
    }
    Ok(count)
}

/// Encode `frames_dir/frame_%08d.png` into `output` at the given rate.
pub async fn assemble_frames(
    ffmpeg: &ToolConfig,
    frames_dir: &Path,
    settings: &Reassembly<'_>,
    output: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    tracing::debug!(
        "assemble frames: {:?} -> {:?} at {} fps",
        frames_dir,
        output,
        settings.frame_rate
    );

    let mut cmd = ToolCommand::from_config(ffmpeg);
    cmd.args(["-y", "-v", "error"]);
    cmd.args(["-framerate", &settings.frame_rate.to_string()]);
    cmd.arg("-i");
    cmd.path_arg(&frames_dir.join(FRAME_PATTERN));
    cmd.arg("-i");
    cmd.path_arg(settings.audio_source);
    cmd.args(["-map", "0:v:0", "-map", "1:a?"]);
    cmd.args(["-c:v", "libx264"]);
    cmd.args(["-crf", &settings.crf.to_string()]);
    cmd.args(["-preset", settings.preset]);
    cmd.args(["-pix_fmt", "yuv420p"]);
    cmd.args(["-c:a", "copy"]);
    cmd.path_arg(output);
    cmd.cancel_token(cancel.clone());
    cmd.execute().await?;

    Ok(())
}

/// The frame rate of `input`, probed with ffprobe.
///
/// Falls back to `fallback` (with a warning) when ffprobe is unavailable or
/// reports no usable rate. Cancellation is never swallowed.
pub async fn source_frame_rate(
    tools: &dyn ToolResolver,
    input: &Path,
    fallback: &str,
    cancel: &CancellationToken,
) -> Result<FrameRate> {
    let probed = match tools.resolve(Tool::Ffprobe) {
        Ok(ffprobe) => match probe_video(&ffprobe, input, cancel).await {
            Ok(info) => info.frame_rate,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::warn!("Could not probe {}: {e}", input.display());
                None
            }
        },
        Err(e) => {
            tracing::warn!("{e}; cannot detect frame rate");
            None
        }
    };

    match probed {
        Some(rate) => Ok(rate),
        None => {
            let rate: FrameRate = fallback.parse()?;
            tracing::warn!("Using fallback frame rate {rate} for {}", input.display());
            Ok(rate)
        }
    }
}
