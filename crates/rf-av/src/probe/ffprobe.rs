//! FFprobe-based video probing.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format -show_streams`
//! and maps the JSON output into [`VideoInfo`].

use std::path::Path;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{FrameRate, VideoInfo};
use crate::command::ToolCommand;
use crate::tools::ToolConfig;

/// Probe the first video stream of `path`.
///
/// # Errors
///
/// Tool errors from ffprobe, [`rf_core::Error::Probe`] if the output cannot
/// be parsed or has no video stream.
pub async fn probe_video(
    ffprobe: &ToolConfig,
    path: &Path,
    cancel: &CancellationToken,
) -> rf_core::Result<VideoInfo> {
    let mut cmd = ToolCommand::from_config(ffprobe);
    cmd.args([
        "-v", "quiet",
        "-print_format", "json",
        "-show_format",
        "-show_streams",
    ]);
    cmd.path_arg(path);
    cmd.cancel_token(cancel.clone());

    let output = cmd.execute().await?;
    let ff: FfprobeOutput = serde_json::from_str(&output.stdout)
        .map_err(|e| rf_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    parse_ffprobe_output(path, ff)
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_ffprobe_output(path: &Path, output: FfprobeOutput) -> rf_core::Result<VideoInfo> {
    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            rf_core::Error::Probe(format!("no video stream in {}", path.display()))
        })?;

    // Frames are re-timed at this rate, so the average (frames / duration)
    // keeps the clip's length even for variable frame rate sources. Some
    // muxers leave it at 0/0; `r_frame_rate` is the fallback.
    let avg = video.avg_frame_rate.as_deref().and_then(|s| s.parse::<FrameRate>().ok());
    let base = video.r_frame_rate.as_deref().and_then(|s| s.parse::<FrameRate>().ok());
    if let (Some(avg), Some(base)) = (avg, base) {
        if avg != base {
            tracing::warn!(
                "{}: variable frame rate (r_frame_rate {base}, avg_frame_rate {avg}); using {avg}",
                path.display()
            );
        }
    }
    let frame_rate = avg.or(base);

    let has_audio = output
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let duration = output
        .format
        .and_then(|f| f.duration)
        .and_then(|s| s.parse::<f64>().ok());

    Ok(VideoInfo {
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        frame_rate,
        duration,
        has_audio,
    })
}
