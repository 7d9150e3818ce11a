//! Final mux: audio replacement or mix, and subtitle burn-in.

use std::path::{Path, PathBuf};

use rf_core::config::FinalizeConfig;
use rf_core::{Result, StageKind, TimedSegment};
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::subtitles::{burn_in_filter, to_srt};
use crate::tools::{Tool, ToolResolver};
use crate::workspace::WorkingSet;

/// Music weight relative to the voiceover when the configured one would
/// drown it out (voiceover:music = 5:1).
const FALLBACK_MUSIC_RATIO: f32 = 0.2;

/// Everything finalize muxes together.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeInputs<'a> {
    pub video: &'a Path,
    pub voiceover: Option<&'a Path>,
    pub music: Option<&'a Path>,
    /// Subtitles and overlays to burn in; may be empty.
    pub captions: &'a [TimedSegment],
}

/// How the output's audio track is produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioMix {
    /// The video's own audio, copied.
    Original,
    /// The voiceover replaces the video's audio.
    Voiceover,
    /// The music replaces the video's audio.
    Music,
    /// Voiceover over attenuated music, as long as the longer of the two.
    Blend {
        voiceover_weight: f32,
        music_weight: f32,
    },
}

impl AudioMix {
    pub fn choose(has_voiceover: bool, has_music: bool, config: &FinalizeConfig) -> Self {
        match (has_voiceover, has_music) {
            (false, false) => Self::Original,
            (true, false) => Self::Voiceover,
            (false, true) => Self::Music,
            (true, true) => Self::blend(config.voiceover_volume, config.music_volume),
        }
    }

    /// A blend whose music weight is strictly below the voiceover weight.
    pub fn blend(voiceover_weight: f32, music_weight: f32) -> Self {
        let voiceover_weight = if voiceover_weight.is_finite() && voiceover_weight > 0.0 {
            voiceover_weight
        } else {
            tracing::warn!("Invalid voiceover weight {voiceover_weight}; using 1.0");
            1.0
        };

        let music_weight = if !music_weight.is_finite() || music_weight < 0.0 {
            tracing::warn!("Invalid music weight {music_weight}; using 0");
            0.0
        } else if music_weight >= voiceover_weight {
            let clamped = voiceover_weight * FALLBACK_MUSIC_RATIO;
            tracing::warn!(
                "Music weight {music_weight} would cover the voiceover ({voiceover_weight}); using {clamped}"
            );
            clamped
        } else {
            music_weight
        };

        Self::Blend {
            voiceover_weight,
            music_weight,
        }
    }
}

/// Produce the deliverable from the current working output.
///
/// Captions, if any, are written once to `captions_<n>.srt` in the job
/// directory and removed afterwards. A failed run leaves no partial output.
pub async fn finalize(
    inputs: &FinalizeInputs<'_>,
    ws: &WorkingSet,
    tools: &dyn ToolResolver,
    config: &FinalizeConfig,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let ffmpeg = tools.resolve(Tool::Ffmpeg)?;

    let video = std::path::absolute(inputs.video)?;
    let voiceover = inputs.voiceover.map(std::path::absolute).transpose()?;
    let music = inputs.music.map(std::path::absolute).transpose()?;
    let resolved = FinalizeInputs {
        video: &video,
        voiceover: voiceover.as_deref(),
        music: music.as_deref(),
        captions: inputs.captions,
    };

    let mix = AudioMix::choose(voiceover.is_some(), music.is_some(), config);

    let captions_file = if inputs.captions.is_empty() {
        None
    } else {
        let path = ws.file("captions", "srt");
        tokio::fs::write(&path, to_srt(inputs.captions)).await?;
        Some(path)
    };
    let captions_name = captions_file
        .as_deref()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned());

    let output = ws.stage_output(StageKind::Finalize);
    tracing::info!(
        "finalize: {:?} -> {:?} (audio={mix:?}, captions={})",
        video,
        output,
        inputs.captions.len()
    );

    let mut cmd = ToolCommand::from_config(&ffmpeg);
    cmd.args(finalize_args(&resolved, mix, captions_name.as_deref(), config, &output));
    cmd.current_dir(ws.dir());
    cmd.cancel_token(cancel.clone());
    let result = cmd.execute().await;

    if let Some(path) = &captions_file {
        ws.release(path);
    }
    if let Err(e) = result {
        ws.release(&output);
        return Err(e);
    }
    Ok(output)
}

/// The ffmpeg arguments for one finalize run.
///
/// `captions_file` is resolved against ffmpeg's working directory.
pub fn finalize_args(
    inputs: &FinalizeInputs<'_>,
    mix: AudioMix,
    captions_file: Option<&str>,
    config: &FinalizeConfig,
    output: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-v", "error"].map(String::from).to_vec();

    let mut input = |path: &Path| {
        args.push("-i".into());
        args.push(path.to_string_lossy().into_owned());
    };
    input(inputs.video);
    let voiceover_idx = inputs.voiceover.map(|p| {
        input(p);
        1
    });
    let music_idx = inputs.music.map(|p| {
        input(p);
        1 + usize::from(voiceover_idx.is_some())
    });

    let mut graph = Vec::new();
    if let Some(file) = captions_file {
        graph.push(format!("[0:v]{}[vout]", burn_in_filter(file, &config.style)));
    }
    if let (
        AudioMix::Blend {
            voiceover_weight,
            music_weight,
        },
        Some(vo),
        Some(mu),
    ) = (mix, voiceover_idx, music_idx)
    {
        graph.push(format!(
            "[{vo}:a]volume={voiceover_weight}[vo];[{mu}:a]volume={music_weight}[bg];\
             [vo][bg]amix=inputs=2:duration=longest:dropout_transition=0[aout]"
        ));
    }
    if !graph.is_empty() {
        args.push("-filter_complex".into());
        args.push(graph.join(";"));
    }

    // Video
    if captions_file.is_some() {
        args.extend(["-map", "[vout]", "-c:v", "libx264"].map(String::from));
        args.extend(["-crf".into(), config.crf.to_string()]);
        args.extend(["-preset".into(), config.preset.clone()]);
        args.extend(["-pix_fmt", "yuv420p"].map(String::from));
    } else {
        args.extend(["-map", "0:v:0", "-c:v", "copy"].map(String::from));
    }

    // Audio
    let aac = |args: &mut Vec<String>| {
        args.extend(["-c:a".into(), "aac".into(), "-b:a".into(), config.audio_bitrate.clone()]);
    };
    match (mix, voiceover_idx, music_idx) {
        (AudioMix::Voiceover, Some(vo), _) => {
            args.extend(["-map".into(), format!("{vo}:a:0")]);
            aac(&mut args);
        }
        (AudioMix::Music, _, Some(mu)) => {
            args.extend(["-map".into(), format!("{mu}:a:0")]);
            aac(&mut args);
            args.push("-shortest".into());
        }
        (AudioMix::Blend { .. }, Some(_), Some(_)) => {
            args.extend(["-map", "[aout]"].map(String::from));
            aac(&mut args);
        }
        _ => {
            args.extend(["-map", "0:a?", "-c:a", "copy"].map(String::from));
        }
    }

    args.extend(["-movflags", "+faststart"].map(String::from));
    args.push(output.to_string_lossy().into_owned());
    args
}
