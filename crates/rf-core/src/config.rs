//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries all
//! sub-configs for the working directories, external tools, and each stage.
//! Every section defaults sensibly so a completely empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// Locations searched by [`Config::load_or_default`] when no path is given.
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./reelforge.toml",
    "~/.config/reelforge/config.toml",
    "/etc/reelforge/config.toml",
];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub work: WorkConfig,
    pub tools: ToolsConfig,
    pub fetch: FetchConfig,
    pub stabilize: StabilizeConfig,
    pub upscale: UpscaleConfig,
    pub interpolate: InterpolateConfig,
    pub finalize: FinalizeConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        for warning in config.validate() {
            tracing::warn!("{}: {warning}", path.display());
        }
        Ok(config)
    }

    /// Load configuration from `path` if given, otherwise from the first
    /// default location that exists, otherwise fall back to defaults.
    ///
    /// An explicitly given path that cannot be read or parsed is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        for candidate in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(candidate);
            let candidate = Path::new(expanded.as_ref());
            if candidate.exists() {
                tracing::info!("Using config file {}", candidate.display());
                return Self::load(candidate);
            }
        }

        tracing::debug!("No config file found; using defaults");
        Ok(Self::default())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.finalize.voiceover_volume <= 0.0 {
            warnings.push("finalize.voiceover_volume must be positive".into());
        }
        if self.finalize.music_volume < 0.0 {
            warnings.push("finalize.music_volume is negative; it will be treated as 0".into());
        }
        if self.finalize.music_volume >= self.finalize.voiceover_volume {
            warnings.push(
                "finalize.music_volume is not below voiceover_volume; music will be clamped under the voiceover"
                    .into(),
            );
        }

        if !(2..=4).contains(&self.upscale.scale) {
            warnings.push(format!(
                "upscale.scale {} is outside the supported range 2-4",
                self.upscale.scale
            ));
        }

        for (name, crf) in [
            ("stabilize.crf", self.stabilize.crf),
            ("upscale.crf", self.upscale.crf),
            ("interpolate.crf", self.interpolate.crf),
            ("finalize.crf", self.finalize.crf),
        ] {
            if crf > 51 {
                warnings.push(format!("{name} {crf} is above the x264 maximum of 51"));
            }
        }

        if !(1..=10).contains(&self.stabilize.shakiness) {
            warnings.push(format!(
                "stabilize.shakiness {} is outside 1-10",
                self.stabilize.shakiness
            ));
        }
        if !(1..=15).contains(&self.stabilize.accuracy) {
            warnings.push(format!(
                "stabilize.accuracy {} is outside 1-15",
                self.stabilize.accuracy
            ));
        }

        if self.tools.timeout_secs == 0 || self.tools.frame_tool_timeout_secs == 0 {
            warnings.push("tool timeouts of 0 seconds will fail every invocation".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Where jobs keep their intermediates and where finished videos go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkConfig {
    /// Parent of the per-job working directories.
    pub root_dir: PathBuf,
    /// Directory receiving delivered outputs (`<job_id>.mp4`).
    pub output_dir: PathBuf,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            root_dir: std::env::temp_dir().join("reelforge"),
            output_dir: PathBuf::from("./output"),
        }
    }
}

/// Paths and limits for external CLI tools.
///
/// An explicit path wins when it exists; otherwise the tool is looked up in
/// `bundled_dir`, then on `PATH`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub upscaler_path: Option<PathBuf>,
    pub interpolator_path: Option<PathBuf>,
    /// Directory holding packaged tool builds (`<dir>/<tool>/<tool>[.exe]`).
    pub bundled_dir: Option<PathBuf>,
    /// Timeout for ordinary ffmpeg/ffprobe invocations.
    pub timeout_secs: u64,
    /// Timeout for the frame-by-frame upscaler and interpolator.
    pub frame_tool_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            upscaler_path: None,
            interpolator_path: None,
            bundled_dir: Some(PathBuf::from("./bin")),
            timeout_secs: 3600,
            frame_tool_timeout_secs: 6 * 3600,
        }
    }
}

/// Remote asset download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            user_agent: format!("reelforge/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// vid.stab two-pass stabilization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizeConfig {
    /// How shaky the source is (1-10).
    pub shakiness: u8,
    /// Motion detection accuracy (1-15).
    pub accuracy: u8,
    /// Frames used for low-pass filtering the camera path.
    pub smoothing: u32,
    pub crf: u32,
    pub preset: String,
}

impl Default for StabilizeConfig {
    fn default() -> Self {
        Self {
            shakiness: 5,
            accuracy: 15,
            smoothing: 10,
            crf: 18,
            preset: "medium".into(),
        }
    }
}

/// Super-resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpscaleConfig {
    pub scale: u32,
    pub model: String,
    pub crf: u32,
    pub preset: String,
    /// Used only when the source frame rate cannot be probed.
    pub fallback_frame_rate: String,
}

impl Default for UpscaleConfig {
    fn default() -> Self {
        Self {
            scale: 2,
            model: "realesr-animevideov3".into(),
            crf: 18,
            preset: "medium".into(),
            fallback_frame_rate: "30".into(),
        }
    }
}

/// Frame interpolation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolateConfig {
    /// Model directory passed to the interpolator (`-m`); tool default if unset.
    pub model: Option<String>,
    pub crf: u32,
    pub preset: String,
    /// Used only when the source frame rate cannot be probed.
    pub fallback_frame_rate: String,
}

impl Default for InterpolateConfig {
    fn default() -> Self {
        Self {
            model: None,
            crf: 18,
            preset: "medium".into(),
            fallback_frame_rate: "30".into(),
        }
    }
}

/// Audio mix and subtitle burn-in settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizeConfig {
    pub voiceover_volume: f32,
    /// Background music weight when mixed under a voiceover.
    pub music_volume: f32,
    pub crf: u32,
    pub preset: String,
    pub audio_bitrate: String,
    pub style: BurnInStyle,
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            voiceover_volume: 1.0,
            music_volume: 0.2,
            crf: 20,
            preset: "medium".into(),
            audio_bitrate: "192k".into(),
            style: BurnInStyle::default(),
        }
    }
}

/// Visual style for burned-in subtitles (ASS `force_style` fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnInStyle {
    pub font_name: String,
    pub font_size: u32,
    /// ASS colour, `&HAABBGGRR`.
    pub primary_colour: String,
    pub outline_colour: String,
    pub outline: f32,
    pub shadow: f32,
    pub bold: bool,
    /// Distance from the bottom edge in pixels.
    pub margin_v: u32,
}

impl Default for BurnInStyle {
    fn default() -> Self {
        Self {
            font_name: "Arial".into(),
            font_size: 24,
            primary_colour: "&H00FFFFFF".into(),
            outline_colour: "&H00000000".into(),
            outline: 2.0,
            shadow: 0.0,
            bold: false,
            margin_v: 30,
        }
    }
}
