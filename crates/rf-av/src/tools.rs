//! External tool resolution and management.
//!
//! Every [`Tool`] has a *preferred* location (an explicit path from the
//! config, else the packaged build under `bundled_dir`) and a *fallback*
//! (the bare binary name looked up on `PATH`). Resolution happens at call
//! time, so a tool installed while the service runs is picked up.
//!
//! The [`ToolResolver`] trait is the seam the pipeline depends on; the
//! [`ToolRegistry`] is the real implementation and tests substitute their
//! own.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rf_core::config::ToolsConfig;
use serde::{Deserialize, Serialize};

/// The external binaries the pipeline drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
    /// Real-ESRGAN super-resolution (ncnn/Vulkan build).
    Upscaler,
    /// RIFE frame interpolation (ncnn/Vulkan build).
    Interpolator,
}

impl Tool {
    /// All tools, in the order they are reported.
    pub const ALL: [Tool; 4] = [Tool::Ffmpeg, Tool::Ffprobe, Tool::Upscaler, Tool::Interpolator];

    /// Executable name used for the `PATH` fallback and the packaged layout.
    pub fn binary_name(&self) -> &'static str {
        match self {
            Self::Ffmpeg => "ffmpeg",
            Self::Ffprobe => "ffprobe",
            Self::Upscaler => "realesrgan-ncnn-vulkan",
            Self::Interpolator => "rife-ncnn-vulkan",
        }
    }

    /// Argument that prints a version line, if the tool has one.
    fn version_arg(&self) -> Option<&'static str> {
        match self {
            Self::Ffmpeg | Self::Ffprobe => Some("-version"),
            // The ncnn tools print usage and exit non-zero for unknown flags.
            Self::Upscaler | Self::Interpolator => None,
        }
    }

    /// Whether this tool runs over whole frame directories (long-running).
    pub fn is_frame_tool(&self) -> bool {
        matches!(self, Self::Upscaler | Self::Interpolator)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// A resolved tool, ready to be handed to [`ToolCommand::from_config`](crate::ToolCommand::from_config).
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Human-readable tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
    /// Maximum execution time before the tool is killed.
    pub timeout: Duration,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Locates external tools.
pub trait ToolResolver: Send + Sync {
    /// Resolve `tool` to an executable, or fail with
    /// [`rf_core::Error::ToolNotFound`] without spawning anything.
    fn resolve(&self, tool: Tool) -> rf_core::Result<ToolConfig>;
}

/// Resolver backed by the `[tools]` config section and `PATH`.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    config: ToolsConfig,
}

impl ToolRegistry {
    /// Create a registry from the tools configuration.
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        Self {
            config: tools_config.clone(),
        }
    }

    /// The preferred location of `tool`: the configured override, else the
    /// packaged build. The path may not exist.
    pub fn preferred_path(&self, tool: Tool) -> Option<PathBuf> {
        let configured = match tool {
            Tool::Ffmpeg => self.config.ffmpeg_path.as_ref(),
            Tool::Ffprobe => self.config.ffprobe_path.as_ref(),
            Tool::Upscaler => self.config.upscaler_path.as_ref(),
            Tool::Interpolator => self.config.interpolator_path.as_ref(),
        };

        configured.cloned().or_else(|| {
            self.config
                .bundled_dir
                .as_deref()
                .map(|dir| packaged_path(dir, tool))
        })
    }

    fn timeout(&self, tool: Tool) -> Duration {
        if tool.is_frame_tool() {
            Duration::from_secs(self.config.frame_tool_timeout_secs)
        } else {
            Duration::from_secs(self.config.timeout_secs)
        }
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        Tool::ALL
            .iter()
            .map(|&tool| match self.resolve(tool) {
                Ok(cfg) => ToolInfo {
                    name: tool.binary_name().to_string(),
                    available: true,
                    version: tool
                        .version_arg()
                        .and_then(|arg| detect_version(&cfg.path, arg)),
                    path: Some(cfg.path),
                },
                Err(_) => ToolInfo {
                    name: tool.binary_name().to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

impl ToolResolver for ToolRegistry {
    fn resolve(&self, tool: Tool) -> rf_core::Result<ToolConfig> {
        let name = tool.binary_name();

        let path = match self.preferred_path(tool) {
            Some(preferred) if preferred.is_file() => preferred,
            preferred => {
                if let Some(p) = preferred {
                    tracing::debug!(
                        "{name} not found at {}; falling back to PATH",
                        p.display()
                    );
                }
                which::which(name).map_err(|_| rf_core::Error::tool_not_found(name))?
            }
        };

        Ok(ToolConfig {
            name: name.to_string(),
            path,
            timeout: self.timeout(tool),
        })
    }
}

/// `<dir>/<name>/<name>[.exe]`, the layout of the packaged tool builds.
fn packaged_path(dir: &Path, tool: Tool) -> PathBuf {
    let name = tool.binary_name();
    dir.join(name)
        .join(format!("{name}{}", std::env::consts::EXE_SUFFIX))
}

/// Run `<tool> <version_arg>` and return the first line of stdout.
fn detect_version(path: &Path, version_arg: &str) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg(version_arg)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config() -> ToolsConfig {
        ToolsConfig {
            bundled_dir: None,
            ..ToolsConfig::default()
        }
    }

    #[test]
    fn packaged_layout() {
        let path = packaged_path(Path::new("/opt/rf/bin"), Tool::Upscaler);
        let expected = format!(
            "/opt/rf/bin/realesrgan-ncnn-vulkan/realesrgan-ncnn-vulkan{}",
            std::env::consts::EXE_SUFFIX
        );
        assert_eq!(path, PathBuf::from(expected));
    }

    #[test]
    fn existing_preferred_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("my-ffmpeg");
        std::fs::write(&fake, b"#!/bin/sh\n").unwrap();

        let cfg = ToolsConfig {
            ffmpeg_path: Some(fake.clone()),
            ..empty_config()
        };
        let registry = ToolRegistry::discover(&cfg);
        let resolved = registry.resolve(Tool::Ffmpeg).unwrap();
        assert_eq!(resolved.path, fake);
        assert_eq!(resolved.name, "ffmpeg");
        assert_eq!(resolved.timeout, Duration::from_secs(cfg.timeout_secs));
    }

    #[test]
    fn bundled_dir_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let bundled = packaged_path(dir.path(), Tool::Interpolator);
        std::fs::create_dir_all(bundled.parent().unwrap()).unwrap();
        std::fs::write(&bundled, b"").unwrap();

        let cfg = ToolsConfig {
            bundled_dir: Some(dir.path().to_path_buf()),
            ..ToolsConfig::default()
        };
        let registry = ToolRegistry::discover(&cfg);
        let resolved = registry.resolve(Tool::Interpolator).unwrap();
        assert_eq!(resolved.path, bundled);
        assert_eq!(
            resolved.timeout,
            Duration::from_secs(cfg.frame_tool_timeout_secs)
        );
    }

    #[test]
    fn missing_everywhere_is_tool_not_found() {
        let cfg = ToolsConfig {
            upscaler_path: Some(PathBuf::from("/nonexistent/realesrgan")),
            ..empty_config()
        };
        let registry = ToolRegistry::discover(&cfg);
        // Assumes the upscaler is not installed on the test machine's PATH.
        if which::which(Tool::Upscaler.binary_name()).is_err() {
            let err = registry.resolve(Tool::Upscaler).unwrap_err();
            assert!(matches!(err, rf_core::Error::ToolNotFound { ref tool } if tool == "realesrgan-ncnn-vulkan"));
        }
    }

    #[test]
    fn check_all_returns_known_tools() {
        let registry = ToolRegistry::discover(&empty_config());
        let infos = registry.check_all();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["ffmpeg", "ffprobe", "realesrgan-ncnn-vulkan", "rife-ncnn-vulkan"]
        );
        for info in infos.iter().filter(|i| !i.available) {
            assert!(info.path.is_none());
        }
    }
}
