//! # rf-av
//!
//! Audio/video processing, probing, and external tool management for the
//! reelforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool resolution** ([`ToolRegistry`], [`ToolResolver`]) -- find ffmpeg,
//!   ffprobe, the upscaler and the interpolator, preferring packaged builds
//!   over `PATH`.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout,
//!   working directory and cancellation support.
//! - **Working sets** ([`WorkingSet`]) -- per-job directory lifecycle with
//!   promotion of the final output.
//! - **Fetching** ([`MediaFetcher`]) -- streams remote inputs into the job
//!   directory.
//! - **Subtitles** ([`subtitles`]) -- SubRip rendering/parsing and burn-in
//!   styling.
//! - **Action functions** ([`actions`]) -- stabilize, upscale, interpolate,
//!   finalize, and the frame helpers they share.

pub mod actions;
pub mod command;
pub mod fetch;
pub mod probe;
pub mod subtitles;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use fetch::MediaFetcher;
pub use probe::{probe_video, FrameRate, VideoInfo};
pub use tools::{Tool, ToolConfig, ToolInfo, ToolRegistry, ToolResolver};
pub use workspace::WorkingSet;

// Action functions
pub use actions::{
    assemble_frames, extract_frames, finalize, interpolate, stabilize, upscale, AudioMix,
    FinalizeInputs,
};
