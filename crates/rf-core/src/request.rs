//! The job description handed to the pipeline by the scheduler.
//!
//! A [`PipelineRequest`] is immutable once constructed. Media references
//! (`input_video`, `voiceover`, `music`) are either local filesystem paths or
//! HTTP(S) URLs; the fetcher decides which.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// StageKind
// ---------------------------------------------------------------------------

/// The processing stages, in the only order they ever run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Stabilize,
    Upscale,
    Interpolate,
    Finalize,
}

impl StageKind {
    /// All stages in execution order.
    pub const ORDER: [StageKind; 4] = [
        StageKind::Stabilize,
        StageKind::Upscale,
        StageKind::Interpolate,
        StageKind::Finalize,
    ];

    /// Lowercase name, also used for intermediate file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stabilize => "stabilize",
            Self::Upscale => "upscale",
            Self::Interpolate => "interpolate",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TimedSegment
// ---------------------------------------------------------------------------

/// A piece of text shown between `start` and `end` (seconds).
///
/// Shared by subtitles and overlays; both are rendered the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl TimedSegment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// Check the timing invariant (finite, non-negative, `start < end`) and
    /// that the text survives a SubRip block: no blank lines and no carriage
    /// returns.
    pub fn validate(&self) -> Result<()> {
        if self.text.contains('\r') {
            return Err(Error::Validation(format!(
                "segment {:?} contains a carriage return",
                self.text
            )));
        }
        if !self.text.is_empty() && self.text.split('\n').any(|line| line.trim().is_empty()) {
            return Err(Error::Validation(format!(
                "segment {:?} contains a blank line",
                self.text
            )));
        }
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(Error::Validation(format!(
                "segment {:?} has a non-finite time",
                self.text
            )));
        }
        if self.start < 0.0 {
            return Err(Error::Validation(format!(
                "segment {:?} starts before 0 ({})",
                self.text, self.start
            )));
        }
        if self.start >= self.end {
            return Err(Error::Validation(format!(
                "segment {:?} must start before it ends ({} >= {})",
                self.text, self.start, self.end
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SubtitleSource
// ---------------------------------------------------------------------------

/// Subtitles as supplied by the caller.
///
/// Either a list of segments or an already formatted SubRip document. A path
/// to an existing subtitle file is deliberately not an option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubtitleSource {
    Segments(Vec<TimedSegment>),
    Document(String),
}

impl SubtitleSource {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Segments(segments) => segments.is_empty(),
            Self::Document(doc) => doc.trim().is_empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineRequest
// ---------------------------------------------------------------------------

/// Description of one post-processing job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineRequest {
    /// Base video: local path or HTTP(S) URL.
    pub input_video: String,
    pub stabilize: bool,
    pub upscale: bool,
    pub interpolate: bool,
    /// Voiceover audio: local path or HTTP(S) URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voiceover: Option<String>,
    /// Background music: local path or HTTP(S) URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<SubtitleSource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overlays: Vec<TimedSegment>,
}

impl PipelineRequest {
    /// A request that only names the input video.
    pub fn new(input_video: impl Into<String>) -> Self {
        Self {
            input_video: input_video.into(),
            ..Self::default()
        }
    }

    /// Parse a request from JSON.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("request parse error: {e}")))
    }

    /// Check the request's invariants before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.input_video.trim().is_empty() {
            return Err(Error::Validation("input_video is required".into()));
        }
        if let Some(SubtitleSource::Segments(segments)) = &self.subtitles {
            for segment in segments {
                segment.validate()?;
            }
        }
        for overlay in &self.overlays {
            overlay.validate()?;
        }
        Ok(())
    }

    /// The voiceover reference, treating an empty string as absent.
    pub fn voiceover_ref(&self) -> Option<&str> {
        non_empty(self.voiceover.as_deref())
    }

    /// The music reference, treating an empty string as absent.
    pub fn music_ref(&self) -> Option<&str> {
        non_empty(self.music.as_deref())
    }

    /// Whether any subtitle or overlay text has to be burned in.
    pub fn has_captions(&self) -> bool {
        self.subtitles.as_ref().is_some_and(|s| !s.is_empty()) || !self.overlays.is_empty()
    }

    /// Whether the finalize stage has anything to do.
    pub fn needs_finalize(&self) -> bool {
        self.voiceover_ref().is_some() || self.music_ref().is_some() || self.has_captions()
    }

    /// Whether the given stage is requested.
    pub fn wants(&self, stage: StageKind) -> bool {
        match stage {
            StageKind::Stabilize => self.stabilize,
            StageKind::Upscale => self.upscale,
            StageKind::Interpolate => self.interpolate,
            StageKind::Finalize => self.needs_finalize(),
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
