//! Unified error type for the reelforge pipeline.
//!
//! All crates funnel their failures into [`Error`]. The job scheduler only
//! needs the flat [`ErrorKind`] (via [`Error::kind`]) to mark a job failed
//! and [`Error::is_transient`] to decide whether a retry makes sense.

use std::fmt;

use crate::request::StageKind;

/// Unified error type covering all failure modes of a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request or configuration data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A remote asset could not be downloaded or written to disk.
    #[error("Fetch error [{reference}]: {message}")]
    Fetch {
        /// The URL that was being fetched.
        reference: String,
        /// Human-readable error description.
        message: String,
    },

    /// A required external binary was found neither at its packaged path nor
    /// on `PATH`.
    #[error("Tool not found: {tool}")]
    ToolNotFound {
        /// Name of the missing tool.
        tool: String,
    },

    /// An external tool (ffmpeg, upscaler, ...) failed.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description, including the stderr tail.
        message: String,
        /// Process exit code, when the process ran to completion.
        exit_code: Option<i32>,
    },

    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// A pipeline stage failed; `source` is the underlying cause.
    #[error("{stage} stage failed: {source}")]
    Stage {
        /// The stage that failed.
        stage: StageKind,
        /// What went wrong inside the stage.
        #[source]
        source: Box<Error>,
    },

    /// The caller cancelled the run.
    #[error("Cancelled during {during}")]
    Cancelled {
        /// The step (stage or tool) that was running when the run was cancelled.
        during: String,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Flat classification of an [`Error`] for the job scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Invalid,
    Fetch,
    ToolNotFound,
    Stabilization,
    Upscale,
    Interpolation,
    Finalize,
    Cancelled,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Invalid => "invalid request",
            Self::Fetch => "fetch failed",
            Self::ToolNotFound => "tool not found",
            Self::Stabilization => "stabilization failed",
            Self::Upscale => "upscale failed",
            Self::Interpolation => "interpolation failed",
            Self::Finalize => "finalize failed",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal error",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Classify this error.
    ///
    /// A stage error reports the stage, not the underlying cause, except for
    /// cancellation which always surfaces as [`ErrorKind::Cancelled`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Invalid,
            Error::Fetch { .. } => ErrorKind::Fetch,
            Error::ToolNotFound { .. } => ErrorKind::ToolNotFound,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
            Error::Stage { source, .. } if source.is_cancelled() => ErrorKind::Cancelled,
            Error::Stage { stage, .. } => match stage {
                StageKind::Stabilize => ErrorKind::Stabilization,
                StageKind::Upscale => ErrorKind::Upscale,
                StageKind::Interpolate => ErrorKind::Interpolation,
                StageKind::Finalize => ErrorKind::Finalize,
            },
            Error::Io { .. } | Error::Tool { .. } | Error::Probe(_) | Error::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether a scheduler may reasonably retry the job. Only fetch failures
    /// are considered transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Fetch { .. })
    }

    /// Whether this error (or the cause it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled { .. } => true,
            Error::Stage { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// The stage a stage error is attributed to.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Convenience constructor for [`Error::Fetch`].
    pub fn fetch(reference: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Fetch {
            reference: reference.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::ToolNotFound`].
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Error::ToolNotFound { tool: tool.into() }
    }

    /// Convenience constructor for [`Error::Tool`] without an exit code
    /// (spawn failures, timeouts, unusable output).
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
            exit_code: None,
        }
    }

    /// Convenience constructor for [`Error::Stage`].
    pub fn stage_failed(stage: StageKind, source: Error) -> Self {
        Error::Stage {
            stage,
            source: Box::new(source),
        }
    }

    /// Convenience constructor for [`Error::Cancelled`].
    pub fn cancelled(during: impl Into<String>) -> Self {
        Error::Cancelled {
            during: during.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
