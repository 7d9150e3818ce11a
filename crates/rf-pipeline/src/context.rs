//! Execution context shared by all stages in a pipeline run.

use std::path::PathBuf;
use std::sync::Arc;

use rf_av::{ToolResolver, WorkingSet};
use rf_core::config::Config;
use rf_core::TimedSegment;
use tokio_util::sync::CancellationToken;

/// Sender for reporting progress from within the pipeline.
///
/// Wraps a callback that receives a progress percentage (0.0 -- 100.0) and a
/// human-readable step description.
pub struct ProgressSender {
    callback: Box<dyn Fn(f32, &str) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(f32, &str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_, _| {}),
        }
    }

    /// Report progress.
    pub fn send(&self, progress: f32, step: &str) {
        (self.callback)(progress, step);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

/// Context passed to every stage of one run.
pub struct StageContext {
    /// The job's working set; every stage output is created inside it.
    pub working_set: Arc<WorkingSet>,
    /// Local voiceover file, if the request has one.
    pub voiceover: Option<PathBuf>,
    /// Local music file, if the request has one.
    pub music: Option<PathBuf>,
    /// Subtitles and overlays, merged and ordered by start time.
    pub captions: Vec<TimedSegment>,
    /// Resolver for external tool paths.
    pub tools: Arc<dyn ToolResolver>,
    /// Per-stage settings (encoder quality, tool models, mix volumes).
    pub config: Arc<Config>,
    /// Cancels the run; every tool invocation is bound to it.
    pub cancellation: CancellationToken,
    /// Channel for reporting progress to the caller.
    pub progress: Arc<ProgressSender>,
}

impl StageContext {
    /// Create a context with no optional inputs.
    pub fn new(
        working_set: Arc<WorkingSet>,
        tools: Arc<dyn ToolResolver>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            working_set,
            voiceover: None,
            music: None,
            captions: Vec::new(),
            tools,
            config,
            cancellation: CancellationToken::new(),
            progress: Arc::new(ProgressSender::noop()),
        }
    }

    /// Builder: attach the resolved audio inputs.
    pub fn with_audio(mut self, voiceover: Option<PathBuf>, music: Option<PathBuf>) -> Self {
        self.voiceover = voiceover;
        self.music = music;
        self
    }

    /// Builder: attach the captions to burn in.
    pub fn with_captions(mut self, captions: Vec<TimedSegment>) -> Self {
        self.captions = captions;
        self
    }

    /// Builder: attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Builder: attach a progress sender.
    pub fn with_progress(mut self, progress: Arc<ProgressSender>) -> Self {
        self.progress = progress;
        self
    }
}
