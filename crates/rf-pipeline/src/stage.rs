//! The [`Stage`] trait defines a single pipeline step.
//!
//! A stage consumes the current working output and produces a new file in
//! the working set. Stages never see each other; the orchestrator threads the
//! output of one into the next.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rf_av::Tool;
use rf_core::{PipelineRequest, StageKind};

use crate::context::StageContext;

#[async_trait]
pub trait Stage: Send + Sync {
    /// Which stage this is; also fixes its position in the run.
    fn kind(&self) -> StageKind;

    /// Whether the request asks for this stage.
    fn enabled(&self, request: &PipelineRequest) -> bool {
        request.wants(self.kind())
    }

    /// External tools that must be resolvable before the run starts.
    fn required_tools(&self) -> &'static [Tool] {
        &[]
    }

    /// Transform `input` into a new file inside the working set.
    ///
    /// On failure the stage must not leave a partial output behind; the
    /// orchestrator wraps the error with [`kind`](Stage::kind).
    async fn run(&self, input: &Path, ctx: &StageContext) -> rf_core::Result<PathBuf>;

    /// Relative weight of this stage for progress reporting.
    ///
    /// Default is `1.0`.
    fn weight(&self) -> f32 {
        1.0
    }
}
