use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rf_av::Tool;
use rf_core::StageKind;

use crate::context::StageContext;
use crate::stage::Stage;

/// Two-pass vid.stab stabilization.
#[derive(Debug, Clone, Copy, Default)]
pub struct StabilizeStage;

#[async_trait]
impl Stage for StabilizeStage {
    fn kind(&self) -> StageKind {
        StageKind::Stabilize
    }

    fn required_tools(&self) -> &'static [Tool] {
        &[Tool::Ffmpeg]
    }

    async fn run(&self, input: &Path, ctx: &StageContext) -> rf_core::Result<PathBuf> {
        rf_av::stabilize(
            input,
            &ctx.working_set,
            ctx.tools.as_ref(),
            &ctx.config.stabilize,
            &ctx.cancellation,
        )
        .await
    }

    // Two full decode passes plus an encode.
    fn weight(&self) -> f32 {
        2.0
    }
}
