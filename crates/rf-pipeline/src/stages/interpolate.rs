use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rf_av::Tool;
use rf_core::StageKind;

use crate::context::StageContext;
use crate::stage::Stage;

/// Frame interpolation to a higher frame rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpolateStage;

#[async_trait]
impl Stage for InterpolateStage {
    fn kind(&self) -> StageKind {
        StageKind::Interpolate
    }

    fn required_tools(&self) -> &'static [Tool] {
        &[Tool::Ffmpeg, Tool::Interpolator]
    }

    async fn run(&self, input: &Path, ctx: &StageContext) -> rf_core::Result<PathBuf> {
        rf_av::interpolate(
            input,
            &ctx.working_set,
            ctx.tools.as_ref(),
            &ctx.config.interpolate,
            &ctx.cancellation,
        )
        .await
    }

    fn weight(&self) -> f32 {
        4.0
    }
}
