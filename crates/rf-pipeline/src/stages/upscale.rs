use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rf_av::Tool;
use rf_core::StageKind;

use crate::context::StageContext;
use crate::stage::Stage;

/// Frame-by-frame super-resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpscaleStage;

#[async_trait]
impl Stage for UpscaleStage {
    fn kind(&self) -> StageKind {
        StageKind::Upscale
    }

    fn required_tools(&self) -> &'static [Tool] {
        &[Tool::Ffmpeg, Tool::Upscaler]
    }

    async fn run(&self, input: &Path, ctx: &StageContext) -> rf_core::Result<PathBuf> {
        rf_av::upscale(
            input,
            &ctx.working_set,
            ctx.tools.as_ref(),
            &ctx.config.upscale,
            &ctx.cancellation,
        )
        .await
    }

    fn weight(&self) -> f32 {
        5.0
    }
}
