use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rf_av::{FinalizeInputs, Tool};
use rf_core::StageKind;

use crate::context::StageContext;
use crate::stage::Stage;

/// Audio replacement/mix and subtitle burn-in.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalizeStage;

#[async_trait]
impl Stage for FinalizeStage {
    fn kind(&self) -> StageKind {
        StageKind::Finalize
    }

    fn required_tools(&self) -> &'static [Tool] {
        &[Tool::Ffmpeg]
    }

    async fn run(&self, input: &Path, ctx: &StageContext) -> rf_core::Result<PathBuf> {
        let inputs = FinalizeInputs {
            video: input,
            voiceover: ctx.voiceover.as_deref(),
            music: ctx.music.as_deref(),
            captions: &ctx.captions,
        };
        rf_av::finalize(
            &inputs,
            &ctx.working_set,
            ctx.tools.as_ref(),
            &ctx.config.finalize,
            &ctx.cancellation,
        )
        .await
    }
}
