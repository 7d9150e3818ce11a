//! Pipeline orchestrator: fetches a job's inputs, runs the enabled
//! [`Stage`]s in their fixed order with progress reporting and cancellation,
//! and delivers the final output.

use std::path::PathBuf;
use std::sync::Arc;

use rf_av::{MediaFetcher, ToolResolver, WorkingSet};
use rf_core::config::Config;
use rf_core::{Error, JobId, PipelineRequest, StageKind};
use tokio_util::sync::CancellationToken;

use crate::context::{ProgressSender, StageContext};
use crate::stage::Stage;
use crate::stages::default_stages;

/// Runs post-processing jobs.
///
/// A `Pipeline` holds no per-job state; concurrent runs are isolated by
/// their own [`WorkingSet`].
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    tools: Arc<dyn ToolResolver>,
    fetcher: MediaFetcher,
    config: Arc<Config>,
    progress: Arc<ProgressSender>,
}

impl Pipeline {
    /// Create a pipeline with the built-in stages.
    pub fn new(config: Config, tools: Arc<dyn ToolResolver>) -> rf_core::Result<Self> {
        let fetcher = MediaFetcher::new(&config.fetch)?;
        Ok(Self {
            stages: default_stages(),
            tools,
            fetcher,
            config: Arc::new(config),
            progress: Arc::new(ProgressSender::noop()),
        })
    }

    /// Replace the stage list. Stages are kept in their fixed run order
    /// whatever order they are given in.
    pub fn with_stages(mut self, mut stages: Vec<Box<dyn Stage>>) -> Self {
        stages.sort_by_key(|s| s.kind());
        self.stages = stages;
        self
    }

    /// Builder: attach a progress sender.
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The stages `request` would run, in order.
    pub fn plan(&self, request: &PipelineRequest) -> Vec<StageKind> {
        self.enabled(request).iter().map(|s| s.kind()).collect()
    }

    fn enabled(&self, request: &PipelineRequest) -> Vec<&dyn Stage> {
        self.stages
            .iter()
            .filter(|s| s.enabled(request))
            .map(|s| s.as_ref())
            .collect()
    }

    /// Run `request` under a fresh job id.
    pub async fn run(
        &self,
        request: &PipelineRequest,
        cancel: CancellationToken,
    ) -> rf_core::Result<PathBuf> {
        self.run_job(JobId::new(), request, cancel).await
    }

    /// Run `request`, returning the delivered file
    /// `<output_dir>/<job_id>.<ext>`.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for an invalid request, before any work.
    /// - [`Error::Stage`] naming the failed stage, wrapping the cause. A
    ///   missing tool is reported against the first stage that needs it,
    ///   before anything is fetched or spawned.
    /// - [`Error::Fetch`] if an input could not be downloaded.
    /// - [`Error::Cancelled`] if `cancel` fired; never wrapped in a stage
    ///   error.
    ///
    /// The job's working set is removed whatever the outcome.
    pub async fn run_job(
        &self,
        job_id: JobId,
        request: &PipelineRequest,
        cancel: CancellationToken,
    ) -> rf_core::Result<PathBuf> {
        request.validate()?;
        let captions =
            rf_av::subtitles::merge_segments(request.subtitles.as_ref(), &request.overlays)?;

        let stages = self.enabled(request);
        for stage in &stages {
            for &tool in stage.required_tools() {
                self.tools
                    .resolve(tool)
                    .map_err(|e| Error::stage_failed(stage.kind(), e))?;
            }
        }

        tracing::info!(
            "job {job_id}: {} -> [{}]",
            request.input_video,
            stages
                .iter()
                .map(|s| s.kind().as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let ws = Arc::new(WorkingSet::create(
            &self.config.work.root_dir,
            &self.config.work.output_dir,
            job_id,
        )?);

        let result = self.execute(&ws, request, captions, &stages, cancel).await;

        match Arc::try_unwrap(ws) {
            Ok(ws) => ws.cleanup(),
            // Removed when the last handle drops.
            Err(_) => tracing::debug!("job {job_id}: working set still shared at cleanup"),
        }

        if let Err(e) = &result {
            tracing::error!("job {job_id} failed ({}): {e}", e.kind());
        }
        result
    }

    async fn execute(
        &self,
        ws: &Arc<WorkingSet>,
        request: &PipelineRequest,
        captions: Vec<rf_core::TimedSegment>,
        stages: &[&dyn Stage],
        cancel: CancellationToken,
    ) -> rf_core::Result<PathBuf> {
        let (video, voiceover, music) = tokio::try_join!(
            self.fetcher
                .resolve(Some(request.input_video.as_str()), "input", ws, &cancel),
            self.fetcher
                .resolve(request.voiceover_ref(), "voiceover", ws, &cancel),
            self.fetcher.resolve(request.music_ref(), "music", ws, &cancel),
        )?;
        let video =
            video.ok_or_else(|| Error::Validation("input_video is required".into()))?;

        let ctx = StageContext::new(ws.clone(), self.tools.clone(), self.config.clone())
            .with_audio(voiceover, music)
            .with_captions(captions)
            .with_cancellation(cancel.clone())
            .with_progress(self.progress.clone());
        ctx.progress.send(0.0, "Fetched");

        let total_weight: f32 = stages.iter().map(|s| s.weight()).sum();
        let mut completed_weight: f32 = 0.0;
        let mut current = video;

        for stage in stages {
            let kind = stage.kind();

            // Check cancellation between stages.
            if cancel.is_cancelled() {
                tracing::info!("Pipeline cancelled before {kind}");
                return Err(Error::cancelled(kind.as_str()));
            }

            tracing::info!("Starting: {kind}");
            let next = match stage.run(&current, &ctx).await {
                Ok(next) => next,
                Err(e) if e.is_cancelled() => {
                    tracing::info!("Pipeline cancelled during {kind}");
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!("Stage failed: {kind}: {e}");
                    return Err(Error::stage_failed(kind, e));
                }
            };

            ws.release(&current);
            current = next;

            completed_weight += stage.weight();
            let pct = if total_weight > 0.0 {
                (completed_weight / total_weight) * 100.0
            } else {
                100.0
            };
            ctx.progress.send(pct, kind.as_str());
            tracing::info!("[{:.0}%] Completed: {kind}", pct);
        }

        let delivered = ws.promote(&current)?;
        ctx.progress.send(100.0, "Delivered");
        tracing::info!("[100%] Delivered {}", delivered.display());
        Ok(delivered)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field(
                "stages",
                &self.stages.iter().map(|s| s.kind()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}
