//! Pipeline runner: drives one job through its stages.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use sellora_core::enhance::EnhanceOptions;
use sellora_core::job::{JobRecord, JobResult, PROGRESS_COMPLETE};
use sellora_core::job_events::{
    EVENT_JOB_COMPLETED, EVENT_JOB_FAILED, EVENT_JOB_PROGRESS, EVENT_JOB_STARTED,
};
use sellora_core::style::Style;
use sellora_enhancer::{EnhanceApi, EnhanceApiError};
use sellora_events::{EventBus, PlatformEvent};
use sellora_store::{JobStore, StoreError};

use crate::config::{PipelineConfig, PipelineMode};
use crate::stage::{Stage, StageContext};
use crate::stages::{ApplyStyle, LoadSource, SaveOutput, SimulatedInference, WebhookEnhance};

pub const STAGE_ANALYZING: &str = "Analyzing image";
pub const STAGE_APPLYING_STYLE: &str = "Applying style";
pub const STAGE_ENHANCING: &str = "Enhancing features";
pub const STAGE_FINALIZING: &str = "Finalizing result";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("ENHANCE_WEBHOOK_URL is required in webhook mode")]
    MissingWebhookUrl,

    #[error("invalid pipeline steps: {0}")]
    InvalidSteps(String),

    #[error("failed to build webhook client: {0}")]
    Client(#[from] EnhanceApiError),
}

/// A named stage and the progress recorded once it finishes.
pub struct PipelineStep {
    pub name: &'static str,
    /// Strictly increasing across steps and below 100.
    pub checkpoint: u8,
    pub stage: Arc<dyn Stage>,
}

impl PipelineStep {
    pub fn new(name: &'static str, checkpoint: u8, stage: impl Stage + 'static) -> Self {
        Self {
            name,
            checkpoint,
            stage: Arc::new(stage),
        }
    }
}

impl fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineStep")
            .field("name", &self.name)
            .field("checkpoint", &self.checkpoint)
            .finish_non_exhaustive()
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(JobRecord),
    Failed(JobRecord),
    /// The job was cancelled or deleted; nothing further was recorded.
    Cancelled,
    /// The job could not be claimed, e.g. a second run for the same job.
    Skipped(String),
}

#[derive(Debug)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
    config: Arc<PipelineConfig>,
}

impl Pipeline {
    /// Build a pipeline from explicit steps.
    pub fn new(config: PipelineConfig, steps: Vec<PipelineStep>) -> Result<Self, PipelineError> {
        if steps.is_empty() {
            return Err(PipelineError::InvalidSteps("at least one step is required".into()));
        }
        let mut previous: Option<u8> = None;
        for step in &steps {
            if step.checkpoint >= PROGRESS_COMPLETE {
                return Err(PipelineError::InvalidSteps(format!(
                    "checkpoint {} of '{}' must be below {PROGRESS_COMPLETE}",
                    step.checkpoint, step.name
                )));
            }
            if previous.is_some_and(|p| step.checkpoint <= p) {
                return Err(PipelineError::InvalidSteps(format!(
                    "checkpoint {} of '{}' does not increase",
                    step.checkpoint, step.name
                )));
            }
            previous = Some(step.checkpoint);
        }
        Ok(Self {
            steps,
            config: Arc::new(config),
        })
    }

    /// Local stage set: decode, transform, simulated inference, write.
    pub fn local(config: PipelineConfig) -> Self {
        let steps = vec![
            PipelineStep::new(STAGE_ANALYZING, 20, LoadSource),
            PipelineStep::new(STAGE_APPLYING_STYLE, 50, ApplyStyle),
            PipelineStep::new(
                STAGE_ENHANCING,
                80,
                SimulatedInference {
                    delay: config.simulated_inference,
                },
            ),
            PipelineStep::new(STAGE_FINALIZING, 95, SaveOutput),
        ];
        Self {
            steps,
            config: Arc::new(config),
        }
    }

    /// Webhook stage set: decode, external enhancement, write.
    pub fn webhook(config: PipelineConfig, api: Arc<EnhanceApi>) -> Self {
        let steps = vec![
            PipelineStep::new(STAGE_ANALYZING, 20, LoadSource),
            PipelineStep::new(STAGE_APPLYING_STYLE, 80, WebhookEnhance { api }),
            PipelineStep::new(STAGE_FINALIZING, 95, SaveOutput),
        ];
        Self {
            steps,
            config: Arc::new(config),
        }
    }

    /// Build the stage set selected by `config.mode`.
    pub fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        match config.mode {
            PipelineMode::Local => Ok(Self::local(config)),
            PipelineMode::Webhook => {
                let url = config
                    .webhook_url
                    .clone()
                    .ok_or(PipelineError::MissingWebhookUrl)?;
                let api = EnhanceApi::new(url, config.webhook_timeout)?;
                Ok(Self::webhook(config, Arc::new(api)))
            }
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Drive `job_id` from `queued` to a terminal state.
    ///
    /// Cancellation is observed at every stage boundary (token or store
    /// status) and interrupts the stage currently awaiting.
    pub async fn run(
        &self,
        store: &JobStore,
        bus: &EventBus,
        job_id: &str,
        cancel: CancellationToken,
    ) -> RunOutcome {
        let job = match store.claim(job_id).await {
            Ok(job) => job,
            Err(StoreError::NotFound(_) | StoreError::Cancelled(_)) => return RunOutcome::Cancelled,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Job not claimed");
                return RunOutcome::Skipped(e.to_string());
            }
        };

        tracing::info!(job_id, style = %job.style, mode = %self.config.mode, "Job started");
        bus.publish(
            PlatformEvent::new(EVENT_JOB_STARTED)
                .with_job(job_id)
                .with_payload(serde_json::json!({ "status": job.status, "style": job.style })),
        );

        let first = &self.steps[0];
        if let Err(e) = store.update_progress(job_id, 0, Some(first.name)).await {
            return self.interrupted(job_id, e);
        }

        let mut ctx = match self.context_for(job) {
            Ok(ctx) => ctx,
            Err(reason) => return self.fail(store, bus, job_id, first.name, &reason).await,
        };

        for (index, step) in self.steps.iter().enumerate() {
            if cancel.is_cancelled() || store.is_cancelled(job_id).await {
                tracing::info!(job_id, stage = step.name, "Job cancelled before stage");
                return RunOutcome::Cancelled;
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(job_id, stage = step.name, "Job cancelled during stage");
                    return RunOutcome::Cancelled;
                }
                result = step.stage.run(&mut ctx) => result,
            };

            if let Err(e) = result {
                return self.fail(store, bus, job_id, step.name, &e.to_string()).await;
            }

            let next_name = self.steps.get(index + 1).map_or(step.name, |next| next.name);
            match store
                .update_progress(job_id, step.checkpoint, Some(next_name))
                .await
            {
                Ok(updated) => {
                    tracing::debug!(job_id, stage = step.name, progress = step.checkpoint, "Stage finished");
                    bus.publish(
                        PlatformEvent::new(EVENT_JOB_PROGRESS)
                            .with_job(job_id)
                            .with_payload(serde_json::json!({
                                "progress": updated.progress,
                                "message": updated.message,
                            })),
                    );
                }
                Err(e) => return self.interrupted(job_id, e),
            }
        }

        self.complete(store, bus, job_id, ctx).await
    }

    fn context_for(&self, job: JobRecord) -> Result<StageContext, String> {
        let style = job.style.parse::<Style>().map_err(|e| e.to_string())?;
        let options = EnhanceOptions::from_value(&job.options).map_err(|e| e.to_string())?;
        Ok(StageContext::new(job, style, options, Arc::clone(&self.config)))
    }

    async fn complete(
        &self,
        store: &JobStore,
        bus: &EventBus,
        job_id: &str,
        ctx: StageContext,
    ) -> RunOutcome {
        let Some(enhanced_file) = ctx.output_file.clone() else {
            let last = self.steps.last().map_or(STAGE_FINALIZING, |s| s.name);
            return self.fail(store, bus, job_id, last, "no output produced").await;
        };

        let processing_time_ms = ctx
            .job
            .started_at
            .map_or(0, |started| (Utc::now() - started).num_milliseconds().max(0));
        let url = self.config.output_url(&enhanced_file);

        let result = JobResult {
            original_file: ctx.job.source_ref.clone(),
            enhanced_file: enhanced_file.clone(),
            style: ctx.style.as_str().to_string(),
            processing_time_ms,
            enhancements: ctx.enhancements,
            download_url: url.clone(),
            preview_url: url,
        };

        match store.complete(job_id, result).await {
            Ok(job) => {
                tracing::info!(job_id, processing_time_ms, file = %enhanced_file, "Job completed");
                bus.publish(
                    PlatformEvent::new(EVENT_JOB_COMPLETED)
                        .with_job(job_id)
                        .with_payload(serde_json::json!({
                            "status": job.status,
                            "style": job.style,
                            "downloadUrl": job.result.as_ref().map(|r| r.download_url.as_str()),
                        })),
                );
                RunOutcome::Completed(job)
            }
            Err(e) => {
                // Cancelled while finalizing: the output has no job to belong to.
                let path = self.config.output_dir.join(&enhanced_file);
                if let Err(io) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(job_id, error = %io, "Failed to remove orphaned output");
                }
                self.interrupted(job_id, e)
            }
        }
    }

    async fn fail(
        &self,
        store: &JobStore,
        bus: &EventBus,
        job_id: &str,
        stage: &str,
        reason: &str,
    ) -> RunOutcome {
        let error = format!("{stage}: {reason}");
        match store.fail(job_id, &error).await {
            Ok(job) => {
                tracing::warn!(job_id, %error, "Job failed");
                bus.publish(
                    PlatformEvent::new(EVENT_JOB_FAILED)
                        .with_job(job_id)
                        .with_payload(serde_json::json!({
                            "status": job.status,
                            "style": job.style,
                            "error": error,
                        })),
                );
                RunOutcome::Failed(job)
            }
            Err(e) => self.interrupted(job_id, e),
        }
    }

    /// A store mutation was rejected mid-run. Cancellation and deletion are
    /// expected; anything else is logged.
    fn interrupted(&self, job_id: &str, err: StoreError) -> RunOutcome {
        match err {
            StoreError::NotFound(_) | StoreError::Cancelled(_) => {
                tracing::info!(job_id, "Job cancelled mid-run");
                RunOutcome::Cancelled
            }
            other => {
                tracing::error!(job_id, error = %other, "Job state update rejected");
                RunOutcome::Skipped(other.to_string())
            }
        }
    }
}
