//! Stage abstraction shared by every pipeline step.

use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};

use sellora_core::enhance::EnhanceOptions;
use sellora_core::error::CoreError;
use sellora_core::job::JobRecord;
use sellora_core::style::Style;
use sellora_enhancer::EnhanceApiError;

use crate::config::PipelineConfig;

/// Why a stage could not finish. The display text becomes the reason half
/// of the job's `"<stage name>: <reason>"` error.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("source file {0} not found")]
    SourceMissing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    Transform(#[from] CoreError),

    #[error("enhancement service failed: {0}")]
    Webhook(#[from] EnhanceApiError),

    /// An earlier stage did not produce what this one needs.
    #[error("missing {0}")]
    MissingInput(&'static str),

    /// A blocking worker panicked or was aborted.
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Data carried from one stage to the next during a single run.
pub struct StageContext {
    /// Snapshot of the job taken when the run claimed it.
    pub job: JobRecord,
    pub style: Style,
    pub options: EnhanceOptions,
    pub config: Arc<PipelineConfig>,

    /// Raw bytes of the uploaded source.
    pub source_bytes: Option<Arc<Vec<u8>>>,
    /// Current working image.
    pub image: Option<DynamicImage>,
    /// Encoding for the output file; follows the source when supported.
    pub output_format: ImageFormat,
    /// Applied enhancements, in application order.
    pub enhancements: Vec<String>,
    /// File name of the written output, relative to the output directory.
    pub output_file: Option<String>,
}

impl StageContext {
    pub fn new(job: JobRecord, style: Style, options: EnhanceOptions, config: Arc<PipelineConfig>) -> Self {
        Self {
            job,
            style,
            options,
            config,
            source_bytes: None,
            image: None,
            output_format: ImageFormat::Png,
            enhancements: Vec::new(),
            output_file: None,
        }
    }

    /// Take the working image, failing if no earlier stage produced one.
    pub fn take_image(&mut self) -> Result<DynamicImage, StageError> {
        self.image.take().ok_or(StageError::MissingInput("decoded image"))
    }
}

/// One unit of pipeline work.
///
/// Implementations may await freely: the runner races every stage against
/// the job's cancellation token and drops the future on cancellation.
#[async_trait]
pub trait Stage: Send + Sync {
    async fn run(&self, ctx: &mut StageContext) -> Result<(), StageError>;
}
