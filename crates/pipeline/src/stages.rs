//! Concrete pipeline stages.
//!
//! CPU-bound work (decode, transform, encode) runs on the blocking pool. If
//! the run is cancelled while such work is in flight, the blocking task
//! finishes in the background and its result is dropped.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};

use sellora_core::transform;
use sellora_enhancer::{EnhanceApi, EnhanceRequest, ProductInfo};

use crate::stage::{Stage, StageContext, StageError};

/// Read and decode the uploaded source image.
pub struct LoadSource;

#[async_trait]
impl Stage for LoadSource {
    async fn run(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        let file_id = ctx.job.source_ref.clone();
        let path = ctx
            .config
            .source_path(&file_id)
            .ok_or_else(|| StageError::SourceMissing(file_id.clone()))?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => Arc::new(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StageError::SourceMissing(file_id));
            }
            Err(e) => return Err(e.into()),
        };

        let for_decode = Arc::clone(&bytes);
        let (image, format) = tokio::task::spawn_blocking(move || {
            let format = image::guess_format(&for_decode)?;
            let image = image::load_from_memory_with_format(&for_decode, format)?;
            Ok::<_, image::ImageError>((image, format))
        })
        .await??;

        tracing::debug!(
            job_id = %ctx.job.id,
            width = image.width(),
            height = image.height(),
            format = ?format,
            "Source decoded",
        );

        ctx.output_format = output_format_for(format);
        ctx.source_bytes = Some(bytes);
        ctx.image = Some(image);
        Ok(())
    }
}

/// Run the deterministic transform pipeline for the job's style.
pub struct ApplyStyle;

#[async_trait]
impl Stage for ApplyStyle {
    async fn run(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        let source = ctx.take_image()?;
        let style = ctx.style;
        let options = ctx.options.clone();
        let max_dimension = ctx.config.max_dimension;

        let (image, plan) = tokio::task::spawn_blocking(move || {
            transform::enhance(&source, style, &options, max_dimension)
        })
        .await??;

        ctx.enhancements.extend(plan.descriptions());
        ctx.image = Some(image);
        Ok(())
    }
}

/// Stand-in for model inference: waits for a fixed duration.
pub struct SimulatedInference {
    pub delay: Duration,
}

#[async_trait]
impl Stage for SimulatedInference {
    async fn run(&self, _ctx: &mut StageContext) -> Result<(), StageError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Send the source to the external AI webhook and keep its answer.
pub struct WebhookEnhance {
    pub api: Arc<EnhanceApi>,
}

#[async_trait]
impl Stage for WebhookEnhance {
    async fn run(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        let source = ctx
            .source_bytes
            .clone()
            .ok_or(StageError::MissingInput("source bytes"))?;

        let product_info = ProductInfo {
            name: ctx.options.product_name.clone().unwrap_or_default(),
            brand: ctx.options.brand_name.clone().unwrap_or_default(),
            description: ctx.options.description.clone().unwrap_or_default(),
        };
        let request = EnhanceRequest::new(&source, ctx.style.as_str(), product_info);

        let enhanced = self.api.enhance(&request).await?;

        let (image, format) = tokio::task::spawn_blocking(move || {
            let format = image::guess_format(&enhanced)?;
            let image = image::load_from_memory_with_format(&enhanced, format)?;
            Ok::<_, image::ImageError>((image, format))
        })
        .await??;

        ctx.output_format = output_format_for(format);
        ctx.enhancements
            .push(format!("AI enhancement ({} style)", ctx.style));
        ctx.image = Some(image);
        Ok(())
    }
}

/// Encode the working image and write it to the output directory.
pub struct SaveOutput;

#[async_trait]
impl Stage for SaveOutput {
    async fn run(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        let image = ctx.take_image()?;
        let format = ctx.output_format;

        let encoded = tokio::task::spawn_blocking(move || encode(image, format)).await??;

        let file_name = format!("enhanced_{}.{}", ctx.job.id, extension_for(format));
        tokio::fs::create_dir_all(&ctx.config.output_dir).await?;
        tokio::fs::write(ctx.config.output_dir.join(&file_name), &encoded).await?;

        tracing::debug!(job_id = %ctx.job.id, file = %file_name, bytes = encoded.len(), "Output written");
        ctx.output_file = Some(file_name);
        Ok(())
    }
}

fn encode(image: DynamicImage, format: ImageFormat) -> Result<Vec<u8>, image::ImageError> {
    // The JPEG encoder has no alpha channel.
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format)?;
    Ok(buffer.into_inner())
}

/// Keep the source encoding when an encoder for it is built in.
fn output_format_for(source: ImageFormat) -> ImageFormat {
    match source {
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP => source,
        _ => ImageFormat::Png,
    }
}

fn extension_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::WebP => "webp",
        _ => "png",
    }
}
