//! Deterministic image transform pipeline.
//!
//! [`enhance`] plans the operations for a style and options, then
//! [`apply`] runs them in order on an RGBA working buffer. Pixel maths is
//! plain `f32` arithmetic and lookup tables, so identical inputs give
//! identical pixels.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use crate::enhance::{self, EnhanceOptions, TransformOp, TransformPlan};
use crate::error::CoreError;
use crate::style::Style;

/// Rec. 601 luma weights.
const LUMA: [f32; 3] = [0.299, 0.587, 0.114];

/// Plan and apply the transform pipeline for one image.
pub fn enhance(
    source: &DynamicImage,
    style: Style,
    options: &EnhanceOptions,
    default_max_dimension: u32,
) -> Result<(DynamicImage, TransformPlan), CoreError> {
    let plan = enhance::plan(style, options, default_max_dimension, source.dimensions())?;
    let output = apply(source, &plan);
    Ok((output, plan))
}

/// Apply a resolved plan. The result is RGB when the background was
/// flattened and RGBA otherwise.
pub fn apply(source: &DynamicImage, plan: &TransformPlan) -> DynamicImage {
    let mut buffer = source.to_rgba8();
    let mut flattened = false;

    for op in &plan.ops {
        buffer = match *op {
            TransformOp::Flatten { background } => {
                flattened = true;
                flatten(buffer, background)
            }
            TransformOp::Fit { width, height, resized } => {
                if resized {
                    imageops::resize(&buffer, width, height, FilterType::Lanczos3)
                } else {
                    buffer
                }
            }
            TransformOp::Lighting { brightness, contrast } => {
                let table = lookup_table(|x| ((x - 0.5) * contrast + 0.5) * brightness);
                map_channels(buffer, &table)
            }
            TransformOp::Gamma { gamma } => {
                let table = lookup_table(|x| x.powf(1.0 / gamma));
                map_channels(buffer, &table)
            }
            TransformOp::Saturate { factor } => saturate(buffer, factor),
            TransformOp::Sharpen { sigma, threshold } => {
                imageops::unsharpen(&buffer, sigma, threshold)
            }
            TransformOp::Tint { color, strength } => tint(buffer, color, strength),
        };
    }

    if flattened {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(buffer).to_rgb8())
    } else {
        DynamicImage::ImageRgba8(buffer)
    }
}

/// Composite onto an opaque background colour.
fn flatten(mut buffer: RgbaImage, background: [u8; 3]) -> RgbaImage {
    for pixel in buffer.pixels_mut() {
        let alpha = f32::from(pixel[3]) / 255.0;
        for c in 0..3 {
            let blended =
                f32::from(pixel[c]) * alpha + f32::from(background[c]) * (1.0 - alpha);
            pixel[c] = to_u8(blended);
        }
        pixel[3] = u8::MAX;
    }
    buffer
}

/// Build a 256-entry table from a function over normalized intensity.
fn lookup_table(f: impl Fn(f32) -> f32) -> [u8; 256] {
    let mut table = [0u8; 256];
    for (value, entry) in table.iter_mut().enumerate() {
        let x = value as f32 / 255.0;
        *entry = to_u8(f(x) * 255.0);
    }
    table
}

/// Map the colour channels through a lookup table, leaving alpha untouched.
fn map_channels(mut buffer: RgbaImage, table: &[u8; 256]) -> RgbaImage {
    for pixel in buffer.pixels_mut() {
        for c in 0..3 {
            pixel[c] = table[usize::from(pixel[c])];
        }
    }
    buffer
}

fn saturate(mut buffer: RgbaImage, factor: f32) -> RgbaImage {
    for pixel in buffer.pixels_mut() {
        let luma = luma(pixel);
        for c in 0..3 {
            pixel[c] = to_u8(luma + (f32::from(pixel[c]) - luma) * factor);
        }
    }
    buffer
}

/// Multiply-blend a uniform colour at the given strength.
fn tint(mut buffer: RgbaImage, color: [u8; 3], strength: f32) -> RgbaImage {
    for pixel in buffer.pixels_mut() {
        for c in 0..3 {
            let value = f32::from(pixel[c]);
            let tinted = value * f32::from(color[c]) / 255.0;
            pixel[c] = to_u8(value * (1.0 - strength) + tinted * strength);
        }
    }
    buffer
}

fn luma(pixel: &Rgba<u8>) -> f32 {
    (0..3).map(|c| f32::from(pixel[c]) * LUMA[c]).sum()
}

fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
