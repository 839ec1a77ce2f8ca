//! Enhancement options and transform planning.
//!
//! [`EnhanceOptions`] is the validated form of a job's `options` object.
//! [`plan`] resolves a style preset plus options against the source image
//! size into a [`TransformPlan`]: the ordered list of operations the
//! transform pipeline applies. Planning is pure, so the same inputs always
//! produce the same plan.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::style::Style;

/// Default bound on the longest output side, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 2048;
/// Smallest accepted `maxDimension`.
pub const MIN_MAX_DIMENSION: u32 = 64;
/// Largest accepted `maxDimension`.
pub const MAX_MAX_DIMENSION: u32 = 8192;
/// Accepted range for `strength`.
pub const STRENGTH_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

// ---------------------------------------------------------------------------
// EnhanceOptions
// ---------------------------------------------------------------------------

/// Client-supplied enhancement parameters. Every field is optional; absent
/// flags fall back to the style preset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceOptions {
    pub remove_background: Option<bool>,
    pub enhance_lighting: Option<bool>,
    pub enhance_colors: Option<bool>,
    /// Scales every preset adjustment; 1.0 keeps the preset as-is.
    pub strength: Option<f32>,
    pub max_dimension: Option<u32>,
    /// `#rrggbb` colour used by background normalization.
    pub background_color: Option<String>,
    pub product_name: Option<String>,
    pub brand_name: Option<String>,
    pub description: Option<String>,
}

impl EnhanceOptions {
    /// Parse and validate a raw `options` value. `null` means defaults.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, CoreError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        if !value.is_object() {
            return Err(CoreError::Validation("options must be an object".into()));
        }

        let options: Self = serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Validation(format!("Invalid options: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if let Some(strength) = self.strength {
            if !STRENGTH_RANGE.contains(&strength) {
                return Err(CoreError::Validation(format!(
                    "strength must be between {} and {}",
                    STRENGTH_RANGE.start(),
                    STRENGTH_RANGE.end()
                )));
            }
        }
        if let Some(max) = self.max_dimension {
            if !(MIN_MAX_DIMENSION..=MAX_MAX_DIMENSION).contains(&max) {
                return Err(CoreError::Validation(format!(
                    "maxDimension must be between {MIN_MAX_DIMENSION} and {MAX_MAX_DIMENSION}"
                )));
            }
        }
        if let Some(color) = &self.background_color {
            parse_hex_color(color)?;
        }
        Ok(())
    }

    pub fn strength(&self) -> f32 {
        self.strength.unwrap_or(1.0)
    }
}

/// Parse `#rrggbb` (leading `#` optional).
pub fn parse_hex_color(input: &str) -> Result<[u8; 3], CoreError> {
    let hex = input.trim().trim_start_matches('#');
    let invalid = || CoreError::Validation(format!("Invalid colour '{input}', expected #rrggbb"));

    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
    };
    Ok([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

fn hex(color: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

// ---------------------------------------------------------------------------
// TransformOp / TransformPlan
// ---------------------------------------------------------------------------

/// One resolved image operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformOp {
    Flatten { background: [u8; 3] },
    Fit { width: u32, height: u32, resized: bool },
    Lighting { brightness: f32, contrast: f32 },
    Gamma { gamma: f32 },
    Saturate { factor: f32 },
    Sharpen { sigma: f32, threshold: i32 },
    Tint { color: [u8; 3], strength: f32 },
}

impl TransformOp {
    /// Human-readable description for the job's enhancement list.
    pub fn describe(&self) -> String {
        match self {
            TransformOp::Flatten { background } => {
                format!("Background normalized to {}", hex(*background))
            }
            TransformOp::Fit { width, height, resized: true } => {
                format!("Resized to {width}x{height}")
            }
            TransformOp::Fit { width, height, resized: false } => {
                format!("Kept original size {width}x{height}")
            }
            TransformOp::Lighting { brightness, contrast } => {
                format!("Lighting adjusted (brightness {brightness:.2}, contrast {contrast:.2})")
            }
            TransformOp::Gamma { gamma } => format!("Gamma corrected ({gamma:.2})"),
            TransformOp::Saturate { factor } => format!("Saturation boosted ({factor:.2}x)"),
            TransformOp::Sharpen { sigma, .. } => format!("Sharpened (sigma {sigma:.2})"),
            TransformOp::Tint { color, strength } => {
                format!("Tinted {} at {:.0}%", hex(*color), strength * 100.0)
            }
        }
    }
}

/// Ordered operations for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformPlan {
    pub style: Style,
    pub ops: Vec<TransformOp>,
}

impl TransformPlan {
    pub fn descriptions(&self) -> Vec<String> {
        self.ops.iter().map(TransformOp::describe).collect()
    }
}

/// Output size that bounds the longest side by `max_dimension` while keeping
/// the aspect ratio. Never upscales.
pub fn fit_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return (width, height);
    }
    let scale = f64::from(max_dimension) / f64::from(longest);
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Move a multiplicative parameter towards or away from identity.
fn scale_multiplier(value: f32, strength: f32) -> f32 {
    1.0 + (value - 1.0) * strength
}

/// Resolve a style and options against the source size.
///
/// Step order is fixed: background, fit, lighting (multiplier then gamma),
/// colour (saturation, sharpen, tint). Steps whose parameters are the
/// identity after scaling are left out.
pub fn plan(
    style: Style,
    options: &EnhanceOptions,
    default_max_dimension: u32,
    source_size: (u32, u32),
) -> Result<TransformPlan, CoreError> {
    let preset = style.preset();
    let strength = options.strength();
    let mut ops = Vec::new();

    // 1. Background normalization.
    if options.remove_background.unwrap_or(preset.remove_background) {
        let background = match &options.background_color {
            Some(color) => parse_hex_color(color)?,
            None => preset.background,
        };
        ops.push(TransformOp::Flatten { background });
    }

    // 2. Geometric fit (always present).
    let max_dimension = options.max_dimension.unwrap_or(default_max_dimension);
    let (width, height) = fit_dimensions(source_size.0, source_size.1, max_dimension);
    ops.push(TransformOp::Fit {
        width,
        height,
        resized: (width, height) != source_size,
    });

    // 3. Lighting.
    if options.enhance_lighting.unwrap_or(preset.enhance_lighting) {
        let brightness = scale_multiplier(preset.lighting.brightness, strength);
        let contrast = scale_multiplier(preset.lighting.contrast, strength);
        let gamma = scale_multiplier(preset.lighting.gamma, strength);
        if brightness != 1.0 || contrast != 1.0 {
            ops.push(TransformOp::Lighting { brightness, contrast });
        }
        if gamma != 1.0 && gamma > 0.0 {
            ops.push(TransformOp::Gamma { gamma });
        }
    }

    // 4. Colour: saturation, sharpen, tint. Tint last so it does not bleed
    //    into sharpening halos.
    if options.enhance_colors.unwrap_or(preset.enhance_colors) {
        let factor = scale_multiplier(preset.color.saturation, strength).max(0.0);
        if factor != 1.0 {
            ops.push(TransformOp::Saturate { factor });
        }
        let sigma = preset.color.sharpen_sigma * strength;
        if sigma > 0.0 {
            ops.push(TransformOp::Sharpen {
                sigma,
                threshold: preset.color.sharpen_threshold,
            });
        }
        let tint_strength = (preset.color.tint_strength * strength).clamp(0.0, 1.0);
        if tint_strength > 0.0 {
            ops.push(TransformOp::Tint {
                color: preset.color.tint,
                strength: tint_strength,
            });
        }
    }

    Ok(TransformPlan { style, ops })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
