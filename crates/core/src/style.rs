//! Style identifiers and their enhancement presets.
//!
//! A preset is configuration data: it decides which optional transform
//! steps run by default and with which numeric parameters. Request options
//! can switch steps on or off and scale the parameters (see
//! [`crate::enhance`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Parameter groups
// ---------------------------------------------------------------------------

/// Brightness/contrast multipliers followed by a gamma correction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightingParams {
    pub brightness: f32,
    pub contrast: f32,
    pub gamma: f32,
}

/// Saturation boost, unsharp mask and a uniform tint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorParams {
    pub saturation: f32,
    pub sharpen_sigma: f32,
    pub sharpen_threshold: i32,
    pub tint: [u8; 3],
    /// Blend factor of the tint, 0.0 (none) to 1.0 (full multiply).
    pub tint_strength: f32,
}

/// Default behaviour of the transform pipeline for one style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StylePreset {
    pub remove_background: bool,
    pub background: [u8; 3],
    pub enhance_lighting: bool,
    pub lighting: LightingParams,
    pub enhance_colors: bool,
    pub color: ColorParams,
}

const WHITE: [u8; 3] = [255, 255, 255];

// ---------------------------------------------------------------------------
// Style
// ---------------------------------------------------------------------------

/// Named enhancement style selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Minimal,
    Maximalist,
    Luxury,
    Delicate,
    Elegant,
    Glamorous,
    Natural,
    Vintage,
    Artistic,
    Professional,
}

impl Style {
    pub const ALL: [Style; 10] = [
        Style::Minimal,
        Style::Maximalist,
        Style::Luxury,
        Style::Delicate,
        Style::Elegant,
        Style::Glamorous,
        Style::Natural,
        Style::Vintage,
        Style::Artistic,
        Style::Professional,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Style::Minimal => "minimal",
            Style::Maximalist => "maximalist",
            Style::Luxury => "luxury",
            Style::Delicate => "delicate",
            Style::Elegant => "elegant",
            Style::Glamorous => "glamorous",
            Style::Natural => "natural",
            Style::Vintage => "vintage",
            Style::Artistic => "artistic",
            Style::Professional => "professional",
        }
    }

    /// Preset parameters for this style.
    pub fn preset(self) -> StylePreset {
        let neutral_color = ColorParams {
            saturation: 1.0,
            sharpen_sigma: 0.8,
            sharpen_threshold: 2,
            tint: WHITE,
            tint_strength: 0.0,
        };

        match self {
            Style::Minimal => StylePreset {
                remove_background: true,
                background: WHITE,
                enhance_lighting: true,
                lighting: LightingParams { brightness: 1.05, contrast: 1.05, gamma: 1.0 },
                enhance_colors: false,
                color: neutral_color,
            },
            Style::Maximalist => StylePreset {
                remove_background: false,
                background: WHITE,
                enhance_lighting: true,
                lighting: LightingParams { brightness: 1.05, contrast: 1.2, gamma: 1.0 },
                enhance_colors: true,
                color: ColorParams {
                    saturation: 1.4,
                    sharpen_sigma: 1.2,
                    sharpen_threshold: 2,
                    tint: [255, 236, 214],
                    tint_strength: 0.06,
                },
            },
            Style::Luxury => StylePreset {
                remove_background: true,
                background: [24, 24, 28],
                enhance_lighting: true,
                lighting: LightingParams { brightness: 0.95, contrast: 1.15, gamma: 0.95 },
                enhance_colors: true,
                color: ColorParams {
                    saturation: 1.1,
                    sharpen_sigma: 1.0,
                    sharpen_threshold: 2,
                    tint: [255, 223, 170],
                    tint_strength: 0.08,
                },
            },
            Style::Delicate => StylePreset {
                remove_background: true,
                background: [250, 244, 240],
                enhance_lighting: true,
                lighting: LightingParams { brightness: 1.1, contrast: 0.95, gamma: 1.1 },
                enhance_colors: true,
                color: ColorParams {
                    saturation: 0.9,
                    sharpen_sigma: 0.5,
                    sharpen_threshold: 3,
                    tint: [255, 228, 236],
                    tint_strength: 0.05,
                },
            },
            Style::Elegant => StylePreset {
                remove_background: true,
                background: [245, 245, 245],
                enhance_lighting: true,
                lighting: LightingParams { brightness: 1.0, contrast: 1.1, gamma: 1.0 },
                enhance_colors: true,
                color: ColorParams {
                    saturation: 1.05,
                    sharpen_sigma: 0.8,
                    sharpen_threshold: 2,
                    tint: [240, 240, 255],
                    tint_strength: 0.04,
                },
            },
            Style::Glamorous => StylePreset {
                remove_background: false,
                background: WHITE,
                enhance_lighting: true,
                lighting: LightingParams { brightness: 1.1, contrast: 1.15, gamma: 1.05 },
                enhance_colors: true,
                color: ColorParams {
                    saturation: 1.3,
                    sharpen_sigma: 1.0,
                    sharpen_threshold: 2,
                    tint: [255, 215, 225],
                    tint_strength: 0.07,
                },
            },
            Style::Natural => StylePreset {
                remove_background: false,
                background: WHITE,
                enhance_lighting: true,
                lighting: LightingParams { brightness: 1.05, contrast: 1.05, gamma: 1.05 },
                enhance_colors: true,
                color: ColorParams {
                    saturation: 1.1,
                    ..neutral_color
                },
            },
            Style::Vintage => StylePreset {
                remove_background: false,
                background: WHITE,
                enhance_lighting: true,
                lighting: LightingParams { brightness: 1.0, contrast: 0.9, gamma: 0.9 },
                enhance_colors: true,
                color: ColorParams {
                    saturation: 0.75,
                    sharpen_sigma: 0.5,
                    sharpen_threshold: 3,
                    tint: [255, 226, 180],
                    tint_strength: 0.15,
                },
            },
            Style::Artistic => StylePreset {
                remove_background: false,
                background: WHITE,
                enhance_lighting: true,
                lighting: LightingParams { brightness: 1.0, contrast: 1.25, gamma: 0.95 },
                enhance_colors: true,
                color: ColorParams {
                    saturation: 1.5,
                    sharpen_sigma: 1.5,
                    sharpen_threshold: 1,
                    tint: [220, 235, 255],
                    tint_strength: 0.08,
                },
            },
            Style::Professional => StylePreset {
                remove_background: true,
                background: WHITE,
                enhance_lighting: true,
                lighting: LightingParams { brightness: 1.05, contrast: 1.1, gamma: 1.0 },
                enhance_colors: true,
                color: ColorParams {
                    saturation: 1.05,
                    sharpen_sigma: 1.0,
                    sharpen_threshold: 2,
                    tint: WHITE,
                    tint_strength: 0.0,
                },
            },
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Style::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<&str> = Style::ALL.iter().map(|s| s.as_str()).collect();
                CoreError::Validation(format!(
                    "Unknown style '{s}'. Expected one of: {}",
                    known.join(", ")
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_names_case_insensitively() {
        assert_eq!("Natural".parse::<Style>().unwrap(), Style::Natural);
        assert_eq!(" LUXURY ".parse::<Style>().unwrap(), Style::Luxury);
    }

    #[test]
    fn unknown_style_lists_known_styles() {
        let err = "neon".parse::<Style>().unwrap_err().to_string();
        assert!(err.contains("neon"));
        assert!(err.contains("professional"));
    }

    #[test]
    fn every_preset_has_positive_multipliers() {
        for style in Style::ALL {
            let preset = style.preset();
            assert!(preset.lighting.brightness > 0.0, "{style}");
            assert!(preset.lighting.contrast > 0.0, "{style}");
            assert!(preset.lighting.gamma > 0.0, "{style}");
            assert!(preset.color.saturation >= 0.0, "{style}");
            assert!((0.0..=1.0).contains(&preset.color.tint_strength), "{style}");
        }
    }
}
