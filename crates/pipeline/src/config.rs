//! Pipeline configuration loaded from environment variables.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sellora_core::enhance::{DEFAULT_MAX_DIMENSION, MAX_MAX_DIMENSION, MIN_MAX_DIMENSION};

/// Which stage set processes jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// Local transform pipeline plus a simulated inference delay.
    Local,
    /// Enhancement delegated to the external AI webhook.
    Webhook,
}

impl PipelineMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineMode::Local => "local",
            PipelineMode::Webhook => "webhook",
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(PipelineMode::Local),
            "webhook" => Ok(PipelineMode::Webhook),
            other => Err(format!("unknown pipeline mode '{other}' (expected local or webhook)")),
        }
    }
}

const DEFAULT_UPLOAD_DIR: &str = "./uploads";
const DEFAULT_OUTPUT_DIR: &str = "./outputs";
const DEFAULT_OUTPUT_URL_PREFIX: &str = "/outputs";
const DEFAULT_SIMULATED_INFERENCE_MS: u64 = 1500;
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: PipelineMode,
    /// Directory holding uploaded source assets.
    pub upload_dir: PathBuf,
    /// Directory enhanced outputs are written to.
    pub output_dir: PathBuf,
    /// URL path under which `output_dir` is served.
    pub output_url_prefix: String,
    /// Bound on the longest output side when a job does not set one.
    pub max_dimension: u32,
    /// Duration of the simulated inference stage in local mode.
    pub simulated_inference: Duration,
    pub webhook_url: Option<String>,
    pub webhook_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::Local,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            output_url_prefix: DEFAULT_OUTPUT_URL_PREFIX.to_string(),
            max_dimension: DEFAULT_MAX_DIMENSION,
            simulated_inference: Duration::from_millis(DEFAULT_SIMULATED_INFERENCE_MS),
            webhook_url: None,
            webhook_timeout: Duration::from_secs(DEFAULT_WEBHOOK_TIMEOUT_SECS),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable                 | Default      |
    /// |--------------------------|--------------|
    /// | `PIPELINE_MODE`          | `local`      |
    /// | `UPLOAD_DIR`             | `./uploads`  |
    /// | `OUTPUT_DIR`             | `./outputs`  |
    /// | `MAX_DIMENSION`          | `2048`       |
    /// | `SIMULATED_INFERENCE_MS` | `1500`       |
    /// | `ENHANCE_WEBHOOK_URL`    | -            |
    /// | `WEBHOOK_TIMEOUT_SECS`   | `120`        |
    ///
    /// Panics on malformed values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mode = std::env::var("PIPELINE_MODE")
            .map(|v| v.parse().expect("PIPELINE_MODE must be 'local' or 'webhook'"))
            .unwrap_or(defaults.mode);

        let max_dimension: u32 = std::env::var("MAX_DIMENSION")
            .map(|v| v.parse().expect("MAX_DIMENSION must be a valid u32"))
            .unwrap_or(defaults.max_dimension);
        assert!(
            (MIN_MAX_DIMENSION..=MAX_MAX_DIMENSION).contains(&max_dimension),
            "MAX_DIMENSION must be between {MIN_MAX_DIMENSION} and {MAX_MAX_DIMENSION}"
        );

        let simulated_inference = std::env::var("SIMULATED_INFERENCE_MS")
            .map(|v| {
                Duration::from_millis(v.parse().expect("SIMULATED_INFERENCE_MS must be a valid u64"))
            })
            .unwrap_or(defaults.simulated_inference);

        let webhook_timeout = std::env::var("WEBHOOK_TIMEOUT_SECS")
            .map(|v| Duration::from_secs(v.parse().expect("WEBHOOK_TIMEOUT_SECS must be a valid u64")))
            .unwrap_or(defaults.webhook_timeout);

        Self {
            mode,
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            output_url_prefix: defaults.output_url_prefix,
            max_dimension,
            simulated_inference,
            webhook_url: std::env::var("ENHANCE_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            webhook_timeout,
        }
    }

    /// Path of an uploaded asset, or `None` if the name could escape the
    /// upload directory.
    pub fn source_path(&self, file_id: &str) -> Option<PathBuf> {
        is_safe_file_name(file_id).then(|| self.upload_dir.join(file_id))
    }

    /// Public URL of an output file.
    pub fn output_url(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.output_url_prefix.trim_end_matches('/'))
    }
}

/// A bare file name: one normal path component, no separators, no `..`.
pub fn is_safe_file_name(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains('\0') {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Webhook".parse::<PipelineMode>().unwrap(), PipelineMode::Webhook);
        assert_eq!("local".parse::<PipelineMode>().unwrap(), PipelineMode::Local);
        assert!("remote".parse::<PipelineMode>().is_err());
    }

    #[test]
    fn file_names_cannot_escape_upload_dir() {
        assert!(is_safe_file_name("abc.jpg"));
        assert!(is_safe_file_name("1699999999-photo.png"));
        assert!(!is_safe_file_name(""));
        assert!(!is_safe_file_name(".."));
        assert!(!is_safe_file_name("."));
        assert!(!is_safe_file_name("../etc/passwd"));
        assert!(!is_safe_file_name("a/b.jpg"));
        assert!(!is_safe_file_name("a\\b.jpg"));
        assert!(!is_safe_file_name("/abs.jpg"));
    }

    #[test]
    fn output_url_joins_prefix() {
        let config = PipelineConfig::default();
        assert_eq!(config.output_url("enhanced_x.png"), "/outputs/enhanced_x.png");
        assert!(config.source_path("../x").is_none());
        assert_eq!(
            config.source_path("x.png").unwrap(),
            PathBuf::from("./uploads").join("x.png")
        );
    }
}
