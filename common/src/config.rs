use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Session configuration, loaded once from TOML at startup and immutable
/// for the lifetime of the capture loop. Every section has defaults, so an
/// empty (or absent) file yields a runnable configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// "monitor" (primary display) or "window" (keyword-matched window).
    #[serde(default = "default_source")]
    pub source: String,
    /// Title/app-name substrings tried in priority order when `source = "window"`.
    #[serde(default = "default_window_keywords")]
    pub window_keywords: Vec<String>,
    /// Seconds between polls. Must be strictly positive.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Similarity engine: "mean-diff" or "histogram".
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Threshold preset: "low" (0.02), "medium" (0.05) or "high" (0.10).
    #[serde(default = "default_sensitivity")]
    pub sensitivity: String,
    /// Explicit dissimilarity cutoff. Overrides the preset when set.
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory that receives the per-session slide folder and the PDF.
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            window_keywords: default_window_keywords(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            sensitivity: default_sensitivity(),
            threshold: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }
}

impl CaptureConfig {
    /// Polling interval, validated before the session starts.
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        if !self.interval_secs.is_finite() || self.interval_secs <= 0.0 {
            return Err(ConfigError::InvalidInterval(self.interval_secs));
        }
        Ok(Duration::from_secs_f64(self.interval_secs))
    }
}

impl DetectorConfig {
    /// The effective dissimilarity cutoff: the explicit threshold when
    /// given, otherwise the named preset.
    pub fn resolve_threshold(&self) -> Result<f64, ConfigError> {
        if let Some(t) = self.threshold {
            return Ok(t);
        }
        match self.sensitivity.as_str() {
            "low" => Ok(0.02),
            "medium" => Ok(0.05),
            "high" => Ok(0.10),
            other => Err(ConfigError::UnknownSensitivity(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("capture interval must be a positive number of seconds, got {0}")]
    InvalidInterval(f64),
    #[error("unknown sensitivity preset {0:?}, expected \"low\", \"medium\" or \"high\"")]
    UnknownSensitivity(String),
}

// Default value functions
fn default_source() -> String {
    "monitor".into()
}
fn default_window_keywords() -> Vec<String> {
    ["box.com", "YouTube", "Zoom", "Google Meet", "Microsoft Teams", "Meeting"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_interval_secs() -> f64 {
    1.0
}
fn default_engine() -> String {
    "mean-diff".into()
}
fn default_sensitivity() -> String {
    "medium".into()
}
fn default_output_dir() -> String {
    "slides".into()
}
fn default_jpeg_quality() -> u8 {
    95
}
fn default_log_level() -> String {
    "info".into()
}
