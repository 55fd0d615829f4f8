//! Configuration loading and management for lucid.
//!
//! Loads settings from `lucid.toml`, falling back to built-in defaults when no
//! file exists. `OLLAMA_HOST` overrides the inference service address.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Local inference service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: String,
    /// Per-attempt timeout, in seconds
    pub timeout_secs: u64,
    /// Maximum in-flight calls to the service
    pub concurrency: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 180,
            concurrency: 1,
        }
    }
}

/// One model variant and its generation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_window: u32,
}

impl ModelConfig {
    fn small() -> Self {
        Self {
            name: "gemma3n:e2b".to_string(),
            temperature: 0.3,
            max_tokens: 800,
            context_window: 4096,
        }
    }

    fn large() -> Self {
        Self {
            name: "gemma3n:e4b".to_string(),
            context_window: 8192,
            ..Self::small()
        }
    }
}

/// A `[models.*]` table as written. Keys left out keep the tier's defaults.
#[derive(Deserialize)]
struct ModelTable {
    name: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    context_window: Option<u32>,
}

impl ModelTable {
    fn over(self, base: ModelConfig) -> ModelConfig {
        ModelConfig {
            name: self.name.unwrap_or(base.name),
            temperature: self.temperature.unwrap_or(base.temperature),
            max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
            context_window: self.context_window.unwrap_or(base.context_window),
        }
    }
}

fn small_model<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ModelConfig, D::Error> {
    Ok(ModelTable::deserialize(deserializer)?.over(ModelConfig::small()))
}

fn large_model<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ModelConfig, D::Error> {
    Ok(ModelTable::deserialize(deserializer)?.over(ModelConfig::large()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    #[serde(deserialize_with = "small_model")]
    pub small: ModelConfig,
    #[serde(deserialize_with = "large_model")]
    pub large: ModelConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            small: ModelConfig::small(),
            large: ModelConfig::large(),
        }
    }
}

/// Model routing policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// PDFs with more pages than this go to the large model
    pub long_form_page_threshold: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            long_form_page_threshold: 10,
        }
    }
}

/// Summary shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub min_key_points: usize,
    pub max_key_points: usize,
    /// Pad short key point lists with a marked placeholder
    pub pad_missing_key_points: bool,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            min_key_points: 3,
            max_key_points: 5,
            pad_missing_key_points: false,
        }
    }
}

/// Extraction limits and external tool locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Normalized text is cut to this many characters
    pub max_chars: usize,
    pub max_file_size_mb: u64,
    pub ocr_enabled: bool,
    pub tesseract_command: String,
    pub pdf_render_command: String,
    pub ffmpeg_command: String,
    pub ffprobe_command: String,
    pub whisper_command: String,
    pub whisper_model: PathBuf,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_chars: 12_000,
            max_file_size_mb: 500,
            ocr_enabled: true,
            tesseract_command: "tesseract".to_string(),
            pdf_render_command: "pdftoppm".to_string(),
            ffmpeg_command: "ffmpeg".to_string(),
            ffprobe_command: "ffprobe".to_string(),
            whisper_command: "whisper-cli".to_string(),
            whisper_model: PathBuf::from("models/ggml-base.bin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive, used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "lucid=info".to_string(),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inference: InferenceConfig,
    pub models: ModelsConfig,
    pub routing: RoutingConfig,
    pub summary: SummaryConfig,
    pub extraction: ExtractionConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location (lucid.toml in cwd or home)
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => {
                let mut config = Config::default();
                config.apply_env();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration text without consulting the environment
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            if !host.trim().is_empty() {
                self.inference.base_url = normalize_host(&host);
            }
        }
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        // Check current directory first
        let local_config = PathBuf::from("lucid.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let home_config = dirs::home_dir()?
            .join(".config")
            .join("lucid")
            .join("lucid.toml");
        home_config.exists().then_some(home_config)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let summary = &self.summary;
        if summary.min_key_points == 0 || summary.min_key_points > summary.max_key_points {
            return Err(ConfigError::Invalid(format!(
                "key point bounds must satisfy 1 <= min <= max (got {}..{})",
                summary.min_key_points, summary.max_key_points
            )));
        }
        if self.inference.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "inference.concurrency must be at least 1".to_string(),
            ));
        }
        if self.inference.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "inference.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.extraction.max_chars == 0 {
            return Err(ConfigError::Invalid(
                "extraction.max_chars must be at least 1".to_string(),
            ));
        }
        for (tier, model) in [("small", &self.models.small), ("large", &self.models.large)] {
            if model.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "models.{tier}.name must not be empty"
                )));
            }
        }
        Ok(())
    }

    /// Per-attempt inference timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.inference.timeout_secs)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.extraction.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// `OLLAMA_HOST` may be a bare `host:port`.
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}
