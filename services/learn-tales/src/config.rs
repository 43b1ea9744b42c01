//! Application Configuration Module
//!
//! Settings for the Learn Tales service are read from the environment once
//! at startup and passed to whichever component needs them.

use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_WORDS_PER_MINUTE: u32 = 170;

/// Which speech engine narrates the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEngineKind {
    /// Prints the story word by word at speaking pace.
    Console,
    /// No speech support; read-aloud controls are hidden.
    None,
}

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    pub gemini_api_key: SecretString,
    pub text_model: String,
    pub image_model: String,
    pub base_url: Option<String>,
    pub request_timeout: Option<Duration>,
    pub speech_engine: SpeechEngineKind,
    pub words_per_minute: u32,
    pub prompts_dir: PathBuf,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `GEMINI_API_KEY`: Secret key for the Gemini API. Required.
    // *   `TEXT_MODEL`: (Optional) Model that writes the story. Defaults to "gemini-2.5-flash".
    // *   `IMAGE_MODEL`: (Optional) Model that draws the illustration. Defaults to "imagen-3.0-generate-002".
    // *   `GEMINI_BASE_URL`: (Optional) Overrides the API endpoint.
    // *   `REQUEST_TIMEOUT_SECS`: (Optional) Per-request timeout. Unset means wait indefinitely.
    // *   `SPEECH_ENGINE`: (Optional) "console" or "none". Defaults to "console".
    // *   `SPEECH_WPM`: (Optional) Console narration speed. Defaults to 170.
    // *   `PROMPTS_DIR`: (Optional) Directory of prompt overrides. Defaults to "prompts".
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let gemini_api_key = lookup("GEMINI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;

        let text_model = lookup("TEXT_MODEL")
            .unwrap_or_else(|| gemini_content::config::DEFAULT_TEXT_MODEL.to_string());
        let image_model = lookup("IMAGE_MODEL")
            .unwrap_or_else(|| gemini_content::config::DEFAULT_IMAGE_MODEL.to_string());
        let base_url = lookup("GEMINI_BASE_URL");

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(value) => Some(Duration::from_secs(parse_positive(
                "REQUEST_TIMEOUT_SECS",
                value,
            )?)),
            None => None,
        };

        let speech_engine = match lookup("SPEECH_ENGINE") {
            None => SpeechEngineKind::Console,
            Some(value) => match value.to_lowercase().as_str() {
                "console" => SpeechEngineKind::Console,
                "none" | "off" => SpeechEngineKind::None,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "SPEECH_ENGINE",
                        value,
                    });
                }
            },
        };

        let words_per_minute = match lookup("SPEECH_WPM") {
            Some(value) => u32::try_from(parse_positive("SPEECH_WPM", value.clone())?)
                .map_err(|_| ConfigError::InvalidValue {
                    name: "SPEECH_WPM",
                    value,
                })?,
            None => DEFAULT_WORDS_PER_MINUTE,
        };

        let prompts_dir = lookup("PROMPTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("prompts"));

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            gemini_api_key: SecretString::from(gemini_api_key),
            text_model,
            image_model,
            base_url,
            request_timeout,
            speech_engine,
            words_per_minute,
            prompts_dir,
            log_level,
        })
    }

    /// Client settings for the Gemini API.
    pub fn gemini_config(&self) -> gemini_content::Config {
        let mut builder = gemini_content::Config::builder()
            .with_api_key(self.gemini_api_key.expose_secret())
            .with_text_model(&self.text_model)
            .with_image_model(&self.image_model);
        if let Some(base_url) = &self.base_url {
            builder = builder.with_base_url(base_url);
        }
        if let Some(timeout) = self.request_timeout {
            builder = builder.with_timeout(timeout);
        }
        builder.build()
    }
}

fn parse_positive(name: &'static str, value: String) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::InvalidValue { name, value }),
    }
}
