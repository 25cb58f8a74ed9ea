//! Runtime settings
//!
//! Loaded from an optional `potsbox.toml` plus `POTSBOX_*` environment
//! overrides (double underscore as the section separator, e.g.
//! `POTSBOX_SERVER__PORT=8080`).

use std::path::Path;

use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub caller: CallerConfig,
    pub llm: LlmSettings,
    pub speech: SpeechSettings,
    pub exchange: ExchangeSettings,
}

/// HTTP server binding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Where and when the callers are
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallerConfig {
    /// Offset from UTC for caller-local wall clock time
    pub utc_offset_hours: i32,
    /// City used when the channel carries no caller location
    pub default_city: String,
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: -5,
            default_city: "New York City".to_string(),
        }
    }
}

impl CallerConfig {
    /// Current caller-local wall clock time
    pub fn local_now(&self) -> NaiveDateTime {
        (Utc::now() + Duration::hours(self.utc_offset_hours as i64)).naive_utc()
    }
}

/// Language model backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base endpoint of an OpenAI-style API
    pub endpoint: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Model for conversational replies
    pub chat_model: String,
    /// Model for intent classification
    pub intent_model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            intent_model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            initial_backoff_ms: 100,
        }
    }
}

/// Speech backends and the audio mailbox
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    pub transcribe_model: String,
    pub tts_model: String,
    /// Directory the telephony layer reads response audio from
    pub sounds_dir: String,
    /// Stale mailbox files older than this are swept
    pub mailbox_max_age_secs: u64,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            transcribe_model: "gpt-4o-mini-transcribe".to_string(),
            tts_model: "gpt-4o-mini-tts".to_string(),
            sounds_dir: "asterisk-sounds/en".to_string(),
            mailbox_max_age_secs: 60,
        }
    }
}

/// Dispatcher tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    /// Most recent turns replayed into model calls
    pub context_window: usize,
    /// Minimum classifier confidence for a service switch
    pub intent_confidence_threshold: f32,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            context_window: 8,
            intent_confidence_threshold: 0.6,
        }
    }
}

/// Load settings from an optional file plus environment overrides.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();

    match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::FileNotFound(p.display().to_string()));
            }
            builder = builder.add_source(config::File::from(p.to_path_buf()));
        }
        None => {
            builder = builder.add_source(config::File::with_name("potsbox").required(false));
        }
    }

    let cfg = builder
        .add_source(config::Environment::with_prefix("POTSBOX").separator("__"))
        .build()?;

    Ok(cfg.try_deserialize()?)
}
