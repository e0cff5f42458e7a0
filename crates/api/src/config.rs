//! Layered configuration
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. `fleet-monitor.toml` (or the file named by `FLEET_MONITOR_CONFIG`), if present
//! 3. `FLEET__<SECTION>__<KEY>` environment variables
//! 4. `ELEVENLABS_API_KEY`, `ELEVENLABS_VOICE_ID`, `SUPABASE_URL`, `SUPABASE_ANON_KEY`

use alerting::AlertConfig;
use config::{Config, ConfigError, Environment, File, Source};
use monitor::MonitorConfig;
use serde::{Deserialize, Serialize};
use speech::SpeechConfig;
use storage::SupabaseConfig;

use crate::rate_limit::RateLimitConfig;

const DEFAULT_CONFIG_FILE: &str = "fleet-monitor.toml";
const CONFIG_PATH_VAR: &str = "FLEET_MONITOR_CONFIG";
const ENV_PREFIX: &str = "FLEET";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Hosted backend; unset means in-memory demo data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseSettings {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub supabase: SupabaseSettings,
    pub speech: SpeechConfig,
    pub alerts: AlertConfig,
    pub monitor: MonitorConfig,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load from the process environment and the config file
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::layered(File::with_name(&path).required(false), |key| {
            std::env::var(key).ok()
        })
    }

    /// Defaults, then `file`, then `FLEET__*` variables, then the
    /// well-known variables resolved through `lookup`
    pub fn layered<S>(file: S, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let settings = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let mut config: AppConfig = settings.try_deserialize()?;
        config.apply_overrides(lookup);
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ELEVENLABS_API_KEY") {
            self.speech.elevenlabs_api_key = Some(key);
        }
        if let Some(voice) = lookup("ELEVENLABS_VOICE_ID") {
            self.speech.elevenlabs_voice_id = Some(voice);
        }
        if let Some(url) = lookup("SUPABASE_URL") {
            self.supabase.url = Some(url);
        }
        if let Some(key) = lookup("SUPABASE_ANON_KEY") {
            self.supabase.anon_key = Some(key);
        }
    }

    /// Hosted backend settings when both URL and key are present
    pub fn supabase(&self) -> Option<SupabaseConfig> {
        let url = self.supabase.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        let key = self
            .supabase
            .anon_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())?;

        Some(SupabaseConfig {
            url: url.to_string(),
            api_key: key.to_string(),
        })
    }
}
