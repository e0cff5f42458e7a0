//! Speech configuration

use serde::{Deserialize, Serialize};

use crate::elevenlabs::{DEFAULT_BASE_URL, DEFAULT_VOICE_ID};

/// Value shipped in sample env files; treated as "not configured"
const PLACEHOLDER_API_KEY: &str = "your_api_key_here";

/// Speech configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// ElevenLabs API key (`ELEVENLABS_API_KEY`)
    pub elevenlabs_api_key: Option<String>,
    /// ElevenLabs voice identity (`ELEVENLABS_VOICE_ID`)
    pub elevenlabs_voice_id: Option<String>,
    pub elevenlabs_base_url: String,
    /// espeak-compatible synthesizer binary
    pub local_program: String,
    /// Local voices to prefer, matched by substring
    pub preferred_voices: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            elevenlabs_api_key: None,
            elevenlabs_voice_id: None,
            elevenlabs_base_url: DEFAULT_BASE_URL.to_string(),
            local_program: "espeak-ng".to_string(),
            preferred_voices: vec![
                "Samantha".to_string(),
                "Google US English".to_string(),
                "Microsoft David".to_string(),
            ],
        }
    }
}

impl SpeechConfig {
    /// Usable API key: present, non-empty and not the placeholder
    pub fn api_key(&self) -> Option<&str> {
        self.elevenlabs_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && *key != PLACEHOLDER_API_KEY)
    }

    pub fn remote_enabled(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn voice_id(&self) -> &str {
        self.elevenlabs_voice_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(DEFAULT_VOICE_ID)
    }
}
