//! ElevenLabs text-to-speech client

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::{SpeechConfig, SpeechError};

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
/// "Rachel"
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
const MODEL_ID: &str = "eleven_monolingual_v1";

/// Fixed voice-quality knobs sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.6,
            similarity_boost: 0.8,
            style: 0.3,
            use_speaker_boost: true,
        }
    }
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// Remote speech synthesis over HTTPS
#[derive(Debug, Clone)]
pub struct ElevenLabsClient {
    client: Client,
    base_url: String,
    api_key: String,
    voice_id: String,
}

impl ElevenLabsClient {
    pub fn new(api_key: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            voice_id: voice_id.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `None` unless a usable API key is configured
    pub fn from_config(config: &SpeechConfig) -> Option<Self> {
        let key = config.api_key()?;
        Some(Self::new(key, config.voice_id()).with_base_url(&config.elevenlabs_base_url))
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    /// Synthesize `text`, returning MPEG audio
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice_id);
        let request = TtsRequest {
            text,
            model_id: MODEL_ID,
            voice_settings: VoiceSettings::default(),
        };

        let response = self
            .client
            .post(&url)
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SpeechError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let audio = response.bytes().await?;
        debug!("Received {} bytes of audio from ElevenLabs", audio.len());
        Ok(audio.to_vec())
    }
}
