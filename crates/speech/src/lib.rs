//! Speech Delivery
//!
//! Turns alert messages into audible speech:
//! - Remote high-quality synthesis (ElevenLabs) when an API key is configured
//! - Local synthesis fallback on any remote failure
//! - At most one local utterance audible at a time

mod config;
mod delivery;
mod elevenlabs;
mod local;
mod player;

pub use config::SpeechConfig;
pub use delivery::{DeliveryPath, Speaker, SpeechDelivery};
pub use elevenlabs::{ElevenLabsClient, VoiceSettings, DEFAULT_BASE_URL, DEFAULT_VOICE_ID};
pub use local::{pick_voice, CommandSynthesizer, LocalSynthesizer, Utterance, Voice};
pub use player::{AudioPlayer, RodioPlayer};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Speech errors
///
/// Never surfaced past [`SpeechDelivery`]; they are logged and degraded.
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Speech provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Speech synthesis not supported: {0}")]
    Unsupported(String),

    #[error("Audio playback failed: {0}")]
    Playback(String),

    #[error("Process error: {0}")]
    Process(#[from] std::io::Error),
}

/// Voice parameters for one message
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechOptions {
    /// Speed multiplier
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            rate: 1.1,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

impl SpeechOptions {
    /// Faster delivery for critical alerts
    pub fn urgent() -> Self {
        Self {
            rate: 1.2,
            ..Default::default()
        }
    }

    /// Normal pace for advisory alerts
    pub fn calm() -> Self {
        Self {
            rate: 1.0,
            ..Default::default()
        }
    }
}
