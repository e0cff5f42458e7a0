//! Speech Delivery Implementation

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, warn};

use crate::local::{pick_voice, CommandSynthesizer, LocalSynthesizer, Utterance};
use crate::player::{AudioPlayer, RodioPlayer};
use crate::{ElevenLabsClient, SpeechConfig, SpeechOptions};

/// Fire-and-forget speech sink used by the alert dispatcher
pub trait Speaker: Send + Sync {
    /// Queue `message` for speech; never fails
    fn speak(&self, message: &str, options: SpeechOptions);

    /// Silence speech in progress and discard deliveries still pending
    fn stop(&self);
}

/// How a message ended up being delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    Remote,
    Local,
    /// No working speech facility
    Dropped,
    /// `stop()` ran while the message was pending
    Cancelled,
}

impl DeliveryPath {
    fn label(&self) -> &'static str {
        match self {
            DeliveryPath::Remote => "remote",
            DeliveryPath::Local => "local",
            DeliveryPath::Dropped => "dropped",
            DeliveryPath::Cancelled => "cancelled",
        }
    }
}

/// Remote-first speech with local fallback
#[derive(Clone)]
pub struct SpeechDelivery {
    remote: Option<ElevenLabsClient>,
    local: Arc<dyn LocalSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    preferred_voices: Vec<String>,
    /// Bumped by `stop()`; a delivery started under an older value is dropped
    generation: Arc<Mutex<u64>>,
}

impl SpeechDelivery {
    pub fn new(
        remote: Option<ElevenLabsClient>,
        local: Arc<dyn LocalSynthesizer>,
        player: Arc<dyn AudioPlayer>,
    ) -> Self {
        Self {
            remote,
            local,
            player,
            preferred_voices: SpeechConfig::default().preferred_voices,
            generation: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_preferred_voices(mut self, voices: Vec<String>) -> Self {
        self.preferred_voices = voices;
        self
    }

    /// Build the production stack from configuration
    pub fn from_config(config: &SpeechConfig) -> Self {
        let remote = ElevenLabsClient::from_config(config);
        match &remote {
            Some(client) => debug!("Remote speech enabled (voice {})", client.voice_id()),
            None => debug!("No ElevenLabs key configured, using local speech only"),
        }

        Self::new(
            remote,
            Arc::new(CommandSynthesizer::detect(&config.local_program)),
            Arc::new(RodioPlayer::new()),
        )
        .with_preferred_voices(config.preferred_voices.clone())
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    fn current_generation(&self) -> u64 {
        *self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Speak `message`, degrading to local speech on any remote failure
    pub async fn deliver(&self, message: &str, options: SpeechOptions) -> DeliveryPath {
        let ticket = self.current_generation();
        self.deliver_under(ticket, message, options).await
    }

    async fn deliver_under(
        &self,
        ticket: u64,
        message: &str,
        options: SpeechOptions,
    ) -> DeliveryPath {
        let path = match &self.remote {
            Some(remote) => {
                let synthesized = remote.synthesize(message).await;
                self.unless_stopped(ticket, || match synthesized {
                    Ok(audio) => match self.player.play(audio) {
                        Ok(()) => DeliveryPath::Remote,
                        Err(e) => {
                            warn!(
                                "Remote audio playback failed, falling back to local speech: {}",
                                e
                            );
                            self.speak_locally(message, SpeechOptions::default())
                        }
                    },
                    Err(e) => {
                        warn!("ElevenLabs error, falling back to local speech: {}", e);
                        self.speak_locally(message, SpeechOptions::default())
                    }
                })
            }
            None => self.unless_stopped(ticket, || self.speak_locally(message, options)),
        };

        metrics::counter!("fleet_speech_total", "path" => path.label()).increment(1);
        path
    }

    /// Run `start` unless `stop()` came after `ticket` was taken. The lock
    /// is held while audio starts so a concurrent `stop()` cannot slip in
    /// between the check and the start.
    fn unless_stopped(
        &self,
        ticket: u64,
        start: impl FnOnce() -> DeliveryPath,
    ) -> DeliveryPath {
        let generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        if *generation != ticket {
            debug!("Speech stopped while pending, discarding");
            return DeliveryPath::Cancelled;
        }
        start()
    }

    /// Speak through the local facility, replacing any current utterance
    pub fn speak_locally(&self, message: &str, options: SpeechOptions) -> DeliveryPath {
        if !self.local.is_supported() {
            error!("Speech synthesis not supported, dropping alert");
            return DeliveryPath::Dropped;
        }

        self.local.cancel();

        let voices = self.local.voices();
        let voice = pick_voice(&voices, &self.preferred_voices).map(|v| v.name.clone());

        let utterance = Utterance {
            text: message.to_string(),
            rate: options.rate,
            pitch: options.pitch,
            volume: options.volume,
            lang: "en-US".to_string(),
            voice,
        };

        match self.local.speak(utterance) {
            Ok(()) => DeliveryPath::Local,
            Err(e) => {
                warn!("Local speech failed: {}", e);
                DeliveryPath::Dropped
            }
        }
    }
}

impl Speaker for SpeechDelivery {
    fn speak(&self, message: &str, options: SpeechOptions) {
        if self.remote.is_none() {
            self.speak_locally(message, options);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                // Taken now so a stop() before the task runs still applies
                let ticket = self.current_generation();
                let this = self.clone();
                let message = message.to_string();
                handle.spawn(async move {
                    this.deliver_under(ticket, &message, options).await;
                });
            }
            Err(_) => {
                warn!("No async runtime for remote speech, speaking locally");
                self.speak_locally(message, options);
            }
        }
    }

    fn stop(&self) {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *generation = generation.wrapping_add(1);
        self.local.cancel();
        self.player.stop();
    }
}
