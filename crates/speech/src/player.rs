//! Playback of remotely synthesized audio

use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use std::sync::{
    mpsc::{self, Sender},
    Mutex,
};
use std::thread;
use tracing::{debug, warn};

use crate::SpeechError;

/// Plays encoded audio
pub trait AudioPlayer: Send + Sync {
    /// Begin playback, replacing anything still playing; returns once
    /// playback has started
    fn play(&self, audio: Vec<u8>) -> Result<(), SpeechError>;

    /// Silence playback in progress
    fn stop(&self);
}

enum AudioCommand {
    Play {
        audio: Vec<u8>,
        started: Sender<Result<(), SpeechError>>,
    },
    Stop,
}

/// MP3 playback through the default output device
///
/// Output streams are not `Send`, so they live on a dedicated audio
/// thread started on first use and driven over a channel.
pub struct RodioPlayer {
    tx: Mutex<Option<Sender<AudioCommand>>>,
}

impl RodioPlayer {
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, SpeechError> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|e| SpeechError::Playback(format!("Lock error: {}", e)))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        thread::Builder::new()
            .name("speech-audio".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                while let Ok(command) = rx.recv() {
                    match command {
                        AudioCommand::Play { audio, started } => {
                            if let Some(previous) = sink.take() {
                                previous.stop();
                            }
                            _stream = None;

                            let result = start_playback(audio).map(|(stream, new_sink)| {
                                _stream = Some(stream);
                                sink = Some(new_sink);
                            });
                            let _ = started.send(result);
                        }
                        AudioCommand::Stop => {
                            if let Some(previous) = sink.take() {
                                previous.stop();
                                debug!("Remote playback stopped");
                            }
                            _stream = None;
                        }
                    }
                }
            })?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl Default for RodioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode first so a bad payload fails without touching the device.
/// The sink drops the decoded source, and with it the buffer, once
/// playback ends.
fn start_playback(audio: Vec<u8>) -> Result<(OutputStream, Sink), SpeechError> {
    let len = audio.len();
    let source = Decoder::new(Cursor::new(audio))
        .map_err(|e| SpeechError::Playback(format!("Undecodable audio: {}", e)))?;
    let (stream, handle) = OutputStream::try_default()
        .map_err(|e| SpeechError::Playback(format!("No audio output: {}", e)))?;
    let sink = Sink::try_new(&handle)
        .map_err(|e| SpeechError::Playback(format!("Failed to create audio sink: {}", e)))?;

    sink.append(source);
    debug!("Playing {} bytes of remote audio", len);
    Ok((stream, sink))
}

impl AudioPlayer for RodioPlayer {
    fn play(&self, audio: Vec<u8>) -> Result<(), SpeechError> {
        let tx = self.ensure_thread()?;
        let (started, started_rx) = mpsc::channel();

        tx.send(AudioCommand::Play { audio, started })
            .map_err(|_| SpeechError::Playback("audio thread stopped".to_string()))?;
        started_rx
            .recv()
            .map_err(|_| SpeechError::Playback("audio thread stopped".to_string()))?
    }

    fn stop(&self) {
        match self.tx.lock() {
            Ok(guard) => {
                if let Some(tx) = guard.as_ref() {
                    let _ = tx.send(AudioCommand::Stop);
                }
            }
            Err(e) => warn!("Audio player lock poisoned: {}", e),
        }
    }
}
