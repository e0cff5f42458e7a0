//! Local speech synthesis

use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::SpeechError;

/// espeak's default speed in words per minute
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// An installed voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub language: String,
}

/// One message to speak locally
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub lang: String,
    /// Voice name; the system default is used when `None`
    pub voice: Option<String>,
}

/// Platform speech facility
pub trait LocalSynthesizer: Send + Sync {
    fn is_supported(&self) -> bool;

    fn voices(&self) -> Vec<Voice>;

    /// Start speaking without waiting for completion
    fn speak(&self, utterance: Utterance) -> Result<(), SpeechError>;

    /// Silence whatever is being spoken
    fn cancel(&self);
}

/// First installed voice whose name contains any preferred name
pub fn pick_voice<'a>(voices: &'a [Voice], preferred: &[String]) -> Option<&'a Voice> {
    voices
        .iter()
        .find(|voice| preferred.iter().any(|p| voice.name.contains(p.as_str())))
}

/// Synthesizer backed by an espeak-compatible command line program
pub struct CommandSynthesizer {
    program: String,
    supported: bool,
    voices: Vec<Voice>,
    current: Mutex<Option<Child>>,
}

impl CommandSynthesizer {
    /// Probe `program` for its voice list; unsupported if it cannot run
    pub fn detect(program: impl Into<String>) -> Self {
        let program = program.into();
        let (supported, voices) = match Command::new(&program)
            .arg("--voices")
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) if output.status.success() => {
                let voices = parse_voice_list(&String::from_utf8_lossy(&output.stdout));
                info!("Local speech via {} ({} voices)", program, voices.len());
                (true, voices)
            }
            Ok(output) => {
                warn!("{} --voices exited with {}", program, output.status);
                (false, Vec::new())
            }
            Err(e) => {
                warn!("Local speech program {} unavailable: {}", program, e);
                (false, Vec::new())
            }
        };

        Self {
            program,
            supported,
            voices,
            current: Mutex::new(None),
        }
    }

    fn args(utterance: &Utterance) -> Vec<String> {
        let voice = utterance
            .voice
            .clone()
            .unwrap_or_else(|| utterance.lang.to_lowercase());
        let speed = (BASE_WORDS_PER_MINUTE * utterance.rate).round() as u32;
        let pitch = (50.0 * utterance.pitch).clamp(0.0, 99.0).round() as u32;
        let amplitude = (100.0 * utterance.volume).clamp(0.0, 200.0).round() as u32;

        vec![
            "-v".to_string(),
            voice,
            "-s".to_string(),
            speed.to_string(),
            "-p".to_string(),
            pitch.to_string(),
            "-a".to_string(),
            amplitude.to_string(),
            "--".to_string(),
            utterance.text.clone(),
        ]
    }
}

impl LocalSynthesizer for CommandSynthesizer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&self, utterance: Utterance) -> Result<(), SpeechError> {
        if !self.supported {
            return Err(SpeechError::Unsupported(self.program.clone()));
        }

        let child = Command::new(&self.program)
            .args(Self::args(&utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let mut current = self
            .current
            .lock()
            .map_err(|e| SpeechError::Playback(format!("Lock error: {}", e)))?;
        if let Some(mut previous) = current.replace(child) {
            // Caller normally cancels first; never let two overlap
            let _ = previous.kill();
            let _ = previous.wait();
        }
        Ok(())
    }

    fn cancel(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(mut child) = current.take() {
                // Already-exited children just get reaped
                let _ = child.kill();
                let _ = child.wait();
                debug!("Local speech cancelled");
            }
        }
    }
}

impl Drop for CommandSynthesizer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Parse `espeak-ng --voices` output
fn parse_voice_list(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            match columns.as_slice() {
                [_, language, _, name, ..] => Some(Voice {
                    name: (*name).to_string(),
                    language: (*language).to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str) -> Voice {
        Voice {
            name: name.to_string(),
            language: "en-us".to_string(),
        }
    }

    #[test]
    fn test_parse_voice_list() {
        let output = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 2  en-us           --/M      English_(America)  gmw/en-US            (en 3)
";
        let voices = parse_voice_list(output);
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[1].name, "English_(America)");
        assert_eq!(voices[1].language, "en-us");
    }

    #[test]
    fn test_pick_voice_prefers_listed_names() {
        let voices = vec![
            voice("Alex"),
            voice("Microsoft David Desktop"),
            voice("Samantha"),
        ];
        let preferred = vec!["Samantha".to_string(), "Microsoft David".to_string()];

        // First installed voice matching any preference wins
        let picked = pick_voice(&voices, &preferred).unwrap();
        assert_eq!(picked.name, "Microsoft David Desktop");

        assert!(pick_voice(&voices, &["Karen".to_string()]).is_none());
    }

    #[test]
    fn test_args_map_options() {
        let utterance = Utterance {
            text: "Keep eyes on the road.".to_string(),
            rate: 1.2,
            pitch: 1.0,
            volume: 1.0,
            lang: "en-US".to_string(),
            voice: None,
        };
        let args = CommandSynthesizer::args(&utterance);
        assert_eq!(
            args,
            vec![
                "-v",
                "en-us",
                "-s",
                "210",
                "-p",
                "50",
                "-a",
                "100",
                "--",
                "Keep eyes on the road."
            ]
        );
    }

    #[test]
    fn test_missing_program_is_unsupported() {
        let synth = CommandSynthesizer::detect("definitely-not-a-speech-engine");
        assert!(!synth.is_supported());
        assert!(synth.voices().is_empty());

        let result = synth.speak(Utterance {
            text: "hello".to_string(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            lang: "en-US".to_string(),
            voice: None,
        });
        assert!(matches!(result, Err(SpeechError::Unsupported(_))));
        synth.cancel();
    }
}
