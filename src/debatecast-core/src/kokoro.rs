//! Local text-to-speech using kokoro-tiny (WAV output).

use std::io::Cursor;

use async_trait::async_trait;
use kokoro_tiny::TtsEngine;
use tokio::sync::Mutex;

use crate::synthesis::{AudioFormat, SpeechSynthesizer, SynthesisError, SynthesizedAudio, Voice};

/// Kokoro renders at 24kHz mono.
const SAMPLE_RATE: u32 = 24_000;
/// Kokoro has a ~200 char safe limit per call.
const MAX_CHUNK_CHARS: usize = 200;
/// 0.3s of silence between chunks.
const CHUNK_GAP_SAMPLES: usize = 7_200;
/// 0.5s of trailing silence so the last word is not cut off.
const TRAILING_PAD_SAMPLES: usize = 12_000;

pub struct KokoroSynthesizer {
    engine: Mutex<TtsEngine>,
    available_voices: Vec<String>,
}

impl KokoroSynthesizer {
    /// Initialize the engine (downloads the model on first run).
    pub async fn new() -> Result<Self, SynthesisError> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| SynthesisError::Engine(format!("Failed to initialize TTS: {}", e)))?;
        let available_voices = engine.voices();

        Ok(Self {
            engine: Mutex::new(engine),
            available_voices,
        })
    }

    fn validate_voice(&self, voice_id: &str) -> Result<(), SynthesisError> {
        if voice_id.trim().is_empty() {
            return Err(SynthesisError::MissingVoice);
        }
        if !self.available_voices.iter().any(|v| v == voice_id) {
            return Err(SynthesisError::UnknownVoice(voice_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechSynthesizer for KokoroSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        self.validate_voice(voice_id)?;

        let mut engine = self.engine.lock().await;
        let mut samples = Vec::new();

        for chunk in split_into_chunks(text, MAX_CHUNK_CHARS) {
            let rendered = engine
                .synthesize(&chunk, Some(voice_id))
                .map_err(|e| SynthesisError::Engine(format!("Synthesis failed: {}", e)))?;
            samples.extend(rendered);
            samples.extend(std::iter::repeat_n(0.0, CHUNK_GAP_SAMPLES));
        }
        samples.extend(std::iter::repeat_n(0.0, TRAILING_PAD_SAMPLES));

        Ok(SynthesizedAudio {
            bytes: encode_wav(&samples)?,
            format: AudioFormat::Wav,
        })
    }

    async fn voices(&self) -> Result<Vec<Voice>, SynthesisError> {
        let mut voices: Vec<Voice> = self
            .available_voices
            .iter()
            .map(|v| Voice {
                voice_id: v.clone(),
                name: v.clone(),
            })
            .collect();
        voices.sort_by(|a, b| a.voice_id.cmp(&b.voice_id));
        Ok(voices)
    }
}

/// Encode mono f32 samples as 16-bit PCM WAV.
fn encode_wav(samples: &[f32]) -> Result<Vec<u8>, SynthesisError> {
    let wav_err = |e: hound::Error| SynthesisError::Engine(format!("Failed to encode WAV: {}", e));
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_err)?;
        for &sample in samples {
            let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(pcm).map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)?;
    }
    Ok(cursor.into_inner())
}

/// Split text into chunks that are safe for a single engine call.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';', '\n'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current_chunk.len() + sentence.len() > max_chars {
            if !current_chunk.is_empty() {
                chunks.push(current_chunk.trim().to_string());
                current_chunk = String::new();
            }

            // Over-long sentences fall back to comma boundaries.
            if sentence.len() > max_chars {
                for part in sentence.split_inclusive(',') {
                    if current_chunk.len() + part.len() > max_chars && !current_chunk.is_empty() {
                        chunks.push(current_chunk.trim().to_string());
                        current_chunk = String::new();
                    }
                    current_chunk.push_str(part);
                    current_chunk.push(' ');
                }
                continue;
            }
        }

        current_chunk.push_str(sentence);
        current_chunk.push(' ');
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    chunks
}
