#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use debatecast_core::generation::GenerationRequest;
use debatecast_core::synthesis::{AudioFormat, SynthesizedAudio};
use debatecast_core::{
    AudioStore, DebateEvent, DebateOrchestrator, DebateStore, GenerationError, MemoryAudioStore,
    MemoryStore, NewDebate, OrchestratorSettings, Persona, RetryPolicy, Side, SpeechSynthesizer,
    SynthesisError, TextGenerator, Voice, default_config,
};

pub const WELL_FORMED_VERDICT: &str =
    "Winner: Side 2\nReasoning: Side 2 rebutted every point with evidence.";

/// Answers debaters deterministically per slot and the judge with a fixed verdict.
pub struct MockGenerator {
    verdict: Mutex<String>,
    failures: Mutex<u32>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    pub fn new(verdict: &str) -> Self {
        Self {
            verdict: Mutex::new(verdict.to_string()),
            failures: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Make the next `n` calls fail.
    pub fn fail_next(&self, n: u32) {
        *self.failures.lock().unwrap() = n;
    }

    pub fn set_verdict(&self, verdict: &str) {
        *self.verdict.lock().unwrap() = verdict.to_string();
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_for(&self, persona: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.persona == persona)
            .count()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());

        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(GenerationError::Backend("model unavailable".to_string()));
            }
        }

        if request.persona == "judge" {
            return Ok(self.verdict.lock().unwrap().clone());
        }

        let question = request
            .prompt
            .lines()
            .find_map(|l| l.strip_prefix("Question: "))
            .unwrap_or("?");
        let prior = request
            .prompt
            .lines()
            .filter(|l| l.starts_with("side1: ") || l.starts_with("side2: "))
            .count();
        Ok(format!(
            "{} makes point {} on '{}'.",
            request.persona,
            prior + 1,
            question
        ))
    }
}

/// Echoes the text back as "audio".
pub struct MockSynthesizer {
    failures: Mutex<u32>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self {
            failures: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_next(&self, n: u32) {
        *self.failures.lock().unwrap() = n;
    }

    /// `(text, voice_id)` of every call, failed ones included.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), voice_id.to_string()));

        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(SynthesisError::Status {
                    status: 500,
                    body: "voice backend down".to_string(),
                });
            }
        }
        if voice_id.is_empty() {
            return Err(SynthesisError::MissingVoice);
        }

        Ok(SynthesizedAudio {
            bytes: text.as_bytes().to_vec(),
            format: AudioFormat::Mp3,
        })
    }

    async fn voices(&self) -> Result<Vec<Voice>, SynthesisError> {
        Ok(vec![Voice {
            voice_id: "voice-1".to_string(),
            name: "Test Voice".to_string(),
        }])
    }
}

pub struct Harness {
    pub orchestrator: Arc<DebateOrchestrator>,
    pub generator: Arc<MockGenerator>,
    pub synthesizer: Arc<MockSynthesizer>,
    pub store: Arc<MemoryStore>,
    pub audio: Arc<MemoryAudioStore>,
    pub events: Arc<Mutex<Vec<DebateEvent>>>,
}

pub fn test_settings() -> OrchestratorSettings {
    let mut settings = OrchestratorSettings::from_config(&default_config());
    settings.retry = RetryPolicy {
        max_attempts: 3,
        delay: Duration::ZERO,
        timeout: Duration::from_secs(5),
    };
    settings
}

pub fn harness() -> Harness {
    harness_with(test_settings())
}

pub fn harness_with(settings: OrchestratorSettings) -> Harness {
    let generator = Arc::new(MockGenerator::new(WELL_FORMED_VERDICT));
    let synthesizer = Arc::new(MockSynthesizer::new());
    let store = Arc::new(MemoryStore::new());
    let audio = Arc::new(MemoryAudioStore::new());
    let events = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&events);
    let orchestrator = DebateOrchestrator::new(
        generator.clone() as Arc<dyn TextGenerator>,
        synthesizer.clone() as Arc<dyn SpeechSynthesizer>,
        store.clone() as Arc<dyn DebateStore>,
        audio.clone() as Arc<dyn AudioStore>,
        settings,
    )
    .with_callback(Box::new(move |event| sink.lock().unwrap().push(event)));

    Harness {
        orchestrator: Arc::new(orchestrator),
        generator,
        synthesizer,
        store,
        audio,
        events,
    }
}

pub fn new_debate(questions: usize, first_speaker: Side) -> NewDebate {
    NewDebate::new(
        "Should homework be abolished?",
        (1..=questions).map(|i| format!("Question {}?", i)).collect(),
    )
    .with_persona(Side::Side1, Persona::new("You argue for abolition.", "voice-side1"))
    .with_persona(Side::Side2, Persona::new("You argue against abolition.", "voice-side2"))
    .with_first_speaker(first_speaker)
    .with_presenter_voice("voice-presenter")
}
