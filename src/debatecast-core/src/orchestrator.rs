//! Debate orchestration logic.
//!
//! [`DebateOrchestrator`] is the surface the driver talks to: it creates and
//! fetches debates and fills turn slots one at a time. Judging and narration
//! live in [`crate::judge`] and [`crate::narration`] as further methods on the
//! same type.
//!
//! Every operation runs generation, then synthesis, then a single store
//! update. Nothing is persisted until all outbound calls have succeeded, so a
//! failed call can be retried from the same preconditions.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audio_store::{AudioStore, turn_audio_name};
use crate::config::Config;
use crate::debate::{Debate, DebateStatus, NewDebate, Response};
use crate::error::DebateError;
use crate::generation::{GenerationRequest, ModelSpec, RetryPolicy, TextGenerator, generate_with_retry};
use crate::participant::Side;
use crate::store::{DebateStore, FieldUpdate, StoreError};
use crate::synthesis::SpeechSynthesizer;

/// Models and policies the orchestrator runs with.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub side1: ModelSpec,
    pub side2: ModelSpec,
    pub judge: ModelSpec,
    pub judge_instructions: String,
    pub retry: RetryPolicy,
}

impl OrchestratorSettings {
    /// Resolve models and keys from configuration and the environment.
    pub fn from_config(config: &Config) -> Self {
        Self {
            side1: config.models.side1.resolve(),
            side2: config.models.side2.resolve(),
            judge: config.models.judge.resolve(),
            judge_instructions: config.models.judge.instructions.clone().unwrap_or_default(),
            retry: config.generation.retry_policy(),
        }
    }

    pub fn model_for(&self, side: Side) -> &ModelSpec {
        match side {
            Side::Side1 => &self.side1,
            Side::Side2 => &self.side2,
        }
    }
}

/// Callback for debate events.
pub type DebateCallback = Box<dyn Fn(DebateEvent) + Send + Sync>;

/// Events emitted while a debate is driven.
#[derive(Debug, Clone)]
pub enum DebateEvent {
    /// A side is about to be asked for a response.
    TurnStart {
        debate_id: Uuid,
        round: usize,
        turn: usize,
        side: Side,
    },
    /// A response was generated, voiced and stored.
    TurnRecorded {
        debate_id: Uuid,
        round: usize,
        turn: usize,
        side: Side,
        content: String,
    },
    /// The judge's verdict was stored.
    VerdictReached {
        debate_id: Uuid,
        winner: Side,
        reasoning: String,
    },
    /// Full narration audio was stored.
    NarrationReady { debate_id: Uuid, audio_file: String },
}

/// A turn filled by [`DebateOrchestrator::advance_next`].
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub round: usize,
    pub turn: usize,
    pub response: Response,
}

/// Drives debates through turns, judgment and narration.
pub struct DebateOrchestrator {
    pub(crate) generator: Arc<dyn TextGenerator>,
    pub(crate) synthesizer: Arc<dyn SpeechSynthesizer>,
    pub(crate) store: Arc<dyn DebateStore>,
    pub(crate) audio: Arc<dyn AudioStore>,
    pub(crate) settings: OrchestratorSettings,
    callback: Option<DebateCallback>,
}

impl DebateOrchestrator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: Arc<dyn DebateStore>,
        audio: Arc<dyn AudioStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            generator,
            synthesizer,
            store,
            audio,
            settings,
            callback: None,
        }
    }

    /// Set a callback for debate events.
    pub fn with_callback(mut self, callback: DebateCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// The synthesis backend, for voice listings.
    pub fn synthesizer(&self) -> &dyn SpeechSynthesizer {
        self.synthesizer.as_ref()
    }

    /// Validate the input and store a new debate.
    pub async fn create_debate(&self, input: NewDebate) -> Result<Debate, DebateError> {
        let debate = Debate::create(input)?;
        self.store
            .create(&debate)
            .await
            .map_err(|source| DebateError::PersistenceFailed {
                debate_id: debate.id,
                source,
            })?;

        info!(debate_id = %debate.id, rounds = debate.rounds.len(), "created debate");
        Ok(debate)
    }

    pub async fn get_debate(&self, debate_id: Uuid) -> Result<Debate, DebateError> {
        self.store
            .get(debate_id)
            .await
            .map_err(|source| DebateError::PersistenceFailed { debate_id, source })?
            .ok_or(DebateError::DebateNotFound(debate_id))
    }

    pub async fn list_debates(&self) -> Result<Vec<Debate>, DebateError> {
        self.store.list().await.map_err(DebateError::StoreFailed)
    }

    /// Fill the `(round, turn)` slot with a generated, voiced response.
    ///
    /// The slot must be the next open one in its round. The speaker is derived
    /// from the slot, never chosen by the caller.
    pub async fn advance_turn(
        &self,
        debate_id: Uuid,
        round: usize,
        turn: usize,
    ) -> Result<Response, DebateError> {
        let debate = self.get_debate(debate_id).await?;
        debate.check_slot(round, turn)?;

        let side = debate.expected_speaker(turn);
        let persona = debate
            .persona(side)
            .ok_or(DebateError::PersonaNotConfigured { debate_id, side })?;
        let model = self.settings.model_for(side);
        if model.name.trim().is_empty() {
            return Err(DebateError::PersonaNotConfigured { debate_id, side });
        }

        self.emit_event(DebateEvent::TurnStart {
            debate_id,
            round,
            turn,
            side,
        });

        let request = GenerationRequest {
            persona: side.to_string(),
            model: model.clone(),
            system: Some(persona.instructions.clone()),
            prompt: turn_prompt(&debate, round, side),
        };
        let content = generate_with_retry(self.generator.as_ref(), &request, &self.settings.retry)
            .await?
            .text;

        let audio_file = self
            .synthesize_artifact(
                debate_id,
                &turn_audio_name(debate_id, round, turn),
                &content,
                &persona.voice_id,
            )
            .await?;

        let response = Response {
            side,
            content,
            audio_file: Some(audio_file),
            created_at: Utc::now(),
        };
        let fields = FieldUpdate {
            status: Some(DebateStatus::InProgress),
            current_round: Some(round),
            current_turn: Some(turn),
            ..Default::default()
        };

        self.store
            .conditional_append(debate_id, round, turn, response.clone(), fields)
            .await
            .map_err(|e| match e {
                StoreError::LengthMismatch { actual, .. } => DebateError::InvalidTurn {
                    debate_id,
                    round,
                    turn,
                    reason: format!("slot was filled concurrently, round now has {} responses", actual),
                },
                source => DebateError::PersistenceFailed { debate_id, source },
            })?;

        info!(%debate_id, round, turn, %side, "recorded turn");
        self.emit_event(DebateEvent::TurnRecorded {
            debate_id,
            round,
            turn,
            side,
            content: response.content.clone(),
        });

        Ok(response)
    }

    /// Fill the first open slot, as derived from the stored responses.
    pub async fn advance_next(&self, debate_id: Uuid) -> Result<TurnRecord, DebateError> {
        let debate = self.get_debate(debate_id).await?;
        let Some((round, turn)) = debate.next_slot() else {
            return Err(DebateError::InvalidTurn {
                debate_id,
                round: debate.rounds.len(),
                turn: 0,
                reason: "every round is already complete".to_string(),
            });
        };

        let response = self.advance_turn(debate_id, round, turn).await?;
        Ok(TurnRecord {
            round,
            turn,
            response,
        })
    }

    /// Synthesize `text` and store it under a deterministic artifact name.
    pub(crate) async fn synthesize_artifact(
        &self,
        debate_id: Uuid,
        artifact: &str,
        text: &str,
        voice_id: &str,
    ) -> Result<String, DebateError> {
        let audio = self
            .synthesizer
            .synthesize(text, voice_id)
            .await
            .map_err(|source| DebateError::SynthesisFailed {
                artifact: artifact.to_string(),
                source,
            })?;

        self.audio
            .put(artifact, &audio)
            .await
            .map_err(|source| DebateError::PersistenceFailed { debate_id, source })
    }

    /// Emit an event if a callback is registered.
    pub(crate) fn emit_event(&self, event: DebateEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

/// Prompt for one turn: topic, question, the round so far, then whose turn it is.
pub fn turn_prompt(debate: &Debate, round: usize, speaker: Side) -> String {
    let question = debate
        .rounds
        .get(round)
        .map(|r| r.question.as_str())
        .unwrap_or_default();

    let transcript = debate
        .rounds
        .get(round)
        .map(|r| {
            r.responses
                .iter()
                .map(|resp| format!("{}: {}", resp.side, resp.content))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    let prompt = format!(
        "{}\n\nQuestion: {}\n\nPrevious responses:\n{}\n\nYour turn to respond as {}.",
        debate.topic,
        question,
        if transcript.is_empty() { "(none yet)" } else { transcript.as_str() },
        speaker
    );
    debug!(debate_id = %debate.id, round, %speaker, "built turn prompt");
    prompt
}
