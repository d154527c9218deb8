//! The debate aggregate and its turn-order rules.
//!
//! A debate holds one round per question. Each round has a fixed number of
//! turn slots that are filled strictly in order, alternating between sides
//! starting from `first_speaker`. The authoritative position of a debate is
//! derived from the response counts; `current_round`/`current_turn` are only
//! a display hint.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DebateError;
use crate::participant::{Persona, Side};

/// Responses per round: two exchanges per side.
pub const TURNS_PER_ROUND: usize = 4;

/// Lifecycle of a debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateStatus {
    Created,
    InProgress,
    Completed,
}

/// One generated response in a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub side: Side,
    pub content: String,
    pub audio_file: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A question and the responses given to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub question: String,
    #[serde(default)]
    pub responses: Vec<Response>,
}

impl Round {
    pub fn is_full(&self) -> bool {
        self.responses.len() >= TURNS_PER_ROUND
    }
}

/// The judge's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeDecision {
    pub winner: Side,
    pub reasoning: String,
    pub audio_file: Option<String>,
}

/// Input for creating a debate.
#[derive(Debug, Clone)]
pub struct NewDebate {
    pub topic: String,
    pub questions: Vec<String>,
    pub personas: BTreeMap<Side, Persona>,
    pub first_speaker: Side,
    pub presenter_voice_id: String,
}

impl NewDebate {
    pub fn new(topic: impl Into<String>, questions: Vec<String>) -> Self {
        Self {
            topic: topic.into(),
            questions,
            personas: BTreeMap::new(),
            first_speaker: Side::Side1,
            presenter_voice_id: String::new(),
        }
    }

    pub fn with_persona(mut self, side: Side, persona: Persona) -> Self {
        self.personas.insert(side, persona);
        self
    }

    pub fn with_first_speaker(mut self, side: Side) -> Self {
        self.first_speaker = side;
        self
    }

    pub fn with_presenter_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.presenter_voice_id = voice_id.into();
        self
    }

    /// Check the input before any document is created.
    pub fn validate(&self) -> Result<(), DebateError> {
        if self.topic.trim().is_empty() {
            return Err(DebateError::ValidationError(
                "Topic cannot be empty".to_string(),
            ));
        }
        if self.questions.is_empty() {
            return Err(DebateError::ValidationError(
                "At least one question is required".to_string(),
            ));
        }
        if let Some(i) = self.questions.iter().position(|q| q.trim().is_empty()) {
            return Err(DebateError::ValidationError(format!(
                "Question {} is empty",
                i + 1
            )));
        }
        for side in Side::ALL {
            if !self.personas.contains_key(&side) {
                return Err(DebateError::ValidationError(format!(
                    "Missing persona configuration for {}",
                    side
                )));
            }
        }
        Ok(())
    }
}

/// The debate aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debate {
    pub id: Uuid,
    pub topic: String,
    pub questions: Vec<String>,
    pub persona_config: BTreeMap<Side, Persona>,
    pub first_speaker: Side,
    pub rounds: Vec<Round>,
    pub current_round: usize,
    pub current_turn: usize,
    pub status: DebateStatus,
    pub judge_decision: Option<JudgeDecision>,
    pub presenter_voice_id: String,
    pub full_debate_audio_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Debate {
    /// Build a fresh document from validated input.
    pub fn create(input: NewDebate) -> Result<Self, DebateError> {
        input.validate()?;

        let now = Utc::now();
        let rounds = input
            .questions
            .iter()
            .map(|q| Round {
                question: q.clone(),
                responses: Vec::new(),
            })
            .collect();

        Ok(Self {
            id: Uuid::new_v4(),
            topic: input.topic,
            questions: input.questions,
            persona_config: input.personas,
            first_speaker: input.first_speaker,
            rounds,
            current_round: 0,
            current_turn: 0,
            status: DebateStatus::Created,
            judge_decision: None,
            presenter_voice_id: input.presenter_voice_id,
            full_debate_audio_file: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Speaker for a turn slot: the first speaker opens, then sides alternate.
    pub fn expected_speaker(&self, turn: usize) -> Side {
        if turn % 2 == 0 {
            self.first_speaker
        } else {
            self.first_speaker.other()
        }
    }

    pub fn persona(&self, side: Side) -> Option<&Persona> {
        self.persona_config.get(&side)
    }

    /// First unfilled `(round, turn)` slot, or `None` once every round is full.
    /// For an incomplete debate the turn is also that round's response count.
    pub fn next_slot(&self) -> Option<(usize, usize)> {
        self.rounds
            .iter()
            .enumerate()
            .find(|(_, r)| !r.is_full())
            .map(|(i, r)| (i, r.responses.len()))
    }

    pub fn is_complete(&self) -> bool {
        self.rounds.iter().all(Round::is_full)
    }

    /// Check that `(round, turn)` addresses the next open slot.
    pub fn check_slot(&self, round: usize, turn: usize) -> Result<(), DebateError> {
        let invalid = |reason: String| DebateError::InvalidTurn {
            debate_id: self.id,
            round,
            turn,
            reason,
        };

        let Some(r) = self.rounds.get(round) else {
            return Err(invalid(format!(
                "debate has {} round(s)",
                self.rounds.len()
            )));
        };
        if turn >= TURNS_PER_ROUND {
            return Err(invalid(format!(
                "a round has {} turns",
                TURNS_PER_ROUND
            )));
        }
        if let Some(open) = self.rounds[..round].iter().position(|earlier| !earlier.is_full()) {
            return Err(invalid(format!("round {} is not complete", open)));
        }
        if turn != r.responses.len() {
            return Err(invalid(format!(
                "next open turn in this round is {}",
                r.responses.len()
            )));
        }
        Ok(())
    }

    /// Responses given by one side, in round order.
    pub fn responses_by(&self, side: Side) -> impl Iterator<Item = &Response> {
        self.rounds
            .iter()
            .flat_map(|r| r.responses.iter())
            .filter(move |resp| resp.side == side)
    }
}
