//! Error types for the debate system.

use thiserror::Error;
use uuid::Uuid;

use crate::generation::GenerationError;
use crate::participant::Side;
use crate::store::StoreError;
use crate::synthesis::SynthesisError;

#[derive(Error, Debug)]
pub enum DebateError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Debate {0} not found")]
    DebateNotFound(Uuid),

    #[error("Invalid turn for debate {debate_id}: round {round}, turn {turn} ({reason})")]
    InvalidTurn {
        debate_id: Uuid,
        round: usize,
        turn: usize,
        reason: String,
    },

    #[error("No persona configured for {side} in debate {debate_id}")]
    PersonaNotConfigured { debate_id: Uuid, side: Side },

    #[error("Generation failed for {persona} after {attempts} attempt(s)")]
    GenerationFailed {
        persona: String,
        attempts: u32,
        #[source]
        source: GenerationError,
    },

    #[error("Speech synthesis failed for {artifact}")]
    SynthesisFailed {
        artifact: String,
        #[source]
        source: SynthesisError,
    },

    #[error("Failed to persist debate {debate_id}")]
    PersistenceFailed {
        debate_id: Uuid,
        #[source]
        source: StoreError,
    },

    #[error("Debate store error")]
    StoreFailed(#[source] StoreError),

    #[error("Debate {debate_id} is incomplete: round {round} has {responses} of {required} responses")]
    DebateIncomplete {
        debate_id: Uuid,
        round: usize,
        responses: usize,
        required: usize,
    },

    #[error("Could not parse judge verdict from output: {raw:?}")]
    UnparsableVerdict { raw: String },

    #[error("Debate {0} has not been judged yet")]
    DebateNotJudged(Uuid),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
