//! DebateCast Core Library
//!
//! Turn-taking, judging and narration for two-persona AI debates, with
//! pluggable generation, speech and storage backends.

pub mod audio_store;
pub mod config;
pub mod debate;
pub mod error;
pub mod generation;
pub mod judge;
#[cfg(feature = "kokoro")]
pub mod kokoro;
pub mod narration;
pub mod orchestrator;
pub mod participant;
pub mod store;
pub mod synthesis;

pub use audio_store::{AudioStore, FsAudioStore, MemoryAudioStore};
pub use config::{Config, SynthesisBackend, default_config};
pub use debate::{Debate, DebateStatus, JudgeDecision, NewDebate, Response, Round, TURNS_PER_ROUND};
pub use error::DebateError;
pub use generation::{GenerationError, OpenAiGenerator, RetryPolicy, TextGenerator};
pub use judge::{Verdict, parse_verdict};
pub use orchestrator::{DebateCallback, DebateEvent, DebateOrchestrator, OrchestratorSettings, TurnRecord};
pub use participant::{Persona, Side};
pub use store::{DebateStore, JsonFileStore, MemoryStore, StoreError};
pub use synthesis::{ElevenLabsSynthesizer, SpeechSynthesizer, SynthesisError, Voice};
