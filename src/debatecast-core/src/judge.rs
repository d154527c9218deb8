//! Judging a completed debate.
//!
//! The judge model answers in free text; [`parse_verdict`] is the only place
//! that turns that text into a [`Verdict`].

use regex::Regex;
use tracing::info;
use uuid::Uuid;

use crate::audio_store::judgement_audio_name;
use crate::debate::{Debate, DebateStatus, JudgeDecision, TURNS_PER_ROUND};
use crate::error::DebateError;
use crate::generation::{GenerationRequest, generate_with_retry};
use crate::orchestrator::{DebateEvent, DebateOrchestrator};
use crate::participant::Side;
use crate::store::{FieldGuard, FieldUpdate, StoreError};

/// Winner and reasoning extracted from the judge's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub winner: Side,
    pub reasoning: String,
}

/// Parse `Winner: Side N` followed by `Reasoning: ...`.
///
/// Reasoning is everything after its label, trimmed. There is no best-effort
/// fallback: anything else is [`DebateError::UnparsableVerdict`] carrying the
/// raw output.
pub fn parse_verdict(raw: &str) -> Result<Verdict, DebateError> {
    let unparsable = || DebateError::UnparsableVerdict {
        raw: raw.to_string(),
    };

    let winner_re = Regex::new(r"Winner:\s*(Side 1|Side 2)").map_err(|_| unparsable())?;
    let reasoning_re = Regex::new(r"(?s)Reasoning:\s*(.*)").map_err(|_| unparsable())?;

    let winner_caps = winner_re.captures(raw).ok_or_else(unparsable)?;
    let winner = match winner_caps.get(1).map(|m| m.as_str()) {
        Some("Side 1") => Side::Side1,
        Some("Side 2") => Side::Side2,
        _ => return Err(unparsable()),
    };

    let after_winner = winner_caps
        .get(0)
        .map(|m| &raw[m.end()..])
        .unwrap_or_default();
    let reasoning = reasoning_re
        .captures(after_winner)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|r| !r.is_empty())
        .ok_or_else(unparsable)?;

    Ok(Verdict { winner, reasoning })
}

/// Prompt asking the judge to pick a winner from both sides' arguments.
pub fn judge_prompt(debate: &Debate) -> String {
    let arguments = |side: Side| {
        debate
            .responses_by(side)
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are an impartial judge. Review the following debate and decide the winner.\n\n\
         Topic: {}\n\n\
         Side 1 Arguments:\n{}\n\n\
         Side 2 Arguments:\n{}\n\n\
         Please provide your decision and reasoning in the following format:\n\
         Winner: [Side 1 or Side 2]\n\
         Reasoning: [Your detailed explanation for the decision]",
        debate.topic,
        arguments(Side::Side1),
        arguments(Side::Side2)
    )
}

impl DebateOrchestrator {
    /// Ask the judge persona for a verdict, voice it and mark the debate completed.
    ///
    /// A debate that already has a decision returns it untouched.
    pub async fn judge(&self, debate_id: Uuid) -> Result<JudgeDecision, DebateError> {
        let debate = self.get_debate(debate_id).await?;

        if let Some(decision) = &debate.judge_decision {
            info!(%debate_id, "debate already judged");
            return Ok(decision.clone());
        }
        if let Some((round, responses)) = debate.next_slot() {
            return Err(DebateError::DebateIncomplete {
                debate_id,
                round,
                responses,
                required: TURNS_PER_ROUND,
            });
        }

        let request = GenerationRequest {
            persona: "judge".to_string(),
            model: self.settings.judge.clone(),
            system: Some(self.settings.judge_instructions.clone()),
            prompt: judge_prompt(&debate),
        };
        let judgement =
            generate_with_retry(self.generator.as_ref(), &request, &self.settings.retry).await?;
        let verdict = parse_verdict(&judgement.text).map_err(|_| DebateError::UnparsableVerdict {
            raw: judgement.raw.clone(),
        })?;

        let audio_file = self
            .synthesize_artifact(
                debate_id,
                &judgement_audio_name(debate_id),
                &judgement.text,
                &debate.presenter_voice_id,
            )
            .await?;

        let decision = JudgeDecision {
            winner: verdict.winner,
            reasoning: verdict.reasoning,
            audio_file: Some(audio_file),
        };
        let stored = self
            .store
            .set_fields_once(
                debate_id,
                FieldGuard::JudgeDecision,
                FieldUpdate {
                    judge_decision: Some(decision.clone()),
                    status: Some(DebateStatus::Completed),
                    ..Default::default()
                },
            )
            .await;
        match stored {
            Ok(_) => {}
            Err(StoreError::AlreadySet { .. }) => {
                info!(%debate_id, "verdict recorded concurrently, keeping the stored one");
                return self
                    .get_debate(debate_id)
                    .await?
                    .judge_decision
                    .ok_or(DebateError::DebateNotJudged(debate_id));
            }
            Err(source) => return Err(DebateError::PersistenceFailed { debate_id, source }),
        }

        info!(%debate_id, winner = %decision.winner, "recorded verdict");
        self.emit_event(DebateEvent::VerdictReached {
            debate_id,
            winner: decision.winner,
            reasoning: decision.reasoning.clone(),
        });

        Ok(decision)
    }
}
