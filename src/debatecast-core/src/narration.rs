//! Full-debate narration: one script, one synthesis call, presenter voice.

use tracing::info;
use uuid::Uuid;

use crate::audio_store::full_audio_name;
use crate::debate::{Debate, JudgeDecision};
use crate::error::DebateError;
use crate::orchestrator::{DebateEvent, DebateOrchestrator};
use crate::store::{FieldGuard, FieldUpdate, StoreError};

/// Linearize a judged debate into the presenter's script.
pub fn narration_script(debate: &Debate, decision: &JudgeDecision) -> String {
    let mut script = format!(
        "Welcome to our AI debate on the topic: {}. \
         Two AI opponents will take this topic on, round by round. Let's begin!\n\n",
        debate.topic
    );

    for (i, round) in debate.rounds.iter().enumerate() {
        script.push_str(&format!("Round {}, Question: {}\n\n", i + 1, round.question));
        for response in &round.responses {
            script.push_str(&format!(
                "{}: {}\n\n",
                response.side.friendly_name(),
                response.content
            ));
        }
        if i + 1 < debate.rounds.len() {
            script.push_str("Now, let's move on to the next round.\n\n");
        }
    }

    script.push_str(&format!(
        "The debate has concluded. The winner is {}. The reasoning for this decision is: {}\n\n",
        decision.winner.friendly_name(),
        decision.reasoning
    ));
    script.push_str("Thank you for listening to our AI debate. We hope you found it informative.");
    script
}

impl DebateOrchestrator {
    /// Voice the whole debate plus verdict as a single artifact.
    ///
    /// Requires a verdict. Once stored, the same reference is returned on
    /// every later call.
    pub async fn compose_full_narration(&self, debate_id: Uuid) -> Result<String, DebateError> {
        let debate = self.get_debate(debate_id).await?;

        let Some(decision) = &debate.judge_decision else {
            return Err(DebateError::DebateNotJudged(debate_id));
        };
        if let Some(existing) = &debate.full_debate_audio_file {
            info!(%debate_id, "narration already composed");
            return Ok(existing.clone());
        }

        let script = narration_script(&debate, decision);
        let audio_file = self
            .synthesize_artifact(
                debate_id,
                &full_audio_name(debate_id),
                &script,
                &debate.presenter_voice_id,
            )
            .await?;

        let stored = self
            .store
            .set_fields_once(
                debate_id,
                FieldGuard::FullDebateAudioFile,
                FieldUpdate {
                    full_debate_audio_file: Some(audio_file.clone()),
                    ..Default::default()
                },
            )
            .await;
        match stored {
            Ok(_) => {}
            Err(StoreError::AlreadySet { .. }) => {
                info!(%debate_id, "narration recorded concurrently, keeping the stored one");
                return self
                    .get_debate(debate_id)
                    .await?
                    .full_debate_audio_file
                    .ok_or(DebateError::DebateNotJudged(debate_id));
            }
            Err(source) => return Err(DebateError::PersistenceFailed { debate_id, source }),
        }

        info!(%debate_id, %audio_file, "composed full narration");
        self.emit_event(DebateEvent::NarrationReady {
            debate_id,
            audio_file: audio_file.clone(),
        });

        Ok(audio_file)
    }
}
