mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{MockGenerator, MockSynthesizer, WELL_FORMED_VERDICT, new_debate, test_settings};
use debatecast_core::generation::GenerationRequest;
use debatecast_core::store::FieldUpdate;
use debatecast_core::{
    AudioStore, DebateOrchestrator, DebateStatus, DebateStore, GenerationError, JudgeDecision,
    MemoryAudioStore, MemoryStore, Side, SpeechSynthesizer, TURNS_PER_ROUND, TextGenerator,
};

/// Records a competing verdict in the store while the judge model is still answering.
struct CompetingJudge {
    store: Arc<MemoryStore>,
    inner: MockGenerator,
}

#[async_trait]
impl TextGenerator for CompetingJudge {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        if request.persona == "judge" {
            for debate in self.store.list().await.unwrap() {
                self.store
                    .set_fields(
                        debate.id,
                        FieldUpdate {
                            judge_decision: Some(JudgeDecision {
                                winner: Side::Side1,
                                reasoning: "decided by another caller".to_string(),
                                audio_file: None,
                            }),
                            status: Some(DebateStatus::Completed),
                            ..Default::default()
                        },
                    )
                    .await
                    .unwrap();
            }
        }
        self.inner.generate(request).await
    }
}

#[tokio::test]
async fn concurrent_verdict_is_not_overwritten() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = DebateOrchestrator::new(
        Arc::new(CompetingJudge {
            store: store.clone(),
            inner: MockGenerator::new(WELL_FORMED_VERDICT),
        }) as Arc<dyn TextGenerator>,
        Arc::new(MockSynthesizer::new()) as Arc<dyn SpeechSynthesizer>,
        store.clone() as Arc<dyn DebateStore>,
        Arc::new(MemoryAudioStore::new()) as Arc<dyn AudioStore>,
        test_settings(),
    );

    let debate = orchestrator
        .create_debate(new_debate(1, Side::Side1))
        .await
        .unwrap();
    for _ in 0..TURNS_PER_ROUND {
        orchestrator.advance_next(debate.id).await.unwrap();
    }

    // The model says Side 2, but the verdict stored first wins.
    let decision = orchestrator.judge(debate.id).await.unwrap();
    assert_eq!(decision.winner, Side::Side1);
    assert_eq!(decision.reasoning, "decided by another caller");

    let stored = store.get(debate.id).await.unwrap().unwrap();
    assert_eq!(stored.judge_decision, Some(decision));
    assert_eq!(stored.status, DebateStatus::Completed);
}
