//! Debate document storage.
//!
//! The orchestrator never holds an in-process lock per debate. Ordering of
//! turns relies on [`DebateStore::conditional_append`], which only appends
//! when the target round still has the expected number of responses, so two
//! racing writers cannot both fill the same slot.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::debate::{Debate, DebateStatus, JudgeDecision, Response};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Debate {0} not found")]
    NotFound(Uuid),

    #[error("Debate {0} already exists")]
    AlreadyExists(Uuid),

    #[error("{field} is already set")]
    AlreadySet { field: &'static str },

    #[error("Round {round} does not exist")]
    NoSuchRound { round: usize },

    #[error("Round {round} has {actual} responses, expected {expected}")]
    LengthMismatch {
        round: usize,
        expected: usize,
        actual: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Scalar fields to set on a debate. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    pub status: Option<DebateStatus>,
    pub current_round: Option<usize>,
    pub current_turn: Option<usize>,
    pub judge_decision: Option<JudgeDecision>,
    pub full_debate_audio_file: Option<String>,
}

impl FieldUpdate {
    fn apply(self, debate: &mut Debate) {
        if let Some(status) = self.status {
            debate.status = status;
        }
        if let Some(round) = self.current_round {
            debate.current_round = round;
        }
        if let Some(turn) = self.current_turn {
            debate.current_turn = turn;
        }
        if let Some(decision) = self.judge_decision {
            debate.judge_decision = Some(decision);
        }
        if let Some(file) = self.full_debate_audio_file {
            debate.full_debate_audio_file = Some(file);
        }
        debate.updated_at = Utc::now();
    }
}

/// A set-once field that must still be empty for a guarded update to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldGuard {
    JudgeDecision,
    FullDebateAudioFile,
}

impl FieldGuard {
    fn name(self) -> &'static str {
        match self {
            FieldGuard::JudgeDecision => "judgeDecision",
            FieldGuard::FullDebateAudioFile => "fullDebateAudioFile",
        }
    }

    fn is_set(self, debate: &Debate) -> bool {
        match self {
            FieldGuard::JudgeDecision => debate.judge_decision.is_some(),
            FieldGuard::FullDebateAudioFile => debate.full_debate_audio_file.is_some(),
        }
    }
}

/// Persistent store for debate documents.
#[async_trait]
pub trait DebateStore: Send + Sync {
    async fn create(&self, debate: &Debate) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Debate>, StoreError>;

    /// All debates, oldest first.
    async fn list(&self) -> Result<Vec<Debate>, StoreError>;

    /// Push `response` onto `rounds[round].responses` only if that array
    /// currently holds `expected_len` items, then apply `fields`.
    async fn conditional_append(
        &self,
        id: Uuid,
        round: usize,
        expected_len: usize,
        response: Response,
        fields: FieldUpdate,
    ) -> Result<Debate, StoreError>;

    async fn set_fields(&self, id: Uuid, fields: FieldUpdate) -> Result<Debate, StoreError>;

    /// Apply `fields` only while the `guard` field is unset, in the same
    /// atomic step as [`DebateStore::conditional_append`].
    async fn set_fields_once(
        &self,
        id: Uuid,
        guard: FieldGuard,
        fields: FieldUpdate,
    ) -> Result<Debate, StoreError>;
}

fn apply_once(debate: &mut Debate, guard: FieldGuard, fields: FieldUpdate) -> Result<(), StoreError> {
    if guard.is_set(debate) {
        return Err(StoreError::AlreadySet {
            field: guard.name(),
        });
    }
    fields.apply(debate);
    Ok(())
}

fn apply_append(
    debate: &mut Debate,
    round: usize,
    expected_len: usize,
    response: Response,
    fields: FieldUpdate,
) -> Result<(), StoreError> {
    let target = debate
        .rounds
        .get_mut(round)
        .ok_or(StoreError::NoSuchRound { round })?;
    if target.responses.len() != expected_len {
        return Err(StoreError::LengthMismatch {
            round,
            expected: expected_len,
            actual: target.responses.len(),
        });
    }
    target.responses.push(response);
    fields.apply(debate);
    Ok(())
}

/// In-process store, used by tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    debates: RwLock<HashMap<Uuid, Debate>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DebateStore for MemoryStore {
    async fn create(&self, debate: &Debate) -> Result<(), StoreError> {
        let mut debates = self.debates.write().await;
        if debates.contains_key(&debate.id) {
            return Err(StoreError::AlreadyExists(debate.id));
        }
        debates.insert(debate.id, debate.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Debate>, StoreError> {
        Ok(self.debates.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Debate>, StoreError> {
        let mut all: Vec<Debate> = self.debates.read().await.values().cloned().collect();
        all.sort_by_key(|d| d.created_at);
        Ok(all)
    }

    async fn conditional_append(
        &self,
        id: Uuid,
        round: usize,
        expected_len: usize,
        response: Response,
        fields: FieldUpdate,
    ) -> Result<Debate, StoreError> {
        let mut debates = self.debates.write().await;
        let debate = debates.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        apply_append(debate, round, expected_len, response, fields)?;
        Ok(debate.clone())
    }

    async fn set_fields(&self, id: Uuid, fields: FieldUpdate) -> Result<Debate, StoreError> {
        let mut debates = self.debates.write().await;
        let debate = debates.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        fields.apply(debate);
        Ok(debate.clone())
    }

    async fn set_fields_once(
        &self,
        id: Uuid,
        guard: FieldGuard,
        fields: FieldUpdate,
    ) -> Result<Debate, StoreError> {
        let mut debates = self.debates.write().await;
        let debate = debates.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        apply_once(debate, guard, fields)?;
        Ok(debate.clone())
    }
}

/// One JSON document per debate under a directory.
///
/// Read-modify-write cycles are serialized by an async mutex, so the
/// conditional append is only atomic for writers sharing this instance.
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn read(&self, id: Uuid) -> Result<Option<Debate>, StoreError> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temp file so readers never see a torn document.
    async fn write(&self, debate: &Debate) -> Result<(), StoreError> {
        let path = self.path_for(debate.id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(debate)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), "wrote debate document");
        Ok(())
    }
}

#[async_trait]
impl DebateStore for JsonFileStore {
    async fn create(&self, debate: &Debate) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        if self.read(debate.id).await?.is_some() {
            return Err(StoreError::AlreadyExists(debate.id));
        }
        self.write(debate).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Debate>, StoreError> {
        self.read(id).await
    }

    async fn list(&self) -> Result<Vec<Debate>, StoreError> {
        let mut all = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            all.push(serde_json::from_slice::<Debate>(&bytes)?);
        }
        all.sort_by_key(|d| d.created_at);
        Ok(all)
    }

    async fn conditional_append(
        &self,
        id: Uuid,
        round: usize,
        expected_len: usize,
        response: Response,
        fields: FieldUpdate,
    ) -> Result<Debate, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut debate = self.read(id).await?.ok_or(StoreError::NotFound(id))?;
        apply_append(&mut debate, round, expected_len, response, fields)?;
        self.write(&debate).await?;
        Ok(debate)
    }

    async fn set_fields(&self, id: Uuid, fields: FieldUpdate) -> Result<Debate, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut debate = self.read(id).await?.ok_or(StoreError::NotFound(id))?;
        fields.apply(&mut debate);
        self.write(&debate).await?;
        Ok(debate)
    }

    async fn set_fields_once(
        &self,
        id: Uuid,
        guard: FieldGuard,
        fields: FieldUpdate,
    ) -> Result<Debate, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut debate = self.read(id).await?.ok_or(StoreError::NotFound(id))?;
        apply_once(&mut debate, guard, fields)?;
        self.write(&debate).await?;
        Ok(debate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::NewDebate;
    use crate::participant::{Persona, Side};

    fn sample_debate() -> Debate {
        let input = NewDebate::new("Topic", vec!["Q1".to_string(), "Q2".to_string()])
            .with_persona(Side::Side1, Persona::new("", "v1"))
            .with_persona(Side::Side2, Persona::new("", "v2"));
        Debate::create(input).unwrap()
    }

    fn response(side: Side, content: &str) -> Response {
        Response {
            side,
            content: content.to_string(),
            audio_file: None,
            created_at: Utc::now(),
        }
    }

    async fn exercise_conditional_append(store: &dyn DebateStore) {
        let debate = sample_debate();
        store.create(&debate).await.unwrap();

        let updated = store
            .conditional_append(
                debate.id,
                0,
                0,
                response(Side::Side1, "first"),
                FieldUpdate {
                    status: Some(DebateStatus::InProgress),
                    current_round: Some(0),
                    current_turn: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.rounds[0].responses.len(), 1);
        assert_eq!(updated.status, DebateStatus::InProgress);
        assert!(updated.updated_at >= debate.updated_at);

        // Same expected length again loses the race.
        let err = store
            .conditional_append(
                debate.id,
                0,
                0,
                response(Side::Side1, "duplicate"),
                FieldUpdate::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::LengthMismatch {
                expected: 0,
                actual: 1,
                ..
            }
        ));

        let err = store
            .conditional_append(debate.id, 5, 0, response(Side::Side1, "x"), FieldUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoSuchRound { round: 5 }));

        let stored = store.get(debate.id).await.unwrap().unwrap();
        assert_eq!(stored.rounds[0].responses.len(), 1);
        assert_eq!(stored.rounds[0].responses[0].content, "first");
    }

    async fn exercise_set_fields_once(store: &dyn DebateStore) {
        let debate = sample_debate();
        store.create(&debate).await.unwrap();

        let verdict = |winner: Side, reasoning: &str| FieldUpdate {
            judge_decision: Some(JudgeDecision {
                winner,
                reasoning: reasoning.to_string(),
                audio_file: None,
            }),
            status: Some(DebateStatus::Completed),
            ..Default::default()
        };

        store
            .set_fields_once(debate.id, FieldGuard::JudgeDecision, verdict(Side::Side2, "first"))
            .await
            .unwrap();
        let err = store
            .set_fields_once(debate.id, FieldGuard::JudgeDecision, verdict(Side::Side1, "second"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::AlreadySet {
                field: "judgeDecision"
            }
        ));

        let stored = store.get(debate.id).await.unwrap().unwrap();
        let decision = stored.judge_decision.unwrap();
        assert_eq!(decision.winner, Side::Side2);
        assert_eq!(decision.reasoning, "first");

        // Guards are per field.
        let narrated = store
            .set_fields_once(
                debate.id,
                FieldGuard::FullDebateAudioFile,
                FieldUpdate {
                    full_debate_audio_file: Some("full.mp3".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(narrated.full_debate_audio_file.as_deref(), Some("full.mp3"));
        assert!(
            store
                .set_fields_once(debate.id, FieldGuard::FullDebateAudioFile, FieldUpdate::default())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_memory_store_set_fields_once() {
        exercise_set_fields_once(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_file_store_set_fields_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        exercise_set_fields_once(&store).await;
    }

    #[tokio::test]
    async fn test_memory_store_conditional_append() {
        exercise_conditional_append(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_file_store_conditional_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        exercise_conditional_append(&store).await;
    }

    #[tokio::test]
    async fn test_missing_debate() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        assert!(store.get(id).await.unwrap().is_none());
        assert!(matches!(
            store.set_fields(id, FieldUpdate::default()).await,
            Err(StoreError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = MemoryStore::new();
        let debate = sample_debate();
        store.create(&debate).await.unwrap();
        assert!(matches!(
            store.create(&debate).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let debate = sample_debate();
        {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            store.create(&debate).await.unwrap();
            store
                .set_fields(
                    debate.id,
                    FieldUpdate {
                        full_debate_audio_file: Some("full.mp3".to_string()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let reopened = JsonFileStore::open(dir.path()).await.unwrap();
        let listed = reopened.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, debate.id);
        assert_eq!(listed[0].full_debate_audio_file.as_deref(), Some("full.mp3"));
        assert_eq!(listed[0].rounds.len(), listed[0].questions.len());
    }
}
