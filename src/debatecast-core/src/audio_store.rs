//! Storage for synthesized audio artifacts.
//!
//! Artifacts are keyed by deterministic names, so a retried operation
//! overwrites its previous output instead of adding a new file.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::store::StoreError;
use crate::synthesis::SynthesizedAudio;

/// Artifact name for one turn's audio.
pub fn turn_audio_name(debate_id: Uuid, round: usize, turn: usize) -> String {
    format!("debate_{}_round_{}_turn_{}", debate_id, round, turn)
}

/// Artifact name for the judge's verdict audio.
pub fn judgement_audio_name(debate_id: Uuid) -> String {
    format!("debate_{}_judgement", debate_id)
}

/// Artifact name for the full narration.
pub fn full_audio_name(debate_id: Uuid) -> String {
    format!("debate_{}_full_audio", debate_id)
}

#[async_trait]
pub trait AudioStore: Send + Sync {
    /// Store `audio` under `name` plus the format's extension, replacing any
    /// previous artifact. Returns the stored file name.
    async fn put(&self, name: &str, audio: &SynthesizedAudio) -> Result<String, StoreError>;
}

/// Writes artifacts into a directory (e.g. `public/audio`).
pub struct FsAudioStore {
    dir: PathBuf,
}

impl FsAudioStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }
}

#[async_trait]
impl AudioStore for FsAudioStore {
    async fn put(&self, name: &str, audio: &SynthesizedAudio) -> Result<String, StoreError> {
        let file_name = format!("{}.{}", name, audio.format.extension());
        let path = self.dir.join(&file_name);
        let tmp = self.dir.join(format!("{}.tmp", file_name));

        tokio::fs::write(&tmp, &audio.bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), bytes = audio.bytes.len(), "stored audio artifact");
        Ok(file_name)
    }
}

/// Keeps artifacts in memory.
#[derive(Default)]
pub struct MemoryAudioStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryAudioStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, file_name: &str) -> Option<Vec<u8>> {
        self.files.read().await.get(file_name).cloned()
    }

    pub async fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl AudioStore for MemoryAudioStore {
    async fn put(&self, name: &str, audio: &SynthesizedAudio) -> Result<String, StoreError> {
        let file_name = format!("{}.{}", name, audio.format.extension());
        self.files
            .write()
            .await
            .insert(file_name.clone(), audio.bytes.clone());
        Ok(file_name)
    }
}
