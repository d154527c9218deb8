//! Configuration module for loading TOML config files.
//!
//! Every section has defaults, so an empty file (or no file at all, via
//! [`default_config`]) yields a working setup. Secrets are never stored in
//! the file: it names the environment variables that hold them.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::DebateError;
use crate::generation::{ModelSpec, RetryPolicy};
use crate::participant::Side;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub voices: VoicesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Generation backend endpoint and retry settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// Environment variable holding the default API key.
    pub api_key_env: String,
    /// Upper bound on one generation attempt.
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: "https://openrouter.ai/api/v1".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
            retry_delay_secs: 2,
        }
    }
}

impl GenerationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            delay: Duration::from_secs(self.retry_delay_secs),
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
        }
    }

    pub fn default_api_key(&self) -> Option<String> {
        env_value(&self.api_key_env)
    }
}

/// Model bound to one persona.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelProfile {
    pub model: String,
    /// Environment variable with a persona-specific API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// System instructions; debaters take theirs from the debate instead.
    #[serde(default)]
    pub instructions: Option<String>,
}

impl ModelProfile {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key_env: None,
            instructions: None,
        }
    }

    /// Resolve the model id and its key from the environment.
    pub fn resolve(&self) -> ModelSpec {
        let spec = ModelSpec::new(self.model.clone());
        match self.api_key_env.as_deref().and_then(env_value) {
            Some(key) => spec.with_api_key(key),
            None => spec,
        }
    }
}

/// Models for both debaters and the judge.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub side1: ModelProfile,
    pub side2: ModelProfile,
    pub judge: ModelProfile,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            side1: ModelProfile {
                model: "meta-llama/llama-2-13b-chat".to_string(),
                api_key_env: Some("OPENROUTER_API_KEY_SIDE1".to_string()),
                instructions: None,
            },
            side2: ModelProfile {
                model: "mistralai/mistral-7b-instruct".to_string(),
                api_key_env: Some("OPENROUTER_API_KEY_SIDE2".to_string()),
                instructions: None,
            },
            judge: ModelProfile {
                model: "nousresearch/nous-hermes-2-mixtral-8x7b-dpo".to_string(),
                api_key_env: Some("OPENROUTER_API_KEY_JUDGE".to_string()),
                instructions: Some(DEFAULT_JUDGE_INSTRUCTIONS.to_string()),
            },
        }
    }
}

impl ModelsConfig {
    pub fn for_side(&self, side: Side) -> &ModelProfile {
        match side {
            Side::Side1 => &self.side1,
            Side::Side2 => &self.side2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisBackend {
    Elevenlabs,
    Kokoro,
}

/// Speech synthesis backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub backend: SynthesisBackend,
    pub api_base: String,
    pub api_key_env: String,
    /// ElevenLabs model id; the account default when unset.
    pub model_id: Option<String>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            backend: SynthesisBackend::Elevenlabs,
            api_base: "https://api.elevenlabs.io/v1".to_string(),
            api_key_env: "ELEVENLABS_API_KEY".to_string(),
            model_id: None,
        }
    }
}

impl SynthesisConfig {
    pub fn api_key(&self) -> Option<String> {
        env_value(&self.api_key_env)
    }
}

/// Default voices for new debates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoicesConfig {
    pub side1: String,
    pub side2: String,
    pub presenter: String,
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            side1: "pNInz6obpgDQGcFmaJgB".to_string(),
            side2: "EXAVITQu4vr4xnSDxMaL".to_string(),
            presenter: "21m00Tcm4TlvDq8ikWAM".to_string(),
        }
    }
}

impl VoicesConfig {
    pub fn for_side(&self, side: Side) -> &str {
        match side {
            Side::Side1 => &self.side1,
            Side::Side2 => &self.side2,
        }
    }
}

/// Where debate documents and audio artifacts live.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub audio_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/debates"),
            audio_dir: PathBuf::from("public/audio"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::ConfigError(format!("Failed to read config: {}", e)))?;

        content.parse()
    }
}

impl FromStr for Config {
    type Err = DebateError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        toml::from_str(content)
            .map_err(|e| DebateError::ConfigError(format!("Failed to parse config: {}", e)))
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

const DEFAULT_JUDGE_INSTRUCTIONS: &str = "You are an impartial debate judge. \
Weigh the strength of evidence, the quality of reasoning and how well each side \
answered its opponent. Do not favour a side for speaking first or last.";
