//! Text generation against OpenAI-compatible chat endpoints.
//!
//! [`TextGenerator`] is the seam the orchestrator talks to; [`OpenAiGenerator`]
//! is the production adapter. [`generate_with_retry`] wraps any generator with
//! the bounded-wait, fixed-delay retry policy used for every persona call.

use std::fmt;
use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::DebateError;

/// Errors from a single generation attempt.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("OpenAI API error: {0}")]
    Api(#[from] OpenAIError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Model identifier plus the credentials to reach it.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub api_key: Option<String>,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl fmt::Debug for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSpec")
            .field("name", &self.name)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One call to the generation backend.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Persona label used in logs and errors (`side1`, `side2`, `judge`).
    pub persona: String,
    pub model: ModelSpec,
    /// Persona instructions, sent as the system message when non-empty.
    pub system: Option<String>,
    pub prompt: String,
}

/// Generation backend seam.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one completion and return the raw text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Model output as returned and with reasoning blocks stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedText {
    pub raw: String,
    pub text: String,
}

/// Bounded retry for generation calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
    /// Upper bound on a single attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Call `generator` until it yields non-empty text or the policy is exhausted.
///
/// Reasoning blocks are stripped from the output; an attempt that leaves no
/// text behind counts as a failure. The unstripped output is kept for
/// diagnostics.
pub async fn generate_with_retry(
    generator: &dyn TextGenerator,
    request: &GenerationRequest,
    policy: &RetryPolicy,
) -> Result<GeneratedText, DebateError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = GenerationError::EmptyResponse;

    debug!(persona = %request.persona, model = %request.model.name, prompt = %request.prompt, "generation request");

    for attempt in 1..=attempts {
        if attempt > 1 {
            tokio::time::sleep(policy.delay).await;
        }

        let outcome = match tokio::time::timeout(policy.timeout, generator.generate(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(policy.timeout)),
        };

        match outcome.map(|raw| GeneratedText {
            text: strip_reasoning(&raw),
            raw,
        }) {
            Ok(output) if !output.text.is_empty() => {
                info!(persona = %request.persona, attempt, "generated response");
                return Ok(output);
            }
            Ok(_) => last_error = GenerationError::EmptyResponse,
            Err(e) => last_error = e,
        }

        warn!(
            persona = %request.persona,
            attempt,
            max_attempts = attempts,
            error = %last_error,
            "generation attempt failed"
        );
    }

    Err(DebateError::GenerationFailed {
        persona: request.persona.clone(),
        attempts,
        source: last_error,
    })
}

/// Generator for any OpenAI-compatible chat completion API (OpenRouter by default).
pub struct OpenAiGenerator {
    api_base: String,
    default_api_key: Option<String>,
    http_client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(
        api_base: impl Into<String>,
        default_api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()?;

        Ok(Self {
            api_base: api_base.into(),
            default_api_key,
            http_client,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let api_key = request
            .model
            .api_key
            .as_deref()
            .or(self.default_api_key.as_deref())
            .unwrap_or_default();

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&self.api_base);
        let client = Client::with_config(config).with_http_client(self.http_client.clone());

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_ref().filter(|s| !s.trim().is_empty()) {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: system.clone().into(),
                    name: None,
                },
            ));
        }
        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage {
                content: request.prompt.clone().into(),
                name: None,
            },
        ));

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model.name)
            .messages(messages)
            .build()?;

        let response = client.chat().create(chat_request).await?;

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

/// Strip reasoning blocks and markup from model output.
///
/// Removes patterns like `<thinking>...</thinking>`, orphaned tags and
/// asterisk emphasis, then tidies whitespace. Line breaks are kept because
/// the judge's verdict is line-oriented.
pub fn strip_reasoning(response: &str) -> String {
    let tags_to_strip = [
        "thinking",
        "think",
        "reflection",
        "reflect",
        "internal",
        "reasoning",
        "thought",
        "scratch",
        "scratchpad",
        "plan",
        "analysis",
    ];

    let mut result = response.to_string();

    // No backreferences in `regex`, so one pattern per tag.
    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    if let Ok(orphan_re) = regex::Regex::new(r"</?[\w]+[^>]*>") {
        result = orphan_re.replace_all(&result, "").to_string();
    }

    result = result.replace('*', "");

    if let Ok(spaces_re) = regex::Regex::new(r"[ \t]+") {
        result = spaces_re.replace_all(&result, " ").to_string();
    }
    if let Ok(blank_lines_re) = regex::Regex::new(r"\n\s*\n\s*(\n\s*)*") {
        result = blank_lines_re.replace_all(&result, "\n\n").to_string();
    }

    result
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedGenerator {
        outputs: Mutex<VecDeque<Result<String, GenerationError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedGenerator {
        fn new(outputs: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                outputs: Mutex::new(VecDeque::from(outputs)),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
            *self.calls.lock().unwrap() += 1;
            self.outputs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GenerationError::Backend("script exhausted".into())))
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            persona: "side1".to_string(),
            model: ModelSpec::new("test-model"),
            system: None,
            prompt: "Argue.".to_string(),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_after_failures() {
        let generator = ScriptedGenerator::new(vec![
            Err(GenerationError::Backend("503".into())),
            Ok("<think>hmm</think>".to_string()),
            Ok("A solid argument.".to_string()),
        ]);

        let output = generate_with_retry(&generator, &request(), &fast_policy())
            .await
            .unwrap();
        assert_eq!(output.text, "A solid argument.");
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_raw_output_kept_beside_stripped_text() {
        let generator = ScriptedGenerator::new(vec![Ok(
            "<think>weighing</think>**Verdict**: a tie, really.".to_string(),
        )]);

        let output = generate_with_retry(&generator, &request(), &fast_policy())
            .await
            .unwrap();
        assert_eq!(output.text, "Verdict: a tie, really.");
        assert_eq!(output.raw, "<think>weighing</think>**Verdict**: a tie, really.");
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let generator = ScriptedGenerator::new(vec![
            Err(GenerationError::Backend("a".into())),
            Err(GenerationError::Backend("b".into())),
            Err(GenerationError::Backend("c".into())),
            Ok("never reached".to_string()),
        ]);

        let err = generate_with_retry(&generator, &request(), &fast_policy())
            .await
            .unwrap_err();
        match err {
            DebateError::GenerationFailed {
                persona,
                attempts,
                source,
            } => {
                assert_eq!(persona, "side1");
                assert_eq!(attempts, 3);
                assert!(matches!(source, GenerationError::Backend(ref msg) if msg == "c"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_attempt_timeout_counts_as_failure() {
        let policy = RetryPolicy {
            max_attempts: 2,
            delay: Duration::ZERO,
            timeout: Duration::from_millis(20),
        };

        let err = generate_with_retry(&SlowGenerator, &request(), &policy)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DebateError::GenerationFailed {
                source: GenerationError::Timeout(_),
                attempts: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(2));
        assert_eq!(policy.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_model_spec_debug_hides_key() {
        let spec = ModelSpec::new("m").with_api_key("sk-secret");
        assert!(!format!("{spec:?}").contains("sk-secret"));
    }

    #[test]
    fn test_strip_reasoning_thinking_tags() {
        let input = "<thinking>Let me think about this...</thinking>The answer is 42.";
        assert_eq!(strip_reasoning(input), "The answer is 42.");
    }

    #[test]
    fn test_strip_reasoning_multiline_tags() {
        let input = "<think>\nMultiple\nlines\n</think>Final answer here.";
        assert_eq!(strip_reasoning(input), "Final answer here.");
    }

    #[test]
    fn test_strip_reasoning_keeps_line_breaks() {
        let input = "**Winner:** Side 2\n\n\n\nReasoning:   Stronger   evidence.";
        assert_eq!(
            strip_reasoning(input),
            "Winner: Side 2\n\nReasoning: Stronger evidence."
        );
    }

    #[test]
    fn test_strip_reasoning_no_tags() {
        let input = "No tags here, just text.";
        assert_eq!(strip_reasoning(input), input);
    }
}
