//! HTTP client for an OpenRouter-style chat-completions API.
//!
//! [`GenerationClient`] is the reference [`Generator`] implementation. Plan
//! requests run in JSON mode and the response content is passed through
//! [`extract_json`], which tolerates markdown fences and prose wrapping —
//! collaborators degrade to those shapes routinely. Errors keep the
//! `"HTTP <status>: <body>"` format so [`classify`](super::retry::classify)
//! can route them.

use crate::{
    COMPACTION_MAX_TOKENS, CompletionFuture, DEFAULT_MODEL, Generator, PLAN_MAX_TOKENS,
    PlanConstraints, PlanFuture,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Chat-completions endpoint used by the default client.
pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// System message for structured plan requests.
const PLAN_SYSTEM_PROMPT: &str = "\
You are a story-planning assistant. You respond with a single JSON object and \
nothing else — no commentary, no markdown fences. Follow the count and format \
instructions in the request exactly.";

// ── Wire types ─────────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// JSON output format type.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub enum ResponseFormatType {
    #[serde(rename = "json_object")]
    JsonObject,
}

/// JSON output mode.
#[derive(Serialize, Clone, Debug)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub fmt_type: ResponseFormatType,
}

/// Chat completion request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "is_zero_f32")]
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
fn is_zero_f32(v: &f32) -> bool {
    *v == 0.0
}

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the chat-completions API.
pub struct GenerationClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl GenerationClient {
    /// Create a client with the given API key, default endpoint and model.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("plotloom/0.1")
            .timeout(Duration::from_secs(180))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: OPENROUTER_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Override the chat-completions endpoint (for proxies and test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Send a chat completion request and return the content of the first choice.
    pub async fn chat(&self, body: &ChatRequest) -> Result<String, String> {
        debug!(
            "generation request: model={}, messages={}, max_tokens={}",
            body.model.as_deref().unwrap_or("(default)"),
            body.messages.len(),
            body.max_tokens,
        );
        trace!(
            "request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "generation response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("generation API HTTP {status}: {text}"));
        }

        let parsed: RawChatResponse =
            serde_json::from_str(&text).map_err(|e| format!("failed to parse response: {e}"))?;

        if let Some(err) = parsed.error {
            return Err(format!("generation API error: {}", err.message));
        }

        if let Some(ref usage) = parsed.usage {
            debug!(
                "token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0),
            );
        }

        parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content)
            .ok_or_else(|| "empty generation response".to_string())
    }
}

impl Generator for GenerationClient {
    fn plan(&self, prompt: &str, constraints: PlanConstraints) -> PlanFuture<'_> {
        let prompt = prompt.to_string();
        Box::pin(async move {
            debug!(
                "plan request: {} chapter(s), {} segment(s)",
                constraints.expected_chapters, constraints.segment_count,
            );
            let body = ChatRequest {
                model: Some(self.model.clone()),
                messages: vec![Message::system(PLAN_SYSTEM_PROMPT), Message::user(prompt)],
                max_tokens: PLAN_MAX_TOKENS,
                temperature: 0.7,
                response_format: Some(ResponseFormat {
                    fmt_type: ResponseFormatType::JsonObject,
                }),
            };
            let content = self.chat(&body).await?;
            extract_json(&content)
        })
    }

    fn complete(&self, system: &str, user: &str) -> CompletionFuture<'_> {
        let system = system.to_string();
        let user = user.to_string();
        Box::pin(async move {
            let body = ChatRequest {
                model: Some(self.model.clone()),
                messages: vec![Message::system(system), Message::user(user)],
                max_tokens: COMPACTION_MAX_TOKENS,
                temperature: 0.3,
                response_format: None,
            };
            self.chat(&body).await
        })
    }
}

// ── JSON extraction ────────────────────────────────────────────────

/// Extract a JSON object from model output.
///
/// Tries, in order: the text as-is, the contents of a markdown code fence,
/// and the span from the first `{` to the last `}`. Models asked for bare
/// JSON still wrap it in fences or prose often enough that all three are
/// needed.
pub fn extract_json(text: &str) -> Result<serde_json::Value, String> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    if let Some(inner) = fenced_block(trimmed)
        && let Ok(value) = serde_json::from_str(inner)
    {
        return Ok(value);
    }

    if let Some(start) = trimmed.find('{')
        && let Some(end) = trimmed.rfind('}')
        && start < end
        && let Some(span) = trimmed.get(start..=end)
        && let Ok(value) = serde_json::from_str(span)
    {
        return Ok(value);
    }

    Err(format!(
        "no JSON object found in generation output ({} chars)",
        text.chars().count()
    ))
}

/// The contents of the first ``` fence in `text`, if any.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = text.get(open + 3..)?;
    // Skip a language tag on the fence line.
    let body_start = after_open.find('\n')? + 1;
    let body = after_open.get(body_start..)?;
    let close = body.find("```")?;
    body.get(..close).map(str::trim)
}
