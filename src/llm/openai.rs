//! OpenAI-compatible `chat/completions` client, used for custom endpoints.

use async_trait::async_trait;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::check_status;
use super::provider::{ChatMessage, GenerateRequest, GenerateResponse, LlmProvider, Role, TokenUsage};
use crate::error::LlmError;
use crate::model::FileData;

const PROVIDER: &str = "custom";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Provider for any endpoint speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl OpenAiCompatProvider {
    pub fn new(api_key: SecretString, base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        if self.base_url.ends_with("/chat/completions") {
            self.base_url.clone()
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }

    fn build_messages(request: &GenerateRequest) -> Vec<Value> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_instruction {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.extend(request.messages.iter().map(to_message));
        messages
    }
}

fn to_message(msg: &ChatMessage) -> Value {
    let role = match msg.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    if msg.attachments.is_empty() {
        return json!({"role": role, "content": msg.content});
    }

    let mut parts: Vec<Value> = msg.attachments.iter().map(attachment_part).collect();
    parts.push(json!({"type": "text", "text": msg.content}));
    json!({"role": role, "content": parts})
}

/// Images travel as data URLs; text-like files are inlined; anything else is
/// announced by name only.
fn attachment_part(file: &FileData) -> Value {
    if file.mime_type.starts_with("image/") {
        return json!({
            "type": "image_url",
            "image_url": {"url": format!("data:{};base64,{}", file.mime_type, file.data)}
        });
    }
    let decoded = BASE64_STANDARD
        .decode(&file.data)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());
    let text = match decoded {
        Some(body) => format!("[Attached file: {}]\n{}", file.file_name, body),
        None => format!("[Attached file: {} ({})]", file.file_name, file.mime_type),
    };
    json!({"type": "text", "text": text})
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: Self::build_messages(&request),
        };
        debug!(model = %self.model, turns = body.messages.len(), "Chat completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;
        let response = check_status(PROVIDER, response).await?;
        let parsed: ChatCompletionResponse = response.json().await?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "empty reply".to_string(),
            });
        }

        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(GenerateResponse { text, usage })
    }
}
