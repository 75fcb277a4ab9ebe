//! Google Gemini `generateContent` client.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::provider::{ChatMessage, GenerateRequest, GenerateResponse, LlmProvider, Role, TokenUsage};
use super::check_status;
use crate::error::LlmError;

const PROVIDER: &str = "gemini";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Gemini provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: SecretString, base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        let base = self
            .base_url
            .strip_suffix("/v1beta")
            .unwrap_or(&self.base_url);
        format!("{}/v1beta/models/{}:generateContent", base, self.model)
    }

    fn build_body(request: &GenerateRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: request.messages.iter().map(to_content).collect(),
            system_instruction: request.system_instruction.as_ref().map(|text| Content {
                role: None,
                parts: vec![Part::Text { text: text.clone() }],
            }),
            tools: if request.use_search {
                vec![Tool {
                    google_search: serde_json::json!({}),
                }]
            } else {
                Vec::new()
            },
        }
    }
}

fn to_content(msg: &ChatMessage) -> Content {
    let role = match msg.role {
        Role::User => "user",
        Role::Assistant => "model",
    };
    let mut parts: Vec<Part> = msg
        .attachments
        .iter()
        .map(|f| Part::InlineData {
            inline_data: InlineData {
                mime_type: f.mime_type.clone(),
                data: f.data.clone(),
            },
        })
        .collect();
    if !msg.content.is_empty() || parts.is_empty() {
        parts.push(Part::Text {
            text: msg.content.clone(),
        });
    }
    Content {
        role: Some(role),
        parts,
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let body = Self::build_body(&request);
        debug!(
            model = %self.model,
            turns = body.contents.len(),
            search = request.use_search,
            "Gemini request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;
        let response = check_status(PROVIDER, response).await?;
        let parsed: GenerateContentResponse = response.json().await?;

        let usage = parsed
            .usage_metadata
            .as_ref()
            .map(|u| {
                // Some responses only report the total.
                if u.prompt_token_count + u.candidates_token_count == 0 {
                    TokenUsage {
                        input_tokens: 0,
                        output_tokens: u.total_token_count,
                    }
                } else {
                    TokenUsage {
                        input_tokens: u.prompt_token_count,
                        output_tokens: u.total_token_count.saturating_sub(u.prompt_token_count),
                    }
                }
            })
            .unwrap_or_default();

        let candidate = parsed.candidates.into_iter().next();
        let text: String = candidate
            .as_ref()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter(|p| !p.thought.unwrap_or(false))
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("prompt blocked: {r}"))
                .or_else(|| {
                    candidate
                        .and_then(|c| c.finish_reason)
                        .map(|r| format!("empty reply (finish reason {r})"))
                })
                .unwrap_or_else(|| "empty reply".to_string());
            return Err(LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason,
            });
        }

        Ok(GenerateResponse { text, usage })
    }
}
