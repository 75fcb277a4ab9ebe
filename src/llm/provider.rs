//! Provider-neutral request/response types and the `LlmProvider` trait.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::model::{FileData, Message, Role as MessageRole};

/// Conversation role as providers see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One turn of conversation sent to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub attachments: Vec<FileData>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<FileData>) -> Self {
        self.attachments = attachments;
        self
    }
}

impl From<&Message> for ChatMessage {
    /// Tool output is replayed to the model as user-side context.
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            MessageRole::Assistant => Role::Assistant,
            MessageRole::User | MessageRole::Tool => Role::User,
        };
        Self {
            role,
            content: msg.content.clone(),
            attachments: msg.attachments().to_vec(),
        }
    }
}

/// A generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub messages: Vec<ChatMessage>,
    /// Ask the provider to ground answers with web search, where supported.
    pub use_search: bool,
}

impl GenerateRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        self.system_instruction = if instruction.trim().is_empty() {
            None
        } else {
            Some(instruction)
        };
        self
    }

    pub fn with_search(mut self, enabled: bool) -> Self {
        self.use_search = enabled;
        self
    }
}

/// Token usage from an LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Generated text plus usage.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub text: String,
    pub usage: TokenUsage,
}

/// A generative-AI backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider label used in errors and logs.
    fn name(&self) -> &str;

    fn model_name(&self) -> &str;

    /// Generate one reply for the conversation.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_messages_map_to_user() {
        let mut msg = Message::user("tool output");
        msg.role = MessageRole::Tool;
        assert_eq!(ChatMessage::from(&msg).role, Role::User);
        assert_eq!(ChatMessage::from(&Message::assistant("a")).role, Role::Assistant);
    }

    #[test]
    fn blank_system_instruction_is_dropped() {
        let req = GenerateRequest::new(vec![]).with_system_instruction("  ");
        assert!(req.system_instruction.is_none());
    }

    #[test]
    fn usage_total() {
        let usage = TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        };
        assert_eq!(usage.total(), 15);
    }
}
