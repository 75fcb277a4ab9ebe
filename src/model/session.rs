//! Chat sessions and messages.

use serde::{Deserialize, Serialize};

use super::{new_id, now_millis};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A file attached to a user message, base64 encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub data: String,
    pub file_name: String,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileData>>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role,
            content: content.into(),
            timestamp: now_millis(),
            files: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Builder: attach files. An empty list is stored as no attachment.
    pub fn with_files(mut self, files: Vec<FileData>) -> Self {
        self.files = if files.is_empty() { None } else { Some(files) };
        self
    }

    pub fn attachments(&self) -> &[FileData] {
        self.files.as_deref().unwrap_or(&[])
    }
}

/// Per-session context switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    pub use_knowledge_base: bool,
    pub use_weak_points: bool,
    #[serde(rename = "useMCP")]
    pub use_mcp: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            use_knowledge_base: true,
            use_weak_points: true,
            use_mcp: true,
        }
    }
}

/// A chat session with its full message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub settings: SessionSettings,
}

impl ChatSession {
    /// Title given to sessions before their first exchange.
    pub const DEFAULT_TITLE: &'static str = "New session";

    pub fn new() -> Self {
        Self {
            id: new_id(),
            title: Self::DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now_millis(),
            custom_prompt: None,
            settings: SessionSettings::default(),
        }
    }

    /// Custom prompt, ignoring blank values.
    pub fn custom_prompt(&self) -> Option<&str> {
        self.custom_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Index of the most recent user message.
    pub fn last_user_index(&self) -> Option<usize> {
        self.messages.iter().rposition(|m| m.role == Role::User)
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_defaults() {
        let session = ChatSession::new();
        assert_eq!(session.title, ChatSession::DEFAULT_TITLE);
        assert!(session.messages.is_empty());
        assert!(session.settings.use_knowledge_base);
        assert!(session.settings.use_weak_points);
        assert!(session.settings.use_mcp);
        assert!(session.custom_prompt().is_none());
    }

    #[test]
    fn settings_serialize_with_original_keys() {
        let json = serde_json::to_value(SessionSettings::default()).unwrap();
        assert_eq!(json["useKnowledgeBase"], true);
        assert_eq!(json["useWeakPoints"], true);
        assert_eq!(json["useMCP"], true);
    }

    #[test]
    fn message_without_files_omits_field() {
        let msg = Message::user("hi").with_files(vec![]);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("files"));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn blank_custom_prompt_is_ignored() {
        let mut session = ChatSession::new();
        session.custom_prompt = Some("   ".into());
        assert!(session.custom_prompt().is_none());
        session.custom_prompt = Some(" focus on calculus ".into());
        assert_eq!(session.custom_prompt(), Some("focus on calculus"));
    }

    #[test]
    fn last_user_index_skips_assistant() {
        let mut session = ChatSession::new();
        session.messages.push(Message::user("q1"));
        session.messages.push(Message::assistant("a1"));
        session.messages.push(Message::user("q2"));
        session.messages.push(Message::assistant("a2"));
        assert_eq!(session.last_user_index(), Some(2));
    }

    #[test]
    fn session_parses_legacy_document_without_settings() {
        let json = r#"{"id":"1","title":"t","messages":[],"createdAt":5}"#;
        let session: ChatSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.settings, SessionSettings::default());
    }
}
