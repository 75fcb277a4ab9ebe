//! Plain data records persisted in the state document.

pub mod artifact;
pub mod knowledge;
pub mod provider;
pub mod session;

pub use artifact::{CorrectAnswer, MindMapNode, PlotSpec, QuestionType, QuizData, QuizQuestion, QuizResults};
pub use knowledge::{KbBlock, WpBlock, WpStatus};
pub use provider::{AiConfig, AiProvider, McpTool, McpToolType};
pub use session::{ChatSession, FileData, Message, Role, SessionSettings};

use chrono::Utc;
use uuid::Uuid;

/// Current time as epoch milliseconds, the timestamp unit of the state document.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Fresh unique identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
