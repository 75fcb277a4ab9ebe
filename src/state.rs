//! Application state container.
//!
//! One `AppState` tree holds every session, provider config and artifact
//! selection. All mutations go through the methods here so that the tree stays
//! consistent; persistence is the caller's job (see `tutor`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifacts::{self, SessionArtifacts};
use crate::config::default_ai_config;
use crate::error::SessionError;
use crate::llm::TokenUsage;
use crate::model::{
    AiConfig, ChatSession, FileData, KbBlock, McpTool, Message, MindMapNode, QuizData,
    QuizResults, SessionSettings, WpBlock, WpStatus,
};

/// Number of characters of the first user message used as session title.
pub const TITLE_CHARS: usize = 15;

/// Title used when the first user message is blank (attachment-only sends).
pub const FALLBACK_TITLE: &str = "New study";

/// The whole persisted client state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    #[serde(default)]
    pub sessions: Vec<ChatSession>,
    #[serde(default)]
    pub active_session_id: Option<String>,
    #[serde(default)]
    pub configs: Vec<AiConfig>,
    #[serde(default)]
    pub active_config_id: String,
    #[serde(default)]
    pub current_quiz: Option<QuizData>,
    #[serde(default)]
    pub current_mind_map: Option<MindMapNode>,
    #[serde(default)]
    pub knowledge_base: Vec<KbBlock>,
    #[serde(default)]
    pub weak_points: Vec<WpBlock>,
    #[serde(default)]
    pub mcp_tools: Vec<McpTool>,
    #[serde(default)]
    pub total_tokens_used: u64,
    #[serde(default)]
    pub quiz_results: BTreeMap<String, QuizResults>,
    /// Last visible error from a send. Never persisted.
    #[serde(skip)]
    pub last_error: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        let config = default_ai_config();
        Self {
            sessions: Vec::new(),
            active_session_id: None,
            active_config_id: config.id.clone(),
            configs: vec![config],
            current_quiz: None,
            current_mind_map: None,
            knowledge_base: Vec::new(),
            weak_points: Vec::new(),
            mcp_tools: Vec::new(),
            total_tokens_used: 0,
            quiz_results: BTreeMap::new(),
            last_error: None,
        }
    }
}

/// Partial update of a session.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub title: Option<String>,
    /// `Some(None)` clears the custom prompt.
    pub custom_prompt: Option<Option<String>>,
    pub settings: Option<SessionSettings>,
}

/// Bookkeeping for a send that is waiting on the provider.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub session_id: String,
    /// History sent to the provider, ending with the new user message.
    pub messages: Vec<Message>,
    /// Whether the exchange started from an empty history.
    pub first_exchange: bool,
    /// The user's text, used for titling.
    pub content: String,
}

/// What a completed send produced.
#[derive(Debug, Clone, Default)]
pub struct SendOutcome {
    pub reply: Option<Message>,
    pub new_weak_points: usize,
    pub quizzes: usize,
    pub mind_maps: usize,
}

impl AppState {
    // ── Invariants ──────────────────────────────────────────────────

    /// Repair a freshly loaded tree: at least one config, an active config
    /// that exists, and an active session that exists.
    pub fn normalize(&mut self) {
        if self.configs.is_empty() {
            warn!("State had no provider configs, restoring default");
            self.configs.push(default_ai_config());
        }
        if !self.configs.iter().any(|c| c.id == self.active_config_id) {
            self.active_config_id = self.configs[0].id.clone();
        }
        if let Some(id) = &self.active_session_id
            && !self.sessions.iter().any(|s| &s.id == id)
        {
            debug!(session_id = %id, "Dropping dangling active session id");
            self.active_session_id = None;
        }
    }

    // ── Sessions ────────────────────────────────────────────────────

    pub fn active_session(&self) -> Option<&ChatSession> {
        let id = self.active_session_id.as_ref()?;
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn session(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    fn session_mut(&mut self, id: &str) -> Option<&mut ChatSession> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    /// Create a session at the top of the list and make it active.
    pub fn new_session(&mut self) -> &ChatSession {
        let session = ChatSession::new();
        info!(session_id = %session.id, "Created session");
        self.active_session_id = Some(session.id.clone());
        self.current_quiz = None;
        self.current_mind_map = None;
        self.sessions.insert(0, session);
        &self.sessions[0]
    }

    /// Activate a session and reset the artifact selection.
    pub fn select_session(&mut self, id: &str) -> Result<(), SessionError> {
        if self.session(id).is_none() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        self.active_session_id = Some(id.to_string());
        self.current_quiz = None;
        self.current_mind_map = None;
        self.sync_current_artifacts();
        Ok(())
    }

    pub fn delete_session(&mut self, id: &str) -> Result<ChatSession, SessionError> {
        let pos = self
            .sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        let removed = self.sessions.remove(pos);
        if self.active_session_id.as_deref() == Some(id) {
            self.active_session_id = None;
            self.current_quiz = None;
            self.current_mind_map = None;
        }
        info!(session_id = %id, "Deleted session");
        Ok(removed)
    }

    pub fn update_session(&mut self, id: &str, update: SessionUpdate) -> Result<(), SessionError> {
        let session = self
            .session_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        if let Some(title) = update.title {
            session.title = title;
        }
        if let Some(prompt) = update.custom_prompt {
            session.custom_prompt = prompt.filter(|p| !p.trim().is_empty());
        }
        if let Some(settings) = update.settings {
            session.settings = settings;
        }
        Ok(())
    }

    // ── Provider configs ────────────────────────────────────────────

    /// The selected config, falling back to the first one.
    pub fn active_config(&self) -> &AiConfig {
        self.configs
            .iter()
            .find(|c| c.id == self.active_config_id)
            .unwrap_or(&self.configs[0])
    }

    pub fn active_config_mut(&mut self) -> &mut AiConfig {
        let idx = self
            .configs
            .iter()
            .position(|c| c.id == self.active_config_id)
            .unwrap_or(0);
        &mut self.configs[idx]
    }

    /// Replace configs and tools in one step, as the settings screen does.
    pub fn save_settings(
        &mut self,
        configs: Vec<AiConfig>,
        active_config_id: String,
        mcp_tools: Vec<McpTool>,
    ) {
        self.configs = configs;
        self.active_config_id = active_config_id;
        self.mcp_tools = mcp_tools;
        self.normalize();
    }

    // ── Artifacts ───────────────────────────────────────────────────

    /// Quizzes, mind maps and plots of the active session.
    pub fn artifacts(&self) -> SessionArtifacts {
        self.active_session()
            .map(|s| artifacts::collect_session_artifacts(s, &self.quiz_results))
            .unwrap_or_default()
    }

    /// Select the session's first quiz and mind map when none is selected.
    pub fn sync_current_artifacts(&mut self) {
        if self.current_quiz.is_some() && self.current_mind_map.is_some() {
            return;
        }
        let found = self.artifacts();
        if self.current_quiz.is_none() {
            self.current_quiz = found.quizzes.into_iter().next();
        }
        if self.current_mind_map.is_none() {
            self.current_mind_map = found.mind_maps.into_iter().next();
        }
    }

    /// Show a quiz, carrying over persisted results, or the draft answers
    /// when the same quiz is already shown and not yet submitted.
    pub fn select_quiz(&mut self, mut quiz: QuizData) {
        quiz.results = match self.quiz_results.get(&quiz.id) {
            Some(results) => Some(results.clone()),
            None => self
                .current_quiz
                .take()
                .filter(|current| current.id == quiz.id)
                .and_then(|current| current.results),
        };
        self.current_quiz = Some(quiz);
    }

    pub fn select_mind_map(&mut self, map: MindMapNode) {
        self.current_mind_map = Some(map);
    }

    /// Record a draft answer on the current quiz.
    pub fn record_quiz_answer(
        &mut self,
        index: usize,
        answer: serde_json::Value,
    ) -> Result<(), SessionError> {
        let quiz = self.current_quiz.as_mut().ok_or(SessionError::NoQuiz)?;
        if quiz.is_submitted() {
            return Err(SessionError::QuizAlreadySubmitted(quiz.id.clone()));
        }
        let count = quiz.questions.len();
        if index >= count {
            return Err(SessionError::QuestionOutOfRange { index, count });
        }
        quiz.results
            .get_or_insert_with(QuizResults::default)
            .user_answers
            .insert(index, answer);
        Ok(())
    }

    /// Persist graded results and reflect them on the current quiz.
    pub fn submit_quiz(&mut self, quiz_id: &str, results: QuizResults) {
        info!(quiz_id = %quiz_id, score = ?results.score, "Quiz submitted");
        self.quiz_results.insert(quiz_id.to_string(), results.clone());
        if let Some(quiz) = self.current_quiz.as_mut()
            && quiz.id == quiz_id
        {
            quiz.results = Some(results);
        }
    }

    // ── Knowledge base and weak points ──────────────────────────────

    pub fn add_knowledge(&mut self, content: impl Into<String>, tags: Vec<String>) -> &KbBlock {
        self.knowledge_base.insert(0, KbBlock::new(content, tags));
        &self.knowledge_base[0]
    }

    pub fn remove_knowledge(&mut self, id: &str) -> bool {
        let before = self.knowledge_base.len();
        self.knowledge_base.retain(|b| b.id != id);
        self.knowledge_base.len() != before
    }

    pub fn accept_weak_point(&mut self, id: &str) -> bool {
        match self.weak_points.iter_mut().find(|b| b.id == id) {
            Some(block) => {
                block.status = WpStatus::Accepted;
                true
            }
            None => false,
        }
    }

    pub fn remove_weak_point(&mut self, id: &str) -> bool {
        let before = self.weak_points.len();
        self.weak_points.retain(|b| b.id != id);
        self.weak_points.len() != before
    }

    /// Prepend suggested weak points, skipping any already tracked or
    /// repeated within `contents`. Returns how many were added.
    pub fn merge_suggested_weak_points(&mut self, contents: &[String]) -> usize {
        let mut known: std::collections::HashSet<String> = self
            .weak_points
            .iter()
            .map(|b| WpBlock::dedup_key(&b.content))
            .collect();
        let fresh: Vec<WpBlock> = contents
            .iter()
            .filter(|c| known.insert(WpBlock::dedup_key(c)))
            .map(|c| WpBlock::suggested(c.trim()))
            .collect();
        let added = fresh.len();
        if added > 0 {
            self.weak_points.splice(0..0, fresh);
        }
        added
    }

    // ── Send reconciliation ─────────────────────────────────────────

    /// Append the user message to the active session before the request.
    ///
    /// With `custom_messages` the history is replaced by that list first,
    /// which is how a regenerate from an earlier point works.
    pub fn begin_send(
        &mut self,
        content: &str,
        files: Vec<FileData>,
        custom_messages: Option<Vec<Message>>,
    ) -> Result<PendingSend, SessionError> {
        let session_id = self
            .active_session()
            .map(|s| s.id.clone())
            .ok_or(SessionError::NoActiveSession)?;
        let session = self
            .session_mut(&session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))?;

        let mut messages = custom_messages.unwrap_or_else(|| session.messages.clone());
        let first_exchange = messages.is_empty();
        messages.push(Message::user(content).with_files(files));
        session.messages = messages.clone();
        self.last_error = None;

        debug!(session_id = %session_id, history = messages.len(), "Send started");
        Ok(PendingSend {
            session_id,
            messages,
            first_exchange,
            content: content.to_string(),
        })
    }

    /// Fold a provider reply into the tree.
    ///
    /// The session is looked up again by id; if it was deleted while the
    /// request was in flight the reply is dropped. Suggested weak points are
    /// global and are kept either way.
    pub fn complete_send(
        &mut self,
        pending: PendingSend,
        text: String,
        usage: TokenUsage,
    ) -> SendOutcome {
        let reply = Message::assistant(text);
        let found = artifacts::extract_actions(&reply.content, &reply.id, &self.quiz_results);

        self.total_tokens_used += u64::from(usage.total());
        let new_weak_points = self.merge_suggested_weak_points(&found.weak_points);

        let Some(session) = self.session_mut(&pending.session_id) else {
            warn!(session_id = %pending.session_id, "Session vanished before reply arrived, dropping it");
            return SendOutcome {
                new_weak_points,
                ..Default::default()
            };
        };

        let mut messages = pending.messages;
        messages.push(reply.clone());
        session.messages = messages;
        if pending.first_exchange {
            let title: String = pending.content.trim().chars().take(TITLE_CHARS).collect();
            session.title = if title.is_empty() {
                FALLBACK_TITLE.to_string()
            } else {
                title
            };
        }

        if self.active_session_id.as_deref() == Some(pending.session_id.as_str()) {
            self.sync_current_artifacts();
        }

        info!(
            session_id = %pending.session_id,
            tokens = usage.total(),
            quizzes = found.quizzes.len(),
            mind_maps = found.mind_maps.len(),
            weak_points = new_weak_points,
            "Reply reconciled"
        );

        SendOutcome {
            reply: Some(reply),
            new_weak_points,
            quizzes: found.quizzes.len(),
            mind_maps: found.mind_maps.len(),
        }
    }

    /// Record a failed send. The user message stays in the history.
    pub fn fail_send(&mut self, pending: &PendingSend, error: impl std::fmt::Display) {
        let message = error.to_string();
        warn!(session_id = %pending.session_id, error = %message, "Send failed");
        self.last_error = Some(message);
    }
}
