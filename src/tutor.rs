//! Tutor orchestration.
//!
//! `Tutor` owns the application state, the store it persists to and the
//! factory that builds a provider for the active config. Every operation that
//! changes the tree saves it before returning. Sends take `&mut self` across
//! the provider call, so only one request can be in flight at a time.

use std::path::Path;
use std::sync::Arc;

use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, info};

use crate::artifacts::quiz;
use crate::error::{ConfigError, LlmError, Result, SessionError};
use crate::llm::{
    ChatMessage, GenerateRequest, GenerateResponse, LlmProvider, ProviderFactory, StudentContext,
    build_system_instruction,
};
use crate::model::{
    AiConfig, FileData, KbBlock, McpTool, McpToolType, Message, QuizResults, SessionSettings,
    new_id,
};
use crate::state::{AppState, PendingSend, SendOutcome, SessionUpdate};
use crate::store::{Archive, ImportSummary, StateStore, export_archive, import_archive};

/// Result of submitting the current quiz.
#[derive(Debug)]
pub struct QuizSubmission {
    pub results: QuizResults,
    /// The feedback message is sent after the results are stored, so a failed
    /// send leaves the grade in place.
    pub feedback: Result<SendOutcome>,
}

pub struct Tutor<S: StateStore> {
    state: AppState,
    store: S,
    providers: Arc<dyn ProviderFactory>,
    fallback_key: Option<SecretString>,
}

impl<S: StateStore> Tutor<S> {
    pub fn new(
        state: AppState,
        store: S,
        providers: Arc<dyn ProviderFactory>,
        fallback_key: Option<SecretString>,
    ) -> Self {
        Self {
            state,
            store,
            providers,
            fallback_key,
        }
    }

    /// Load the persisted state and wrap it.
    pub async fn load(
        store: S,
        providers: Arc<dyn ProviderFactory>,
        fallback_key: Option<SecretString>,
    ) -> Result<Self> {
        let mut state = store.load().await?;
        state.sync_current_artifacts();
        Ok(Self::new(state, store, providers, fallback_key))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether the active config can authenticate, either with its own key
    /// or the process-level one.
    pub fn has_api_key(&self) -> bool {
        self.state.active_config().api_key().is_some() || self.fallback_key.is_some()
    }

    async fn persist(&self) -> Result<()> {
        self.store.save(&self.state).await?;
        Ok(())
    }

    // ── Chat ────────────────────────────────────────────────────────

    /// Send a user message in the active session.
    pub async fn send_message(&mut self, content: &str, files: Vec<FileData>) -> Result<SendOutcome> {
        self.dispatch(content, files, None).await
    }

    /// Regenerate from an earlier point: the history is replaced by
    /// `custom_messages` and `content` is sent after it.
    pub async fn resend(
        &mut self,
        custom_messages: Vec<Message>,
        content: &str,
        files: Vec<FileData>,
    ) -> Result<SendOutcome> {
        self.dispatch(content, files, Some(custom_messages)).await
    }

    /// Re-send the last user message, dropping everything after it.
    pub async fn retry_last(&mut self) -> Result<SendOutcome> {
        let session = self
            .state
            .active_session()
            .ok_or(SessionError::NoActiveSession)?;
        let idx = session
            .last_user_index()
            .ok_or(SessionError::NothingToResend)?;
        let last = &session.messages[idx];
        let content = last.content.clone();
        let files = last.attachments().to_vec();
        let history = session.messages[..idx].to_vec();
        debug!(session_id = %session.id, kept = history.len(), "Retrying last message");
        self.resend(history, &content, files).await
    }

    async fn dispatch(
        &mut self,
        content: &str,
        files: Vec<FileData>,
        custom_messages: Option<Vec<Message>>,
    ) -> Result<SendOutcome> {
        let pending = self.state.begin_send(content, files, custom_messages)?;
        self.persist().await?;

        let config = self.state.active_config().clone();
        let request = self.build_request(&pending, &config);
        let result = match self.providers.build(&config, self.fallback_key.as_ref()) {
            Ok(provider) => call(provider.as_ref(), request).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => {
                let outcome = self
                    .state
                    .complete_send(pending, response.text, response.usage);
                self.persist().await?;
                Ok(outcome)
            }
            Err(e) => {
                self.state.fail_send(&pending, &e);
                self.persist().await?;
                Err(e.into())
            }
        }
    }

    fn build_request(&self, pending: &PendingSend, config: &AiConfig) -> GenerateRequest {
        let messages: Vec<ChatMessage> = pending.messages.iter().map(ChatMessage::from).collect();
        let request = GenerateRequest::new(messages).with_search(config.search_enabled());
        match self.state.session(&pending.session_id) {
            Some(session) => {
                let instruction = build_system_instruction(
                    config,
                    session,
                    StudentContext {
                        knowledge_base: &self.state.knowledge_base,
                        weak_points: &self.state.weak_points,
                        tools: &self.state.mcp_tools,
                    },
                );
                request.with_system_instruction(instruction)
            }
            None => request.with_system_instruction(config.system_prompt.clone()),
        }
    }

    // ── Sessions ────────────────────────────────────────────────────

    pub async fn new_session(&mut self) -> Result<String> {
        let id = self.state.new_session().id.clone();
        self.persist().await?;
        Ok(id)
    }

    pub async fn select_session(&mut self, id: &str) -> Result<()> {
        self.state.select_session(id)?;
        self.persist().await
    }

    pub async fn delete_session(&mut self, id: &str) -> Result<String> {
        let removed = self.state.delete_session(id)?;
        self.persist().await?;
        Ok(removed.title)
    }

    pub async fn rename_active(&mut self, title: &str) -> Result<()> {
        let id = self.active_id()?;
        self.state.update_session(
            &id,
            SessionUpdate {
                title: Some(title.trim().to_string()),
                ..Default::default()
            },
        )?;
        self.persist().await
    }

    /// Set or clear the active session's extra instructions.
    pub async fn set_custom_prompt(&mut self, prompt: Option<String>) -> Result<()> {
        let id = self.active_id()?;
        self.state.update_session(
            &id,
            SessionUpdate {
                custom_prompt: Some(prompt),
                ..Default::default()
            },
        )?;
        self.persist().await
    }

    pub async fn update_settings(
        &mut self,
        edit: impl FnOnce(&mut SessionSettings),
    ) -> Result<SessionSettings> {
        let id = self.active_id()?;
        let mut settings = self
            .state
            .active_session()
            .map(|s| s.settings)
            .unwrap_or_default();
        edit(&mut settings);
        self.state.update_session(
            &id,
            SessionUpdate {
                settings: Some(settings),
                ..Default::default()
            },
        )?;
        self.persist().await?;
        Ok(settings)
    }

    fn active_id(&self) -> std::result::Result<String, SessionError> {
        self.state
            .active_session_id
            .clone()
            .ok_or(SessionError::NoActiveSession)
    }

    // ── Artifacts ───────────────────────────────────────────────────

    /// Show the `index`-th quiz of the active session.
    pub async fn select_quiz(&mut self, index: usize) -> Result<()> {
        let quiz = self
            .state
            .artifacts()
            .quizzes
            .into_iter()
            .nth(index)
            .ok_or(SessionError::NoQuiz)?;
        self.state.select_quiz(quiz);
        self.persist().await
    }

    pub async fn select_mind_map(&mut self, index: usize) -> Result<()> {
        let map = self
            .state
            .artifacts()
            .mind_maps
            .into_iter()
            .nth(index)
            .ok_or(SessionError::NoMindMap)?;
        self.state.select_mind_map(map);
        self.persist().await
    }

    pub async fn answer_question(&mut self, index: usize, answer: Value) -> Result<()> {
        self.state.record_quiz_answer(index, answer)?;
        self.persist().await
    }

    /// Grade the current quiz, store the results, then send the feedback
    /// message so the tutor can follow up.
    pub async fn submit_quiz(&mut self) -> Result<QuizSubmission> {
        let current = self.state.current_quiz.clone().ok_or(SessionError::NoQuiz)?;
        if current.is_submitted() {
            return Err(SessionError::QuizAlreadySubmitted(current.id).into());
        }
        let answers = current
            .results
            .as_ref()
            .map(|r| r.user_answers.clone())
            .unwrap_or_default();
        let results = quiz::grade(&current, &answers);
        self.state.submit_quiz(&current.id, results.clone());
        self.persist().await?;

        let feedback = quiz::feedback_message(&current, &results);
        let feedback = self.send_message(&feedback, Vec::new()).await;
        Ok(QuizSubmission { results, feedback })
    }

    // ── Knowledge base and weak points ──────────────────────────────

    pub async fn add_knowledge(&mut self, content: &str, tags: Vec<String>) -> Result<KbBlock> {
        let block = self.state.add_knowledge(content.trim(), tags).clone();
        self.persist().await?;
        Ok(block)
    }

    pub async fn remove_knowledge(&mut self, id: &str) -> Result<bool> {
        let removed = self.state.remove_knowledge(id);
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    pub async fn accept_weak_point(&mut self, id: &str) -> Result<bool> {
        let changed = self.state.accept_weak_point(id);
        if changed {
            self.persist().await?;
        }
        Ok(changed)
    }

    pub async fn remove_weak_point(&mut self, id: &str) -> Result<bool> {
        let removed = self.state.remove_weak_point(id);
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    // ── Provider configs and tools ──────────────────────────────────

    pub async fn use_config(&mut self, id: &str) -> Result<()> {
        if !self.state.configs.iter().any(|c| c.id == id) {
            return Err(ConfigError::UnknownConfig(id.to_string()).into());
        }
        let configs = self.state.configs.clone();
        let tools = self.state.mcp_tools.clone();
        self.state.save_settings(configs, id.to_string(), tools);
        info!(config_id = %id, "Switched provider config");
        self.persist().await
    }

    /// Edit the active provider config in place.
    pub async fn edit_active_config(&mut self, edit: impl FnOnce(&mut AiConfig)) -> Result<AiConfig> {
        edit(self.state.active_config_mut());
        self.persist().await?;
        Ok(self.state.active_config().clone())
    }

    /// Add a provider config and make it active.
    pub async fn add_config(&mut self, config: AiConfig) -> Result<()> {
        if config.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "model".into(),
                message: "must not be empty".into(),
            }
            .into());
        }
        let mut configs = self.state.configs.clone();
        let id = config.id.clone();
        configs.push(config);
        let tools = self.state.mcp_tools.clone();
        self.state.save_settings(configs, id, tools);
        self.persist().await
    }

    pub async fn add_tool(
        &mut self,
        name: &str,
        endpoint: Option<String>,
        description: &str,
    ) -> Result<McpTool> {
        let tool = McpTool {
            id: new_id(),
            name: name.to_string(),
            description: description.to_string(),
            enabled: true,
            kind: McpToolType::Custom,
            endpoint,
        };
        let mut tools = self.state.mcp_tools.clone();
        tools.push(tool.clone());
        self.replace_tools(tools).await?;
        Ok(tool)
    }

    /// Flip a tool's enabled flag. Returns the new value.
    pub async fn toggle_tool(&mut self, id: &str) -> Result<Option<bool>> {
        let mut tools = self.state.mcp_tools.clone();
        let Some(tool) = tools.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        tool.enabled = !tool.enabled;
        let enabled = tool.enabled;
        self.replace_tools(tools).await?;
        Ok(Some(enabled))
    }

    pub async fn remove_tool(&mut self, id: &str) -> Result<bool> {
        let mut tools = self.state.mcp_tools.clone();
        let before = tools.len();
        tools.retain(|t| t.id != id);
        if tools.len() == before {
            return Ok(false);
        }
        self.replace_tools(tools).await?;
        Ok(true)
    }

    async fn replace_tools(&mut self, tools: Vec<McpTool>) -> Result<()> {
        let configs = self.state.configs.clone();
        let active = self.state.active_config_id.clone();
        self.state.save_settings(configs, active, tools);
        self.persist().await
    }

    // ── Archive ─────────────────────────────────────────────────────

    pub async fn export(&self, path: &Path) -> Result<Archive> {
        Ok(export_archive(&self.state, path).await?)
    }

    pub async fn import(&mut self, path: &Path) -> Result<ImportSummary> {
        let summary = import_archive(&mut self.state, path).await?;
        if summary.imported() > 0 {
            self.persist().await?;
        }
        Ok(summary)
    }
}

async fn call(
    provider: &dyn LlmProvider,
    request: GenerateRequest,
) -> std::result::Result<GenerateResponse, LlmError> {
    debug!(
        provider = provider.name(),
        model = provider.model_name(),
        turns = request.messages.len(),
        "Calling provider"
    );
    provider.generate(request).await
}
