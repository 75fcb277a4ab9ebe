//! End-to-end tutor flows against a scripted provider and an in-memory store.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::json;

use scholar::error::{Error, LlmError, SessionError};
use scholar::llm::{
    GenerateRequest, GenerateResponse, HttpProviderFactory, LlmProvider, ProviderFactory, Role,
    TokenUsage,
};
use scholar::model::{AiConfig, WpStatus};
use scholar::store::MemoryStore;
use scholar::tutor::Tutor;

const QUIZ_REPLY: &str = r#"Let's check your understanding.
```json
{"action":"GENERATE_QUIZ","data":{"title":"Derivatives","questions":[
  {"type":"multiple_choice","question":"d/dx x^2","options":["x","2x"],"correctAnswer":1,"explanation":"power rule"},
  {"type":"true_false","question":"d/dx c = 0","correctAnswer":true}
]}}
```
```json
{"action":"SUGGEST_WEAK_POINT","data":{"content":"Power rule"}}
```"#;

const MAP_REPLY: &str = r#"```json
{"action":"GENERATE_MINDMAP","data":{"label":"Calculus","children":[{"label":"Limits"},{"label":"Derivatives"}]}}
```"#;

/// Provider that replays scripted replies and records every request.
#[derive(Default)]
struct StubLlm {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl StubLlm {
    fn with_replies(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::default(),
        })
    }

    fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    fn name(&self) -> &str {
        "stub"
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()));
        next.map(|text| GenerateResponse {
            text,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        })
    }
}

struct StubFactory(Arc<StubLlm>);

impl ProviderFactory for StubFactory {
    fn build(
        &self,
        _config: &AiConfig,
        _fallback_key: Option<&SecretString>,
    ) -> Result<Arc<dyn LlmProvider>, LlmError> {
        Ok(self.0.clone())
    }
}

async fn tutor(stub: &Arc<StubLlm>) -> Tutor<MemoryStore> {
    Tutor::load(MemoryStore::new(), Arc::new(StubFactory(stub.clone())), None)
        .await
        .unwrap()
}

#[tokio::test]
async fn chat_round_trip_persists_and_titles() {
    let stub = StubLlm::with_replies(vec![Ok("A limit describes approach.".into())]);
    let mut tutor = tutor(&stub).await;
    tutor.new_session().await.unwrap();

    let outcome = tutor.send_message("Explain limits to me please", vec![]).await.unwrap();
    assert_eq!(outcome.reply.unwrap().content, "A limit describes approach.");

    let saved = tutor.store().snapshot().await.unwrap();
    let session = saved.active_session().unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.title, "Explain limits ");
    assert_eq!(saved.total_tokens_used, 15);
}

#[tokio::test]
async fn request_carries_history_and_student_context() {
    let stub = StubLlm::with_replies(vec![]);
    let mut tutor = tutor(&stub).await;
    tutor.new_session().await.unwrap();
    tutor.add_knowledge("Area of a circle is πr²", vec!["geometry".into()]).await.unwrap();
    tutor.set_custom_prompt(Some("Use short answers".into())).await.unwrap();

    tutor.send_message("first", vec![]).await.unwrap();
    tutor.send_message("second", vec![]).await.unwrap();

    let requests = stub.requests();
    let last = requests.last().unwrap();
    assert_eq!(last.messages.len(), 3);
    assert_eq!(last.messages[0].content, "first");
    assert_eq!(last.messages[1].role, Role::Assistant);
    let system = last.system_instruction.as_deref().unwrap();
    assert!(system.contains("Use short answers"));
    assert!(system.contains("Area of a circle is πr² (tags: geometry)"));
    assert!(!last.use_search);
}

#[tokio::test]
async fn disabled_knowledge_base_is_left_out() {
    let stub = StubLlm::with_replies(vec![]);
    let mut tutor = tutor(&stub).await;
    tutor.new_session().await.unwrap();
    tutor.add_knowledge("secret note", vec![]).await.unwrap();
    tutor.update_settings(|s| s.use_knowledge_base = false).await.unwrap();

    tutor.send_message("hi", vec![]).await.unwrap();
    let system = stub.requests()[0].system_instruction.clone().unwrap();
    assert!(!system.contains("secret note"));
}

#[tokio::test]
async fn failed_send_keeps_message_and_records_error() {
    let stub = StubLlm::with_replies(vec![Err(LlmError::AuthFailed {
        provider: "stub".into(),
    })]);
    let mut tutor = tutor(&stub).await;
    tutor.new_session().await.unwrap();

    let err = tutor.send_message("hello", vec![]).await.unwrap_err();
    assert!(matches!(err, Error::Llm(LlmError::AuthFailed { .. })));
    let state = tutor.state();
    assert_eq!(state.active_session().unwrap().messages.len(), 1);
    assert!(state.last_error.as_deref().unwrap().contains("Authentication failed"));
}

#[tokio::test]
async fn missing_key_surfaces_as_llm_error() {
    let mut tutor = Tutor::load(MemoryStore::new(), Arc::new(HttpProviderFactory), None)
        .await
        .unwrap();
    assert!(!tutor.has_api_key());
    tutor.new_session().await.unwrap();
    let err = tutor.send_message("hello", vec![]).await.unwrap_err();
    assert!(matches!(err, Error::Llm(LlmError::MissingApiKey { .. })));
}

#[tokio::test]
async fn send_without_session_is_rejected() {
    let stub = StubLlm::with_replies(vec![]);
    let mut tutor = tutor(&stub).await;
    let err = tutor.send_message("hello", vec![]).await.unwrap_err();
    assert!(matches!(err, Error::Session(SessionError::NoActiveSession)));
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn retry_drops_everything_after_last_user_message() {
    let stub = StubLlm::with_replies(vec![Ok("first answer".into()), Ok("better answer".into())]);
    let mut tutor = tutor(&stub).await;
    tutor.new_session().await.unwrap();
    tutor.send_message("question", vec![]).await.unwrap();

    tutor.retry_last().await.unwrap();
    let session = tutor.state().active_session().unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].content, "question");
    assert_eq!(session.messages[1].content, "better answer");
    assert_eq!(stub.requests()[1].messages.len(), 1);
}

#[tokio::test]
async fn quiz_flow_grades_and_sends_feedback() {
    let stub = StubLlm::with_replies(vec![Ok(QUIZ_REPLY.into()), Ok("Good work.".into())]);
    let mut tutor = tutor(&stub).await;
    tutor.new_session().await.unwrap();

    let outcome = tutor.send_message("quiz me on derivatives", vec![]).await.unwrap();
    assert_eq!(outcome.quizzes, 1);
    assert_eq!(outcome.new_weak_points, 1);
    assert_eq!(tutor.state().weak_points[0].status, WpStatus::Suggested);

    let quiz_id = tutor.state().current_quiz.as_ref().unwrap().id.clone();
    tutor.answer_question(0, json!(1)).await.unwrap();
    tutor.answer_question(1, json!(false)).await.unwrap();

    let submission = tutor.submit_quiz().await.unwrap();
    assert_eq!(submission.results.score, Some(1));
    assert!(submission.feedback.is_ok());

    let state = tutor.state();
    assert!(state.quiz_results[&quiz_id].submitted);
    let feedback = &stub.requests()[1];
    let sent = &feedback.messages.last().unwrap().content;
    assert!(sent.starts_with("I finished the quiz \"Derivatives\" and scored 1/2."));

    // A second submit is refused.
    assert!(matches!(
        tutor.submit_quiz().await,
        Err(Error::Session(SessionError::QuizAlreadySubmitted(_)))
    ));
}

#[tokio::test]
async fn artifacts_can_be_selected_by_position() {
    let stub = StubLlm::with_replies(vec![Ok(MAP_REPLY.into())]);
    let mut tutor = tutor(&stub).await;
    tutor.new_session().await.unwrap();
    tutor.send_message("map calculus", vec![]).await.unwrap();

    tutor.select_mind_map(0).await.unwrap();
    let map = tutor.state().current_mind_map.as_ref().unwrap();
    assert_eq!(map.label, "Calculus");
    assert_eq!(map.children().len(), 2);

    assert!(matches!(
        tutor.select_mind_map(3).await,
        Err(Error::Session(SessionError::NoMindMap))
    ));
    assert!(matches!(
        tutor.select_quiz(0).await,
        Err(Error::Session(SessionError::NoQuiz))
    ));
}

#[tokio::test]
async fn settings_changes_are_persisted() {
    let stub = StubLlm::with_replies(vec![]);
    let mut tutor = tutor(&stub).await;

    tutor.edit_active_config(|c| c.use_search = Some(true)).await.unwrap();
    let tool = tutor.add_tool("calc", Some("http://localhost:9000".into()), "calculator").await.unwrap();
    assert_eq!(tutor.toggle_tool(&tool.id).await.unwrap(), Some(false));
    assert!(tutor.use_config("missing").await.is_err());

    let saved = tutor.store().snapshot().await.unwrap();
    assert!(saved.active_config().search_enabled());
    assert_eq!(saved.mcp_tools.len(), 1);
    assert!(!saved.mcp_tools[0].enabled);

    assert!(tutor.remove_tool(&tool.id).await.unwrap());
    assert!(tutor.state().mcp_tools.is_empty());
}
