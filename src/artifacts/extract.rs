//! Action-block extraction from tutor replies.
//!
//! The tutor embeds structured artifacts as fenced JSON blocks of the form
//! `{"action": "GENERATE_QUIZ", "data": {...}}`. Blocks that fail to parse or
//! carry an unknown action are skipped; the surrounding prose is untouched.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::model::{ChatSession, MindMapNode, PlotSpec, QuizData, QuizResults, Role};

/// Fenced block, optional `json` tag, body is the shortest `{...}` that is
/// followed by the closing fence.
static ACTION_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(?:json)?\s*(\{.*?\})\s*```").expect("action block pattern is valid")
});

pub const ACTION_QUIZ: &str = "GENERATE_QUIZ";
pub const ACTION_MINDMAP: &str = "GENERATE_MINDMAP";
pub const ACTION_WEAK_POINT: &str = "SUGGEST_WEAK_POINT";
pub const ACTION_PLOT: &str = "PLOT_FUNCTION";

/// One classified action block.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quiz(QuizData),
    MindMap(MindMapNode),
    WeakPoint(String),
    Plot(PlotSpec),
}

#[derive(Debug, Deserialize)]
struct ActionEnvelope {
    action: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WeakPointData {
    Text(String),
    Object { content: String },
}

/// Everything extracted from one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedActions {
    pub quizzes: Vec<QuizData>,
    pub mind_maps: Vec<MindMapNode>,
    pub weak_points: Vec<String>,
    pub plots: Vec<PlotSpec>,
}

impl ExtractedActions {
    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
            && self.mind_maps.is_empty()
            && self.weak_points.is_empty()
            && self.plots.is_empty()
    }
}

/// Artifacts of a whole session, in message order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionArtifacts {
    pub quizzes: Vec<QuizData>,
    pub mind_maps: Vec<MindMapNode>,
    pub plots: Vec<PlotSpec>,
}

/// Raw JSON bodies of every fenced block in `content`.
pub fn action_blocks(content: &str) -> impl Iterator<Item = &str> {
    ACTION_BLOCK
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
}

/// Replace each recognised action block with a short bracketed marker, for
/// display. Blocks that do not parse are left as they are.
pub fn summarize_action_blocks(content: &str) -> String {
    ACTION_BLOCK
        .replace_all(content, |caps: &regex::Captures<'_>| {
            let body = caps.get(1).map_or("", |m| m.as_str());
            match parse_action(body) {
                Some(Action::Quiz(q)) => format!("[quiz: {} ({} questions)]", q.title, q.questions.len()),
                Some(Action::MindMap(m)) => format!("[mind map: {}]", m.label),
                Some(Action::WeakPoint(w)) => format!("[weak point suggested: {w}]"),
                Some(Action::Plot(p)) => format!("[plot: y = {}]", p.equation),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Classify one block body. `None` for invalid JSON, unknown actions or
/// payloads that do not fit the action.
pub fn parse_action(body: &str) -> Option<Action> {
    let envelope: ActionEnvelope = match serde_json::from_str(body) {
        Ok(e) => e,
        Err(e) => {
            debug!(error = %e, "Skipping unparsable action block");
            return None;
        }
    };

    let parsed = match envelope.action.as_str() {
        ACTION_QUIZ => match serde_json::from_value::<QuizData>(envelope.data) {
            Ok(quiz) if quiz.questions.is_empty() => {
                debug!("Skipping quiz without usable questions");
                return None;
            }
            other => other.map(Action::Quiz),
        },
        ACTION_MINDMAP => serde_json::from_value(envelope.data).map(Action::MindMap),
        ACTION_PLOT => serde_json::from_value(envelope.data).map(Action::Plot),
        ACTION_WEAK_POINT => serde_json::from_value::<WeakPointData>(envelope.data).map(|d| {
            Action::WeakPoint(match d {
                WeakPointData::Text(t) => t,
                WeakPointData::Object { content } => content,
            })
        }),
        other => {
            debug!(action = other, "Skipping unknown action");
            return None;
        }
    };

    match parsed {
        Ok(action) => Some(action),
        Err(e) => {
            debug!(action = %envelope.action, error = %e, "Skipping malformed action payload");
            None
        }
    }
}

/// Extract and normalise every artifact in a message.
///
/// Quizzes without an id take the message id (a second id-less quiz in the
/// same message takes `<message id>-1`, and so on). A quiz id repeated within
/// the message gets a `-2`, `-3`, ... suffix. Persisted results for a quiz id
/// replace whatever the block carried.
pub fn extract_actions(
    content: &str,
    message_id: &str,
    quiz_results: &BTreeMap<String, QuizResults>,
) -> ExtractedActions {
    extract_with_seen(content, message_id, quiz_results, &mut HashSet::new())
}

/// Extraction that keeps quiz ids unique against `seen`.
fn extract_with_seen(
    content: &str,
    message_id: &str,
    quiz_results: &BTreeMap<String, QuizResults>,
    seen: &mut HashSet<String>,
) -> ExtractedActions {
    let mut out = ExtractedActions::default();
    let mut anonymous_quizzes = 0usize;

    for body in action_blocks(content) {
        match parse_action(body) {
            Some(Action::Quiz(mut quiz)) => {
                let base = if !quiz.id.trim().is_empty() {
                    quiz.id.trim().to_string()
                } else {
                    let id = if anonymous_quizzes == 0 {
                        message_id.to_string()
                    } else {
                        format!("{message_id}-{anonymous_quizzes}")
                    };
                    anonymous_quizzes += 1;
                    id
                };
                let id = unique_id(&base, seen);
                if id != base {
                    debug!(quiz_id = %base, renamed = %id, "Renaming repeated quiz id");
                }
                quiz.id = id.clone();
                quiz.normalize(&id);
                if let Some(results) = quiz_results.get(&quiz.id) {
                    quiz.results = Some(results.clone());
                }
                out.quizzes.push(quiz);
            }
            Some(Action::MindMap(mut map)) => {
                map.normalize();
                out.mind_maps.push(map);
            }
            Some(Action::WeakPoint(text)) => {
                let text = text.trim();
                if !text.is_empty() {
                    out.weak_points.push(text.to_string());
                }
            }
            Some(Action::Plot(plot)) => out.plots.push(plot),
            None => {}
        }
    }

    out
}

/// `base`, or `base-2`, `base-3`, ... if already taken. Records the result.
fn unique_id(base: &str, seen: &mut HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut n = 2;
    while seen.contains(&candidate) {
        candidate = format!("{base}-{n}");
        n += 1;
    }
    seen.insert(candidate.clone());
    candidate
}

/// Run extraction over the assistant messages of a session.
///
/// Quiz ids are unique across the whole session: a later quiz reusing an
/// earlier id is renamed as within a single message.
pub fn collect_session_artifacts(
    session: &ChatSession,
    quiz_results: &BTreeMap<String, QuizResults>,
) -> SessionArtifacts {
    let mut artifacts = SessionArtifacts::default();
    let mut seen = HashSet::new();
    for msg in session.messages.iter().filter(|m| m.role == Role::Assistant) {
        let found = extract_with_seen(&msg.content, &msg.id, quiz_results, &mut seen);
        artifacts.quizzes.extend(found.quizzes);
        artifacts.mind_maps.extend(found.mind_maps);
        artifacts.plots.extend(found.plots);
    }
    artifacts
}
