//! Structured artifacts the tutor embeds in its replies.

use std::collections::{BTreeMap, HashSet};

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Kind of quiz question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

/// Expected answer: an option index or a literal answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Index(u64),
    Bool(bool),
    Text(String),
}

impl<'de> Deserialize<'de> for CorrectAnswer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::String(s) => Ok(Self::Text(s)),
            // Models sometimes write indices as `1.0`.
            Value::Number(n) => n
                .as_u64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                        .map(|f| f as u64)
                })
                .map(Self::Index)
                .ok_or_else(|| de::Error::custom(format!("invalid option index {n}"))),
            other => Err(de::Error::custom(format!("unsupported correctAnswer {other}"))),
        }
    }
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Keep the questions that parse; a malformed one is dropped on its own.
fn lenient_questions<'de, D>(deserializer: D) -> Result<Vec<QuizQuestion>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(question) => Some(question),
            Err(e) => {
                debug!(index, error = %e, "Skipping malformed quiz question");
                None
            }
        })
        .collect())
}

/// A single quiz question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: QuestionType,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub correct_answer: CorrectAnswer,
    #[serde(default, deserialize_with = "null_as_default")]
    pub explanation: String,
}

impl QuizQuestion {
    pub fn options(&self) -> &[String] {
        self.options.as_deref().unwrap_or(&[])
    }
}

/// Answers and grading state of a quiz.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResults {
    /// Answer per question index. Values are option indices, booleans or text.
    #[serde(default)]
    pub user_answers: BTreeMap<usize, serde_json::Value>,
    #[serde(default)]
    pub submitted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
}

/// A quiz generated by the tutor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_questions")]
    pub questions: Vec<QuizQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<QuizResults>,
}

impl QuizData {
    /// Fill in the quiz id (falling back to `fallback_id`) and per-question ids.
    pub fn normalize(&mut self, fallback_id: &str) {
        if self.id.trim().is_empty() {
            self.id = fallback_id.to_string();
        }
        for (i, q) in self.questions.iter_mut().enumerate() {
            if q.id.trim().is_empty() {
                q.id = format!("{}-q{}", self.id, i);
            }
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.results.as_ref().is_some_and(|r| r.submitted)
    }
}

/// A node of a mind map tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindMapNode {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<MindMapNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MindMapNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            children: None,
            description: None,
        }
    }

    /// Builder: append a child.
    pub fn with_child(mut self, child: MindMapNode) -> Self {
        self.children.get_or_insert_with(Vec::new).push(child);
        self
    }

    pub fn children(&self) -> &[MindMapNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Make every id in the tree non-empty and unique.
    ///
    /// Missing ids become path ids (`root`, `root.0`, `root.0.1`); a repeated id
    /// gets a `-2`, `-3`, ... suffix.
    pub fn normalize(&mut self) {
        let mut seen = HashSet::new();
        normalize_node(self, "root", &mut seen);
    }

    /// Depth-first lookup by id.
    pub fn find(&self, id: &str) -> Option<&MindMapNode> {
        if self.id == id {
            return Some(self);
        }
        self.children().iter().find_map(|c| c.find(id))
    }

    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(MindMapNode::node_count).sum::<usize>()
    }

    /// Number of levels, a lone root being depth 1.
    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(MindMapNode::depth).max().unwrap_or(0)
    }
}

fn normalize_node(node: &mut MindMapNode, path: &str, seen: &mut HashSet<String>) {
    let base = if node.id.trim().is_empty() {
        path.to_string()
    } else {
        node.id.trim().to_string()
    };
    let mut candidate = base.clone();
    let mut n = 2;
    while seen.contains(&candidate) {
        candidate = format!("{base}-{n}");
        n += 1;
    }
    seen.insert(candidate.clone());
    node.id = candidate;

    let parent = node.id.clone();
    if let Some(children) = node.children.as_mut() {
        for (i, child) in children.iter_mut().enumerate() {
            normalize_node(child, &format!("{parent}.{i}"), seen);
        }
    }
}

fn default_range() -> [f64; 2] {
    [-10.0, 10.0]
}

/// A function plot request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSpec {
    #[serde(default)]
    pub title: String,
    pub equation: String,
    #[serde(default = "default_range")]
    pub range: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}
