//! Plain-text renderings for the terminal.

use std::fmt::Write;

use chrono::{DateTime, Local};

use crate::artifacts::quiz::{display_answer, expected_text, is_correct};
use crate::artifacts::summarize_action_blocks;
use crate::model::{
    AiConfig, ChatSession, KbBlock, McpTool, Message, MindMapNode, PlotSpec, QuestionType,
    QuizData, Role, WpBlock, WpStatus,
};
use crate::state::{AppState, SendOutcome};

pub const HELP: &str = "\
Chat
  <text>                       send a message to the tutor
  /retry                       resend the last message
  /attach <path>               attach a file to the next message
Sessions
  /new  /sessions  /switch <n>  /delete <n>  /rename <title>
  /prompt [text]               set or clear the session's instructions
  /use kb|wp|mcp on|off        toggle context for this session
Artifacts
  /quizzes  /quiz [n]  /answer <q> <answer>  /submit
  /mindmaps  /mindmap [n]  /plots
Knowledge
  /kb  /kb add <text> #tags  /kb rm <n>
  /wp  /wp accept <n>  /wp rm <n>
Settings
  /configs  /config use <n>  /config model <m>  /config key <k>
  /config search on|off  /config add <name> <gemini|custom> <url> <model>
  /tools  /tool add <name> <endpoint> [description]  /tool toggle <n>  /tool rm <n>
Other
  /tokens  /export <path>  /import <path>  /help  /logout  /quit
An empty line sends pending attachments on their own.";

fn timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn mark(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

pub fn sessions(state: &AppState) -> String {
    if state.sessions.is_empty() {
        return "No sessions yet. Use /new to start one.".into();
    }
    let mut out = String::new();
    for (i, s) in state.sessions.iter().enumerate() {
        let active = if state.active_session_id.as_deref() == Some(s.id.as_str()) {
            "*"
        } else {
            " "
        };
        let _ = writeln!(
            out,
            "{active} {}. {} ({} messages, {})",
            i + 1,
            s.title,
            s.messages.len(),
            timestamp(s.created_at)
        );
    }
    out.trim_end().to_string()
}

pub fn message(msg: &Message) -> String {
    let who = match msg.role {
        Role::User => "you",
        Role::Assistant => "tutor",
        Role::Tool => "tool",
    };
    let mut out = format!("[{who}] {}", summarize_action_blocks(&msg.content));
    for file in msg.attachments() {
        let _ = write!(out, "\n  (attached {} · {})", file.file_name, file.mime_type);
    }
    out
}

/// Header and full history of a session.
pub fn session(session: &ChatSession) -> String {
    let mut out = format!("── {} ──", session.title);
    if let Some(prompt) = session.custom_prompt() {
        let _ = write!(out, "\ninstructions: {prompt}");
    }
    let s = session.settings;
    let _ = write!(
        out,
        "\ncontext: kb {} · weak points {} · tools {}",
        mark(s.use_knowledge_base),
        mark(s.use_weak_points),
        mark(s.use_mcp)
    );
    for msg in &session.messages {
        out.push_str("\n\n");
        out.push_str(&message(msg));
    }
    out
}

/// What a reply carried besides its text.
pub fn outcome(outcome: &SendOutcome) -> Option<String> {
    let mut notes = Vec::new();
    if outcome.quizzes > 0 {
        notes.push(format!("{} new quiz(zes), see /quiz", outcome.quizzes));
    }
    if outcome.mind_maps > 0 {
        notes.push(format!("{} new mind map(s), see /mindmap", outcome.mind_maps));
    }
    if outcome.new_weak_points > 0 {
        notes.push(format!("{} weak point(s) suggested, see /wp", outcome.new_weak_points));
    }
    (!notes.is_empty()).then(|| notes.join(" · "))
}

pub fn quiz_list(quizzes: &[QuizData], current: Option<&QuizData>) -> String {
    if quizzes.is_empty() {
        return "No quizzes in this session.".into();
    }
    let mut out = String::new();
    for (i, q) in quizzes.iter().enumerate() {
        let selected = if current.is_some_and(|c| c.id == q.id) { "*" } else { " " };
        let status = match q.results.as_ref() {
            Some(r) if r.submitted => format!("score {}/{}", r.score.unwrap_or(0), q.questions.len()),
            _ => "open".to_string(),
        };
        let _ = writeln!(out, "{selected} {}. {} ({status})", i + 1, q.title);
    }
    out.trim_end().to_string()
}

fn option_letter(i: usize) -> char {
    (b'A' + (i % 26) as u8) as char
}

pub fn quiz(quiz: &QuizData) -> String {
    let submitted = quiz.is_submitted();
    let answers = quiz.results.as_ref().map(|r| &r.user_answers);
    let mut out = format!("── {} ──", quiz.title);

    for (i, q) in quiz.questions.iter().enumerate() {
        let _ = write!(out, "\n\n{}. {}", i + 1, q.question);
        match q.kind {
            QuestionType::MultipleChoice => {
                for (j, opt) in q.options().iter().enumerate() {
                    let _ = write!(out, "\n   {}. {}", option_letter(j), opt);
                }
            }
            QuestionType::TrueFalse => out.push_str("\n   (true / false)"),
            QuestionType::ShortAnswer => out.push_str("\n   (short answer)"),
        }

        let answer = answers.and_then(|a| a.get(&i));
        if let Some(a) = answer {
            let _ = write!(out, "\n   your answer: {}", display_answer(q, a));
        }
        if submitted {
            let verdict = if answer.is_some_and(|a| is_correct(q, a)) {
                "correct"
            } else {
                "wrong"
            };
            let _ = write!(
                out,
                "\n   {verdict}, answer: {}",
                expected_text(q).unwrap_or_default()
            );
            if !q.explanation.trim().is_empty() {
                let _ = write!(out, "\n   {}", q.explanation.trim());
            }
        }
    }

    if let Some(r) = quiz.results.as_ref().filter(|r| r.submitted) {
        let _ = write!(out, "\n\nScore: {}/{}", r.score.unwrap_or(0), quiz.questions.len());
    } else {
        out.push_str("\n\nAnswer with /answer <q> <answer>, then /submit.");
    }
    out
}

pub fn mind_map_list(maps: &[MindMapNode], current: Option<&MindMapNode>) -> String {
    if maps.is_empty() {
        return "No mind maps in this session.".into();
    }
    let mut out = String::new();
    for (i, m) in maps.iter().enumerate() {
        let selected = if current.is_some_and(|c| c == m) { "*" } else { " " };
        let _ = writeln!(
            out,
            "{selected} {}. {} ({} nodes, depth {})",
            i + 1,
            m.label,
            m.node_count(),
            m.depth()
        );
    }
    out.trim_end().to_string()
}

/// Tree rendering with box-drawing branches.
pub fn mind_map(root: &MindMapNode) -> String {
    let mut out = node_line(root);
    let children = root.children();
    for (i, child) in children.iter().enumerate() {
        write_branch(&mut out, child, "", i + 1 == children.len());
    }
    out
}

fn node_line(node: &MindMapNode) -> String {
    match node.description.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => format!("{}: {}", node.label, d),
        _ => node.label.clone(),
    }
}

fn write_branch(out: &mut String, node: &MindMapNode, prefix: &str, last: bool) {
    let connector = if last { "└── " } else { "├── " };
    let _ = write!(out, "\n{prefix}{connector}{}", node_line(node));
    let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
    let children = node.children();
    for (i, child) in children.iter().enumerate() {
        write_branch(out, child, &child_prefix, i + 1 == children.len());
    }
}

pub fn plots(plots: &[PlotSpec]) -> String {
    if plots.is_empty() {
        return "No plots in this session.".into();
    }
    plots
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let title = if p.title.is_empty() { &p.equation } else { &p.title };
            let label = p.label.as_deref().map(|l| format!(" [{l}]")).unwrap_or_default();
            format!(
                "{}. {title}: y = {} for x in [{}, {}]{label}",
                i + 1,
                p.equation,
                p.range[0],
                p.range[1]
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn knowledge(blocks: &[KbBlock]) -> String {
    if blocks.is_empty() {
        return "Knowledge base is empty. Add notes with /kb add <text> #tags.".into();
    }
    blocks
        .iter()
        .enumerate()
        .map(|(i, b)| match b.tags.as_deref() {
            Some(tags) if !tags.is_empty() => format!(
                "{}. {} #{}",
                i + 1,
                b.content,
                tags.join(" #")
            ),
            _ => format!("{}. {}", i + 1, b.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn weak_points(blocks: &[WpBlock]) -> String {
    if blocks.is_empty() {
        return "No weak points tracked.".into();
    }
    blocks
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let status = match w.status {
                WpStatus::Suggested => "suggested",
                WpStatus::Accepted => "accepted",
            };
            format!("{}. {} ({status}, {})", i + 1, w.content, timestamp(w.timestamp))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn configs(configs: &[AiConfig], active_id: &str) -> String {
    configs
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let active = if c.id == active_id { "*" } else { " " };
            let key = if c.api_key().is_some() { "own key" } else { "env key" };
            format!(
                "{active} {}. {} [{}] {} @ {} ({key}, search {})",
                i + 1,
                c.name,
                c.provider.as_str(),
                c.model,
                c.base_url,
                mark(c.search_enabled())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn tools(tools: &[McpTool]) -> String {
    if tools.is_empty() {
        return "No tools registered.".into();
    }
    tools
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let endpoint = t.endpoint.as_deref().unwrap_or("built in");
            format!(
                "{}. {} ({}) {}: {}",
                i + 1,
                t.name,
                mark(t.enabled),
                endpoint,
                t.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CorrectAnswer, QuizQuestion, QuizResults};
    use std::collections::BTreeMap;

    fn sample_quiz() -> QuizData {
        QuizData {
            id: "q".into(),
            title: "Powers".into(),
            questions: vec![QuizQuestion {
                id: "q-q0".into(),
                kind: QuestionType::MultipleChoice,
                question: "2^3?".into(),
                options: Some(vec!["6".into(), "8".into()]),
                correct_answer: CorrectAnswer::Index(1),
                explanation: "2·2·2".into(),
            }],
            results: None,
        }
    }

    #[test]
    fn mind_map_draws_branches() {
        let map = MindMapNode::new("root", "Algebra")
            .with_child(MindMapNode::new("a", "Equations").with_child(MindMapNode::new("a1", "Linear")))
            .with_child(MindMapNode::new("b", "Functions"));
        let out = mind_map(&map);
        assert_eq!(
            out,
            "Algebra\n├── Equations\n│   └── Linear\n└── Functions"
        );
    }

    #[test]
    fn open_quiz_lists_options() {
        let out = quiz(&sample_quiz());
        assert!(out.contains("1. 2^3?\n   A. 6\n   B. 8"));
        assert!(out.ends_with("then /submit."));
    }

    #[test]
    fn submitted_quiz_shows_verdicts() {
        let mut q = sample_quiz();
        q.results = Some(QuizResults {
            user_answers: BTreeMap::from([(0, serde_json::json!(0))]),
            submitted: true,
            score: Some(0),
        });
        let out = quiz(&q);
        assert!(out.contains("your answer: 6"));
        assert!(out.contains("wrong, answer: 8"));
        assert!(out.ends_with("Score: 0/1"));
    }

    #[test]
    fn message_hides_action_json() {
        let msg = Message::assistant(
            "Noted.\n```json\n{\"action\":\"SUGGEST_WEAK_POINT\",\"data\":{\"content\":\"Fractions\"}}\n```",
        );
        assert_eq!(message(&msg), "[tutor] Noted.\n[weak point suggested: Fractions]");
    }

    #[test]
    fn knowledge_shows_tags() {
        let blocks = vec![KbBlock::new("F = ma", vec!["physics".into(), "newton".into()])];
        assert_eq!(knowledge(&blocks), "1. F = ma #physics #newton");
    }

    #[test]
    fn outcome_is_silent_without_artifacts() {
        assert!(outcome(&SendOutcome::default()).is_none());
    }
}
