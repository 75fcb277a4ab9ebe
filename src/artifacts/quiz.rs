//! Quiz grading and the follow-up message sent to the tutor.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::model::{CorrectAnswer, QuestionType, QuizData, QuizQuestion, QuizResults};

/// Grade `answers` against `quiz`. Score is the number of correct answers.
pub fn grade(quiz: &QuizData, answers: &BTreeMap<usize, Value>) -> QuizResults {
    let score = quiz
        .questions
        .iter()
        .enumerate()
        .filter(|(i, q)| answers.get(i).is_some_and(|a| is_correct(q, a)))
        .count() as u32;

    QuizResults {
        user_answers: answers.clone(),
        submitted: true,
        score: Some(score),
    }
}

/// Whether one answer is right for its question.
pub fn is_correct(question: &QuizQuestion, answer: &Value) -> bool {
    match question.kind {
        QuestionType::MultipleChoice => {
            match (option_index(question, answer), expected_index(question)) {
                (Some(given), Some(expected)) => given == expected,
                _ => text_of(answer)
                    .zip(expected_text(question))
                    .is_some_and(|(a, e)| normalize_text(&a) == normalize_text(&e)),
            }
        }
        QuestionType::TrueFalse => {
            match (truthiness(question, answer), expected_truth(question)) {
                (Some(a), Some(e)) => a == e,
                _ => false,
            }
        }
        QuestionType::ShortAnswer => text_of(answer)
            .zip(expected_text(question))
            .is_some_and(|(a, e)| normalize_text(&a) == normalize_text(&e)),
    }
}

/// Text form of the expected answer, resolving option indices.
pub fn expected_text(question: &QuizQuestion) -> Option<String> {
    match &question.correct_answer {
        CorrectAnswer::Index(i) => question
            .options()
            .get(*i as usize)
            .cloned()
            .or_else(|| Some(i.to_string())),
        CorrectAnswer::Bool(b) => Some(b.to_string()),
        CorrectAnswer::Text(t) => Some(t.clone()),
    }
}

/// Follow-up message reporting a submitted quiz to the tutor.
pub fn feedback_message(quiz: &QuizData, results: &QuizResults) -> String {
    let total = quiz.questions.len();
    let score = results.score.unwrap_or(0);
    let mut out = format!(
        "I finished the quiz \"{}\" and scored {}/{}.",
        quiz.title, score, total
    );

    let missed: Vec<String> = quiz
        .questions
        .iter()
        .enumerate()
        .filter(|(i, q)| !results.user_answers.get(i).is_some_and(|a| is_correct(q, a)))
        .map(|(i, q)| {
            let given = results
                .user_answers
                .get(&i)
                .map(|a| display_answer(q, a))
                .unwrap_or_else(|| "(no answer)".to_string());
            let expected = expected_text(q).unwrap_or_default();
            format!(
                "- Q{}: {} (my answer: {}; correct: {})",
                i + 1,
                q.question,
                given,
                expected
            )
        })
        .collect();

    if missed.is_empty() {
        out.push_str(" Everything was correct. What should I study next?");
    } else {
        out.push_str(" I got these wrong:\n");
        out.push_str(&missed.join("\n"));
        out.push_str("\nPlease explain my mistakes and point out any weak points.");
    }
    out
}

/// Render an answer for display, resolving option indices to option text.
pub fn display_answer(question: &QuizQuestion, answer: &Value) -> String {
    if question.kind == QuestionType::MultipleChoice
        && let Some(i) = option_index(question, answer)
        && let Some(text) = question.options().get(i)
    {
        return text.clone();
    }
    text_of(answer).unwrap_or_else(|| answer.to_string())
}

fn expected_index(question: &QuizQuestion) -> Option<usize> {
    match &question.correct_answer {
        CorrectAnswer::Index(i) => Some(*i as usize),
        CorrectAnswer::Text(t) => resolve_option(question, t),
        CorrectAnswer::Bool(_) => None,
    }
}

fn option_index(question: &QuizQuestion, answer: &Value) -> Option<usize> {
    match answer {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => resolve_option(question, s),
        _ => None,
    }
}

/// Option text first, then a numeric index, then an option letter.
fn resolve_option(question: &QuizQuestion, s: &str) -> Option<usize> {
    let s = s.trim();
    question
        .options()
        .iter()
        .position(|o| normalize_text(o) == normalize_text(s))
        .or_else(|| s.parse::<usize>().ok())
        .or_else(|| letter_index(s))
}

/// `A`/`b` style option letters.
fn letter_index(s: &str) -> Option<usize> {
    let mut chars = s.chars();
    let c = chars.next()?;
    if chars.next().is_some() || !c.is_ascii_alphabetic() {
        return None;
    }
    Some((c.to_ascii_lowercase() as u8 - b'a') as usize)
}

fn truthiness(question: &QuizQuestion, value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().and_then(|i| index_truth(question, i)),
        Value::String(s) => parse_truth(s),
        _ => None,
    }
}

fn expected_truth(question: &QuizQuestion) -> Option<bool> {
    match &question.correct_answer {
        CorrectAnswer::Bool(b) => Some(*b),
        CorrectAnswer::Index(i) => index_truth(question, *i),
        CorrectAnswer::Text(t) => parse_truth(t),
    }
}

/// Truth value of option `i`. Without options the order is `["true", "false"]`.
fn index_truth(question: &QuizQuestion, i: u64) -> Option<bool> {
    match question.options() {
        [] => Some(i == 0),
        options => options.get(i as usize).and_then(|o| parse_truth(o)),
    }
}

fn parse_truth(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "对" | "正确" | "是" => Some(true),
        "false" | "f" | "no" | "n" | "错" | "错误" | "否" => Some(false),
        _ => None,
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn normalize_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
