//! Terminal front end: a stdin/stdout REPL over the tutor.

pub mod attach;
pub mod command;
pub mod render;

pub use command::{Command, CommandParser, ContextSwitch};

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::auth::AuthGate;
use crate::error::{Error, SessionError};
use crate::model::{AiConfig, FileData, QuestionType, QuizQuestion, new_id};
use crate::store::StateStore;
use crate::tutor::Tutor;

/// Whether the loop keeps going after a command.
#[derive(Debug)]
enum Flow {
    Continue,
    Quit,
}

/// Trimmed lines from stdin, ending at EOF.
fn stdin_lines() -> BoxStream<'static, String> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line.trim().to_string()).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|line| (line, rx)) }).boxed()
}

fn prompt() {
    eprint!("> ");
}

/// Run the REPL until `/quit`, `/logout` or EOF.
pub async fn run<S: StateStore>(tutor: &mut Tutor<S>, gate: &AuthGate) -> anyhow::Result<()> {
    if let Some(session) = tutor.state().active_session() {
        eprintln!("{}\n", render::session(session));
    }

    let mut attachments: Vec<FileData> = Vec::new();
    let mut lines = stdin_lines();
    prompt();

    while let Some(line) = lines.next().await {
        let command = CommandParser::parse(&line);
        match handle(tutor, gate, command, &mut attachments).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => eprintln!("error: {e}"),
        }
        prompt();
    }

    tutor.store().save(tutor.state()).await?;
    Ok(())
}

async fn handle<S: StateStore>(
    tutor: &mut Tutor<S>,
    gate: &AuthGate,
    command: Command,
    attachments: &mut Vec<FileData>,
) -> Result<Flow, Error> {
    match command {
        Command::Chat(text) if text.is_empty() && attachments.is_empty() => {}
        Command::Chat(text) => {
            if tutor.state().active_session().is_none() {
                tutor.new_session().await?;
            }
            let files = std::mem::take(attachments);
            eprintln!("thinking...");
            let outcome = tutor.send_message(&text, files).await?;
            print_reply(&outcome);
        }
        Command::Retry => {
            eprintln!("thinking...");
            let outcome = tutor.retry_last().await?;
            print_reply(&outcome);
        }
        Command::Attach(path) => {
            let file = attach::load_attachment(&path).await?;
            eprintln!(
                "attached {} ({}), {} pending",
                file.file_name,
                file.mime_type,
                attachments.len() + 1
            );
            attachments.push(file);
        }

        Command::Help => println!("{}", render::HELP),
        Command::Quit => return Ok(Flow::Quit),
        Command::Logout => {
            gate.lock().await?;
            eprintln!("logged out, the password will be asked on the next start");
            return Ok(Flow::Quit);
        }

        Command::New => {
            tutor.new_session().await?;
            eprintln!("started a new session");
        }
        Command::Sessions => println!("{}", render::sessions(tutor.state())),
        Command::Switch(n) => {
            let id = session_id(tutor, n)?;
            tutor.select_session(&id).await?;
            if let Some(session) = tutor.state().active_session() {
                println!("{}", render::session(session));
            }
        }
        Command::Delete(n) => {
            let id = session_id(tutor, n)?;
            let title = tutor.delete_session(&id).await?;
            eprintln!("deleted \"{title}\"");
        }
        Command::Rename(title) => {
            tutor.rename_active(&title).await?;
            eprintln!("renamed to \"{}\"", title.trim());
        }
        Command::Prompt(text) => {
            let cleared = text.is_none();
            tutor.set_custom_prompt(text).await?;
            eprintln!("{}", if cleared { "session instructions cleared" } else { "session instructions set" });
        }
        Command::Use { switch, enabled } => {
            let settings = tutor
                .update_settings(|s| match switch {
                    ContextSwitch::KnowledgeBase => s.use_knowledge_base = enabled,
                    ContextSwitch::WeakPoints => s.use_weak_points = enabled,
                    ContextSwitch::Mcp => s.use_mcp = enabled,
                })
                .await?;
            eprintln!(
                "kb {} · weak points {} · tools {}",
                settings.use_knowledge_base, settings.use_weak_points, settings.use_mcp
            );
        }

        Command::Quizzes => {
            let state = tutor.state();
            println!(
                "{}",
                render::quiz_list(&state.artifacts().quizzes, state.current_quiz.as_ref())
            );
        }
        Command::Quiz(index) => {
            if let Some(i) = index {
                tutor.select_quiz(i).await?;
            }
            let quiz = tutor.state().current_quiz.as_ref().ok_or(SessionError::NoQuiz)?;
            println!("{}", render::quiz(quiz));
        }
        Command::Answer { question, value } => {
            let quiz = tutor.state().current_quiz.as_ref().ok_or(SessionError::NoQuiz)?;
            let answer = match quiz.questions.get(question) {
                Some(q) => answer_value(q, &value),
                None => {
                    return Err(SessionError::QuestionOutOfRange {
                        index: question,
                        count: quiz.questions.len(),
                    }
                    .into());
                }
            };
            tutor.answer_question(question, answer).await?;
            eprintln!("answer recorded for question {}", question + 1);
        }
        Command::Submit => {
            eprintln!("grading...");
            let submission = tutor.submit_quiz().await?;
            if let Some(quiz) = tutor.state().current_quiz.as_ref() {
                println!("{}", render::quiz(quiz));
            } else {
                println!("score: {}", submission.results.score.unwrap_or(0));
            }
            match submission.feedback {
                Ok(outcome) => print_reply(&outcome),
                Err(e) => eprintln!("results saved, but the follow-up failed: {e}"),
            }
        }
        Command::MindMaps => {
            let state = tutor.state();
            println!(
                "{}",
                render::mind_map_list(&state.artifacts().mind_maps, state.current_mind_map.as_ref())
            );
        }
        Command::MindMap(index) => {
            if let Some(i) = index {
                tutor.select_mind_map(i).await?;
            }
            let map = tutor
                .state()
                .current_mind_map
                .as_ref()
                .ok_or(SessionError::NoMindMap)?;
            println!("{}", render::mind_map(map));
        }
        Command::Plots => println!("{}", render::plots(&tutor.state().artifacts().plots)),

        Command::Kb => println!("{}", render::knowledge(&tutor.state().knowledge_base)),
        Command::KbAdd { content, tags } => {
            tutor.add_knowledge(&content, tags).await?;
            eprintln!("added to the knowledge base");
        }
        Command::KbRemove(n) => {
            let id = nth_id(tutor.state().knowledge_base.iter().map(|b| &b.id), n, "knowledge block")?;
            tutor.remove_knowledge(&id).await?;
            eprintln!("removed");
        }
        Command::Wp => println!("{}", render::weak_points(&tutor.state().weak_points)),
        Command::WpAccept(n) => {
            let id = nth_id(tutor.state().weak_points.iter().map(|b| &b.id), n, "weak point")?;
            tutor.accept_weak_point(&id).await?;
            eprintln!("weak point accepted");
        }
        Command::WpRemove(n) => {
            let id = nth_id(tutor.state().weak_points.iter().map(|b| &b.id), n, "weak point")?;
            tutor.remove_weak_point(&id).await?;
            eprintln!("removed");
        }

        Command::Configs => {
            let state = tutor.state();
            println!("{}", render::configs(&state.configs, &state.active_config_id));
        }
        Command::ConfigUse(n) => {
            let id = nth_id(tutor.state().configs.iter().map(|c| &c.id), n, "config")?;
            tutor.use_config(&id).await?;
            eprintln!("using {}", tutor.state().active_config().name);
            warn_missing_key(tutor);
        }
        Command::ConfigModel(model) => {
            let config = tutor.edit_active_config(|c| c.model = model).await?;
            eprintln!("{} now uses {}", config.name, config.model);
        }
        Command::ConfigKey(key) => {
            let config = tutor.edit_active_config(|c| c.api_key = Some(key)).await?;
            eprintln!("key stored for {}", config.name);
        }
        Command::ConfigSearch(on) => {
            let config = tutor.edit_active_config(|c| c.use_search = Some(on)).await?;
            eprintln!("search grounding {} for {}", if on { "on" } else { "off" }, config.name);
        }
        Command::ConfigAdd {
            name,
            provider,
            base_url,
            model,
        } => {
            let base = tutor.state().active_config().system_prompt.clone();
            tutor
                .add_config(AiConfig {
                    id: new_id(),
                    name,
                    provider,
                    base_url,
                    model,
                    system_prompt: base,
                    api_key: None,
                    use_search: Some(false),
                })
                .await?;
            eprintln!("added and selected {}", tutor.state().active_config().name);
            warn_missing_key(tutor);
        }

        Command::Tools => println!("{}", render::tools(&tutor.state().mcp_tools)),
        Command::ToolAdd {
            name,
            endpoint,
            description,
        } => {
            let tool = tutor.add_tool(&name, Some(endpoint), &description).await?;
            eprintln!("registered tool {}", tool.name);
        }
        Command::ToolToggle(n) => {
            let id = nth_id(tutor.state().mcp_tools.iter().map(|t| &t.id), n, "tool")?;
            if let Some(enabled) = tutor.toggle_tool(&id).await? {
                eprintln!("tool {}", if enabled { "enabled" } else { "disabled" });
            }
        }
        Command::ToolRemove(n) => {
            let id = nth_id(tutor.state().mcp_tools.iter().map(|t| &t.id), n, "tool")?;
            tutor.remove_tool(&id).await?;
            eprintln!("removed");
        }

        Command::Tokens => println!("{} tokens used", tutor.state().total_tokens_used),
        Command::Export(path) => {
            let archive = tutor.export(&path).await?;
            eprintln!(
                "exported {} sessions to {}",
                archive.sessions.len(),
                path.display()
            );
        }
        Command::Import(path) => {
            let summary = tutor.import(&path).await?;
            eprintln!("imported {summary}");
        }

        Command::Invalid(usage) => eprintln!("{usage}"),
    }
    Ok(Flow::Continue)
}

fn print_reply(outcome: &crate::state::SendOutcome) {
    if let Some(reply) = &outcome.reply {
        println!("\n{}\n", render::message(reply));
    }
    if let Some(notes) = render::outcome(outcome) {
        eprintln!("{notes}");
    }
}

/// Print the "needs an API key" hint for the active config.
pub fn warn_missing_key<S: StateStore>(tutor: &Tutor<S>) {
    if !tutor.has_api_key() {
        eprintln!(
            "warning: no API key for \"{}\". Set API_KEY or use /config key <key>.",
            tutor.state().active_config().name
        );
    }
}

fn session_id<S: StateStore>(tutor: &Tutor<S>, n: usize) -> Result<String, SessionError> {
    tutor
        .state()
        .sessions
        .get(n)
        .map(|s| s.id.clone())
        .ok_or_else(|| SessionError::NotFound(format!("#{}", n + 1)))
}

fn nth_id<'a>(
    ids: impl Iterator<Item = &'a String>,
    n: usize,
    what: &str,
) -> Result<String, SessionError> {
    ids.into_iter()
        .nth(n)
        .cloned()
        .ok_or_else(|| SessionError::NotFound(format!("{what} #{}", n + 1)))
}

/// Turn typed input into a stored answer. Multiple-choice numbers are
/// 1-based as displayed; true/false words become booleans.
fn answer_value(question: &QuizQuestion, raw: &str) -> Value {
    let raw = raw.trim();
    match question.kind {
        QuestionType::MultipleChoice => match raw.parse::<usize>() {
            Ok(n) if n >= 1 && n <= question.options().len() => Value::from(n - 1),
            _ => Value::String(raw.to_string()),
        },
        QuestionType::TrueFalse => match raw.to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" => Value::Bool(true),
            "false" | "f" | "no" | "n" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        QuestionType::ShortAnswer => Value::String(raw.to_string()),
    }
}
