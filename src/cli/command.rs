//! Terminal command parsing.
//!
//! Lines starting with `/` are commands; anything else is a chat message.
//! List positions are 1-based, as shown by the listing commands.

use std::path::PathBuf;

use crate::model::AiProvider;

/// Parses a terminal line into a [`Command`].
pub struct CommandParser;

impl CommandParser {
    pub fn parse(line: &str) -> Command {
        let trimmed = line.trim();
        if !trimmed.starts_with('/') {
            return Command::Chat(trimmed.to_string());
        }

        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (trimmed, ""),
        };
        let head = head.to_lowercase();

        match (head.as_str(), rest) {
            ("/help" | "/?", _) => Command::Help,
            ("/quit" | "/exit", _) => Command::Quit,
            ("/logout", _) => Command::Logout,
            ("/new", _) => Command::New,
            ("/sessions" | "/ls", _) => Command::Sessions,
            ("/retry", _) => Command::Retry,
            ("/quizzes", _) => Command::Quizzes,
            ("/submit", _) => Command::Submit,
            ("/mindmaps", _) => Command::MindMaps,
            ("/plots", _) => Command::Plots,
            ("/tokens", _) => Command::Tokens,
            ("/configs", _) => Command::Configs,
            ("/tools", _) => Command::Tools,

            ("/switch", rest) => position(rest, "/switch <n>").map_or_else(identity, Command::Switch),
            ("/delete", rest) => position(rest, "/delete <n>").map_or_else(identity, Command::Delete),
            ("/rename", "") => Command::Invalid("usage: /rename <title>".into()),
            ("/rename", rest) => Command::Rename(rest.to_string()),
            ("/prompt", "") => Command::Prompt(None),
            ("/prompt", rest) => Command::Prompt(Some(rest.to_string())),
            ("/use", rest) => parse_use(rest),
            ("/attach", "") => Command::Invalid("usage: /attach <path>".into()),
            ("/attach", rest) => Command::Attach(PathBuf::from(rest)),
            ("/quiz", "") => Command::Quiz(None),
            ("/quiz", rest) => position(rest, "/quiz [n]").map_or_else(identity, |n| Command::Quiz(Some(n))),
            ("/answer", rest) => parse_answer(rest),
            ("/mindmap", "") => Command::MindMap(None),
            ("/mindmap", rest) => {
                position(rest, "/mindmap [n]").map_or_else(identity, |n| Command::MindMap(Some(n)))
            }
            ("/kb", rest) => parse_kb(rest),
            ("/wp", rest) => parse_wp(rest),
            ("/config", rest) => parse_config(rest),
            ("/tool", rest) => parse_tool(rest),
            ("/export", "") => Command::Invalid("usage: /export <path>".into()),
            ("/export", rest) => Command::Export(PathBuf::from(rest)),
            ("/import", "") => Command::Invalid("usage: /import <path>".into()),
            ("/import", rest) => Command::Import(PathBuf::from(rest)),

            (other, _) => Command::Invalid(format!("unknown command {other}, try /help")),
        }
    }
}

/// Session context switches toggled by `/use`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSwitch {
    KnowledgeBase,
    WeakPoints,
    Mcp,
}

/// A parsed terminal command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Plain text sent to the tutor.
    Chat(String),
    Help,
    Quit,
    /// Forget the password unlock and exit.
    Logout,
    New,
    Sessions,
    Switch(usize),
    Delete(usize),
    Rename(String),
    /// `None` clears the session's custom prompt.
    Prompt(Option<String>),
    Use { switch: ContextSwitch, enabled: bool },
    Retry,
    Attach(PathBuf),
    Quizzes,
    /// Show the current quiz, or select the n-th one.
    Quiz(Option<usize>),
    Answer { question: usize, value: String },
    Submit,
    MindMaps,
    MindMap(Option<usize>),
    Plots,
    Kb,
    KbAdd { content: String, tags: Vec<String> },
    KbRemove(usize),
    Wp,
    WpAccept(usize),
    WpRemove(usize),
    Configs,
    ConfigUse(usize),
    ConfigModel(String),
    ConfigKey(String),
    ConfigSearch(bool),
    ConfigAdd {
        name: String,
        provider: AiProvider,
        base_url: String,
        model: String,
    },
    Tools,
    ToolAdd {
        name: String,
        endpoint: String,
        description: String,
    },
    ToolToggle(usize),
    ToolRemove(usize),
    Tokens,
    Export(PathBuf),
    Import(PathBuf),
    /// Malformed input, carrying a usage hint.
    Invalid(String),
}

fn identity(c: Command) -> Command {
    c
}

/// Parse a 1-based list position into a 0-based index.
fn position(raw: &str, usage: &str) -> Result<usize, Command> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(Command::Invalid(format!("usage: {usage}"))),
    }
}

fn on_off(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// `/use kb|wp|mcp on|off`
fn parse_use(rest: &str) -> Command {
    const USAGE: &str = "usage: /use kb|wp|mcp on|off";
    let mut parts = rest.split_whitespace();
    let switch = match parts.next().map(str::to_lowercase).as_deref() {
        Some("kb") => ContextSwitch::KnowledgeBase,
        Some("wp") => ContextSwitch::WeakPoints,
        Some("mcp") => ContextSwitch::Mcp,
        _ => return Command::Invalid(USAGE.into()),
    };
    match parts.next().and_then(on_off) {
        Some(enabled) => Command::Use { switch, enabled },
        None => Command::Invalid(USAGE.into()),
    }
}

/// `/answer <question> <value>`
fn parse_answer(rest: &str) -> Command {
    const USAGE: &str = "usage: /answer <question> <answer>";
    let Some((q, value)) = rest.split_once(char::is_whitespace) else {
        return Command::Invalid(USAGE.into());
    };
    match position(q, "/answer <question> <answer>") {
        Ok(question) if !value.trim().is_empty() => Command::Answer {
            question,
            value: value.trim().to_string(),
        },
        _ => Command::Invalid(USAGE.into()),
    }
}

/// `/kb`, `/kb add <text> #tag...`, `/kb rm <n>`
fn parse_kb(rest: &str) -> Command {
    let (sub, args) = split_sub(rest);
    match sub.as_str() {
        "" | "list" => Command::Kb,
        "add" if !args.is_empty() => {
            let mut tags = Vec::new();
            let mut words = Vec::new();
            for word in args.split_whitespace() {
                match word.strip_prefix('#') {
                    Some(tag) if !tag.is_empty() => tags.push(tag.to_string()),
                    _ => words.push(word),
                }
            }
            if words.is_empty() {
                return Command::Invalid("usage: /kb add <text> [#tag ...]".into());
            }
            Command::KbAdd {
                content: words.join(" "),
                tags,
            }
        }
        "rm" | "remove" => position(args, "/kb rm <n>").map_or_else(identity, Command::KbRemove),
        _ => Command::Invalid("usage: /kb [add <text> #tags | rm <n>]".into()),
    }
}

/// `/wp`, `/wp accept <n>`, `/wp rm <n>`
fn parse_wp(rest: &str) -> Command {
    let (sub, args) = split_sub(rest);
    match sub.as_str() {
        "" | "list" => Command::Wp,
        "accept" => position(args, "/wp accept <n>").map_or_else(identity, Command::WpAccept),
        "rm" | "remove" => position(args, "/wp rm <n>").map_or_else(identity, Command::WpRemove),
        _ => Command::Invalid("usage: /wp [accept <n> | rm <n>]".into()),
    }
}

/// `/config use|model|key|search|add ...`
fn parse_config(rest: &str) -> Command {
    let (sub, args) = split_sub(rest);
    match sub.as_str() {
        "" | "list" => Command::Configs,
        "use" => position(args, "/config use <n>").map_or_else(identity, Command::ConfigUse),
        "model" if !args.is_empty() => Command::ConfigModel(args.to_string()),
        "key" if !args.is_empty() => Command::ConfigKey(args.to_string()),
        "search" => match on_off(args) {
            Some(on) => Command::ConfigSearch(on),
            None => Command::Invalid("usage: /config search on|off".into()),
        },
        "add" => {
            const USAGE: &str = "usage: /config add <name> <gemini|custom> <base_url> <model>";
            let parts: Vec<&str> = args.split_whitespace().collect();
            let [name, provider, base_url, model] = parts.as_slice() else {
                return Command::Invalid(USAGE.into());
            };
            match provider.parse::<AiProvider>() {
                Ok(provider) => Command::ConfigAdd {
                    name: name.to_string(),
                    provider,
                    base_url: base_url.to_string(),
                    model: model.to_string(),
                },
                Err(_) => Command::Invalid(USAGE.into()),
            }
        }
        _ => Command::Invalid("usage: /config [use <n> | model <m> | key <k> | search on|off | add ...]".into()),
    }
}

/// `/tool add|toggle|rm ...`
fn parse_tool(rest: &str) -> Command {
    let (sub, args) = split_sub(rest);
    match sub.as_str() {
        "" | "list" => Command::Tools,
        "add" => {
            let mut parts = args.splitn(3, char::is_whitespace);
            match (parts.next(), parts.next()) {
                (Some(name), Some(endpoint)) if !name.is_empty() && !endpoint.is_empty() => {
                    Command::ToolAdd {
                        name: name.to_string(),
                        endpoint: endpoint.to_string(),
                        description: parts.next().unwrap_or("").trim().to_string(),
                    }
                }
                _ => Command::Invalid("usage: /tool add <name> <endpoint> [description]".into()),
            }
        }
        "toggle" => position(args, "/tool toggle <n>").map_or_else(identity, Command::ToolToggle),
        "rm" | "remove" => position(args, "/tool rm <n>").map_or_else(identity, Command::ToolRemove),
        _ => Command::Invalid("usage: /tool [add ... | toggle <n> | rm <n>]".into()),
    }
}

fn split_sub(rest: &str) -> (String, &str) {
    match rest.split_once(char::is_whitespace) {
        Some((sub, args)) => (sub.to_lowercase(), args.trim()),
        None => (rest.to_lowercase(), ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(
            CommandParser::parse("  what is a limit?  "),
            Command::Chat("what is a limit?".into())
        );
    }

    #[test]
    fn simple_commands() {
        assert_eq!(CommandParser::parse("/help"), Command::Help);
        assert_eq!(CommandParser::parse("/QUIT"), Command::Quit);
        assert_eq!(CommandParser::parse("/new"), Command::New);
        assert_eq!(CommandParser::parse("/retry"), Command::Retry);
        assert_eq!(CommandParser::parse("/tokens"), Command::Tokens);
        assert_eq!(CommandParser::parse("/logout"), Command::Logout);
        assert_eq!(CommandParser::parse("   "), Command::Chat(String::new()));
    }

    #[test]
    fn positions_are_one_based() {
        assert_eq!(CommandParser::parse("/switch 2"), Command::Switch(1));
        assert_eq!(CommandParser::parse("/quiz 1"), Command::Quiz(Some(0)));
        assert_eq!(CommandParser::parse("/quiz"), Command::Quiz(None));
        assert!(matches!(CommandParser::parse("/switch 0"), Command::Invalid(_)));
        assert!(matches!(CommandParser::parse("/delete x"), Command::Invalid(_)));
    }

    #[test]
    fn prompt_with_and_without_text() {
        assert_eq!(CommandParser::parse("/prompt"), Command::Prompt(None));
        assert_eq!(
            CommandParser::parse("/prompt Answer like Feynman"),
            Command::Prompt(Some("Answer like Feynman".into()))
        );
    }

    #[test]
    fn use_switches() {
        assert_eq!(
            CommandParser::parse("/use kb off"),
            Command::Use {
                switch: ContextSwitch::KnowledgeBase,
                enabled: false
            }
        );
        assert_eq!(
            CommandParser::parse("/use MCP on"),
            Command::Use {
                switch: ContextSwitch::Mcp,
                enabled: true
            }
        );
        assert!(matches!(CommandParser::parse("/use kb maybe"), Command::Invalid(_)));
    }

    #[test]
    fn answer_keeps_free_text() {
        assert_eq!(
            CommandParser::parse("/answer 3 the chain rule"),
            Command::Answer {
                question: 2,
                value: "the chain rule".into()
            }
        );
        assert!(matches!(CommandParser::parse("/answer 3"), Command::Invalid(_)));
    }

    #[test]
    fn kb_add_collects_tags() {
        assert_eq!(
            CommandParser::parse("/kb add sin²x + cos²x = 1 #trig #identity"),
            Command::KbAdd {
                content: "sin²x + cos²x = 1".into(),
                tags: vec!["trig".into(), "identity".into()]
            }
        );
        assert_eq!(CommandParser::parse("/kb rm 1"), Command::KbRemove(0));
        assert_eq!(CommandParser::parse("/kb"), Command::Kb);
    }

    #[test]
    fn weak_point_commands() {
        assert_eq!(CommandParser::parse("/wp"), Command::Wp);
        assert_eq!(CommandParser::parse("/wp accept 2"), Command::WpAccept(1));
        assert_eq!(CommandParser::parse("/wp rm 1"), Command::WpRemove(0));
    }

    #[test]
    fn config_commands() {
        assert_eq!(CommandParser::parse("/config use 1"), Command::ConfigUse(0));
        assert_eq!(
            CommandParser::parse("/config model gemini-2.5-flash"),
            Command::ConfigModel("gemini-2.5-flash".into())
        );
        assert_eq!(CommandParser::parse("/config search on"), Command::ConfigSearch(true));
        assert_eq!(
            CommandParser::parse("/config add local openai http://localhost:11434/v1 llama3"),
            Command::ConfigAdd {
                name: "local".into(),
                provider: AiProvider::Custom,
                base_url: "http://localhost:11434/v1".into(),
                model: "llama3".into(),
            }
        );
        assert!(matches!(
            CommandParser::parse("/config add local claude http://x m"),
            Command::Invalid(_)
        ));
    }

    #[test]
    fn tool_commands() {
        assert_eq!(
            CommandParser::parse("/tool add wolfram https://api.example.com symbolic math"),
            Command::ToolAdd {
                name: "wolfram".into(),
                endpoint: "https://api.example.com".into(),
                description: "symbolic math".into(),
            }
        );
        assert_eq!(CommandParser::parse("/tool toggle 1"), Command::ToolToggle(0));
        assert_eq!(CommandParser::parse("/tools"), Command::Tools);
    }

    #[test]
    fn paths_and_unknown() {
        assert_eq!(
            CommandParser::parse("/attach notes/graph.png"),
            Command::Attach(PathBuf::from("notes/graph.png"))
        );
        assert_eq!(
            CommandParser::parse("/export backup.json"),
            Command::Export(PathBuf::from("backup.json"))
        );
        assert!(matches!(CommandParser::parse("/frobnicate"), Command::Invalid(_)));
    }
}
