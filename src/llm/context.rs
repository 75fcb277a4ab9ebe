//! System-instruction composition.
//!
//! The provider config's prompt comes first, then the session's own
//! instructions, then whichever student context the session has switched on.

use crate::model::{AiConfig, ChatSession, KbBlock, McpTool, WpBlock, WpStatus};

/// Student context available to a send.
#[derive(Debug, Clone, Copy)]
pub struct StudentContext<'a> {
    pub knowledge_base: &'a [KbBlock],
    pub weak_points: &'a [WpBlock],
    pub tools: &'a [McpTool],
}

/// Build the system instruction for one request.
pub fn build_system_instruction(
    config: &AiConfig,
    session: &ChatSession,
    ctx: StudentContext<'_>,
) -> String {
    let mut sections = Vec::new();

    if !config.system_prompt.trim().is_empty() {
        sections.push(config.system_prompt.trim().to_string());
    }

    if let Some(prompt) = session.custom_prompt() {
        sections.push(format!("### Session instructions\n{prompt}"));
    }

    if session.settings.use_knowledge_base && !ctx.knowledge_base.is_empty() {
        let lines: Vec<String> = ctx
            .knowledge_base
            .iter()
            .map(|b| match b.tags.as_deref() {
                Some(tags) if !tags.is_empty() => format!("- {} (tags: {})", b.content, tags.join(", ")),
                _ => format!("- {}", b.content),
            })
            .collect();
        sections.push(format!("### [Global knowledge base]\n{}", lines.join("\n")));
    }

    if session.settings.use_weak_points && !ctx.weak_points.is_empty() {
        let lines: Vec<String> = ctx
            .weak_points
            .iter()
            .map(|w| {
                let status = match w.status {
                    WpStatus::Accepted => "confirmed",
                    WpStatus::Suggested => "suspected",
                };
                format!("- {} ({status})", w.content)
            })
            .collect();
        sections.push(format!("### [Weak points]\n{}", lines.join("\n")));
    }

    if session.settings.use_mcp {
        let lines: Vec<String> = ctx
            .tools
            .iter()
            .filter(|t| t.enabled)
            .map(|t| match &t.endpoint {
                Some(ep) => format!("- {}: {} ({ep})", t.name, t.description),
                None => format!("- {}: {}", t.name, t.description),
            })
            .collect();
        if !lines.is_empty() {
            sections.push(format!("### [Available tools]\n{}", lines.join("\n")));
        }
    }

    sections.join("\n\n")
}
