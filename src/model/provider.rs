//! AI provider configurations and tool descriptors.

use serde::{Deserialize, Serialize};

/// Which wire protocol a config speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiProvider {
    /// Google Gemini `generateContent`.
    Gemini,
    /// Any OpenAI-compatible `chat/completions` endpoint.
    Custom,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::Gemini => "gemini",
            AiProvider::Custom => "custom",
        }
    }
}

impl std::str::FromStr for AiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(AiProvider::Gemini),
            "custom" | "openai" => Ok(AiProvider::Custom),
            other => Err(format!("unknown provider '{other}' (expected gemini or custom)")),
        }
    }
}

/// One selectable AI backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    pub id: String,
    pub name: String,
    pub provider: AiProvider,
    pub base_url: String,
    pub model: String,
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_search: Option<bool>,
}

impl AiConfig {
    /// The config's own key, ignoring blank values.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn search_enabled(&self) -> bool {
        self.use_search.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpToolType {
    BuiltIn,
    Custom,
}

/// An external tool the tutor may be told about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    pub id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: McpToolType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_aliases() {
        assert_eq!("Gemini".parse::<AiProvider>().unwrap(), AiProvider::Gemini);
        assert_eq!("openai".parse::<AiProvider>().unwrap(), AiProvider::Custom);
        assert!("claude".parse::<AiProvider>().is_err());
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let mut config = crate::config::default_ai_config();
        config.api_key = Some("  ".into());
        assert!(config.api_key().is_none());
        config.api_key = Some("k".into());
        assert_eq!(config.api_key(), Some("k"));
    }

    #[test]
    fn config_uses_camel_case_keys() {
        let json = serde_json::to_value(crate::config::default_ai_config()).unwrap();
        assert!(json.get("baseUrl").is_some());
        assert!(json.get("systemPrompt").is_some());
        assert_eq!(json["provider"], "gemini");
    }

    #[test]
    fn tool_type_field_is_named_type() {
        let tool = McpTool {
            id: "t1".into(),
            name: "search".into(),
            description: "web search".into(),
            enabled: true,
            kind: McpToolType::BuiltIn,
            endpoint: None,
        };
        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["type"], "built_in");
    }
}
