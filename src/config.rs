//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::model::{AiConfig, AiProvider};

/// Stem of the persisted state document.
pub const STORAGE_KEY: &str = "ai_scholar_state_v6";

/// Name of the access marker file written after a successful password check.
pub const AUTH_KEY: &str = "scholar_auth_v1";

/// Password used when no site password is configured.
pub const DEFAULT_SITE_PASSWORD: &str = "admin888";

/// Default Gemini endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default tutoring system prompt. Documents the action-block formats the
/// client knows how to extract.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an outstanding AI learning tutor who teaches with structured, visual material.

### Core tasks
1. **Use the context**: you receive the student's [Global knowledge base] and [Weak points]. Build on them.
2. **Teach visually**: use mind maps to organise structure and quizzes to consolidate memory.
3. **Plot maths**: when a mathematical function comes up (for example $y=x^2$), emit a plot JSON block.

### Formatting (Obsidian style)
- **Callouts**: > [!INFO] background | > [!TIP] study tip | > [!WARN] common mistake | > [!ABSTRACT] key idea
- **Maths**: use $...$ or $$...$$ for LaTeX.

### Action blocks (always standard fenced JSON)

#### 1. Plot a function (PLOT_FUNCTION)
```json
{
  "action": "PLOT_FUNCTION",
  "data": { "title": "Plot title", "equation": "x * x", "range": [-10, 10], "label": "y = x²" }
}
```

#### 2. Generate a quiz (GENERATE_QUIZ)
```json
{
  "action": "GENERATE_QUIZ",
  "data": {
    "title": "Title",
    "questions": [{"type": "multiple_choice", "question": "Prompt", "options": ["A", "B"], "correctAnswer": 0, "explanation": "Why"}]
  }
}
```

#### 3. Generate a mind map (GENERATE_MINDMAP)
```json
{
  "action": "GENERATE_MINDMAP",
  "data": { "id": "root", "label": "Topic", "children": [] }
}
```

#### 4. Suggest a weak point (SUGGEST_WEAK_POINT)
```json
{
  "action": "SUGGEST_WEAK_POINT",
  "data": { "content": "The concept the student keeps getting wrong" }
}
```

**Constraints**: reply in the student's language. Only emit JSON blocks when they genuinely help. Prefer Socratic guidance."#;

/// The provider config every fresh state starts with.
pub fn default_ai_config() -> AiConfig {
    AiConfig {
        id: "default".to_string(),
        name: "Default Gemini tutor".to_string(),
        provider: AiProvider::Gemini,
        base_url: GEMINI_BASE_URL.to_string(),
        model: "gemini-3-pro-preview".to_string(),
        system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        api_key: None,
        use_search: Some(false),
    }
}

/// Process-level configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the state document, access marker and logs.
    pub data_dir: PathBuf,
    /// Fallback API key for configs that carry none.
    pub api_key: Option<SecretString>,
    /// Password for the access gate.
    pub site_password: SecretString,
    /// Send logs to stderr instead of the rolling log file.
    pub log_to_stderr: bool,
}

impl AppConfig {
    /// Build from environment variables.
    ///
    /// - `SCHOLAR_DATA_DIR` (default `$HOME/.scholar`)
    /// - `API_KEY`, `VITE_API_KEY`, `GEMINI_API_KEY` (first non-empty wins)
    /// - `SITE_PASSWORD`, `VITE_SITE_PASSWORD` (default `admin888`)
    /// - `SCHOLAR_LOG_STDERR` (`1`/`true` to log to stderr)
    pub fn from_env() -> Self {
        let data_dir = std::env::var("SCHOLAR_DATA_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".scholar")
            });

        let api_key = first_env(&["API_KEY", "VITE_API_KEY", "GEMINI_API_KEY"])
            .map(SecretString::from);

        let site_password = first_env(&["SITE_PASSWORD", "VITE_SITE_PASSWORD"])
            .unwrap_or_else(|| DEFAULT_SITE_PASSWORD.to_string());

        let log_to_stderr = std::env::var("SCHOLAR_LOG_STDERR")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            data_dir,
            api_key,
            site_password: SecretString::from(site_password),
            log_to_stderr,
        }
    }

    /// Path of the persisted state document.
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(format!("{STORAGE_KEY}.json"))
    }

    /// Path of the access marker.
    pub fn auth_path(&self) -> PathBuf {
        self.data_dir.join(AUTH_KEY)
    }

    /// Directory for rolling log files.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .find(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_gemini() {
        let config = default_ai_config();
        assert_eq!(config.id, "default");
        assert_eq!(config.provider, AiProvider::Gemini);
        assert_eq!(config.base_url, GEMINI_BASE_URL);
        assert!(config.api_key.is_none());
        assert!(config.system_prompt.contains("GENERATE_QUIZ"));
        assert!(config.system_prompt.contains("SUGGEST_WEAK_POINT"));
    }

    #[test]
    fn paths_live_under_data_dir() {
        let config = AppConfig {
            data_dir: PathBuf::from("/tmp/scholar"),
            api_key: None,
            site_password: SecretString::from("pw"),
            log_to_stderr: false,
        };
        assert_eq!(
            config.state_path(),
            PathBuf::from("/tmp/scholar/ai_scholar_state_v6.json")
        );
        assert_eq!(config.auth_path(), PathBuf::from("/tmp/scholar/scholar_auth_v1"));
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/scholar/logs"));
    }
}
