//! Artifact extraction and quiz grading.

pub mod extract;
pub mod quiz;

pub use extract::{
    Action, ExtractedActions, SessionArtifacts, collect_session_artifacts, extract_actions,
    parse_action, summarize_action_blocks,
};
