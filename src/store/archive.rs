//! Portable export of the study data.
//!
//! An archive carries sessions, the knowledge base, weak points and quiz
//! results. Provider configs and their API keys are never exported.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::error::StorageError;
use crate::model::{ChatSession, KbBlock, QuizResults, WpBlock};
use crate::state::AppState;

pub const ARCHIVE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Archive {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub sessions: Vec<ChatSession>,
    #[serde(default)]
    pub knowledge_base: Vec<KbBlock>,
    #[serde(default)]
    pub weak_points: Vec<WpBlock>,
    #[serde(default)]
    pub quiz_results: BTreeMap<String, QuizResults>,
}

impl Archive {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            version: ARCHIVE_VERSION,
            exported_at: Utc::now(),
            sessions: state.sessions.clone(),
            knowledge_base: state.knowledge_base.clone(),
            weak_points: state.weak_points.clone(),
            quiz_results: state.quiz_results.clone(),
        }
    }

    /// Merge into `state` by id. Entries whose id already exists are skipped.
    pub fn merge_into(self, state: &mut AppState) -> ImportSummary {
        let mut summary = ImportSummary::default();

        let known: HashSet<String> = state.sessions.iter().map(|s| s.id.clone()).collect();
        for session in self.sessions {
            if known.contains(&session.id) {
                summary.skipped += 1;
            } else {
                state.sessions.push(session);
                summary.sessions += 1;
            }
        }

        let known: HashSet<String> = state.knowledge_base.iter().map(|b| b.id.clone()).collect();
        for block in self.knowledge_base {
            if known.contains(&block.id) {
                summary.skipped += 1;
            } else {
                state.knowledge_base.push(block);
                summary.knowledge += 1;
            }
        }

        let known: HashSet<String> = state.weak_points.iter().map(|b| b.id.clone()).collect();
        for block in self.weak_points {
            if known.contains(&block.id) {
                summary.skipped += 1;
            } else {
                state.weak_points.push(block);
                summary.weak_points += 1;
            }
        }

        for (id, results) in self.quiz_results {
            if state.quiz_results.contains_key(&id) {
                summary.skipped += 1;
            } else {
                state.quiz_results.insert(id, results);
                summary.quiz_results += 1;
            }
        }

        summary
    }
}

/// Counts reported by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub sessions: usize,
    pub knowledge: usize,
    pub weak_points: usize,
    pub quiz_results: usize,
    pub skipped: usize,
}

impl ImportSummary {
    pub fn imported(&self) -> usize {
        self.sessions + self.knowledge + self.weak_points + self.quiz_results
    }
}

impl std::fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} sessions, {} knowledge blocks, {} weak points, {} quiz results ({} skipped)",
            self.sessions, self.knowledge, self.weak_points, self.quiz_results, self.skipped
        )
    }
}

/// Write the study data of `state` to `path` as pretty JSON.
pub async fn export_archive(state: &AppState, path: &Path) -> Result<Archive, StorageError> {
    let archive = Archive::from_state(state);
    let json = serde_json::to_vec_pretty(&archive)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;
    }
    fs::write(path, json)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    info!(
        path = %path.display(),
        sessions = archive.sessions.len(),
        "Archive exported"
    );
    Ok(archive)
}

/// Read an archive from `path` and merge it into `state`.
pub async fn import_archive(state: &mut AppState, path: &Path) -> Result<ImportSummary, StorageError> {
    let raw = fs::read_to_string(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    let archive: Archive = serde_json::from_str(&raw)?;
    if archive.version != ARCHIVE_VERSION {
        return Err(StorageError::ArchiveVersion {
            found: archive.version,
            expected: ARCHIVE_VERSION,
        });
    }
    let summary = archive.merge_into(state);
    state.normalize();
    info!(path = %path.display(), %summary, "Archive imported");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populated() -> AppState {
        let mut state = AppState::default();
        state.new_session();
        state.add_knowledge("Ohm's law: V = IR", vec!["physics".into()]);
        state.merge_suggested_weak_points(&["Unit conversion".into()]);
        state.quiz_results.insert("quiz-1".into(), QuizResults::default());
        state
    }

    #[tokio::test]
    async fn export_then_import_into_empty_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup.json");
        let source = populated();
        export_archive(&source, &path).await.unwrap();

        let mut target = AppState::default();
        let summary = import_archive(&mut target, &path).await.unwrap();
        assert_eq!(summary.sessions, 1);
        assert_eq!(summary.knowledge, 1);
        assert_eq!(summary.weak_points, 1);
        assert_eq!(summary.quiz_results, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(target.sessions, source.sessions);
        assert_eq!(target.knowledge_base, source.knowledge_base);
    }

    #[tokio::test]
    async fn reimport_skips_existing_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup.json");
        let mut state = populated();
        export_archive(&state, &path).await.unwrap();

        let summary = import_archive(&mut state, &path).await.unwrap();
        assert_eq!(summary.imported(), 0);
        assert_eq!(summary.skipped, 4);
        assert_eq!(state.sessions.len(), 1);
    }

    #[tokio::test]
    async fn export_leaves_out_configs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup.json");
        let mut state = populated();
        state.active_config_mut().api_key = Some("sk-secret".into());
        export_archive(&state, &path).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("sk-secret"));
        assert!(raw.contains("\"knowledgeBase\""));
    }

    #[tokio::test]
    async fn rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup.json");
        std::fs::write(&path, r#"{"version":9,"exportedAt":"2026-01-01T00:00:00Z"}"#).unwrap();
        let err = import_archive(&mut AppState::default(), &path).await.unwrap_err();
        assert!(matches!(err, StorageError::ArchiveVersion { found: 9, expected: 1 }));
    }
}
