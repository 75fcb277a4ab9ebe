//! Reading local files into message attachments.

use std::path::Path;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;

use crate::error::SessionError;
use crate::model::FileData;

/// Inline attachments are capped at the provider's inline-data limit.
pub const MAX_ATTACHMENT_BYTES: usize = 20 * 1024 * 1024;

/// MIME type guessed from the file extension.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "txt" | "text" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}

/// Read `path` and encode it as an inline attachment.
pub async fn load_attachment(path: &Path) -> Result<FileData, SessionError> {
    let invalid = |reason: String| SessionError::InvalidAttachment {
        path: path.display().to_string(),
        reason,
    };

    let bytes = tokio::fs::read(path).await.map_err(|e| invalid(e.to_string()))?;
    if bytes.is_empty() {
        return Err(invalid("file is empty".into()));
    }
    if bytes.len() > MAX_ATTACHMENT_BYTES {
        return Err(invalid(format!(
            "file is {} bytes, limit is {}",
            bytes.len(),
            MAX_ATTACHMENT_BYTES
        )));
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(FileData {
        mime_type: mime_for(path).to_string(),
        data: BASE64_STANDARD.encode(&bytes),
        file_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn mime_by_extension() {
        assert_eq!(mime_for(Path::new("a/graph.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("notes.md")), "text/markdown");
        assert_eq!(mime_for(Path::new("blob")), "application/octet-stream");
    }

    #[tokio::test]
    async fn loads_and_encodes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        let file = load_attachment(&path).await.unwrap();
        assert_eq!(file.file_name, "notes.txt");
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.data, "aGVsbG8=");
    }

    #[tokio::test]
    async fn missing_and_empty_files_are_rejected() {
        let dir = TempDir::new().unwrap();
        let missing = load_attachment(&dir.path().join("nope.png")).await;
        assert!(matches!(missing, Err(SessionError::InvalidAttachment { .. })));

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "").unwrap();
        assert!(load_attachment(&empty).await.is_err());
    }
}
