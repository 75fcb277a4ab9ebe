//! Password gate in front of the client.
//!
//! A successful unlock leaves a marker file in the data directory so later
//! runs skip the prompt.

use std::path::PathBuf;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use secrecy::{ExposeSecret, SecretString};
use tokio::fs;
use tracing::{info, warn};

use crate::error::AuthError;

const MARKER_PAYLOAD: &str = "access_granted";

fn marker_value() -> String {
    BASE64_STANDARD.encode(MARKER_PAYLOAD)
}

pub struct AuthGate {
    marker_path: PathBuf,
    password: SecretString,
}

impl AuthGate {
    pub fn new(marker_path: impl Into<PathBuf>, password: SecretString) -> Self {
        Self {
            marker_path: marker_path.into(),
            password,
        }
    }

    /// Whether a previous run already unlocked this data directory.
    pub async fn is_authenticated(&self) -> bool {
        match fs::read_to_string(&self.marker_path).await {
            Ok(raw) => raw.trim() == marker_value(),
            Err(_) => false,
        }
    }

    /// Check `input` against the site password and record the marker.
    pub async fn unlock(&self, input: &str) -> Result<(), AuthError> {
        if input != self.password.expose_secret() {
            warn!("Rejected password attempt");
            return Err(AuthError::WrongPassword);
        }
        if let Some(parent) = self.marker_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.marker_path, marker_value()).await?;
        info!("Access granted");
        Ok(())
    }

    /// Forget the marker so the next run prompts again.
    pub async fn lock(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.marker_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
