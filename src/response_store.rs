//! Best-effort dumps of raw Firebase response bodies for offline analysis.
//!
//! Saving must never interrupt normal application flow: errors are logged
//! and swallowed.

use std::path::PathBuf;

use tokio::fs;
use tracing::warn;

/// Writes response bodies to `{dir}/{endpoint}/{timestamp}_{suffix}.json`.
/// A store without a directory does nothing.
#[derive(Debug, Clone, Default)]
pub struct ResponseStore {
    dir: Option<PathBuf>,
}

impl ResponseStore {
    pub fn new(dir: Option<impl Into<PathBuf>>) -> Self {
        Self {
            dir: dir.map(Into::into),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// - `endpoint`: sub-directory name, e.g. `"sign_in"` or `"query"`.
    /// - `suffix`: appended after the timestamp, e.g. a database path. `""` omits it.
    pub async fn save(&self, endpoint: &str, suffix: &str, bytes: &[u8]) {
        let Some(root) = &self.dir else {
            return;
        };

        let ts = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let suffix = sanitize(suffix);
        let filename = if suffix.is_empty() {
            format!("{ts}.json")
        } else {
            format!("{ts}_{suffix}.json")
        };

        let dir = root.join(endpoint);
        let path = dir.join(filename);

        if let Err(e) = fs::create_dir_all(&dir).await {
            warn!(path = %path.display(), error = %e, "response_store: failed to create directory");
            return;
        }

        // Pretty-print the JSON if valid; fall back to raw bytes otherwise.
        let content = match serde_json::from_slice::<serde_json::Value>(bytes) {
            Ok(v) => serde_json::to_vec_pretty(&v).unwrap_or_else(|_| bytes.to_vec()),
            Err(_) => bytes.to_vec(),
        };

        if let Err(e) = fs::write(&path, &content).await {
            warn!(path = %path.display(), error = %e, "response_store: failed to write response file");
        } else {
            tracing::debug!(path = %path.display(), bytes = content.len(), "response_store: saved");
        }
    }
}

/// Database paths and object names contain `/`; keep file names flat.
fn sanitize(suffix: &str) -> String {
    suffix
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
