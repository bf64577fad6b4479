//! Session directories: create, resume, list, state, artifacts, plans.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use planter_core::context::ExternalContext;
use planter_core::ids::SessionId;

use crate::errors::SessionError;

/// Subdirectory of the workspace holding all sessions.
const SESSIONS_SUBDIR: &str = ".openplanter/sessions";

/// Contents of `metadata.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// Session ID.
    pub session_id: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// Absolute workspace path at creation time.
    pub workspace_path: String,
}

/// Factory for sessions under one workspace.
#[derive(Clone, Debug)]
pub struct SessionStore {
    workspace_root: PathBuf,
}

impl SessionStore {
    /// Store rooted at a workspace.
    #[must_use]
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
        }
    }

    fn sessions_dir(&self) -> PathBuf {
        self.workspace_root.join(SESSIONS_SUBDIR)
    }

    /// Create a fresh session directory.
    pub fn create(&self) -> Result<Session, SessionError> {
        let id = SessionId::generate();
        let dir = self.sessions_dir().join(id.as_str());
        fs::create_dir_all(dir.join("artifacts"))?;

        let metadata = SessionMetadata {
            session_id: id.as_str().to_owned(),
            created_at: chrono::Utc::now().to_rfc3339(),
            workspace_path: self.workspace_root.display().to_string(),
        };
        fs::write(
            dir.join("metadata.json"),
            serde_json::to_string_pretty(&metadata)?,
        )?;
        info!(session = %id, "session created");
        Ok(Session { id, dir })
    }

    /// Resume an existing session by ID.
    pub fn resume(&self, id: &str) -> Result<Session, SessionError> {
        let dir = self.sessions_dir().join(id);
        if !dir.join("metadata.json").is_file() {
            return Err(SessionError::NotFound { id: id.to_owned() });
        }
        debug!(session = id, "session resumed");
        Ok(Session {
            id: SessionId::from_string(id),
            dir,
        })
    }

    /// All session IDs under this workspace, oldest first.
    ///
    /// IDs embed UUID v7 timestamps, so lexicographic order is creation
    /// order.
    pub fn list(&self) -> Result<Vec<String>, SessionError> {
        let dir = self.sessions_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<String> = fs::read_dir(&dir)?
            .filter_map(Result::ok)
            .filter(|e| e.path().join("metadata.json").is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// One persisted session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    dir: PathBuf,
}

impl Session {
    /// The session ID.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The session directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read `metadata.json`.
    pub fn metadata(&self) -> Result<SessionMetadata, SessionError> {
        let raw = fs::read_to_string(self.dir.join("metadata.json"))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Overwrite `state.json` atomically (write temp, then rename).
    pub fn snapshot_state(&self, context: &ExternalContext) -> Result<(), SessionError> {
        let tmp = self.dir.join("state.json.tmp");
        fs::write(&tmp, serde_json::to_string(context)?)?;
        fs::rename(&tmp, self.dir.join("state.json"))?;
        Ok(())
    }

    /// Load the latest state snapshot, if one was written.
    pub fn load_state(&self) -> Result<Option<ExternalContext>, SessionError> {
        let path = self.dir.join("state.json");
        if !path.is_file() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Write a named artifact blob.
    pub fn write_artifact(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, SessionError> {
        if name.contains('/') || name.contains("..") {
            return Err(SessionError::Io {
                message: format!("artifact name must be a bare filename: {name}"),
            });
        }
        let path = self.dir.join("artifacts").join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Read a named artifact blob.
    pub fn read_artifact(&self, name: &str) -> Result<Vec<u8>, SessionError> {
        Ok(fs::read(self.dir.join("artifacts").join(name))?)
    }

    /// Artifact names, sorted.
    pub fn list_artifacts(&self) -> Result<Vec<String>, SessionError> {
        let dir = self.dir.join("artifacts");
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Persist a plan as `{timestamp}.plan.md`. The newest plan is injected
    /// into the next solve.
    pub fn store_plan(&self, text: &str) -> Result<PathBuf, SessionError> {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let path = self.dir.join(format!("{stamp}.plan.md"));
        fs::write(&path, text)?;
        Ok(path)
    }

    /// The newest stored plan, by filename.
    pub fn latest_plan(&self) -> Result<Option<String>, SessionError> {
        let mut plans: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".plan.md"))
            })
            .collect();
        plans.sort();
        match plans.last() {
            Some(path) => Ok(Some(fs::read_to_string(path)?)),
            None => Ok(None),
        }
    }
}
