//! Workspace confinement and per-solve file tracking.
//!
//! [`Workspace`] owns the canonical root and resolves every path argument
//! inside it. [`ReadSet`] tracks which files a solve has observed (the
//! read-before-overwrite invariant) and [`WriteGuard`] detects sibling
//! sub-agents racing on the same write target within one parent step.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use parking_lot::Mutex;

use crate::errors::ToolError;

/// The filesystem confinement root.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open a workspace rooted at `root`. The root must exist; it is
    /// canonicalized once so symlinked roots behave consistently.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ToolError> {
        let root = root.as_ref().canonicalize().map_err(|e| {
            ToolError::internal(format!(
                "cannot open workspace root {}: {e}",
                root.as_ref().display()
            ))
        })?;
        Ok(Self { root })
    }

    /// The canonical root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path argument to a confined absolute path.
    ///
    /// Relative paths are joined to the root, `.`/`..` are normalized
    /// lexically, and the deepest existing ancestor is canonicalized to
    /// defeat symlink escapes. Anything that lands outside the root is
    /// rejected with `path_escape`.
    pub fn confine(&self, raw: &str) -> Result<PathBuf, ToolError> {
        if raw.trim().is_empty() {
            return Err(ToolError::invalid("path must not be empty"));
        }
        let candidate = Path::new(raw);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let normalized = lexical_normalize(&joined);
        if !normalized.starts_with(&self.root) {
            return Err(ToolError::PathEscape { path: raw.to_owned() });
        }

        // Symlinks can re-point a confined-looking path outside the root;
        // canonicalize the deepest existing ancestor and re-check.
        let mut probe = normalized.clone();
        while !probe.exists() && probe.pop() {}
        if probe.as_os_str().is_empty() {
            return Ok(normalized);
        }
        let canonical = probe
            .canonicalize()
            .map_err(|e| ToolError::internal(format!("cannot resolve {}: {e}", probe.display())))?;
        if !canonical.starts_with(&self.root) {
            return Err(ToolError::PathEscape { path: raw.to_owned() });
        }
        Ok(normalized)
    }
}

/// Normalize `.` and `..` components without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let _ = out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Per-solve set of workspace paths observed via read tools.
#[derive(Debug, Default)]
pub struct ReadSet {
    inner: Mutex<HashSet<PathBuf>>,
}

impl ReadSet {
    /// Empty read set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful read.
    pub fn insert(&self, path: PathBuf) {
        let _ = self.inner.lock().insert(path);
    }

    /// Whether the path was read in this solve.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().contains(path)
    }

    /// Number of recorded paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no path was recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Parent-step write-conflict detector.
///
/// Each writer claims its target under a claimant token (one token per
/// sub-agent or solve). A second claim by a *different* claimant fails; the
/// same claimant may rewrite its own file freely across its steps.
#[derive(Debug, Default)]
pub struct WriteGuard {
    claims: Mutex<HashMap<PathBuf, String>>,
}

impl WriteGuard {
    /// Empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a write target for `claimant`.
    pub fn claim(&self, path: &Path, claimant: &str) -> Result<(), ToolError> {
        let mut claims = self.claims.lock();
        match claims.get(path) {
            Some(owner) if owner != claimant => Err(ToolError::WriteConflict {
                path: path.display().to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                let _ = claims.insert(path.to_path_buf(), claimant.to_owned());
                Ok(())
            }
        }
    }
}
