//! Workspace confinement for the file commands.
//!
//! Every path the model supplies is interpreted relative to the workspace
//! root and must stay inside it, after symlinks are resolved.

use std::path::{Component, Path, PathBuf};

/// Dangling symlinks followed before giving up.
const MAX_LINK_DEPTH: usize = 8;

/// Error returned when a path escapes the workspace.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Path '{path}' is outside the workspace")]
    OutsideWorkspace { path: String },

    #[error("Failed to resolve path '{path}': {reason}")]
    ResolveFailed { path: String, reason: String },
}

impl From<PathError> for issola_core::CommandError {
    fn from(e: PathError) -> Self {
        issola_core::CommandError::PermissionDenied(e.to_string())
    }
}

/// The directory the agent may read and write.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open (creating if needed) the workspace at `root`.
    pub fn open(root: impl AsRef<Path>) -> std::io::Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a model-supplied path to an absolute path inside the workspace.
    ///
    /// The target does not need to exist; its nearest existing ancestor is
    /// canonicalized so a symlink cannot lead outside.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathError> {
        let input = Path::new(path);
        if input.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(PathError::PathTraversal { path: path.into() });
        }

        let joined = if input.is_absolute() {
            input.to_path_buf()
        } else {
            self.root.join(input)
        };

        let canonical = self.anchor(&joined, path, 0)?;
        if !canonical.starts_with(&self.root) {
            return Err(PathError::OutsideWorkspace { path: path.into() });
        }
        Ok(canonical)
    }

    /// Canonicalize the nearest existing ancestor of `joined` and re-append
    /// the missing tail. A dangling symlink counts as existing and is
    /// followed to its target.
    fn anchor(&self, joined: &Path, original: &str, depth: usize) -> Result<PathBuf, PathError> {
        let resolve_failed = |reason: String| PathError::ResolveFailed {
            path: original.into(),
            reason,
        };

        let mut existing = joined;
        let mut rest = Vec::new();
        while existing.symlink_metadata().is_err() {
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    rest.push(name.to_os_string());
                    existing = parent;
                }
                _ => break,
            }
        }

        let mut canonical = match existing.canonicalize() {
            Ok(canonical) => canonical,
            Err(_) if existing.is_symlink() && depth < MAX_LINK_DEPTH => {
                let target = std::fs::read_link(existing).map_err(|e| resolve_failed(e.to_string()))?;
                let target = match existing.parent() {
                    Some(parent) => parent.join(target),
                    None => target,
                };
                self.anchor(&target, original, depth + 1)?
            }
            Err(e) => return Err(resolve_failed(e.to_string())),
        };
        for name in rest.into_iter().rev() {
            canonical.push(name);
        }
        Ok(canonical)
    }

    /// `path` relative to the workspace root, for display.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}
