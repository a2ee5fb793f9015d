//! Artifact discovery: lazy recursive walk of a model directory.
//!
//! Symlinked directories are not descended. A symlink that resolves to a
//! regular file is reported under the link's own relative path; dangling
//! links are skipped.

use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::PublishError;

/// A file under the model directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    local_path: PathBuf,
    relative_path: PathBuf,
}

impl Artifact {
    pub fn new(local_path: PathBuf, relative_path: PathBuf) -> Self {
        Self {
            local_path,
            relative_path,
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Path relative to the model root.
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    pub fn file_name(&self) -> String {
        self.relative_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Parent directory of the relative path joined with `/`, or `None` for
    /// files directly in the model root.
    pub fn artifact_dir(&self) -> Option<String> {
        let parent = self.relative_path.parent()?;
        let parts: Vec<String> = parent
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }
}

/// Fail with `NotFound` unless `path` is an existing directory.
pub fn ensure_model_dir(path: &Path) -> Result<(), PublishError> {
    if !path.is_dir() {
        return Err(PublishError::not_found(path));
    }
    Ok(())
}

/// Lazily enumerate every regular file below `root`, in traversal order.
pub fn discover(root: &Path) -> impl Iterator<Item = Result<Artifact, PublishError>> + use<> {
    let root = root.to_path_buf();
    WalkDir::new(&root)
        .min_depth(1)
        .into_iter()
        .filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(PublishError::from(e))),
            };
            let file_type = entry.file_type();
            let is_file = if file_type.is_symlink() {
                match std::fs::metadata(entry.path()) {
                    Ok(meta) => meta.is_file(),
                    Err(e) => {
                        tracing::debug!(path = %entry.path().display(), error = %e, "Skipping dangling symlink");
                        false
                    }
                }
            } else {
                file_type.is_file()
            };
            if !is_file {
                return None;
            }
            let relative = entry
                .path()
                .strip_prefix(&root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| PathBuf::from(entry.file_name()));
            Some(Ok(Artifact::new(entry.into_path(), relative)))
        })
}

/// Join an optional prefix and an optional sub-directory into one artifact path.
pub fn join_artifact_path(prefix: Option<&str>, dir: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [prefix, dir]
        .into_iter()
        .flatten()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
