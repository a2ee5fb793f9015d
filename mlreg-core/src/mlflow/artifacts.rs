//! Artifact store resolution from a run's `artifact_uri`.

use std::path::{Path, PathBuf};

use crate::error::PublishError;

/// Where a run's artifacts live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    /// Served by the tracking server's artifact proxy; `path` is relative to
    /// `/api/2.0/mlflow-artifacts/artifacts/`.
    Proxied { path: String },
    /// A directory on the local filesystem.
    Local { root: PathBuf },
}

impl ArtifactLocation {
    pub fn parse(uri: &str) -> Result<Self, PublishError> {
        if let Some(rest) = uri.strip_prefix("mlflow-artifacts:") {
            // `mlflow-artifacts://host:port/path` carries an authority we ignore;
            // uploads always go through the configured tracking server.
            let path = match rest.strip_prefix("//") {
                Some(with_authority) => with_authority
                    .find('/')
                    .map(|i| &with_authority[i..])
                    .unwrap_or(""),
                None => rest,
            };
            return Ok(Self::Proxied {
                path: path.trim_matches('/').to_string(),
            });
        }
        if uri.starts_with("file:") {
            let root = url::Url::parse(uri)
                .ok()
                .and_then(|u| u.to_file_path().ok())
                .ok_or_else(|| PublishError::UnsupportedArtifactUri {
                    uri: uri.to_string(),
                })?;
            return Ok(Self::Local { root });
        }
        if Path::new(uri).is_absolute() {
            return Ok(Self::Local {
                root: PathBuf::from(uri),
            });
        }
        Err(PublishError::UnsupportedArtifactUri {
            uri: uri.to_string(),
        })
    }

    /// Local destination of a file uploaded under `artifact_path`.
    pub fn local_destination(
        root: &Path,
        artifact_path: Option<&str>,
        file_name: &str,
    ) -> PathBuf {
        let mut dest = root.to_path_buf();
        for segment in split_segments(artifact_path) {
            dest.push(segment);
        }
        dest.push(file_name);
        dest
    }
}

/// Percent-encoded URL path for a proxied upload.
pub fn proxied_path(base: &str, artifact_path: Option<&str>, file_name: &str) -> String {
    base.split('/')
        .filter(|s| !s.is_empty())
        .chain(split_segments(artifact_path))
        .chain(std::iter::once(file_name))
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn split_segments(artifact_path: Option<&str>) -> impl Iterator<Item = &str> {
    artifact_path
        .into_iter()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty())
}
