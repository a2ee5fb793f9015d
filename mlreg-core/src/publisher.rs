//! The publishing procedure: one run per invocation, holding every file of a
//! model directory plus the model's metadata tags.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::PublisherConfig;
use crate::discovery::{discover, ensure_model_dir, join_artifact_path};
use crate::error::PublishError;
use crate::registration;
use crate::tags::TagSet;
use crate::tracking::{ModelVersion, RunInfo, RunStatus, TrackingClient};

/// What to publish.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Run name and `model_name` tag.
    pub model_name: String,
    pub model_dir: PathBuf,
    /// Single extra file logged at the run root, typically the model config.
    pub config_file: Option<PathBuf>,
}

impl PublishRequest {
    pub fn new(model_name: impl Into<String>, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_name: model_name.into(),
            model_dir: model_dir.into(),
            config_file: None,
        }
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub run_id: String,
    pub experiment_name: String,
    pub experiment_id: String,
    pub artifact_uri: String,
    /// Artifact paths inside the run, in upload order.
    pub artifacts: Vec<String>,
    pub config_logged: bool,
    pub model_version: Option<ModelVersion>,
}

/// Contents written into an open run.
struct RunContents {
    artifacts: Vec<String>,
    config_logged: bool,
    model_version: Option<ModelVersion>,
}

/// Publishes model directories through a [`TrackingClient`].
pub struct ArtifactPublisher<C> {
    client: C,
    config: PublisherConfig,
}

impl<C: TrackingClient> ArtifactPublisher<C> {
    pub fn new(client: C, config: PublisherConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Run the whole procedure.
    ///
    /// The model directory is checked before any registry call. Once the run is
    /// open it is always finalized: `FINISHED` when everything was logged,
    /// `FAILED` otherwise. A failed run is left partial on the server; calling
    /// again creates a new run.
    pub async fn publish(&self, request: &PublishRequest) -> Result<PublishReport, PublishError> {
        ensure_model_dir(&request.model_dir)?;

        let experiment_name = &self.config.tracking.experiment;
        let experiment_id = self
            .client
            .get_or_create_experiment(experiment_name)
            .await?;
        let run = self
            .client
            .create_run(&experiment_id, &request.model_name)
            .await?;
        info!(
            run_id = %run.run_id,
            model = %request.model_name,
            experiment = %experiment_name,
            "Opened run"
        );

        let outcome = self.fill_run(&run, request).await;
        let status = if outcome.is_ok() {
            RunStatus::Finished
        } else {
            RunStatus::Failed
        };
        let finalized = self.client.update_run(&run.run_id, status).await;

        let contents = match (outcome, finalized) {
            (Ok(contents), Ok(())) => contents,
            (Ok(_), Err(e)) => return Err(e),
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(close_err)) => {
                warn!(run_id = %run.run_id, error = %close_err, "Failed to finalize run");
                return Err(e);
            }
        };

        info!(
            run_id = %run.run_id,
            artifacts = contents.artifacts.len(),
            "Run finished"
        );
        Ok(PublishReport {
            run_id: run.run_id,
            experiment_name: experiment_name.clone(),
            experiment_id,
            artifact_uri: run.artifact_uri,
            artifacts: contents.artifacts,
            config_logged: contents.config_logged,
            model_version: contents.model_version,
        })
    }

    async fn fill_run(
        &self,
        run: &RunInfo,
        request: &PublishRequest,
    ) -> Result<RunContents, PublishError> {
        let mut artifacts = Vec::new();

        let mut config_logged = false;
        // Canonical path of the logged config file, so the walk does not
        // upload it a second time to the same root path.
        let mut logged_config = None;
        if let Some(config_file) = &request.config_file {
            if config_file.is_file() {
                self.client.log_artifact(run, config_file, None).await?;
                if let Some(name) = config_file.file_name() {
                    artifacts.push(name.to_string_lossy().into_owned());
                }
                config_logged = true;
                logged_config = config_file.canonicalize().ok();
            } else {
                warn!(
                    path = %config_file.display(),
                    "Config file not found, continuing without it"
                );
            }
        }

        let prefix = self.config.registration.artifact_path.as_deref();
        for artifact in discover(&request.model_dir) {
            let artifact = artifact?;
            let dir = join_artifact_path(prefix, artifact.artifact_dir().as_deref());
            if dir.is_none()
                && logged_config.is_some()
                && artifact.local_path().canonicalize().ok() == logged_config
            {
                debug!(file = %artifact.relative_path().display(), "Config file already logged");
                continue;
            }
            debug!(
                file = %artifact.relative_path().display(),
                artifact_path = dir.as_deref().unwrap_or(""),
                "Logging artifact"
            );
            self.client
                .log_artifact(run, artifact.local_path(), dir.as_deref())
                .await?;
            let name = artifact.file_name();
            artifacts.push(match dir {
                Some(dir) => format!("{dir}/{name}"),
                None => name,
            });
        }

        let tags = TagSet::for_model(&request.model_name, &self.config.metadata);
        for (key, value) in tags.iter() {
            self.client.set_tag(&run.run_id, key, value).await?;
        }

        let model_version = match &self.config.registration.registered_model_name {
            Some(name) => {
                Some(registration::register_version(&self.client, name, run, prefix, &tags).await?)
            }
            None => None,
        };

        Ok(RunContents {
            artifacts,
            config_logged,
            model_version,
        })
    }
}
