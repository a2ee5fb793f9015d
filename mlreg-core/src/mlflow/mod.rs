//! HTTP client for the MLflow tracking server REST API.

pub mod artifacts;
pub mod protocol;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::config::TrackingConfig;
use crate::error::PublishError;
use crate::tracking::{ModelVersion, RunInfo, RunStatus, TrackingClient};
use artifacts::{ArtifactLocation, proxied_path};
use protocol::*;

const RESOURCE_DOES_NOT_EXIST: &str = "RESOURCE_DOES_NOT_EXIST";
const RESOURCE_ALREADY_EXISTS: &str = "RESOURCE_ALREADY_EXISTS";

#[derive(Debug, Clone)]
enum Auth {
    None,
    Bearer(String),
    Basic {
        username: String,
        password: Option<String>,
    },
}

/// Client for one MLflow tracking server.
#[derive(Clone)]
pub struct MlflowClient {
    http: Client,
    base_url: String,
    auth: Auth,
    request_timeout: Duration,
}

impl MlflowClient {
    pub fn new(config: &TrackingConfig) -> Result<Self, PublishError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        // Same precedence as the MLflow client: full basic credentials, then token.
        let auth = match (&config.username, &config.password, &config.token) {
            (Some(username), Some(password), _) => Auth::Basic {
                username: username.clone(),
                password: Some(password.clone()),
            },
            (_, _, Some(token)) => Auth::Bearer(token.clone()),
            (Some(username), None, None) => Auth::Basic {
                username: username.clone(),
                password: None,
            },
            (None, _, None) => Auth::None,
        };

        Ok(Self {
            http,
            base_url: config.uri.trim_end_matches('/').to_string(),
            auth,
            request_timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base_url, endpoint)
    }

    fn add_auth(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::None => req,
            Auth::Bearer(token) => req.bearer_auth(token),
            Auth::Basic { username, password } => req.basic_auth(username, password.as_ref()),
        }
    }

    async fn check_response(resp: Response) -> Result<Response, PublishError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        let body: ErrorResponse = serde_json::from_str(&text).unwrap_or_default();
        let message = if body.message.is_empty() {
            text
        } else {
            body.message
        };
        Err(PublishError::Service {
            status: status.as_u16(),
            error_code: body.error_code,
            message,
        })
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R, PublishError> {
        debug!(endpoint, "POST");
        let req = self
            .http
            .post(self.api_url(endpoint))
            .timeout(self.request_timeout)
            .json(body);
        let resp = self.add_auth(req).send().await?;
        let resp = Self::check_response(resp).await?;
        Ok(resp.json().await?)
    }

    /// POST for endpoints that answer with an empty object.
    async fn post_empty<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<(), PublishError> {
        self.post::<B, serde_json::Value>(endpoint, body).await?;
        Ok(())
    }

    async fn get_experiment_by_name(&self, name: &str) -> Result<Experiment, PublishError> {
        debug!(name, "GET experiments/get-by-name");
        let req = self
            .http
            .get(self.api_url("experiments/get-by-name"))
            .timeout(self.request_timeout)
            .query(&[("experiment_name", name)]);
        let resp = self.add_auth(req).send().await?;
        let resp = Self::check_response(resp).await?;
        let body: GetExperimentResponse = resp.json().await?;
        Ok(body.experiment)
    }

    fn active_experiment_id(name: &str, experiment: Experiment) -> Result<String, PublishError> {
        if experiment.lifecycle_stage.as_deref() == Some("deleted") {
            return Err(PublishError::ExperimentDeleted {
                name: name.to_string(),
            });
        }
        Ok(experiment.experiment_id)
    }

    async fn upload_proxied(
        &self,
        base: &str,
        local_path: &Path,
        artifact_path: Option<&str>,
        file_name: &str,
    ) -> Result<(), PublishError> {
        let url = format!(
            "{}/api/2.0/mlflow-artifacts/artifacts/{}",
            self.base_url,
            proxied_path(base, artifact_path, file_name)
        );
        let file = tokio::fs::File::open(local_path).await?;
        let len = file.metadata().await?.len();
        debug!(%url, bytes = len, "PUT artifact");
        let req = self
            .http
            .put(&url)
            .header(reqwest::header::CONTENT_LENGTH, len)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)));
        let resp = self.add_auth(req).send().await?;
        Self::check_response(resp).await?;
        Ok(())
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl TrackingClient for MlflowClient {
    async fn get_or_create_experiment(&self, name: &str) -> Result<String, PublishError> {
        match self.get_experiment_by_name(name).await {
            Ok(experiment) => return Self::active_experiment_id(name, experiment),
            Err(e) if e.has_error_code(RESOURCE_DOES_NOT_EXIST) => {}
            Err(e) => return Err(e),
        }

        tracing::info!(experiment = name, "Creating experiment");
        let created: Result<CreateExperimentResponse, _> = self
            .post("experiments/create", &CreateExperimentRequest { name })
            .await;
        match created {
            Ok(resp) => Ok(resp.experiment_id),
            // Created concurrently by another client.
            Err(e) if e.has_error_code(RESOURCE_ALREADY_EXISTS) => {
                let experiment = self.get_experiment_by_name(name).await?;
                Self::active_experiment_id(name, experiment)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
    ) -> Result<RunInfo, PublishError> {
        let request = CreateRunRequest {
            experiment_id,
            run_name,
            start_time: now_millis(),
            tags: vec![RunTag {
                key: "mlflow.runName",
                value: run_name,
            }],
        };
        let resp: CreateRunResponse = self.post("runs/create", &request).await?;
        let info = resp.run.info;
        Ok(RunInfo {
            run_id: info.run_id,
            experiment_id: info.experiment_id,
            run_name: info.run_name.unwrap_or_else(|| run_name.to_string()),
            artifact_uri: info.artifact_uri,
        })
    }

    async fn log_artifact(
        &self,
        run: &RunInfo,
        local_path: &Path,
        artifact_path: Option<&str>,
    ) -> Result<(), PublishError> {
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PublishError::protocol(format!("not a file path: {}", local_path.display()))
            })?;

        match ArtifactLocation::parse(&run.artifact_uri)? {
            ArtifactLocation::Proxied { path } => {
                self.upload_proxied(&path, local_path, artifact_path, &file_name)
                    .await
            }
            ArtifactLocation::Local { root } => {
                let dest = ArtifactLocation::local_destination(&root, artifact_path, &file_name);
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                debug!(dest = %dest.display(), "Copying artifact");
                tokio::fs::copy(local_path, &dest).await?;
                Ok(())
            }
        }
    }

    async fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<(), PublishError> {
        self.post_empty("runs/set-tag", &SetTagRequest { run_id, key, value })
            .await
    }

    async fn update_run(&self, run_id: &str, status: RunStatus) -> Result<(), PublishError> {
        let request = UpdateRunRequest {
            run_id,
            status,
            end_time: now_millis(),
        };
        self.post_empty("runs/update", &request).await
    }

    async fn create_registered_model(&self, name: &str) -> Result<(), PublishError> {
        match self
            .post_empty("registered-models/create", &RegisteredModelRequest { name })
            .await
        {
            Err(e) if e.has_error_code(RESOURCE_ALREADY_EXISTS) => {
                debug!(name, "Registered model already exists");
                Ok(())
            }
            other => other,
        }
    }

    async fn set_registered_model_tag(
        &self,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), PublishError> {
        self.post_empty(
            "registered-models/set-tag",
            &RegisteredModelTagRequest { name, key, value },
        )
        .await
    }

    async fn create_model_version(
        &self,
        name: &str,
        source: &str,
        run_id: &str,
    ) -> Result<ModelVersion, PublishError> {
        let resp: CreateModelVersionResponse = self
            .post(
                "model-versions/create",
                &CreateModelVersionRequest {
                    name,
                    source,
                    run_id,
                },
            )
            .await?;
        Ok(ModelVersion {
            name: resp.model_version.name,
            version: resp.model_version.version,
        })
    }

    async fn set_model_version_tag(
        &self,
        name: &str,
        version: &str,
        key: &str,
        value: &str,
    ) -> Result<(), PublishError> {
        self.post_empty(
            "model-versions/set-tag",
            &ModelVersionTagRequest {
                name,
                version,
                key,
                value,
            },
        )
        .await
    }
}
