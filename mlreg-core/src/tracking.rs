//! The registry seam: everything the publisher needs from a tracking server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::PublishError;

/// Handle to a run opened on the tracking server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub experiment_id: String,
    pub run_name: String,
    /// Root of the run's artifact store, as assigned by the server.
    pub artifact_uri: String,
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Scheduled,
    Finished,
    Failed,
    Killed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => write!(f, "RUNNING"),
            RunStatus::Scheduled => write!(f, "SCHEDULED"),
            RunStatus::Finished => write!(f, "FINISHED"),
            RunStatus::Failed => write!(f, "FAILED"),
            RunStatus::Killed => write!(f, "KILLED"),
        }
    }
}

/// A version created under a registered model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: String,
}

/// Client for a tracking server.
///
/// Every call is a blocking round trip from the caller's point of view; the
/// publisher awaits them one after another.
#[async_trait]
pub trait TrackingClient: Send + Sync {
    /// Resolve an experiment by name, creating it when it does not exist.
    async fn get_or_create_experiment(&self, name: &str) -> Result<String, PublishError>;

    /// Open a new run in the experiment.
    async fn create_run(&self, experiment_id: &str, run_name: &str)
    -> Result<RunInfo, PublishError>;

    /// Upload one local file into the run's artifact store.
    ///
    /// `artifact_path` is the `/`-separated sub-directory inside the store;
    /// `None` places the file at the store root.
    async fn log_artifact(
        &self,
        run: &RunInfo,
        local_path: &Path,
        artifact_path: Option<&str>,
    ) -> Result<(), PublishError>;

    async fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<(), PublishError>;

    /// Record the run's terminal status and end time.
    async fn update_run(&self, run_id: &str, status: RunStatus) -> Result<(), PublishError>;

    /// Create a registered model. An already existing model is not an error.
    async fn create_registered_model(&self, name: &str) -> Result<(), PublishError>;

    async fn set_registered_model_tag(
        &self,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), PublishError>;

    async fn create_model_version(
        &self,
        name: &str,
        source: &str,
        run_id: &str,
    ) -> Result<ModelVersion, PublishError>;

    async fn set_model_version_tag(
        &self,
        name: &str,
        version: &str,
        key: &str,
        value: &str,
    ) -> Result<(), PublishError>;
}
