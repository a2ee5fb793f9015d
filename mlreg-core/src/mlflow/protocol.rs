//! Request and response bodies of the MLflow 2.x REST API.

use serde::{Deserialize, Serialize};

use crate::tracking::RunStatus;

#[derive(Debug, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    #[serde(default)]
    pub lifecycle_stage: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetExperimentResponse {
    pub experiment: Experiment,
}

#[derive(Debug, Serialize)]
pub struct CreateExperimentRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CreateExperimentResponse {
    pub experiment_id: String,
}

#[derive(Debug, Serialize)]
pub struct RunTag<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateRunRequest<'a> {
    pub experiment_id: &'a str,
    pub run_name: &'a str,
    /// Milliseconds since the Unix epoch.
    pub start_time: i64,
    pub tags: Vec<RunTag<'a>>,
}

#[derive(Debug, Deserialize)]
pub struct WireRunInfo {
    pub run_id: String,
    pub experiment_id: String,
    #[serde(default)]
    pub run_name: Option<String>,
    pub artifact_uri: String,
}

#[derive(Debug, Deserialize)]
pub struct WireRun {
    pub info: WireRunInfo,
}

#[derive(Debug, Deserialize)]
pub struct CreateRunResponse {
    pub run: WireRun,
}

#[derive(Debug, Serialize)]
pub struct SetTagRequest<'a> {
    pub run_id: &'a str,
    pub key: &'a str,
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
pub struct UpdateRunRequest<'a> {
    pub run_id: &'a str,
    pub status: RunStatus,
    pub end_time: i64,
}

#[derive(Debug, Serialize)]
pub struct RegisteredModelRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisteredModelTagRequest<'a> {
    pub name: &'a str,
    pub key: &'a str,
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateModelVersionRequest<'a> {
    pub name: &'a str,
    pub source: &'a str,
    pub run_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct WireModelVersion {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateModelVersionResponse {
    pub model_version: WireModelVersion,
}

#[derive(Debug, Serialize)]
pub struct ModelVersionTagRequest<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub key: &'a str,
    pub value: &'a str,
}

/// Error body returned by the tracking server on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub message: String,
}
