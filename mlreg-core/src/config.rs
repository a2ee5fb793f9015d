//! Configuration for publishing runs.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace or explicit settings file -> `MLFLOW_*` environment -> `MLREG_*`
//! environment. CLI overrides are applied by the caller on the extracted value.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::PublishError;

/// Name of the workspace-level settings file.
pub const WORKSPACE_SETTINGS_FILE: &str = "mlreg.toml";

/// Standard MLflow client environment variables and the settings they populate.
const MLFLOW_ENV: [(&str, &str); 5] = [
    ("MLFLOW_TRACKING_URI", "tracking.uri"),
    ("MLFLOW_EXPERIMENT_NAME", "tracking.experiment"),
    ("MLFLOW_TRACKING_TOKEN", "tracking.token"),
    ("MLFLOW_TRACKING_USERNAME", "tracking.username"),
    ("MLFLOW_TRACKING_PASSWORD", "tracking.password"),
];

/// Settings kept as text even when an environment value looks like a number.
const STRING_KEYS: [&str; 11] = [
    "tracking.uri",
    "tracking.experiment",
    "tracking.token",
    "tracking.username",
    "tracking.password",
    "metadata.email",
    "metadata.repo",
    "metadata.beam_path",
    "metadata.description",
    "registration.registered_model_name",
    "registration.artifact_path",
];

fn is_string_key(key: &str) -> bool {
    STRING_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// Top-level publisher configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Tracking server connection.
    #[serde(default)]
    pub tracking: TrackingConfig,
    /// Descriptive metadata attached to every run as tags.
    #[serde(default)]
    pub metadata: ModelMetadata,
    /// Optional model-version registration.
    #[serde(default)]
    pub registration: RegistrationConfig,
}

impl PublisherConfig {
    /// Check the settings that cannot be validated by deserialization alone.
    pub fn validate(&self) -> Result<(), PublishError> {
        let uri = url::Url::parse(&self.tracking.uri).map_err(|e| {
            PublishError::config(format!("invalid tracking URI '{}': {e}", self.tracking.uri))
        })?;
        if !matches!(uri.scheme(), "http" | "https") {
            return Err(PublishError::config(format!(
                "tracking URI must use http or https, got '{}'",
                uri.scheme()
            )));
        }
        if self.tracking.experiment.trim().is_empty() {
            return Err(PublishError::config("experiment name must not be empty"));
        }
        if self.tracking.password.is_some() && self.tracking.username.is_none() {
            return Err(PublishError::config(
                "tracking password is set without a username",
            ));
        }
        if let Some(name) = &self.registration.registered_model_name {
            if name.trim().is_empty() {
                return Err(PublishError::config(
                    "registered model name must not be empty",
                ));
            }
        }
        Ok(())
    }
}

/// Tracking server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Base URL of the MLflow tracking server.
    #[serde(default = "default_tracking_uri")]
    pub uri: String,
    /// Experiment under which runs are created. Created on first use.
    #[serde(default = "default_experiment")]
    pub experiment: String,
    /// Bearer token, used unless both username and password are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// HTTP basic auth user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// HTTP basic auth password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Timeout for REST calls in seconds. Artifact uploads are not bounded.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            uri: default_tracking_uri(),
            experiment: default_experiment(),
            token: None,
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_tracking_uri() -> String {
    "http://localhost:5000".to_string()
}

fn default_experiment() -> String {
    "Default".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Deployment stage of a published model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Development,
    Staging,
    Production,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Development => write!(f, "development"),
            Stage::Staging => write!(f, "staging"),
            Stage::Production => write!(f, "production"),
        }
    }
}

/// Static descriptive metadata for a model, edited per model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Contact email of the model owner.
    #[serde(default)]
    pub email: String,
    /// Source repository URL.
    #[serde(default)]
    pub repo: String,
    /// Beam line the model applies to (e.g. `cu_hxr`).
    #[serde(default)]
    pub beam_path: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Whether the model may be deployed.
    #[serde(default)]
    pub ready_to_deploy: bool,
    #[serde(default)]
    pub stage: Stage,
}

/// Model-version registration settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// When set, a model version is created under this registered model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_model_name: Option<String>,
    /// Sub-path inside the run under which directory artifacts are nested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
}

/// Build the layered figment without extracting it.
///
/// Priority (highest to lowest):
/// 1. Environment variables prefixed with `MLREG_` (`MLREG_METADATA__STAGE`, ...)
/// 2. Standard `MLFLOW_*` client variables
/// 3. Explicit settings file, or `<workspace>/mlreg.toml`
/// 4. User config (`~/.config/mlreg/config.toml`)
/// 5. Built-in defaults
pub fn figment(workspace: Option<&Path>, settings_file: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(PublisherConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "mlreg", "mlreg") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(settings) = settings_file {
        figment = figment.merge(Toml::file(settings));
    } else if let Some(ws) = workspace {
        let ws_config = ws.join(WORKSPACE_SETTINGS_FILE);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // `Env` parses values, so `MLFLOW_EXPERIMENT_NAME=2024` would reach a
    // string field as an integer. String settings are merged verbatim.
    for (var, key) in MLFLOW_ENV {
        if let Ok(value) = std::env::var(var) {
            figment = figment.merge(Serialized::default(key, value));
        }
    }

    let prefixed = || Env::prefixed("MLREG_").split("__");
    figment = figment.merge(prefixed().filter(|key| !is_string_key(key.as_str())));
    for (key, value) in prefixed().iter() {
        if is_string_key(key.as_str()) {
            figment = figment.merge(Serialized::default(key.as_str(), value));
        }
    }
    figment
}

/// Load configuration from layered sources.
///
/// An explicit `settings_file` must exist; a missing workspace file is skipped.
pub fn load_config(
    workspace: Option<&Path>,
    settings_file: Option<&Path>,
) -> Result<PublisherConfig, Box<figment::Error>> {
    if let Some(settings) = settings_file {
        if !settings.is_file() {
            return Err(Box::new(figment::Error::from(format!(
                "settings file not found: {}",
                settings.display()
            ))));
        }
    }
    figment(workspace, settings_file).extract().map_err(Box::new)
}
