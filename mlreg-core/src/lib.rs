//! # mlreg-core: publish model artifacts to an MLflow tracking server
//!
//! A publish walks a model directory, uploads every file into a fresh run
//! (keeping the directory layout as artifact sub-paths), attaches the model's
//! metadata as tags and, optionally, registers a model version from the run.
//!
//! The tracking server is reached through the [`TrackingClient`] trait;
//! [`MlflowClient`] implements it over the MLflow REST API.

pub mod config;
pub mod discovery;
pub mod error;
pub mod mlflow;
pub mod publisher;
pub mod registration;
pub mod tags;
pub mod tracking;

// Re-exports
pub use config::{ModelMetadata, PublisherConfig, Stage, load_config};
pub use discovery::{Artifact, discover};
pub use error::PublishError;
pub use mlflow::MlflowClient;
pub use publisher::{ArtifactPublisher, PublishReport, PublishRequest};
pub use tags::TagSet;
pub use tracking::{ModelVersion, RunInfo, RunStatus, TrackingClient};
