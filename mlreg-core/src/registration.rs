//! Model-version registration against the tracking server's model registry.

use crate::discovery::join_artifact_path;
use crate::error::PublishError;
use crate::tags::{MODEL_LEVEL_KEYS, TagSet, VERSION_LEVEL_KEYS};
use crate::tracking::{ModelVersion, RunInfo, TrackingClient};

/// Source URI of a model version: the run's artifact root, nested under
/// `artifact_path` when one is configured.
pub fn version_source(run: &RunInfo, artifact_path: Option<&str>) -> String {
    let root = run.artifact_uri.trim_end_matches('/');
    match join_artifact_path(artifact_path, None) {
        Some(sub) => format!("{root}/{sub}"),
        None => root.to_string(),
    }
}

/// Create (or reuse) the registered model, tag it, and add a version sourced
/// from the run.
pub async fn register_version<C: TrackingClient + ?Sized>(
    client: &C,
    registered_model_name: &str,
    run: &RunInfo,
    artifact_path: Option<&str>,
    tags: &TagSet,
) -> Result<ModelVersion, PublishError> {
    client.create_registered_model(registered_model_name).await?;
    for (key, value) in tags.subset(&MODEL_LEVEL_KEYS) {
        client
            .set_registered_model_tag(registered_model_name, key, value)
            .await?;
    }

    let source = version_source(run, artifact_path);
    let version = client
        .create_model_version(registered_model_name, &source, &run.run_id)
        .await?;
    for (key, value) in tags.subset(&VERSION_LEVEL_KEYS) {
        client
            .set_model_version_tag(&version.name, &version.version, key, value)
            .await?;
    }

    tracing::info!(
        model = %version.name,
        version = %version.version,
        %source,
        "Registered model version"
    );
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelMetadata, Stage};
    use crate::tracking::fake::{Call, FakeTrackingClient};
    use pretty_assertions::assert_eq;

    fn run() -> RunInfo {
        RunInfo {
            run_id: "run-1".into(),
            experiment_id: "1".into(),
            run_name: "surrogate".into(),
            artifact_uri: "mlflow-artifacts:/1/run-1/artifacts".into(),
        }
    }

    #[test]
    fn test_version_source() {
        assert_eq!(
            version_source(&run(), None),
            "mlflow-artifacts:/1/run-1/artifacts"
        );
        assert_eq!(
            version_source(&run(), Some("/models/")),
            "mlflow-artifacts:/1/run-1/artifacts/models"
        );
    }

    #[tokio::test]
    async fn test_register_version_tags_model_and_version() {
        let client = FakeTrackingClient::new();
        let metadata = ModelMetadata {
            email: "owner@example.org".into(),
            repo: "https://github.com/example/repo".into(),
            beam_path: "cu_hxr".into(),
            description: "surrogate".into(),
            ready_to_deploy: true,
            stage: Stage::Production,
        };
        let tags = TagSet::for_model("surrogate", &metadata);

        let version = register_version(&client, "lcls_fel_surrogate", &run(), Some("models"), &tags)
            .await
            .unwrap();
        assert_eq!(version.version, "1");

        let calls = client.calls();
        assert_eq!(
            calls[0],
            Call::CreateRegisteredModel("lcls_fel_surrogate".into())
        );
        let model_tags: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                Call::SetRegisteredModelTag { key, .. } => Some(key.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            model_tags,
            vec!["email", "repo", "beam_path", "description", "stage"]
        );
        assert!(calls.contains(&Call::CreateModelVersion {
            source: "mlflow-artifacts:/1/run-1/artifacts/models".into(),
            run_id: "run-1".into(),
        }));
        assert_eq!(
            calls.last(),
            Some(&Call::SetModelVersionTag {
                version: "1".into(),
                key: "ready_to_deploy".into(),
                value: "true".into(),
            })
        );
    }
}
