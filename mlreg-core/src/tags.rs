//! Run metadata tags.

use std::collections::BTreeMap;

use crate::config::ModelMetadata;

pub const MODEL_NAME: &str = "model_name";
pub const EMAIL: &str = "email";
pub const REPO: &str = "repo";
pub const BEAM_PATH: &str = "beam_path";
pub const DESCRIPTION: &str = "description";
pub const READY_TO_DEPLOY: &str = "ready_to_deploy";
pub const STAGE: &str = "stage";

/// Tags that describe the model itself rather than one version of it.
pub const MODEL_LEVEL_KEYS: [&str; 5] = [EMAIL, REPO, BEAM_PATH, DESCRIPTION, STAGE];

/// Tags that apply to a single model version.
pub const VERSION_LEVEL_KEYS: [&str; 1] = [READY_TO_DEPLOY];

/// Key/value metadata attached to a run. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: BTreeMap<String, String>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed tag set for one model: its name plus the static metadata.
    pub fn for_model(model_name: &str, metadata: &ModelMetadata) -> Self {
        let mut tags = Self::new();
        tags.insert(MODEL_NAME, model_name);
        tags.insert(EMAIL, &metadata.email);
        tags.insert(REPO, &metadata.repo);
        tags.insert(BEAM_PATH, &metadata.beam_path);
        tags.insert(DESCRIPTION, &metadata.description);
        tags.insert(READY_TO_DEPLOY, metadata.ready_to_deploy.to_string());
        tags.insert(STAGE, metadata.stage.to_string());
        tags
    }

    /// Insert a tag, returning the previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.tags.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Tags restricted to `keys`, skipping any that are absent.
    pub fn subset<'a>(&'a self, keys: &'a [&str]) -> impl Iterator<Item = (&'a str, &'a str)> {
        keys.iter()
            .filter_map(|k| self.tags.get_key_value(*k))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
