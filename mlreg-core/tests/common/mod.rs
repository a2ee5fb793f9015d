//! In-process stand-in for an MLflow tracking server.
//!
//! Implements the REST endpoints the publisher uses, keeping everything in
//! memory so tests can inspect what a real server would have stored.

#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct RunRecord {
    pub experiment_id: String,
    pub run_name: String,
    pub artifact_uri: String,
    pub tags: BTreeMap<String, String>,
    pub status: Option<String>,
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct VersionRecord {
    pub name: String,
    pub version: String,
    pub source: String,
    pub run_id: String,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct ServerState {
    /// Experiment name to id.
    pub experiments: BTreeMap<String, String>,
    pub runs: BTreeMap<String, RunRecord>,
    /// Decoded artifact path to uploaded bytes.
    pub uploads: BTreeMap<String, Vec<u8>>,
    /// Registered model name to its tags.
    pub registered_models: BTreeMap<String, BTreeMap<String, String>>,
    pub versions: Vec<VersionRecord>,
    pub requests: usize,
    pub auth_headers: Vec<String>,
    /// When set, runs get a `file://` artifact URI below this directory.
    pub local_artifact_root: Option<PathBuf>,
    pub fail_uploads: bool,
}

pub type Shared = Arc<Mutex<ServerState>>;

pub struct FakeMlflow {
    pub url: String,
    pub state: Shared,
}

impl FakeMlflow {
    pub fn state(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }
}

pub async fn spawn(state: ServerState) -> FakeMlflow {
    let shared: Shared = Arc::new(Mutex::new(state));
    let app = Router::new()
        .route(
            "/api/2.0/mlflow/experiments/get-by-name",
            get(get_experiment_by_name),
        )
        .route("/api/2.0/mlflow/experiments/create", post(create_experiment))
        .route("/api/2.0/mlflow/runs/create", post(create_run))
        .route("/api/2.0/mlflow/runs/set-tag", post(set_tag))
        .route("/api/2.0/mlflow/runs/update", post(update_run))
        .route(
            "/api/2.0/mlflow/registered-models/create",
            post(create_registered_model),
        )
        .route(
            "/api/2.0/mlflow/registered-models/set-tag",
            post(set_registered_model_tag),
        )
        .route(
            "/api/2.0/mlflow/model-versions/create",
            post(create_model_version),
        )
        .route(
            "/api/2.0/mlflow/model-versions/set-tag",
            post(set_model_version_tag),
        )
        .route("/api/2.0/mlflow-artifacts/artifacts/{*path}", put(upload))
        .layer(middleware::from_fn_with_state(shared.clone(), track))
        .with_state(shared.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeMlflow {
        url: format!("http://{addr}"),
        state: shared,
    }
}

async fn track(State(state): State<Shared>, request: Request, next: Next) -> Response {
    {
        let mut s = state.lock().unwrap();
        s.requests += 1;
        if let Some(value) = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        {
            s.auth_headers.push(value.to_string());
        }
    }
    next.run(request).await
}

fn error(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({"error_code": code, "message": message}))).into_response()
}

fn field(body: &Value, name: &str) -> String {
    body[name].as_str().unwrap_or_default().to_string()
}

async fn get_experiment_by_name(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let name = query.get("experiment_name").cloned().unwrap_or_default();
    let state = state.lock().unwrap();
    match state.experiments.get(&name) {
        Some(id) => Json(json!({
            "experiment": {
                "experiment_id": id,
                "name": name,
                "lifecycle_stage": "active"
            }
        }))
        .into_response(),
        None => error(
            StatusCode::NOT_FOUND,
            "RESOURCE_DOES_NOT_EXIST",
            &format!("Could not find experiment with name {name}"),
        ),
    }
}

async fn create_experiment(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let name = field(&body, "name");
    let mut state = state.lock().unwrap();
    if state.experiments.contains_key(&name) {
        return error(
            StatusCode::BAD_REQUEST,
            "RESOURCE_ALREADY_EXISTS",
            "Experiment already exists",
        );
    }
    let id = (state.experiments.len() + 1).to_string();
    state.experiments.insert(name, id.clone());
    Json(json!({"experiment_id": id})).into_response()
}

async fn create_run(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let experiment_id = field(&body, "experiment_id");
    let run_name = field(&body, "run_name");
    let mut state = state.lock().unwrap();
    let run_id = format!("run{}", state.runs.len() + 1);
    let artifact_uri = match &state.local_artifact_root {
        Some(root) => {
            let dir = root.join(&experiment_id).join(&run_id).join("artifacts");
            url::Url::from_file_path(&dir).unwrap().to_string()
        }
        None => format!("mlflow-artifacts:/{experiment_id}/{run_id}/artifacts"),
    };
    let tags = body["tags"]
        .as_array()
        .map(|tags| {
            tags.iter()
                .map(|t| (field(t, "key"), field(t, "value")))
                .collect()
        })
        .unwrap_or_default();
    state.runs.insert(
        run_id.clone(),
        RunRecord {
            experiment_id: experiment_id.clone(),
            run_name: run_name.clone(),
            artifact_uri: artifact_uri.clone(),
            tags,
            status: Some("RUNNING".into()),
            end_time: None,
        },
    );
    Json(json!({
        "run": {
            "info": {
                "run_id": run_id,
                "run_uuid": run_id,
                "experiment_id": experiment_id,
                "run_name": run_name,
                "status": "RUNNING",
                "start_time": body["start_time"],
                "artifact_uri": artifact_uri,
                "lifecycle_stage": "active"
            },
            "data": {}
        }
    }))
    .into_response()
}

async fn set_tag(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().unwrap();
    match state.runs.get_mut(&field(&body, "run_id")) {
        Some(run) => {
            run.tags.insert(field(&body, "key"), field(&body, "value"));
            Json(json!({})).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "RESOURCE_DOES_NOT_EXIST", "no run"),
    }
}

async fn update_run(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().unwrap();
    match state.runs.get_mut(&field(&body, "run_id")) {
        Some(run) => {
            run.status = Some(field(&body, "status"));
            run.end_time = body["end_time"].as_i64();
            Json(json!({"run_info": {"status": run.status}})).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "RESOURCE_DOES_NOT_EXIST", "no run"),
    }
}

async fn upload(State(state): State<Shared>, Path(path): Path<String>, body: Bytes) -> Response {
    let mut state = state.lock().unwrap();
    if state.fail_uploads {
        return error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "artifact store unavailable",
        );
    }
    state.uploads.insert(path, body.to_vec());
    Json(json!({})).into_response()
}

async fn create_registered_model(
    State(state): State<Shared>,
    Json(body): Json<Value>,
) -> Response {
    let name = field(&body, "name");
    let mut state = state.lock().unwrap();
    if state.registered_models.contains_key(&name) {
        return error(
            StatusCode::BAD_REQUEST,
            "RESOURCE_ALREADY_EXISTS",
            &format!("Registered Model (name={name}) already exists."),
        );
    }
    state.registered_models.insert(name.clone(), BTreeMap::new());
    Json(json!({"registered_model": {"name": name}})).into_response()
}

async fn set_registered_model_tag(
    State(state): State<Shared>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    match state.registered_models.get_mut(&field(&body, "name")) {
        Some(tags) => {
            tags.insert(field(&body, "key"), field(&body, "value"));
            Json(json!({})).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "RESOURCE_DOES_NOT_EXIST", "no model"),
    }
}

async fn create_model_version(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let name = field(&body, "name");
    let mut state = state.lock().unwrap();
    if !state.registered_models.contains_key(&name) {
        return error(StatusCode::NOT_FOUND, "RESOURCE_DOES_NOT_EXIST", "no model");
    }
    let version = (state.versions.iter().filter(|v| v.name == name).count() + 1).to_string();
    let record = VersionRecord {
        name: name.clone(),
        version: version.clone(),
        source: field(&body, "source"),
        run_id: field(&body, "run_id"),
        tags: BTreeMap::new(),
    };
    let response = json!({
        "model_version": {
            "name": record.name,
            "version": record.version,
            "source": record.source,
            "run_id": record.run_id,
            "status": "READY"
        }
    });
    state.versions.push(record);
    Json(response).into_response()
}

async fn set_model_version_tag(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let name = field(&body, "name");
    let version = field(&body, "version");
    let mut state = state.lock().unwrap();
    match state
        .versions
        .iter_mut()
        .find(|v| v.name == name && v.version == version)
    {
        Some(record) => {
            record.tags.insert(field(&body, "key"), field(&body, "value"));
            Json(json!({})).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "RESOURCE_DOES_NOT_EXIST", "no version"),
    }
}
