//! In-memory stand-in for an Outline server's management API.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEFAULT_METHOD: &str = "chacha20-ietf-poly1305";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub name: String,
    pub server_id: String,
    pub metrics_enabled: bool,
    pub created_timestamp_ms: i64,
    pub port_for_new_access_keys: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKey {
    pub id: String,
    pub name: String,
    pub password: String,
    pub port: u16,
    pub method: String,
    pub access_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKeyList {
    pub access_keys: Vec<AccessKey>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateAccessKey {
    pub name: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
}

#[derive(Deserialize)]
pub struct PortUpdate {
    pub port: u16,
}

#[derive(Deserialize)]
pub struct DataLimit {
    pub bytes: u64,
}

#[derive(Deserialize)]
pub struct MetricsEnabled {
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMetrics {
    pub bytes_transferred_by_user_id: BTreeMap<String, u64>,
}

#[derive(Clone, Debug)]
pub struct ServerState {
    pub server: Server,
    pub hostname: String,
    pub keys: BTreeMap<u64, AccessKey>,
    pub next_id: u64,
    pub data_limits: BTreeMap<u64, u64>,
    pub bytes_transferred: BTreeMap<String, u64>,
    /// Ports the port route answers with 409 for.
    pub ports_in_use: HashSet<u16>,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            server: Server {
                name: "Outline Server".to_string(),
                server_id: Uuid::new_v4().to_string(),
                metrics_enabled: false,
                created_timestamp_ms: 1_609_459_200_000,
                port_for_new_access_keys: 12345,
            },
            hostname: "127.0.0.1".to_string(),
            keys: BTreeMap::new(),
            next_id: 0,
            data_limits: BTreeMap::new(),
            bytes_transferred: BTreeMap::new(),
            ports_in_use: HashSet::new(),
        }
    }
}

pub type Db = Arc<RwLock<ServerState>>;

pub fn app() -> Router {
    app_with_state(ServerState::default())
}

pub fn app_with_state(state: ServerState) -> Router {
    let db: Db = Arc::new(RwLock::new(state));
    Router::new()
        .route("/server", get(get_server))
        .route("/server/port-for-new-access-keys", put(set_port))
        .route("/server/metrics/enabled", put(set_metrics_enabled))
        .route("/access-keys", get(list_access_keys).post(create_access_key))
        .route("/access-keys/{id}", delete(delete_access_key))
        .route(
            "/access-keys/{id}/data-limit",
            put(set_data_limit).delete(remove_data_limit),
        )
        .route("/metrics/transfer", get(get_transfer_metrics))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_state(listener: TcpListener, state: ServerState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

async fn get_server(State(db): State<Db>) -> Json<Server> {
    Json(db.read().await.server.clone())
}

async fn set_port(State(db): State<Db>, Json(input): Json<PortUpdate>) -> StatusCode {
    let mut state = db.write().await;
    if input.port == 0 {
        return StatusCode::BAD_REQUEST;
    }
    if state.ports_in_use.contains(&input.port) {
        return StatusCode::CONFLICT;
    }
    state.server.port_for_new_access_keys = input.port;
    StatusCode::NO_CONTENT
}

async fn set_metrics_enabled(State(db): State<Db>, Json(input): Json<MetricsEnabled>) -> StatusCode {
    db.write().await.server.metrics_enabled = input.enabled;
    StatusCode::NO_CONTENT
}

async fn list_access_keys(State(db): State<Db>) -> Json<AccessKeyList> {
    let state = db.read().await;
    Json(AccessKeyList {
        access_keys: state.keys.values().cloned().collect(),
    })
}

/// The body is optional: an empty request lets the server choose everything.
async fn create_access_key(
    State(db): State<Db>,
    body: Bytes,
) -> Result<(StatusCode, Json<AccessKey>), StatusCode> {
    let input: CreateAccessKey = if body.is_empty() {
        CreateAccessKey::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?
    };

    let mut state = db.write().await;
    let id = state.next_id;
    state.next_id += 1;

    let password = input.password.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    let port = match input.port {
        Some(0) | None => state.server.port_for_new_access_keys,
        Some(port) => port,
    };
    let key = AccessKey {
        id: id.to_string(),
        name: input.name.unwrap_or_default(),
        access_url: format!(
            "ss://{DEFAULT_METHOD}:{password}@{}:{port}/?outline=1",
            state.hostname
        ),
        password,
        port,
        method: DEFAULT_METHOD.to_string(),
    };
    state.keys.insert(id, key.clone());
    state.bytes_transferred.insert(key.id.clone(), 0);
    Ok((StatusCode::CREATED, Json(key)))
}

async fn delete_access_key(State(db): State<Db>, Path(id): Path<String>) -> StatusCode {
    let mut state = db.write().await;
    let Some(id) = known_id(&state, &id) else {
        return StatusCode::NOT_FOUND;
    };
    state.keys.remove(&id);
    state.data_limits.remove(&id);
    state.bytes_transferred.remove(&id.to_string());
    StatusCode::NO_CONTENT
}

async fn set_data_limit(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(input): Json<DataLimit>,
) -> StatusCode {
    let mut state = db.write().await;
    let Some(id) = known_id(&state, &id) else {
        return StatusCode::NOT_FOUND;
    };
    state.data_limits.insert(id, input.bytes);
    StatusCode::NO_CONTENT
}

async fn remove_data_limit(State(db): State<Db>, Path(id): Path<String>) -> StatusCode {
    let mut state = db.write().await;
    let Some(id) = known_id(&state, &id) else {
        return StatusCode::NOT_FOUND;
    };
    state.data_limits.remove(&id);
    StatusCode::NO_CONTENT
}

async fn get_transfer_metrics(State(db): State<Db>) -> Json<TransferMetrics> {
    Json(TransferMetrics {
        bytes_transferred_by_user_id: db.read().await.bytes_transferred.clone(),
    })
}

fn known_id(state: &ServerState, raw: &str) -> Option<u64> {
    raw.parse().ok().filter(|id| state.keys.contains_key(id))
}
