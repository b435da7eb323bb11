use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub const BASE_UUID: &str = "base-7f3c";

/// The listing a flag API serves, in its capitalised wire form.
pub static DEFAULT_FEATURES: Lazy<Value> = Lazy::new(|| {
    json!({
        "toggles": [
            {"Key": "checkout", "Value": "true", "ActiveAt": "", "DisabledAt": "", "Tags": ["payments"]},
            {"Key": "old-search", "Value": "true", "ActiveAt": "", "DisabledAt": "2020-01-01T00:00:00Z", "Tags": []},
            {"Key": "launch", "Value": "true", "ActiveAt": "2099-01-01T00:00:00Z", "DisabledAt": "", "Tags": null},
            {"Key": "dark-mode", "Value": false}
        ]
    })
});

/// What the mock flag API answers. Tests mutate it between fetches.
pub struct ApiState {
    pub collection_hash: Option<String>,
    pub features: Value,
    pub hash_status: StatusCode,
    pub features_status: StatusCode,
}

impl Default for ApiState {
    fn default() -> Self {
        ApiState {
            collection_hash: Some("hash-1".to_string()),
            features: DEFAULT_FEATURES.clone(),
            hash_status: StatusCode::OK,
            features_status: StatusCode::OK,
        }
    }
}

#[derive(Default)]
pub struct MockFlagApi {
    pub state: Mutex<ApiState>,
    hash_requests: AtomicUsize,
    feature_requests: AtomicUsize,
}

impl MockFlagApi {
    pub fn update(&self, f: impl FnOnce(&mut ApiState)) {
        f(&mut self.state.lock().unwrap())
    }

    pub fn hash_requests(&self) -> usize {
        self.hash_requests.load(Ordering::SeqCst)
    }

    pub fn feature_requests(&self) -> usize {
        self.feature_requests.load(Ordering::SeqCst)
    }
}

async fn collection_hash(
    State(api): State<Arc<MockFlagApi>>,
    Path(uuid): Path<String>,
) -> (StatusCode, Json<Value>) {
    api.hash_requests.fetch_add(1, Ordering::SeqCst);
    if uuid != BASE_UUID {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "unknown base"})));
    }
    let state = api.state.lock().unwrap();
    if state.hash_status != StatusCode::OK {
        return (state.hash_status, Json(json!({"error": "unavailable"})));
    }
    (
        StatusCode::OK,
        Json(json!({"collectionHash": state.collection_hash})),
    )
}

async fn features(
    State(api): State<Arc<MockFlagApi>>,
    Path(uuid): Path<String>,
) -> (StatusCode, Json<Value>) {
    api.feature_requests.fetch_add(1, Ordering::SeqCst);
    if uuid != BASE_UUID {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "unknown base"})));
    }
    let state = api.state.lock().unwrap();
    if state.features_status != StatusCode::OK {
        return (state.features_status, Json(json!({"error": "unavailable"})));
    }
    (StatusCode::OK, Json(state.features.clone()))
}

pub struct ServerHandle {
    pub addr: SocketAddr,
    pub api: Arc<MockFlagApi>,
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    pub async fn for_state(state: ApiState) -> ServerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        let api = Arc::new(MockFlagApi {
            state: Mutex::new(state),
            ..Default::default()
        });
        let app = Router::new()
            .route("/api/collectionHash/:uuid", get(collection_hash))
            .route("/api/features/:uuid", get(features))
            .with_state(api.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { notify.notified().await })
                .await
        });
        ServerHandle {
            addr,
            api,
            shutdown,
        }
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/api/", self.addr)
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}
