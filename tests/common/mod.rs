//! Shared fixtures: an in-memory replica and a scripted in-process server.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use fieldnote::remote::{ApiRequest, Method, RemoteApi, RemoteError};
use fieldnote::session::Session;
use fieldnote::storage::LocalStorage;
use fieldnote::sync::SyncService;

pub const USER: &str = "user-1";

#[derive(Default)]
struct ServerState {
    responses: HashMap<String, Value>,
    failures: HashMap<(Method, String), u16>,
    created: HashSet<String>,
    requests: Vec<ApiRequest>,
    latency: Duration,
}

/// In-process stand-in for the REST API.
///
/// GETs answer from [`FakeRemote::respond`]; unknown paths are 404. POSTs
/// remember the body id and answer 409 on a repeat. Any call can be made to
/// fail with a status until [`FakeRemote::heal`].
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<ServerState>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, body: Value) {
        self.state.lock().unwrap().responses.insert(path.to_string(), body);
    }

    pub fn fail(&self, method: Method, path: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((method, path.to_string()), status);
    }

    /// Delay every call by `latency`, to keep runs in flight.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().unwrap().latency = latency;
    }

    pub fn heal(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn writes(&self) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method != Method::Get)
            .collect()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    pub fn created_ids(&self) -> HashSet<String> {
        self.state.lock().unwrap().created.clone()
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn send(&self, request: ApiRequest) -> Result<Value, RemoteError> {
        let latency = self.state.lock().unwrap().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());

        if let Some(status) = state.failures.get(&(request.method, request.path.clone())) {
            return Err(RemoteError::Status {
                status: *status,
                message: "scripted failure".to_string(),
            });
        }

        match request.method {
            Method::Get => state.responses.get(&request.path).cloned().ok_or(RemoteError::Status {
                status: 404,
                message: "not found".to_string(),
            }),
            Method::Post => {
                let body = request.body.clone().unwrap_or(Value::Null);
                if let Some(id) = body.get("id").and_then(Value::as_str) {
                    if !state.created.insert(id.to_string()) {
                        return Err(RemoteError::Status {
                            status: 409,
                            message: "already exists".to_string(),
                        });
                    }
                }
                Ok(body)
            }
            Method::Patch => Ok(request.body.clone().unwrap_or(Value::Null)),
            Method::Delete => Ok(Value::Null),
        }
    }
}

pub struct Harness {
    pub service: SyncService,
    pub remote: Arc<FakeRemote>,
    pub storage: LocalStorage,
}

/// Signed-in service over a fresh in-memory replica.
pub async fn harness() -> Harness {
    let storage = LocalStorage::in_memory().await.unwrap();
    let remote = FakeRemote::new();
    let service = SyncService::new(&storage, remote.clone(), Session::signed_in(USER, "token"))
        .await
        .unwrap();
    Harness {
        service,
        remote,
        storage,
    }
}

/// Empty lists for every top-level collection, so a pull succeeds.
pub fn serve_empty_collections(remote: &FakeRemote) {
    for path in [
        "/containers",
        "/labels",
        "/documents",
        "/documents/accepted",
        "/checklists",
        "/boards",
        "/boards/accepted",
    ] {
        remote.respond(path, Value::Array(Vec::new()));
    }
}
