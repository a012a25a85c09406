//! In-memory stand-in for the Git Data API (blobs, trees, commits).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use gitload_backend::{Oid, TreeEntry};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use sha1::{Digest, Sha1};

#[derive(Debug, Clone, Default)]
pub struct FakeConfig {
    /// The first N blob requests answer 500.
    pub fail_first_blobs: usize,
    /// Tree requests answer 201 with a body that is not JSON.
    pub malformed_trees: bool,
}

#[derive(Default)]
struct Store {
    blobs: HashMap<String, String>,
    trees: Vec<(String, Vec<TreeEntry>)>,
    commits: Vec<(String, String, String)>,
}

struct Inner {
    config: FakeConfig,
    store: Mutex<Store>,
    blob_requests: AtomicUsize,
    registry: Registry,
    requests_total: IntCounterVec,
}

#[derive(Clone)]
pub struct FakeState { inner: Arc<Inner> }

impl FakeState {
    pub fn new(config: FakeConfig) -> Self {
        let registry = Registry::new();
        let requests_total = IntCounterVec::new(
            Opts::new("fake_git_requests_total", "Requests served by the fake Git Data API"),
            &["endpoint", "status"],
        )
        .expect("counter");
        registry.register(Box::new(requests_total.clone())).expect("register");
        Self {
            inner: Arc::new(Inner {
                config,
                store: Mutex::new(Store::default()),
                blob_requests: AtomicUsize::new(0),
                registry,
                requests_total,
            }),
        }
    }

    pub fn blob_requests(&self) -> usize { self.inner.blob_requests.load(Ordering::SeqCst) }
    pub fn blob_count(&self) -> usize { self.inner.store.lock().unwrap().blobs.len() }
    pub fn has_blob(&self, sha: &str) -> bool { self.inner.store.lock().unwrap().blobs.contains_key(sha) }

    /// Tree entry lists in creation order.
    pub fn trees(&self) -> Vec<Vec<TreeEntry>> {
        self.inner.store.lock().unwrap().trees.iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn tree_shas(&self) -> Vec<String> {
        self.inner.store.lock().unwrap().trees.iter().map(|(sha, _)| sha.clone()).collect()
    }

    /// `(message, tree)` pairs in creation order.
    pub fn commits(&self) -> Vec<(String, String)> {
        self.inner
            .store
            .lock()
            .unwrap()
            .commits
            .iter()
            .map(|(_, message, tree)| (message.clone(), tree.clone()))
            .collect()
    }

    fn record(&self, endpoint: &str, status: StatusCode) {
        self.inner.requests_total.with_label_values(&[endpoint, status.as_str()]).inc();
    }
}

pub fn app() -> Router { router(FakeState::new(FakeConfig::default())) }

pub fn router(state: FakeState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics))
        .route("/repos/:owner/:repo/git/blobs", post(create_blob))
        .route("/repos/:owner/:repo/git/trees", post(create_tree))
        .route("/repos/:owner/:repo/git/commits", post(create_commit))
        .with_state(state)
}

async fn metrics(State(state): State<FakeState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&state.inner.registry.gather(), &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    ([("content-type", encoder.format_type().to_string())], buffer).into_response()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn check_headers(headers: &HeaderMap) -> Result<(), Response> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer ") && v.len() > "Bearer ".len());
    if !bearer {
        return Err(error(StatusCode::UNAUTHORIZED, "Requires authentication"));
    }
    if !headers.contains_key("x-github-api-version") {
        return Err(error(StatusCode::BAD_REQUEST, "Missing X-GitHub-Api-Version header"));
    }
    Ok(())
}

fn parse<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|_| error(StatusCode::BAD_REQUEST, "Problems parsing JSON"))
}

fn hex_sha1(parts: &[&[u8]]) -> String {
    let mut hasher = Sha1::new();
    for part in parts { hasher.update(part); }
    format!("{:x}", hasher.finalize())
}

#[derive(Deserialize)]
struct BlobRequest { content: String }

async fn create_blob(
    State(state): State<FakeState>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let resp = blob_response(&state, &owner, &repo, &headers, &body);
    state.record("blobs", resp.status());
    resp
}

fn blob_response(state: &FakeState, owner: &str, repo: &str, headers: &HeaderMap, body: &Bytes) -> Response {
    let seq = state.inner.blob_requests.fetch_add(1, Ordering::SeqCst);
    if let Err(resp) = check_headers(headers) { return resp; }
    if seq < state.inner.config.fail_first_blobs {
        tracing::debug!(seq, "injecting blob failure");
        return error(StatusCode::INTERNAL_SERVER_ERROR, "injected failure");
    }
    let req: BlobRequest = match parse(body) { Ok(r) => r, Err(resp) => return resp };
    let header = format!("blob {}\0", req.content.len());
    let sha = hex_sha1(&[header.as_bytes(), req.content.as_bytes()]);
    state.inner.store.lock().unwrap().blobs.insert(sha.clone(), req.content);
    let url = format!("/repos/{}/{}/git/blobs/{}", owner, repo, sha);
    (StatusCode::CREATED, Json(json!({ "sha": sha, "url": url }))).into_response()
}

#[derive(Deserialize)]
struct TreeRequest { tree: Vec<TreeEntry> }

async fn create_tree(
    State(state): State<FakeState>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let resp = tree_response(&state, &owner, &repo, &headers, &body);
    state.record("trees", resp.status());
    resp
}

fn tree_response(state: &FakeState, owner: &str, repo: &str, headers: &HeaderMap, body: &Bytes) -> Response {
    if let Err(resp) = check_headers(headers) { return resp; }
    let req: TreeRequest = match parse(body) { Ok(r) => r, Err(resp) => return resp };
    if state.inner.config.malformed_trees {
        return (StatusCode::CREATED, "<html>not json</html>").into_response();
    }
    let mut store = state.inner.store.lock().unwrap();
    if let Some(missing) = req.tree.iter().find(|e| !store.blobs.contains_key(e.sha.as_str())) {
        return error(StatusCode::UNPROCESSABLE_ENTITY, &format!("tree.sha {} is not a valid blob", missing.sha));
    }
    let listing: String = req
        .tree
        .iter()
        .map(|e| format!("{} {}\0{}\n", e.mode, e.path, e.sha))
        .collect();
    let sha = hex_sha1(&[b"tree ".as_slice(), listing.as_bytes()]);
    store.trees.push((sha.clone(), req.tree));
    let url = format!("/repos/{}/{}/git/trees/{}", owner, repo, sha);
    (StatusCode::CREATED, Json(json!({ "sha": sha, "url": url }))).into_response()
}

#[derive(Deserialize)]
struct CommitRequest { message: String, tree: Oid }

async fn create_commit(
    State(state): State<FakeState>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let resp = commit_response(&state, &owner, &repo, &headers, &body);
    state.record("commits", resp.status());
    resp
}

fn commit_response(state: &FakeState, owner: &str, repo: &str, headers: &HeaderMap, body: &Bytes) -> Response {
    if let Err(resp) = check_headers(headers) { return resp; }
    let req: CommitRequest = match parse(body) { Ok(r) => r, Err(resp) => return resp };
    let mut store = state.inner.store.lock().unwrap();
    if !store.trees.iter().any(|(sha, _)| sha == req.tree.as_str()) {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "Tree SHA does not exist");
    }
    let seq = store.commits.len().to_string();
    let sha = hex_sha1(&[
        b"commit tree ".as_slice(),
        req.tree.as_str().as_bytes(),
        b"\n\n".as_slice(),
        req.message.as_bytes(),
        seq.as_bytes(),
    ]);
    store.commits.push((sha.clone(), req.message, req.tree.to_string()));
    let url = format!("/repos/{}/{}/git/commits/{}", owner, repo, sha);
    (StatusCode::CREATED, Json(json!({ "sha": sha, "url": url }))).into_response()
}

/// Serves until the process is interrupted.
pub async fn serve(listener: tokio::net::TcpListener, state: FakeState) -> std::io::Result<()> {
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    };
    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await
}
