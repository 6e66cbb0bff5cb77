#![allow(dead_code)]

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use qwen_fetch::hub::HubClient;
use qwen_fetch::HubConfig;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const COMMIT: &str = "c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00";

#[derive(Clone, Debug)]
pub struct MockFile {
    pub body: Vec<u8>,
    pub etag: String,
    pub lfs: bool,
    /// Resolved through a relative redirect into `/api/resolve-cache/`.
    pub resolve_cache: bool,
}

impl MockFile {
    /// Small git-tracked file: 40-hex etag, served directly.
    pub fn plain(body: &[u8]) -> Self {
        let digest = format!("{:x}", Sha256::digest(body));
        Self {
            body: body.to_vec(),
            etag: digest[..40].to_string(),
            lfs: false,
            resolve_cache: false,
        }
    }

    /// Git-tracked file the hub answers with a relative 307 into its resolve cache.
    pub fn resolve_cached(body: &[u8]) -> Self {
        Self {
            resolve_cache: true,
            ..Self::plain(body)
        }
    }

    /// LFS file: SHA-256 etag, redirected to the storage backend.
    pub fn lfs(body: &[u8]) -> Self {
        Self {
            body: body.to_vec(),
            etag: format!("{:x}", Sha256::digest(body)),
            lfs: true,
            resolve_cache: false,
        }
    }

    /// LFS file whose advertised hash does not match its content.
    pub fn corrupt_lfs(body: &[u8]) -> Self {
        Self {
            body: body.to_vec(),
            etag: format!("{:x}", Sha256::digest(b"something else")),
            lfs: true,
            resolve_cache: false,
        }
    }
}

pub struct HubState {
    base: String,
    files: Mutex<HashMap<String, MockFile>>,
    heads: AtomicUsize,
    gets: AtomicUsize,
    failing_gets: AtomicUsize,
    ignore_ranges: AtomicBool,
    unsatisfiable_ranges: AtomicUsize,
    ranges: Mutex<Vec<String>>,
    authorizations: Mutex<Vec<String>>,
}

/// In-process stand-in for the hub's `resolve` endpoint and its storage backend.
pub struct MockHub {
    state: Arc<HubState>,
}

impl MockHub {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(HubState {
            base,
            files: Mutex::new(HashMap::new()),
            heads: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            failing_gets: AtomicUsize::new(0),
            ignore_ranges: AtomicBool::new(false),
            unsatisfiable_ranges: AtomicUsize::new(0),
            ranges: Mutex::new(Vec::new()),
            authorizations: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/*path", any(handle))
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { state }
    }

    pub fn endpoint(&self) -> &str {
        &self.state.base
    }

    pub fn insert(&self, repo_id: &str, filename: &str, file: MockFile) {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(format!("{repo_id}/{filename}"), file);
    }

    pub fn fail_next_gets(&self, count: usize) {
        self.state.failing_gets.store(count, Ordering::SeqCst);
    }

    /// Answer `Range` requests with the whole body, as servers without range support do.
    pub fn ignore_ranges(&self) {
        self.state.ignore_ranges.store(true, Ordering::SeqCst);
    }

    pub fn reject_next_ranges(&self, count: usize) {
        self.state.unsatisfiable_ranges.store(count, Ordering::SeqCst);
    }

    pub fn heads(&self) -> usize {
        self.state.heads.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.state.gets.load(Ordering::SeqCst)
    }

    pub fn ranges(&self) -> Vec<String> {
        self.state.ranges.lock().unwrap().clone()
    }

    pub fn authorizations(&self) -> Vec<String> {
        self.state.authorizations.lock().unwrap().clone()
    }

    pub fn config(&self, cache_dir: &Path) -> HubConfig {
        HubConfig {
            endpoint: self.endpoint().to_string(),
            token: None,
            cache_dir: cache_dir.to_path_buf(),
            max_retries: 2,
            retry_base_delay_ms: 1,
            connect_timeout_secs: 5,
            show_progress: false,
            ..HubConfig::default()
        }
    }

    pub fn client(&self, cache_dir: &Path) -> HubClient {
        HubClient::new(self.config(cache_dir)).unwrap()
    }
}

async fn handle(
    State(state): State<Arc<HubState>>,
    method: Method,
    UrlPath(path): UrlPath<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        state.authorizations.lock().unwrap().push(auth.to_string());
    }

    if let Some(etag) = path.strip_prefix("cdn/") {
        let file = state
            .files
            .lock()
            .unwrap()
            .values()
            .find(|f| f.etag == etag)
            .cloned();
        return match file {
            Some(file) => serve_body(&state, &file, &headers),
            None => error_response(StatusCode::NOT_FOUND, None),
        };
    }

    if let Some(rest) = path.strip_prefix("api/resolve-cache/models/") {
        return resolve_cache(&state, &method, rest, &headers);
    }

    let Some((repo_id, rest)) = path.split_once("/resolve/") else {
        return error_response(StatusCode::NOT_FOUND, Some("RepoNotFound"));
    };
    let Some((_revision, filename)) = rest.split_once('/') else {
        return error_response(StatusCode::NOT_FOUND, Some("EntryNotFound"));
    };

    if method == Method::HEAD {
        state.heads.fetch_add(1, Ordering::SeqCst);
    }

    let (file, known_repo) = {
        let files = state.files.lock().unwrap();
        let prefix = format!("{repo_id}/");
        (
            files.get(&format!("{repo_id}/{filename}")).cloned(),
            files.keys().any(|k| k.starts_with(&prefix)),
        )
    };

    let Some(file) = file else {
        let code = if known_repo { "EntryNotFound" } else { "RepoNotFound" };
        return error_response(StatusCode::NOT_FOUND, Some(code));
    };

    if file.resolve_cache {
        let redirect = "Temporary Redirect.";
        return Response::builder()
            .status(StatusCode::TEMPORARY_REDIRECT)
            .header("x-repo-commit", COMMIT)
            .header(header::ETAG, format!("\"{}\"", file.etag))
            .header(header::CONTENT_LENGTH, redirect.len().to_string())
            .header(
                header::LOCATION,
                format!("/api/resolve-cache/models/{repo_id}/{COMMIT}/{filename}"),
            )
            .body(Body::from(redirect))
            .unwrap();
    }

    if file.lfs {
        return Response::builder()
            .status(StatusCode::FOUND)
            .header("x-repo-commit", COMMIT)
            .header("x-linked-etag", format!("\"{}\"", file.etag))
            .header("x-linked-size", file.body.len().to_string())
            .header(header::LOCATION, format!("{}/cdn/{}", state.base, file.etag))
            .body(Body::empty())
            .unwrap();
    }

    if method == Method::HEAD {
        return Response::builder()
            .status(StatusCode::OK)
            .header("x-repo-commit", COMMIT)
            .header(header::ETAG, format!("\"{}\"", file.etag))
            .header(header::CONTENT_LENGTH, file.body.len().to_string())
            .body(Body::from(file.body.clone()))
            .unwrap();
    }

    serve_body(&state, &file, &headers)
}

fn resolve_cache(state: &HubState, method: &Method, rest: &str, headers: &HeaderMap) -> Response {
    let mut parts = rest.splitn(4, '/');
    let (Some(owner), Some(name), Some(_commit), Some(filename)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return error_response(StatusCode::NOT_FOUND, Some("EntryNotFound"));
    };

    let file = state
        .files
        .lock()
        .unwrap()
        .get(&format!("{owner}/{name}/{filename}"))
        .cloned();
    let Some(file) = file else {
        return error_response(StatusCode::NOT_FOUND, Some("EntryNotFound"));
    };

    if *method == Method::HEAD {
        state.heads.fetch_add(1, Ordering::SeqCst);
        return Response::builder()
            .status(StatusCode::OK)
            .header("x-repo-commit", COMMIT)
            .header(header::ETAG, format!("\"{}\"", file.etag))
            .header(header::CONTENT_LENGTH, file.body.len().to_string())
            .body(Body::from(file.body.clone()))
            .unwrap();
    }

    serve_body(state, &file, headers)
}

fn serve_body(state: &HubState, file: &MockFile, headers: &HeaderMap) -> Response {
    state.gets.fetch_add(1, Ordering::SeqCst);

    let failing = state
        .failing_gets
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .body(Body::from(r#"{"error":"storage busy"}"#))
            .unwrap();
    }

    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    if let Some(range) = range {
        state.ranges.lock().unwrap().push(range.to_string());
        let rejected = state
            .unsatisfiable_ranges
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .body(Body::empty())
                .unwrap();
        }
    }

    let start = range
        .filter(|_| !state.ignore_ranges.load(Ordering::SeqCst))
        .and_then(|range| range.strip_prefix("bytes="))
        .and_then(|range| range.trim_end_matches('-').parse::<usize>().ok())
        .filter(|start| *start < file.body.len());

    let len = file.body.len();
    match start {
        Some(start) => Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header("x-repo-commit", COMMIT)
            .header(header::ETAG, format!("\"{}\"", file.etag))
            .header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, len - 1, len),
            )
            .body(Body::from(file.body[start..].to_vec()))
            .unwrap(),
        None => Response::builder()
            .status(StatusCode::OK)
            .header("x-repo-commit", COMMIT)
            .header(header::ETAG, format!("\"{}\"", file.etag))
            .body(Body::from(file.body.clone()))
            .unwrap(),
    }
}

fn error_response(status: StatusCode, code: Option<&str>) -> Response {
    let mut builder = Response::builder().status(status);
    if let Some(code) = code {
        builder = builder
            .header("x-error-code", code)
            .header("x-error-message", format!("{code} (mock hub)"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Every blob stored under `cache_root`, across all repo folders.
pub fn blobs(cache_root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(repos) = std::fs::read_dir(cache_root) else {
        return found;
    };
    for repo in repos.flatten() {
        let Ok(entries) = std::fs::read_dir(repo.path().join("blobs")) else {
            continue;
        };
        found.extend(entries.flatten().map(|e| e.path()));
    }
    found.sort();
    found
}
