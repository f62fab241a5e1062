//! In-process mock of the conversion API, served by axum on an ephemeral port.
//!
//! Authenticated endpoints accept only `Bearer tok-valid` and answer `401`
//! to anything else, so a client without a session (or with a stale token)
//! exercises the guest fallback. Every endpoint counts its calls.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use d2x::{ApiClient, ClientConfig, MemoryStore, SessionStore, SharedStore};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const VALID_TOKEN: &str = "tok-valid";
pub const JOB_ID: &str = "job-42";

/// What the mock answers.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Status returned by the n-th status poll; the last entry repeats.
    pub statuses: Vec<&'static str>,
    /// `error` field sent along with a FAILED status.
    pub failure: Option<String>,
    /// Include `downloadUrl` in the download response.
    pub with_download_url: bool,
    /// Make the guest presigned-URL endpoint fail with 500.
    pub break_guest_presign: bool,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            statuses: vec!["PENDING", "PROCESSING", "COMPLETED"],
            failure: None,
            with_download_url: true,
            break_guest_presign: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub presign: AtomicUsize,
    pub guest_presign: AtomicUsize,
    pub upload: AtomicUsize,
    pub create: AtomicUsize,
    pub guest_create: AtomicUsize,
    pub status: AtomicUsize,
    pub guest_status: AtomicUsize,
    pub download: AtomicUsize,
    pub guest_download: AtomicUsize,
    pub files: AtomicUsize,
    /// Requests answered with 401.
    pub rejected: AtomicUsize,
    served_polls: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Status polls answered with a job status, on either variant.
    pub fn polls(&self) -> usize {
        Self::get(&self.served_polls)
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub key: String,
    pub content_type: Option<String>,
    pub len: usize,
}

pub struct MockState {
    base_url: String,
    plan: Mutex<Plan>,
    pub counters: Counters,
    pub uploads: Mutex<Vec<Upload>>,
    pub created_bodies: Mutex<Vec<Value>>,
}

type Shared = Arc<MockState>;

pub struct MockApi {
    pub url: String,
    pub state: Shared,
}

impl MockApi {
    pub async fn start(plan: Plan) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(MockState {
            base_url: url.clone(),
            plan: Mutex::new(plan),
            counters: Counters::default(),
            uploads: Mutex::new(Vec::new()),
            created_bodies: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/auth/:action", post(auth))
            .route("/upload/presigned-url", post(presign))
            .route("/upload/guest-presigned-url", post(guest_presign))
            .route("/storage/:key", put(store_object))
            .route("/files/:name", get(serve_file))
            // `/jobs` and `/jobs/guest/...` share prefixes; dispatched by hand.
            .fallback(jobs)
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { url, state }
    }

    pub fn counters(&self) -> &Counters {
        &self.state.counters
    }

    /// Client against this mock, polling every millisecond.
    pub fn client(&self, store: SharedStore, max_polls: u32) -> ApiClient {
        let config = ClientConfig::builder()
            .api_url(&self.url)
            .poll_interval_ms(1)
            .max_polls(max_polls)
            .request_timeout_secs(5)
            .build()
            .unwrap();
        ApiClient::new(config, SessionStore::new(store)).unwrap()
    }

    pub fn guest_client(&self) -> ApiClient {
        self.client(MemoryStore::shared(), 100)
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {VALID_TOKEN}"))
        .unwrap_or(false)
}

fn unauthorized(state: &MockState) -> Response {
    state.counters.rejected.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Unauthorized" })),
    )
        .into_response()
}

async fn auth(Path(action): Path<String>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    match action.as_str() {
        "login" if password == "wrong-password" => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid email or password" })),
        )
            .into_response(),
        "register" if email == "taken@example.com" => (
            StatusCode::CONFLICT,
            Json(json!({ "message": "User already exists" })),
        )
            .into_response(),
        "register" if email == "silent@example.com" => {
            StatusCode::BAD_REQUEST.into_response()
        }
        "login" | "register" => Json(json!({ "accessToken": VALID_TOKEN })).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn presigned(state: &MockState, body: &Value) -> Response {
    let name = body["fileName"].as_str().unwrap_or("file");
    let key = format!("uploads-{name}");
    Json(json!({
        "url": format!("{}/storage/{}", state.base_url, key),
        "key": key,
    }))
    .into_response()
}

async fn presign(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.counters.presign.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized(&state);
    }
    presigned(&state, &body)
}

async fn guest_presign(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    state.counters.guest_presign.fetch_add(1, Ordering::SeqCst);
    if state.plan.lock().unwrap().break_guest_presign {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "storage offline" })),
        )
            .into_response();
    }
    presigned(&state, &body)
}

async fn store_object(
    State(state): State<Shared>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    state.counters.upload.fetch_add(1, Ordering::SeqCst);
    state.uploads.lock().unwrap().push(Upload {
        key,
        content_type: headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        len: body.len(),
    });
    StatusCode::OK
}

async fn serve_file(State(state): State<Shared>, Path(_name): Path<String>) -> Vec<u8> {
    state.counters.files.fetch_add(1, Ordering::SeqCst);
    b"PK\x03\x04 fake xlsx".to_vec()
}

async fn jobs(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let segments: Vec<&str> = uri.path().trim_matches('/').split('/').collect();
    let c = &state.counters;

    match (method, segments.as_slice()) {
        (Method::POST, ["jobs"]) => {
            c.create.fetch_add(1, Ordering::SeqCst);
            if !authorized(&headers) {
                return unauthorized(&state);
            }
            create_job(&state, &body)
        }
        (Method::POST, ["jobs", "guest"]) => {
            c.guest_create.fetch_add(1, Ordering::SeqCst);
            create_job(&state, &body)
        }
        (Method::GET, ["jobs", "guest", id, "status"]) => {
            c.guest_status.fetch_add(1, Ordering::SeqCst);
            job_status(&state, id)
        }
        (Method::GET, ["jobs", id, "status"]) => {
            c.status.fetch_add(1, Ordering::SeqCst);
            if !authorized(&headers) {
                return unauthorized(&state);
            }
            job_status(&state, id)
        }
        (Method::GET, ["jobs", "guest", _id, "download"]) => {
            c.guest_download.fetch_add(1, Ordering::SeqCst);
            download(&state)
        }
        (Method::GET, ["jobs", _id, "download"]) => {
            c.download.fetch_add(1, Ordering::SeqCst);
            if !authorized(&headers) {
                return unauthorized(&state);
            }
            download(&state)
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn create_job(state: &MockState, body: &[u8]) -> Response {
    let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    state.created_bodies.lock().unwrap().push(value);
    Json(json!({ "jobId": JOB_ID, "status": "PENDING" })).into_response()
}

fn job_status(state: &MockState, id: &str) -> Response {
    let n = state.counters.served_polls.fetch_add(1, Ordering::SeqCst);
    let plan = state.plan.lock().unwrap();
    let status = plan
        .statuses
        .get(n)
        .or(plan.statuses.last())
        .copied()
        .unwrap_or("PROCESSING");
    let mut body = json!({ "jobId": id, "status": status });
    if status == "FAILED" {
        if let Some(ref e) = plan.failure {
            body["error"] = json!(e);
        }
    }
    Json(body).into_response()
}

fn download(state: &MockState) -> Response {
    let plan = state.plan.lock().unwrap();
    if plan.with_download_url {
        Json(json!({
            "statusCode": 200,
            "status": "COMPLETED",
            "downloadUrl": format!("{}/files/{}.xlsx", state.base_url, JOB_ID),
        }))
        .into_response()
    } else {
        Json(json!({
            "statusCode": 200,
            "status": "COMPLETED",
            "message": "File not ready",
        }))
        .into_response()
    }
}
