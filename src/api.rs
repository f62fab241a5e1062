//! HTTP client for the remote job API.
//!
//! Every job endpoint exists twice: an authenticated variant and a guest
//! variant with a different path. [`ApiClient`] always tries the
//! authenticated one first (attaching the bearer token when a session
//! exists). On `401 Unauthorized` it retries exactly once against the guest
//! variant without credentials. Any other non-success status is final.
//!
//! Both variants go through one request builder keyed by [`Endpoint`] and
//! [`Access`], so the two paths cannot drift apart.

use crate::config::ClientConfig;
use crate::error::D2xError;
use crate::model::{
    AuthResponse, CreateJobRequest, Credentials, DocumentType, DownloadResponse, Job,
    JobResponse, PresignedUpload, PresignedUrlRequest,
};
use crate::session::SessionStore;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Which variant of an endpoint a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Regular path, bearer token attached when signed in.
    Authenticated,
    /// Guest path, never carries credentials.
    Guest,
}

/// A job-API operation that has both an authenticated and a guest path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    /// `POST /upload/presigned-url` | `POST /upload/guest-presigned-url`
    PresignedUrl,
    /// `POST /jobs` | `POST /jobs/guest`
    CreateJob,
    /// `GET /jobs/{id}/status` | `GET /jobs/guest/{id}/status`
    JobStatus(&'a str),
    /// `GET /jobs/{id}/download` | `GET /jobs/guest/{id}/download`
    Download(&'a str),
}

impl<'a> Endpoint<'a> {
    pub fn method(&self) -> Method {
        match self {
            Endpoint::PresignedUrl | Endpoint::CreateJob => Method::POST,
            Endpoint::JobStatus(_) | Endpoint::Download(_) => Method::GET,
        }
    }

    /// Path segments below the API root.
    pub fn segments(&self, access: Access) -> Vec<&'a str> {
        use Access::*;
        match (*self, access) {
            (Endpoint::PresignedUrl, Authenticated) => vec!["upload", "presigned-url"],
            (Endpoint::PresignedUrl, Guest) => vec!["upload", "guest-presigned-url"],
            (Endpoint::CreateJob, Authenticated) => vec!["jobs"],
            (Endpoint::CreateJob, Guest) => vec!["jobs", "guest"],
            (Endpoint::JobStatus(id), Authenticated) => vec!["jobs", id, "status"],
            (Endpoint::JobStatus(id), Guest) => vec!["jobs", "guest", id, "status"],
            (Endpoint::Download(id), Authenticated) => vec!["jobs", id, "download"],
            (Endpoint::Download(id), Guest) => vec!["jobs", "guest", id, "download"],
        }
    }

    /// Human-readable path, e.g. `/jobs/guest/42/status`.
    pub fn path(&self, access: Access) -> String {
        format!("/{}", self.segments(access).join("/"))
    }

    /// The error this endpoint reports for a failed call.
    fn failure(&self, access: Access, status: Option<StatusCode>, detail: String) -> D2xError {
        let guest = access == Access::Guest;
        let status = status.map(|s| s.as_u16());
        match *self {
            Endpoint::PresignedUrl => D2xError::PresignedUrlFailed {
                guest,
                status,
                detail,
            },
            Endpoint::CreateJob => D2xError::JobCreationFailed {
                guest,
                status,
                detail,
            },
            Endpoint::JobStatus(id) => D2xError::StatusFetchFailed {
                job_id: id.to_string(),
                status,
                detail,
            },
            Endpoint::Download(id) => D2xError::DownloadUrlFailed {
                job_id: id.to_string(),
                status,
                detail,
            },
        }
    }
}

/// Client for the document-processing API.
///
/// Cheap to clone: clones share the connection pool, config and session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: Url,
    session: SessionStore,
    config: ClientConfig,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("session", &self.inner.session)
            .finish()
    }
}

impl ApiClient {
    /// Build a client for `config.api_url`, reading credentials from `session`.
    pub fn new(config: ClientConfig, session: SessionStore) -> Result<Self, D2xError> {
        let base_url = Url::parse(&config.api_url)
            .map_err(|e| D2xError::InvalidConfig(format!("API URL '{}': {e}", config.api_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(D2xError::InvalidConfig(format!(
                "API URL '{}' cannot carry a path",
                config.api_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("d2x/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| D2xError::Http(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                session,
                config,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    // ── Auth ─────────────────────────────────────────────────────────────

    /// Create an account and sign in. `name` defaults to the email's local part.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<AuthResponse, D2xError> {
        let email = email.trim();
        validate_credentials(email, password)?;
        let auth = self
            .auth_call("register", email, password)
            .await
            .map_err(|message| D2xError::RegistrationFailed { message })?;
        self.inner.session.sign_up(&auth.access_token, email, name)?;
        info!("Registered {}", email);
        Ok(auth)
    }

    /// Sign in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, D2xError> {
        let email = email.trim();
        validate_credentials(email, password)?;
        let auth = self
            .auth_call("login", email, password)
            .await
            .map_err(|message| D2xError::AuthFailed { message })?;
        self.inner.session.sign_in(&auth.access_token, email)?;
        info!("Signed in as {}", email);
        Ok(auth)
    }

    /// Drop the local session. The server keeps no session state to revoke.
    pub fn logout(&self) -> Result<(), D2xError> {
        self.inner.session.clear()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.is_authenticated()
    }

    /// `POST /auth/{action}`; the error side is the message to show the user.
    async fn auth_call(
        &self,
        action: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, String> {
        let fallback = if action == "register" {
            "Registration failed"
        } else {
            "Invalid credentials"
        };
        let url = self
            .url_from_segments(&["auth", action])
            .map_err(|e| e.to_string())?;
        let body = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };

        debug!(%url, "Auth request");
        let response = self
            .inner
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_detail(&e))?;

        if !response.status().is_success() {
            return Err(server_message(response)
                .await
                .unwrap_or_else(|| fallback.to_string()));
        }
        response
            .json::<AuthResponse>()
            .await
            .map_err(|e| format!("{fallback}: invalid response body: {e}"))
    }

    // ── Upload ───────────────────────────────────────────────────────────

    /// Ask for a presigned object-storage target for `file_name`.
    pub async fn request_upload_url(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> Result<PresignedUpload, D2xError> {
        let body = PresignedUrlRequest {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
        };
        self.call(Endpoint::PresignedUrl, Some(&body)).await
    }

    /// PUT the raw bytes to the presigned target. Never carries the bearer token.
    pub async fn upload_object(
        &self,
        target: &PresignedUpload,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), D2xError> {
        let size = bytes.len();
        debug!(key = %target.key, size, "Uploading object");
        let response = self
            .inner
            .http
            .put(&target.url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| D2xError::UploadFailed {
                status: None,
                detail: transport_detail(&e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(D2xError::UploadFailed {
                status: Some(status.as_u16()),
                detail: error_detail(response).await,
            });
        }
        Ok(())
    }

    // ── Jobs ─────────────────────────────────────────────────────────────

    /// Create a processing job for an uploaded object.
    pub async fn create_job(
        &self,
        input_file_key: &str,
        document_type: DocumentType,
    ) -> Result<JobResponse, D2xError> {
        let body = CreateJobRequest {
            input_file_key: input_file_key.to_string(),
            document_type,
        };
        self.call(Endpoint::CreateJob, Some(&body)).await
    }

    /// Current status of a job.
    pub async fn job_status(&self, job_id: &str) -> Result<Job, D2xError> {
        self.call::<(), _>(Endpoint::JobStatus(job_id), None).await
    }

    /// Download descriptor of a completed job.
    pub async fn download_url(&self, job_id: &str) -> Result<DownloadResponse, D2xError> {
        self.call::<(), _>(Endpoint::Download(job_id), None).await
    }

    /// Fetch the bytes behind a download URL (e.g. the finished spreadsheet).
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, D2xError> {
        let failed = |reason: String| D2xError::DownloadFailed {
            url: url.to_string(),
            reason,
        };
        let response = self
            .inner
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| failed(transport_detail(&e)))?;
        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| failed(transport_detail(&e)))?;
        Ok(bytes.to_vec())
    }

    // ── Request plumbing ─────────────────────────────────────────────────

    /// Call `endpoint`, falling back to its guest variant once on `401`.
    pub(crate) async fn call<B, T>(
        &self,
        endpoint: Endpoint<'_>,
        body: Option<&B>,
    ) -> Result<T, D2xError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.inner.session.token();
        let mut access = Access::Authenticated;
        let mut response = self.send(endpoint, access, token.as_deref(), body).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(
                "{} returned 401, retrying {}",
                endpoint.path(Access::Authenticated),
                endpoint.path(Access::Guest)
            );
            access = Access::Guest;
            response = self.send(endpoint, access, None, body).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response).await;
            return Err(endpoint.failure(access, Some(status), detail));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| endpoint.failure(access, None, format!("invalid response body: {e}")))
    }

    async fn send<B>(
        &self,
        endpoint: Endpoint<'_>,
        access: Access,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<Response, D2xError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url_from_segments(&endpoint.segments(access))?;
        debug!(method = %endpoint.method(), %url, ?access, "API request");

        let mut request = self.inner.http.request(endpoint.method(), url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request
            .send()
            .await
            .map_err(|e| endpoint.failure(access, None, transport_detail(&e)))
    }

    /// API root joined with `segments`; each segment is percent-encoded.
    fn url_from_segments(&self, segments: &[&str]) -> Result<Url, D2xError> {
        let mut url = self.inner.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                D2xError::InvalidConfig(format!(
                    "API URL '{}' cannot carry a path",
                    self.inner.base_url
                ))
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }
}

/// Reject obviously malformed credentials before hitting the network.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), D2xError> {
    if !RE_EMAIL.is_match(email.trim()) {
        return Err(D2xError::InvalidCredentials(format!(
            "'{email}' is not a valid email address"
        )));
    }
    if password.is_empty() {
        return Err(D2xError::InvalidCredentials(
            "password must not be empty".into(),
        ));
    }
    Ok(())
}

fn transport_detail(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("could not connect: {e}")
    } else {
        e.to_string()
    }
}

/// `message` or `error` from a JSON error body, if present.
async fn server_message(response: Response) -> Option<String> {
    let value = response.json::<serde_json::Value>().await.ok()?;
    ["message", "error"]
        .iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()))
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Describe a failed response: the server's message if it sent one, else the status.
async fn error_detail(response: Response) -> String {
    let status = response.status();
    match server_message(response).await {
        Some(message) => format!("HTTP {status}: {message}"),
        None => format!("HTTP {status}"),
    }
}
