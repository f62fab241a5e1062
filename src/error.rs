//! Error types for the d2x client library.
//!
//! Every failure the conversion workflow can hit is a distinct
//! [`D2xError`] variant, so callers can map each one to its own user-facing
//! message and count it as a failed conversion. The workflow never retries on
//! its own: apart from the one-shot guest fallback on `401`, the first error
//! aborts the run and the user starts again from scratch.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the d2x library.
#[derive(Debug, Error)]
pub enum D2xError {
    // ── Authentication ────────────────────────────────────────────────────
    /// Login was rejected (wrong email/password or server refused).
    #[error("Login failed: {message}")]
    AuthFailed { message: String },

    /// Registration was rejected by the server.
    #[error("Registration failed: {message}")]
    RegistrationFailed { message: String },

    /// An operation that requires a session was attempted without one.
    #[error("Not signed in.\nRun `d2x login` first.")]
    NotAuthenticated,

    /// Email or password did not pass local validation.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    // ── Workflow: upload ──────────────────────────────────────────────────
    /// Neither the authenticated nor the guest endpoint issued an upload URL.
    #[error("Failed to get presigned URL{}: {detail}", guest_suffix(.guest))]
    PresignedUrlFailed {
        guest: bool,
        status: Option<u16>,
        detail: String,
    },

    /// The direct PUT to object storage was rejected.
    #[error("Failed to upload file to storage: {detail}")]
    UploadFailed { status: Option<u16>, detail: String },

    // ── Workflow: job ─────────────────────────────────────────────────────
    /// The processing job could not be created.
    #[error("Failed to create processing job{}: {detail}", guest_suffix(.guest))]
    JobCreationFailed {
        guest: bool,
        status: Option<u16>,
        detail: String,
    },

    /// A status poll failed at the HTTP level.
    #[error("Failed to get status of job '{job_id}': {detail}")]
    StatusFetchFailed {
        job_id: String,
        status: Option<u16>,
        detail: String,
    },

    /// The server reported the job as FAILED.
    #[error("{message}")]
    ProcessingFailed { job_id: String, message: String },

    /// Polling gave up before the job reached a terminal state.
    #[error("Processing timeout: job '{job_id}' still running after {polls} status checks")]
    PollTimeout { job_id: String, polls: u32 },

    // ── Workflow: download ────────────────────────────────────────────────
    /// The download-URL request itself failed.
    #[error("Failed to get download URL for job '{job_id}': {detail}")]
    DownloadUrlFailed {
        job_id: String,
        status: Option<u16>,
        detail: String,
    },

    /// The job completed but the server returned no download URL.
    #[error("No download URL available for job '{job_id}'")]
    MissingDownloadUrl { job_id: String },

    /// Fetching the finished spreadsheet failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file type is not accepted by the processing service.
    #[error("Invalid file format '{content_type}' for '{path}'.\nPlease upload PDF, JPG, PNG, WebP, BMP, TIFF, DOC or DOCX.")]
    UnsupportedFormat { path: PathBuf, content_type: String },

    /// The file exceeds the configured upload limit.
    #[error("File '{path}' is {size} bytes, exceeding the {limit}-byte limit")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// The file has no content.
    #[error("File '{path}' is empty")]
    EmptyFile { path: PathBuf },

    // ── Local state ───────────────────────────────────────────────────────
    /// Could not read or write the persisted client state.
    #[error("State storage error at '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted value could not be (de)serialised.
    #[error("Corrupt state for key '{key}': {detail}")]
    CorruptState { key: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Transport / control ───────────────────────────────────────────────
    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(String),

    /// The conversion task was cancelled before it finished.
    #[error("Conversion cancelled")]
    Cancelled,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl D2xError {
    /// HTTP status attached to a request-level failure, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            D2xError::PresignedUrlFailed { status, .. }
            | D2xError::UploadFailed { status, .. }
            | D2xError::JobCreationFailed { status, .. }
            | D2xError::StatusFetchFailed { status, .. }
            | D2xError::DownloadUrlFailed { status, .. } => *status,
            _ => None,
        }
    }
}

fn guest_suffix(guest: &bool) -> &'static str {
    if *guest {
        " for guest user"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presigned_display_mentions_guest() {
        let e = D2xError::PresignedUrlFailed {
            guest: true,
            status: Some(500),
            detail: "HTTP 500".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("for guest user"), "got: {msg}");
        assert_eq!(e.http_status(), Some(500));
    }

    #[test]
    fn presigned_display_authenticated() {
        let e = D2xError::PresignedUrlFailed {
            guest: false,
            status: Some(403),
            detail: "HTTP 403".into(),
        };
        assert!(!e.to_string().contains("guest"));
    }

    #[test]
    fn processing_failed_shows_server_message() {
        let e = D2xError::ProcessingFailed {
            job_id: "j1".into(),
            message: "Unreadable scan".into(),
        };
        assert_eq!(e.to_string(), "Unreadable scan");
        assert_eq!(e.http_status(), None);
    }

    #[test]
    fn timeout_display() {
        let e = D2xError::PollTimeout {
            job_id: "abc".into(),
            polls: 100,
        };
        let msg = e.to_string();
        assert!(msg.contains("timeout"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn too_large_display() {
        let e = D2xError::FileTooLarge {
            path: "big.pdf".into(),
            size: 60,
            limit: 50,
        };
        assert!(e.to_string().contains("50-byte limit"));
    }
}
