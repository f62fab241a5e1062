//! Wire types of the remote job API and the client-side records built from them.
//!
//! Field names follow the service's JSON (`camelCase` objects,
//! `SCREAMING_SNAKE_CASE` enum tags), so every type here round-trips through
//! `serde_json` without custom code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Remote job ───────────────────────────────────────────────────────────

/// Server-side status of a processing job.
///
/// `Completed` and `Failed` are terminal: once observed, the client stops
/// reading the job's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Extraction algorithm the service applies to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    /// Receipts, invoices, expense reports. (default)
    #[default]
    Expense,
    /// Payslips, contracts, HR forms.
    Hr,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentType::Expense => "EXPENSE",
            DocumentType::Hr => "HR",
        })
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EXPENSE" => Ok(DocumentType::Expense),
            "HR" => Ok(DocumentType::Hr),
            other => Err(format!("unknown document type '{other}' (expected EXPENSE or HR)")),
        }
    }
}

/// Body of `POST /upload/presigned-url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlRequest {
    pub file_name: String,
    pub content_type: String,
}

/// A pre-authorised object-storage target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedUpload {
    /// URL the raw bytes are PUT to.
    pub url: String,
    /// Storage key passed to job creation.
    pub key: String,
}

/// Body of `POST /jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub input_file_key: String,
    pub document_type: DocumentType,
}

/// Response of `POST /jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub job_id: String,
    pub status: String,
}

/// Response of `GET /jobs/{id}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `GET /jobs/{id}/download`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ── Auth ─────────────────────────────────────────────────────────────────

/// Body of `/auth/register` and `/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Response of `/auth/register` and `/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
}

/// Profile of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl User {
    /// Name to greet the user with: the profile name, else the email's local part.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| email_local_part(&self.email))
    }
}

pub(crate) fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

// ── Client-side progress ────────────────────────────────────────────────

/// Phase reported to progress observers.
///
/// The first two phases are client-side steps; the rest mirror the
/// server's [`JobStatus`] as seen on each poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionStatus {
    Uploading,
    CreatingJob,
    Pending,
    Processing,
    Completed,
    Failed,
}

impl From<JobStatus> for ConversionStatus {
    fn from(s: JobStatus) -> Self {
        match s {
            JobStatus::Pending => ConversionStatus::Pending,
            JobStatus::Processing => ConversionStatus::Processing,
            JobStatus::Completed => ConversionStatus::Completed,
            JobStatus::Failed => ConversionStatus::Failed,
        }
    }
}

impl ConversionStatus {
    /// Human-readable status line, e.g. `Uploading file... 30%`.
    pub fn describe(self, percentage: f64) -> String {
        let pct = percentage.round() as u32;
        match self {
            ConversionStatus::Uploading => format!("Uploading file... {pct}%"),
            ConversionStatus::CreatingJob => format!("Creating processing job... {pct}%"),
            ConversionStatus::Pending => format!("Queued... {pct}%"),
            ConversionStatus::Processing => format!("Processing with AI... {pct}%"),
            ConversionStatus::Completed => format!("Completed! {pct}%"),
            ConversionStatus::Failed => "Processing failed".to_string(),
        }
    }
}

/// One progress event: the workflow's phase and overall percentage (0–100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub status: ConversionStatus,
    pub percentage: f64,
}

/// A conversion as tracked by the client for the current process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRecord {
    pub id: String,
    pub file_name: String,
    pub status: ConversionStatus,
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConversionRecord {
    /// A fresh record in the `UPLOADING / 0%` state.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            status: ConversionStatus::Uploading,
            percentage: 0.0,
            download_url: None,
            error: None,
            timestamp: Utc::now(),
        }
    }
}
