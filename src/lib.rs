//! # d2x
//!
//! Client for a remote document-to-Excel conversion service.
//!
//! Documents (PDF, scans, photos, Word files) are uploaded straight to
//! object storage, processed server-side by an AI extraction job, and come
//! back as a spreadsheet download URL. This crate drives that workflow,
//! reports progress, and keeps the client-side state the service expects:
//! the session token, the signed-in user and per-user conversion stats.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Input     read, detect content type, validate size/type
//!  ├─ 2. Upload    presigned URL, then PUT straight to object storage
//!  ├─ 3. Job       POST /jobs with {inputFileKey, documentType}
//!  ├─ 4. Poll      GET /jobs/{id}/status every 3 s, up to 100 times
//!  └─ 5. Download  GET /jobs/{id}/download → spreadsheet URL
//! ```
//!
//! Every API call goes to the authenticated endpoint first and retries once
//! against the guest endpoint when the server answers `401`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use d2x::{ApiClient, ClientConfig, Converter, DocumentType, FileStore, SessionStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .api_url("https://api.example.com")
//!         .build()?;
//!     let session = SessionStore::new(FileStore::shared(config.resolved_state_dir())?);
//!     let client = ApiClient::new(config, session)?;
//!
//!     let converter = Converter::new(client);
//!     let record = converter
//!         .convert_path("receipt.pdf", DocumentType::Expense, None)
//!         .await?;
//!     println!("{}", record.download_url.unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `d2x` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! d2x = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod convert;
pub mod error;
pub mod formats;
pub mod history;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod stats;
pub mod storage;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{validate_credentials, Access, ApiClient, Endpoint};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use convert::{
    process_document, process_file, process_file_sync, save_spreadsheet, spreadsheet_file_name,
    Converter,
};
pub use error::D2xError;
pub use formats::{FileFormat, FormatCategory};
pub use history::ConversionHistory;
pub use model::{
    ConversionRecord, ConversionStatus, DocumentType, Job, JobStatus, ProgressUpdate, User,
};
pub use pipeline::input::{resolve_input, DocumentFile};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::SessionStore;
pub use stats::{ConversionStats, StatsStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SharedStore};
pub use stream::{process_document_stream, ConversionResult, ConversionTask, ProgressStream};
