//! Progress-callback trait for conversion workflow events.
//!
//! Pass an [`Arc<dyn ConversionProgressCallback>`] to
//! [`crate::convert::process_document`] to receive `(status, percentage)`
//! updates as the document moves through upload, job creation, polling and
//! download-URL retrieval.
//!
//! Percentages follow a fixed schedule:
//!
//! | Phase         | Emitted                                    |
//! |---------------|--------------------------------------------|
//! | Uploading     | 0 → 30                                     |
//! | Creating job  | 35 → 40                                    |
//! | Polling       | 45, then `min(45 + polls/max_polls·50, 95)` |
//! | Completed     | 98 → 100                                   |
//!
//! Within one run the percentage never decreases.
//!
//! # Example
//!
//! ```rust
//! use d2x::{ConversionProgressCallback, ConversionStatus};
//! use std::sync::{Arc, Mutex};
//!
//! struct LastPercent(Mutex<f64>);
//!
//! impl ConversionProgressCallback for LastPercent {
//!     fn on_progress(&self, _status: ConversionStatus, percentage: f64) {
//!         *self.0.lock().unwrap() = percentage;
//!     }
//! }
//!
//! let cb: Arc<dyn ConversionProgressCallback> = Arc::new(LastPercent(Mutex::new(0.0)));
//! cb.on_progress(ConversionStatus::Uploading, 30.0);
//! ```

use crate::model::ConversionStatus;
use std::sync::Arc;

/// Called by the workflow as a conversion advances.
///
/// Implementations must be `Send + Sync`: several conversions may run on
/// different tasks at once, each reporting through its own (or a shared)
/// callback. All methods have no-op defaults.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called on every phase change and on every status poll.
    ///
    /// # Arguments
    /// * `status`: current phase; during polling, the server's job status
    /// * `percentage`: overall progress, 0–100
    fn on_progress(&self, status: ConversionStatus, percentage: f64) {
        let _ = (status, percentage);
    }

    /// Called once the server has accepted the job.
    fn on_job_created(&self, job_id: &str) {
        let _ = job_id;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback type.
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
