//! Spawned conversions with a progress stream and a cancel handle.
//!
//! [`process_document_stream`] runs [`crate::convert::process_document`] on
//! its own tokio task. The returned [`ConversionTask`] yields every
//! [`ProgressUpdate`] as a `Stream` that ends when the workflow ends, and
//! hands back the final result through [`ConversionTask::result`].
//!
//! ```rust,no_run
//! use d2x::{process_document_stream, ApiClient, DocumentFile, DocumentType};
//! use futures::StreamExt;
//!
//! # async fn run(client: ApiClient, doc: DocumentFile) -> Result<(), d2x::D2xError> {
//! let mut task = process_document_stream(client, doc, DocumentType::Expense);
//! while let Some(update) = task.updates().next().await {
//!     eprintln!("{}", update.status.describe(update.percentage));
//! }
//! let url = task.result().await?;
//! println!("{url}");
//! # Ok(())
//! # }
//! ```

use crate::api::ApiClient;
use crate::convert::process_document;
use crate::error::D2xError;
use crate::model::{ConversionStatus, DocumentType, ProgressUpdate};
use crate::pipeline::input::DocumentFile;
use crate::progress::ConversionProgressCallback;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::debug;

/// A boxed stream of progress updates.
pub type ProgressStream = Pin<Box<dyn Stream<Item = ProgressUpdate> + Send>>;

/// A conversion running on its own task.
pub struct ConversionTask {
    updates: ProgressStream,
    result: ConversionResult,
}

impl ConversionTask {
    /// Progress events in emission order. Ends once the workflow finishes,
    /// fails or is cancelled.
    pub fn updates(&mut self) -> &mut ProgressStream {
        &mut self.updates
    }

    /// Split into the event stream and the pending result. The result can
    /// still cancel the task.
    pub fn into_parts(self) -> (ProgressStream, ConversionResult) {
        (self.updates, self.result)
    }

    /// Abort the workflow at its next suspension point.
    pub fn cancel(&self) {
        self.result.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_finished()
    }

    /// Wait for the download URL. A cancelled task yields
    /// [`D2xError::Cancelled`].
    pub async fn result(self) -> Result<String, D2xError> {
        self.result.await
    }
}

/// The outcome of a spawned conversion, resolving to the download URL.
///
/// Cancellation and panics surface as [`D2xError`] values, never as a
/// `JoinError`.
pub struct ConversionResult {
    handle: JoinHandle<Result<String, D2xError>>,
}

impl ConversionResult {
    /// Abort the workflow at its next suspension point.
    pub fn cancel(&self) {
        debug!("Cancelling conversion task");
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for ConversionResult {
    type Output = Result<String, D2xError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(join_result)
    }
}

fn join_result(
    joined: Result<Result<String, D2xError>, tokio::task::JoinError>,
) -> Result<String, D2xError> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Err(D2xError::Cancelled),
        Err(e) => Err(D2xError::Internal(format!("conversion task panicked: {e}"))),
    }
}

/// Run a conversion on a spawned task.
///
/// Must be called from within a tokio runtime.
pub fn process_document_stream(
    client: ApiClient,
    doc: DocumentFile,
    document_type: DocumentType,
) -> ConversionTask {
    let (tx, rx) = mpsc::unbounded_channel();
    let forwarder = Arc::new(ChannelProgress { tx });

    let handle = tokio::spawn(async move {
        // `forwarder` moves into the task; dropping it on exit closes the stream.
        process_document(&client, doc, document_type, Some(forwarder)).await
    });

    ConversionTask {
        updates: Box::pin(UnboundedReceiverStream::new(rx)),
        result: ConversionResult { handle },
    }
}

struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ConversionProgressCallback for ChannelProgress {
    fn on_progress(&self, status: ConversionStatus, percentage: f64) {
        // The receiver may already be gone; the workflow carries on regardless.
        let _ = self.tx.send(ProgressUpdate { status, percentage });
    }
}
