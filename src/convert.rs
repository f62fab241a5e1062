//! Conversion workflow: document in, spreadsheet download URL out.
//!
//! [`process_document`] drives one document through the remote pipeline and
//! waits for the result. [`Converter`] wraps it with the per-process
//! [`ConversionHistory`] and the per-user [`StatsStore`]. Use
//! [`crate::stream::process_document_stream`] to run a conversion on its own
//! task with a stream of progress events and a cancel handle.

use crate::api::ApiClient;
use crate::error::D2xError;
use crate::history::ConversionHistory;
use crate::model::{ConversionRecord, ConversionStatus, DocumentType};
use crate::pipeline::{download, input, job, upload};
use crate::pipeline::input::DocumentFile;
use crate::progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
use crate::stats::{ConversionStats, StatsStore};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{info, warn};

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Upload `doc`, create a job, poll it and return the spreadsheet URL.
///
/// # Progress
/// `(UPLOADING, 0)`, `(UPLOADING, 30)`, `(CREATING_JOB, 35)`,
/// `(CREATING_JOB, 40)`, `(PROCESSING, 45)`, one event per poll,
/// `(COMPLETED, 98)` and finally `(COMPLETED, 100)`. The percentage never
/// goes down within a run.
///
/// # Errors
/// The first failing step aborts the run. See [`D2xError`] for the
/// per-step variants.
pub async fn process_document(
    client: &ApiClient,
    doc: DocumentFile,
    document_type: DocumentType,
    progress: Option<ProgressCallback>,
) -> Result<String, D2xError> {
    let start = Instant::now();
    let progress: ProgressCallback = progress.unwrap_or_else(|| Arc::new(NoopProgressCallback));
    let file_name = doc.file_name.clone();
    info!("Starting conversion: {} ({})", file_name, document_type);

    // ── Step 1: Upload ───────────────────────────────────────────────────
    progress.on_progress(ConversionStatus::Uploading, 0.0);
    let key = upload::upload_document(client, doc).await?;
    progress.on_progress(ConversionStatus::Uploading, 30.0);

    // ── Step 2: Create job ───────────────────────────────────────────────
    progress.on_progress(ConversionStatus::CreatingJob, 35.0);
    let created = job::create_job(client, &key, document_type).await?;
    progress.on_job_created(&created.job_id);
    progress.on_progress(ConversionStatus::CreatingJob, 40.0);

    // ── Step 3: Poll ─────────────────────────────────────────────────────
    progress.on_progress(ConversionStatus::Processing, job::PROCESSING_START_PERCENT);
    job::poll_until_complete(client, &created.job_id, client.config(), progress.as_ref()).await?;

    // ── Step 4: Download URL ─────────────────────────────────────────────
    progress.on_progress(ConversionStatus::Completed, 98.0);
    let url = download::fetch_download_url(client, &created.job_id).await?;
    progress.on_progress(ConversionStatus::Completed, 100.0);

    info!(
        "Conversion complete: {} in {}ms",
        file_name,
        start.elapsed().as_millis()
    );
    Ok(url)
}

/// Read and validate a local file, then run [`process_document`].
pub async fn process_file(
    client: &ApiClient,
    path: impl AsRef<Path>,
    document_type: DocumentType,
    progress: Option<ProgressCallback>,
) -> Result<String, D2xError> {
    let doc = input::resolve_input(path, client.config()).await?;
    process_document(client, doc, document_type, progress).await
}

/// Synchronous wrapper around [`process_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_file_sync(
    client: &ApiClient,
    path: impl AsRef<Path>,
    document_type: DocumentType,
) -> Result<String, D2xError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| D2xError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_file(client, path, document_type, None))
}

/// File name for the spreadsheet produced from `source_name`:
/// `invoice.pdf` becomes `invoice.xlsx`.
pub fn spreadsheet_file_name(source_name: &str) -> String {
    numbered_file_name(source_name, 1)
}

/// `invoice.xlsx` for the first attempt, `invoice-2.xlsx` for the second.
fn numbered_file_name(source_name: &str, n: u32) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "converted".to_string());
    if n <= 1 {
        format!("{stem}.xlsx")
    } else {
        format!("{stem}-{n}.xlsx")
    }
}

/// Write `bytes` to a fresh temp file inside `dir`, creating `dir` first.
fn stage_in(dir: &Path, bytes: &[u8]) -> Result<NamedTempFile, D2xError> {
    let write_err = |e: std::io::Error| D2xError::Storage {
        path: dir.to_path_buf(),
        source: e,
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    Ok(tmp)
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Download the spreadsheet at `url` into `output_path`, replacing any
/// existing file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
/// Returns the number of bytes written.
pub async fn save_spreadsheet(
    client: &ApiClient,
    url: &str,
    output_path: impl AsRef<Path>,
) -> Result<u64, D2xError> {
    let path = output_path.as_ref();
    let bytes = client.fetch(url).await?;

    let tmp = stage_in(parent_dir(path), &bytes)?;
    tmp.persist(path).map_err(|e| D2xError::Storage {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes.len() as u64)
}

/// Move `tmp` into `dir` under the first free name derived from
/// `source_name`. Never overwrites an existing file.
fn persist_unique(
    mut tmp: NamedTempFile,
    dir: &Path,
    source_name: &str,
) -> Result<PathBuf, D2xError> {
    for n in 1..=MAX_NAME_ATTEMPTS {
        let path = dir.join(numbered_file_name(source_name, n));
        match tmp.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => tmp = e.file,
            Err(e) => return Err(D2xError::Storage { path, source: e.error }),
        }
    }
    Err(D2xError::Storage {
        path: dir.join(spreadsheet_file_name(source_name)),
        source: std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free file name after {MAX_NAME_ATTEMPTS} attempts"),
        ),
    })
}

// ── Converter ────────────────────────────────────────────────────────────

/// Runs conversions while keeping history and statistics up to date.
///
/// Cheap to clone; clones share the client, history and stats, so several
/// conversions can run concurrently through one converter.
#[derive(Debug, Clone)]
pub struct Converter {
    client: ApiClient,
    history: ConversionHistory,
    stats: Arc<StatsStore>,
}

impl Converter {
    /// Build a converter whose stats follow `client`'s session.
    pub fn new(client: ApiClient) -> Self {
        let stats = StatsStore::load(client.session().clone());
        Self {
            client,
            history: ConversionHistory::new(),
            stats: Arc::new(stats),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn history(&self) -> &ConversionHistory {
        &self.history
    }

    pub fn stats(&self) -> ConversionStats {
        self.stats.snapshot()
    }

    /// Clear the signed-in user's statistics.
    pub fn reset_stats(&self) -> Result<ConversionStats, D2xError> {
        self.stats.reset()
    }

    /// Convert an in-memory document.
    ///
    /// Counts the conversion as started, tracks it in the history while it
    /// runs, then records the outcome. Returns the finished record, or the
    /// workflow error after the record has been marked FAILED.
    pub async fn convert(
        &self,
        doc: DocumentFile,
        document_type: DocumentType,
        progress: Option<ProgressCallback>,
    ) -> Result<ConversionRecord, D2xError> {
        self.bump(self.stats.increment_started());
        let id = self.history.start(&doc.file_name);

        let tracker = Arc::new(HistoryTracker {
            history: self.history.clone(),
            id: id.clone(),
            inner: progress,
        });
        let result = process_document(&self.client, doc, document_type, Some(tracker)).await;

        match result {
            Ok(url) => {
                self.bump(self.stats.increment_success());
                self.history
                    .complete(&id, &url)
                    .ok_or_else(|| D2xError::Internal(format!("history record {id} vanished")))
            }
            Err(e) => {
                warn!("Conversion {} failed: {}", id, e);
                self.history.fail(&id, &e.to_string());
                self.bump(self.stats.increment_failure());
                Err(e)
            }
        }
    }

    /// Resolve, validate and convert a local file.
    ///
    /// Files rejected by validation never reach the history or the stats.
    pub async fn convert_path(
        &self,
        path: impl AsRef<Path>,
        document_type: DocumentType,
        progress: Option<ProgressCallback>,
    ) -> Result<ConversionRecord, D2xError> {
        let doc = input::resolve_input(path, self.client.config()).await?;
        self.convert(doc, document_type, progress).await
    }

    /// Download a finished record's spreadsheet into `dir`.
    ///
    /// The file is named after the source document. When that name is taken
    /// (two sources sharing a stem, or an earlier run), a numeric suffix is
    /// added instead of overwriting: `invoice-2.xlsx`, `invoice-3.xlsx`, ...
    pub async fn download(
        &self,
        record: &ConversionRecord,
        dir: impl AsRef<Path>,
    ) -> Result<PathBuf, D2xError> {
        let url = record
            .download_url
            .as_deref()
            .ok_or_else(|| D2xError::MissingDownloadUrl {
                job_id: record.id.clone(),
            })?;
        let dir = dir.as_ref();
        let bytes = self.client.fetch(url).await?;

        let tmp = stage_in(dir, &bytes)?;
        let path = persist_unique(tmp, dir, &record.file_name)?;
        info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    // Stats are best-effort: a storage failure must not fail the conversion.
    fn bump(&self, result: Result<ConversionStats, D2xError>) {
        if let Err(e) = result {
            warn!("Could not persist conversion stats: {}", e);
        }
    }
}

/// Mirrors progress into a history record before passing it on.
struct HistoryTracker {
    history: ConversionHistory,
    id: String,
    inner: Option<ProgressCallback>,
}

impl ConversionProgressCallback for HistoryTracker {
    fn on_progress(&self, status: ConversionStatus, percentage: f64) {
        self.history.update(&self.id, status, percentage);
        if let Some(ref cb) = self.inner {
            cb.on_progress(status, percentage);
        }
    }

    fn on_job_created(&self, job_id: &str) {
        if let Some(ref cb) = self.inner {
            cb.on_job_created(job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spreadsheet_names() {
        assert_eq!(spreadsheet_file_name("invoice.pdf"), "invoice.xlsx");
        assert_eq!(spreadsheet_file_name("scan.2024.png"), "scan.2024.xlsx");
        assert_eq!(spreadsheet_file_name("noext"), "noext.xlsx");
        assert_eq!(spreadsheet_file_name(""), "converted.xlsx");
        assert_eq!(numbered_file_name("invoice.png", 3), "invoice-3.xlsx");
    }

    #[test]
    fn persist_unique_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("invoice.xlsx"), b"first").unwrap();

        let tmp = stage_in(dir.path(), b"second").unwrap();
        let path = persist_unique(tmp, dir.path(), "invoice.png").unwrap();

        assert_eq!(path, dir.path().join("invoice-2.xlsx"));
        assert_eq!(std::fs::read(dir.path().join("invoice.xlsx")).unwrap(), b"first");
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn tracker_updates_history_and_forwards() {
        use std::sync::Mutex;

        #[derive(Default)]
        struct Seen(Mutex<Vec<f64>>);
        impl ConversionProgressCallback for Seen {
            fn on_progress(&self, _s: ConversionStatus, p: f64) {
                self.0.lock().unwrap().push(p);
            }
        }

        let history = ConversionHistory::new();
        let id = history.start("a.pdf");
        let seen = Arc::new(Seen::default());
        let tracker = HistoryTracker {
            history: history.clone(),
            id: id.clone(),
            inner: Some(seen.clone()),
        };

        tracker.on_progress(ConversionStatus::Uploading, 30.0);
        tracker.on_progress(ConversionStatus::CreatingJob, 35.0);

        let r = history.get(&id).unwrap();
        assert_eq!(r.status, ConversionStatus::CreatingJob);
        assert_eq!(r.percentage, 35.0);
        assert_eq!(*seen.0.lock().unwrap(), vec![30.0, 35.0]);
    }
}
