//! In-memory list of the conversions started in this process.
//!
//! Records are kept newest first and live only as long as the
//! [`ConversionHistory`] (and its clones). Every mutation swaps in a whole
//! new record under a short lock, which keeps concurrent workflows from
//! interleaving partial updates.

use crate::model::{ConversionRecord, ConversionStatus};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Shared, cloneable conversion history.
#[derive(Debug, Clone, Default)]
pub struct ConversionHistory {
    records: Arc<Mutex<Vec<ConversionRecord>>>,
}

impl ConversionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh `UPLOADING / 0%` record at the front and return its id.
    pub fn start(&self, file_name: &str) -> String {
        let record = ConversionRecord::new(file_name);
        let id = record.id.clone();
        self.lock().insert(0, record);
        debug!("History: started {} ({})", file_name, id);
        id
    }

    /// Set status and percentage of a record. Unknown ids are ignored.
    pub fn update(&self, id: &str, status: ConversionStatus, percentage: f64) {
        self.replace(id, |r| ConversionRecord {
            status,
            percentage,
            ..r
        });
    }

    /// Mark a record COMPLETED at 100 % with its download URL.
    pub fn complete(&self, id: &str, download_url: &str) -> Option<ConversionRecord> {
        self.replace(id, |r| ConversionRecord {
            status: ConversionStatus::Completed,
            percentage: 100.0,
            download_url: Some(download_url.to_string()),
            error: None,
            ..r
        })
    }

    /// Mark a record FAILED, keeping the last reported percentage.
    pub fn fail(&self, id: &str, message: &str) -> Option<ConversionRecord> {
        self.replace(id, |r| ConversionRecord {
            status: ConversionStatus::Failed,
            error: Some(message.to_string()),
            ..r
        })
    }

    pub fn get(&self, id: &str) -> Option<ConversionRecord> {
        self.lock().iter().find(|r| r.id == id).cloned()
    }

    /// Snapshot of all records, newest first.
    pub fn list(&self) -> Vec<ConversionRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn replace(
        &self,
        id: &str,
        f: impl FnOnce(ConversionRecord) -> ConversionRecord,
    ) -> Option<ConversionRecord> {
        let mut records = self.lock();
        let slot = records.iter_mut().find(|r| r.id == id)?;
        let updated = f(slot.clone());
        *slot = updated.clone();
        Some(updated)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ConversionRecord>> {
        self.records.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_first() {
        let h = ConversionHistory::new();
        let a = h.start("a.pdf");
        let b = h.start("b.pdf");
        let ids: Vec<_> = h.list().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn update_then_complete() {
        let h = ConversionHistory::new();
        let id = h.start("a.pdf");
        h.update(&id, ConversionStatus::Processing, 60.0);
        assert_eq!(h.get(&id).unwrap().percentage, 60.0);

        let done = h.complete(&id, "https://files/a.xlsx").unwrap();
        assert_eq!(done.status, ConversionStatus::Completed);
        assert_eq!(done.percentage, 100.0);
        assert_eq!(done.download_url.as_deref(), Some("https://files/a.xlsx"));
    }

    #[test]
    fn fail_keeps_percentage() {
        let h = ConversionHistory::new();
        let id = h.start("a.pdf");
        h.update(&id, ConversionStatus::Processing, 52.5);
        let r = h.fail(&id, "Processing failed").unwrap();
        assert_eq!(r.status, ConversionStatus::Failed);
        assert_eq!(r.percentage, 52.5);
        assert_eq!(r.error.as_deref(), Some("Processing failed"));
    }

    #[test]
    fn unknown_id_is_ignored() {
        let h = ConversionHistory::new();
        h.update("nope", ConversionStatus::Processing, 50.0);
        assert!(h.complete("nope", "u").is_none());
        assert!(h.is_empty());
    }

    #[test]
    fn clones_share_records() {
        let h = ConversionHistory::new();
        let h2 = h.clone();
        h.start("a.pdf");
        assert_eq!(h2.len(), 1);
    }
}
