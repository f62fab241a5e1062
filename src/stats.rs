//! Running conversion statistics.
//!
//! Counters are derived from workflow outcomes: a conversion is counted when
//! it starts, and later as either a success or a failure. They are persisted
//! only while a session exists. A guest always starts from a clean slate and
//! nothing a guest does is written to storage.

use crate::error::D2xError;
use crate::session::SessionStore;
use crate::storage::{read_json, write_json};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Storage key of the JSON-encoded [`ConversionStats`].
pub const STATS_KEY: &str = "conversion_stats";

/// Counters shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionStats {
    pub total_conversions: u64,
    pub files_processed: u64,
    pub successful_conversions: u64,
    pub failed_conversions: u64,
    /// `round(successful / (successful + failed) * 100)`, 100 before any outcome.
    pub success_rate: u32,
}

impl Default for ConversionStats {
    fn default() -> Self {
        Self {
            total_conversions: 0,
            files_processed: 0,
            successful_conversions: 0,
            failed_conversions: 0,
            success_rate: 100,
        }
    }
}

/// Success rate in whole percent; 100 when nothing has finished yet.
pub fn success_rate(successful: u64, failed: u64) -> u32 {
    let total = successful + failed;
    if total == 0 {
        return 100;
    }
    ((successful as f64 / total as f64) * 100.0).round() as u32
}

/// Thread-safe statistics store.
///
/// Each operation replaces the whole [`ConversionStats`] value under a lock,
/// so concurrent conversions never observe a half-updated record.
#[derive(Debug)]
pub struct StatsStore {
    session: SessionStore,
    stats: Mutex<ConversionStats>,
}

impl StatsStore {
    /// Load statistics for the current session.
    ///
    /// Guests get the default counters without touching storage. A corrupt
    /// persisted value is replaced by the defaults.
    pub fn load(session: SessionStore) -> Self {
        let stats = if session.is_authenticated() {
            match read_json::<ConversionStats>(session.storage().as_ref(), STATS_KEY) {
                Ok(Some(saved)) => saved,
                Ok(None) => ConversionStats::default(),
                Err(e) => {
                    warn!("Error parsing saved stats, starting fresh: {}", e);
                    ConversionStats::default()
                }
            }
        } else {
            ConversionStats::default()
        };
        Self {
            session,
            stats: Mutex::new(stats),
        }
    }

    /// Current counters.
    pub fn snapshot(&self) -> ConversionStats {
        *self.lock()
    }

    /// A conversion was launched.
    pub fn increment_started(&self) -> Result<ConversionStats, D2xError> {
        self.update(|s| ConversionStats {
            total_conversions: s.total_conversions + 1,
            files_processed: s.files_processed + 1,
            ..s
        })
    }

    /// A conversion produced a download URL.
    pub fn increment_success(&self) -> Result<ConversionStats, D2xError> {
        self.update(|s| {
            let successful = s.successful_conversions + 1;
            ConversionStats {
                successful_conversions: successful,
                success_rate: success_rate(successful, s.failed_conversions),
                ..s
            }
        })
    }

    /// A conversion ended in an error.
    pub fn increment_failure(&self) -> Result<ConversionStats, D2xError> {
        self.update(|s| {
            let failed = s.failed_conversions + 1;
            ConversionStats {
                failed_conversions: failed,
                success_rate: success_rate(s.successful_conversions, failed),
                ..s
            }
        })
    }

    /// Zero every counter. Only a signed-in user may reset.
    pub fn reset(&self) -> Result<ConversionStats, D2xError> {
        if !self.session.is_authenticated() {
            return Err(D2xError::NotAuthenticated);
        }
        self.update(|_| ConversionStats::default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ConversionStats> {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(
        &self,
        f: impl FnOnce(ConversionStats) -> ConversionStats,
    ) -> Result<ConversionStats, D2xError> {
        let mut guard = self.lock();
        let next = f(*guard);
        *guard = next;
        if self.session.is_authenticated() {
            write_json(self.session.storage().as_ref(), STATS_KEY, &next)?;
        }
        debug!(?next, "Stats updated");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore, SharedStore};

    fn signed_in(store: &SharedStore) -> SessionStore {
        let s = SessionStore::new(store.clone());
        s.sign_in("tok", "user@example.com").unwrap();
        s
    }

    #[test]
    fn rate_is_100_before_any_outcome() {
        assert_eq!(success_rate(0, 0), 100);
        assert_eq!(ConversionStats::default().success_rate, 100);
    }

    #[test]
    fn three_successes_one_failure_is_75() {
        let stats = StatsStore::load(SessionStore::new(MemoryStore::shared()));
        for _ in 0..4 {
            stats.increment_started().unwrap();
        }
        stats.increment_success().unwrap();
        stats.increment_success().unwrap();
        stats.increment_failure().unwrap();
        let s = stats.increment_success().unwrap();
        assert_eq!(s.success_rate, 75);
        assert_eq!(s.total_conversions, 4);
        assert_eq!(s.files_processed, 4);
        assert_eq!(s.successful_conversions, 3);
        assert_eq!(s.failed_conversions, 1);
    }

    #[test]
    fn rate_rounds_half_up() {
        // 1 of 8 → 12.5 → 13
        assert_eq!(success_rate(1, 7), 13);
        // 2 of 3 → 66.67 → 67
        assert_eq!(success_rate(2, 1), 67);
        assert_eq!(success_rate(0, 3), 0);
    }

    #[test]
    fn guest_stats_are_never_written() {
        let store = MemoryStore::shared();
        let stats = StatsStore::load(SessionStore::new(store.clone()));
        stats.increment_started().unwrap();
        stats.increment_success().unwrap();
        assert!(store.get(STATS_KEY).is_none());
    }

    #[test]
    fn guest_ignores_previously_saved_stats() {
        let store = MemoryStore::shared();
        let saved = ConversionStats {
            total_conversions: 9,
            files_processed: 9,
            successful_conversions: 8,
            failed_conversions: 1,
            success_rate: 89,
        };
        write_json(store.as_ref(), STATS_KEY, &saved).unwrap();

        let stats = StatsStore::load(SessionStore::new(store));
        assert_eq!(stats.snapshot(), ConversionStats::default());
    }

    #[test]
    fn signed_in_stats_persist_and_reload() {
        let store = MemoryStore::shared();
        let session = signed_in(&store);
        {
            let stats = StatsStore::load(session.clone());
            stats.increment_started().unwrap();
            stats.increment_failure().unwrap();
        }
        let reloaded = StatsStore::load(session);
        let s = reloaded.snapshot();
        assert_eq!(s.total_conversions, 1);
        assert_eq!(s.failed_conversions, 1);
        assert_eq!(s.success_rate, 0);
    }

    #[test]
    fn corrupt_saved_stats_fall_back_to_defaults() {
        let store = MemoryStore::shared();
        let session = signed_in(&store);
        store.set(STATS_KEY, "{\"totalConversions\":\"many\"}").unwrap();
        let stats = StatsStore::load(session);
        assert_eq!(stats.snapshot(), ConversionStats::default());
    }

    #[test]
    fn reset_requires_session() {
        let store = MemoryStore::shared();
        let stats = StatsStore::load(SessionStore::new(store.clone()));
        stats.increment_started().unwrap();
        assert!(matches!(stats.reset(), Err(D2xError::NotAuthenticated)));
        assert_eq!(stats.snapshot().total_conversions, 1);

        let stats = StatsStore::load(signed_in(&store));
        stats.increment_started().unwrap();
        let s = stats.reset().unwrap();
        assert_eq!(s, ConversionStats::default());
        let persisted: ConversionStats = read_json(store.as_ref(), STATS_KEY).unwrap().unwrap();
        assert_eq!(persisted, ConversionStats::default());
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let json = serde_json::to_value(ConversionStats::default()).unwrap();
        assert_eq!(json["totalConversions"], 0);
        assert_eq!(json["successRate"], 100);
    }
}
