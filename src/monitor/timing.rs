// Resource timing ledger — per-transfer measurements reported by the sources,
// consumed by the asset monitor to refine its own coarser observations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Ledger capacity; oldest entries are evicted once it fills.
const MAX_RECORDS: usize = 512;

/// Milliseconds since the unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One completed transfer as measured at the socket: wire bytes versus
/// decoded bytes, and wall-clock duration.
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub url: String,
    pub started_epoch_ms: u64,
    pub duration_ms: u64,
    /// Bytes on the wire. Zero or less than `decoded_size` means the
    /// response was served from a cache.
    pub transfer_size: u64,
    pub decoded_size: u64,
    /// Set once a monitor has folded this record into an asset metric.
    pub applied: bool,
}

impl TransferRecord {
    pub fn new(
        url: String,
        started_epoch_ms: u64,
        duration_ms: u64,
        transfer_size: u64,
        decoded_size: u64,
    ) -> Self {
        Self {
            url,
            started_epoch_ms,
            duration_ms,
            transfer_size,
            decoded_size,
            applied: false,
        }
    }

    pub fn served_from_cache(&self) -> bool {
        self.transfer_size == 0 || self.transfer_size < self.decoded_size
    }
}

/// Accumulates transfer records for the lifetime of a loader. Sources write,
/// the monitor reads; `disconnect` stops collection without discarding what
/// was already recorded.
pub struct ResourceTimingLedger {
    entries: Mutex<Vec<TransferRecord>>,
    connected: AtomicBool,
}

impl ResourceTimingLedger {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        }
    }

    pub fn record(&self, record: TransferRecord) {
        if !self.connected.load(Ordering::Relaxed) {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.len() >= MAX_RECORDS {
            entries.remove(0);
        }
        entries.push(record);
    }

    pub fn entries(&self) -> Vec<TransferRecord> {
        self.entries.lock().clone()
    }

    /// Take the most recent not-yet-applied record for `url`, marking it
    /// applied so repeated loads of the same URL each consume their own entry.
    pub fn match_unapplied(&self, url: &str) -> Option<TransferRecord> {
        let mut entries = self.entries.lock();
        let found = entries
            .iter_mut()
            .rev()
            .find(|r| !r.applied && r.url == url)?;
        found.applied = true;
        Some(found.clone())
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Default for ResourceTimingLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_unapplied_consumes_entry() {
        let ledger = ResourceTimingLedger::new();
        ledger.record(TransferRecord::new("https://a/x.js".into(), 1, 80, 100, 100));
        ledger.record(TransferRecord::new("https://a/x.js".into(), 2, 40, 0, 100));

        // Most recent first, then the older one, then nothing.
        let first = ledger.match_unapplied("https://a/x.js").unwrap();
        assert_eq!(first.duration_ms, 40);
        assert!(first.served_from_cache());

        let second = ledger.match_unapplied("https://a/x.js").unwrap();
        assert_eq!(second.duration_ms, 80);
        assert!(!second.served_from_cache());

        assert!(ledger.match_unapplied("https://a/x.js").is_none());
    }

    #[test]
    fn test_disconnect_stops_recording() {
        let ledger = ResourceTimingLedger::new();
        ledger.record(TransferRecord::new("u1".into(), 0, 1, 1, 1));
        ledger.disconnect();
        ledger.record(TransferRecord::new("u2".into(), 0, 1, 1, 1));

        assert!(!ledger.is_connected());
        assert_eq!(ledger.entries().len(), 1);
    }
}
