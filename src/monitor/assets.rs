// Asset load monitor — display-only diagnostics for individual asset loads.
// Passive by contract: nothing here influences loader control flow.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::timing::{epoch_millis, ResourceTimingLedger};
use crate::config::{BUNDLE_SIZE_BUDGET_BYTES, CACHE_HIT_TARGET, LOAD_TIME_BUDGET_MS};

/// URL substrings that mark a transfer as CDN-served for the cache-hit heuristic.
const CDN_URL_HINTS: [&str; 4] = ["cdn", "jsdelivr", "unpkg", "cdnjs"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStatus {
    Loading,
    Success,
    Error,
}

/// One tracked asset load. Created at `start_tracking`, completed exactly once
/// by `record_success`/`record_error`, retained for the session.
#[derive(Debug, Clone)]
pub struct AssetMetrics {
    pub id: String,
    pub url: String,
    pub started_epoch_ms: u64,
    pub completed_epoch_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub size_bytes: Option<u64>,
    pub status: AssetStatus,
    pub error: Option<String>,
    started_at: Instant,
}

#[derive(Debug, Clone)]
pub struct SlowestAsset {
    pub url: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct PerformanceSummary {
    pub total_assets: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_bytes: u64,
    /// Mean duration over successful loads; 0 when none completed.
    pub average_load_time_ms: f64,
    pub slowest_asset: Option<SlowestAsset>,
}

#[derive(Debug, Clone)]
pub struct ThresholdReport {
    pub bundle_size_ok: bool,
    pub load_time_ok: bool,
    pub cache_hit_ok: bool,
    pub violations: Vec<String>,
}

impl ThresholdReport {
    pub fn all_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

pub struct AssetLoadMonitor {
    metrics: Mutex<Vec<AssetMetrics>>,
    ledger: Arc<ResourceTimingLedger>,
}

impl AssetLoadMonitor {
    pub fn new() -> Self {
        Self {
            metrics: Mutex::new(Vec::new()),
            ledger: Arc::new(ResourceTimingLedger::new()),
        }
    }

    /// The ledger sources should report their transfers into.
    pub fn ledger(&self) -> Arc<ResourceTimingLedger> {
        Arc::clone(&self.ledger)
    }

    /// Register an in-flight asset load and return its tracking id.
    pub fn start_tracking(&self, url: &str) -> String {
        let id = format!("asset-{}-{:08x}", epoch_millis(), rand::random::<u32>());
        debug!("tracking started id={} url={}", id, url);
        self.metrics.lock().push(AssetMetrics {
            id: id.clone(),
            url: url.to_string(),
            started_epoch_ms: epoch_millis(),
            completed_epoch_ms: None,
            duration_ms: None,
            size_bytes: None,
            status: AssetStatus::Loading,
            error: None,
            started_at: Instant::now(),
        });
        id
    }

    /// Complete a tracked load. When the timing ledger holds a matching
    /// transfer record, its measured duration and decoded size replace the
    /// monitor's own coarser values.
    pub fn record_success(&self, tracking_id: &str, size_bytes: Option<u64>) {
        let mut metrics = self.metrics.lock();
        let Some(metric) = metrics.iter_mut().find(|m| m.id == tracking_id) else {
            warn!("record_success for unknown tracking id={}", tracking_id);
            return;
        };

        metric.status = AssetStatus::Success;
        metric.completed_epoch_ms = Some(epoch_millis());
        metric.duration_ms = Some(metric.started_at.elapsed().as_millis() as u64);
        metric.size_bytes = size_bytes;

        if let Some(record) = self.ledger.match_unapplied(&metric.url) {
            metric.duration_ms = Some(record.duration_ms);
            metric.size_bytes = Some(record.decoded_size);
        }
    }

    /// Mark a tracked load failed. Unknown ids are ignored.
    pub fn record_error(&self, tracking_id: &str, error: &str) {
        let mut metrics = self.metrics.lock();
        let Some(metric) = metrics.iter_mut().find(|m| m.id == tracking_id) else {
            warn!("record_error for unknown tracking id={}", tracking_id);
            return;
        };

        metric.status = AssetStatus::Error;
        metric.completed_epoch_ms = Some(epoch_millis());
        metric.duration_ms = Some(metric.started_at.elapsed().as_millis() as u64);
        metric.error = Some(error.to_string());
    }

    pub fn metrics(&self) -> Vec<AssetMetrics> {
        self.metrics.lock().clone()
    }

    pub fn get_performance_summary(&self) -> PerformanceSummary {
        let metrics = self.metrics.lock();

        let successful: Vec<&AssetMetrics> = metrics
            .iter()
            .filter(|m| m.status == AssetStatus::Success)
            .collect();
        let failed = metrics
            .iter()
            .filter(|m| m.status == AssetStatus::Error)
            .count();

        let total_bytes: u64 = successful.iter().filter_map(|m| m.size_bytes).sum();

        let durations: Vec<u64> = successful.iter().filter_map(|m| m.duration_ms).collect();
        let average_load_time_ms = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<u64>() as f64 / durations.len() as f64
        };

        // Strict comparison: the earliest asset wins duration ties.
        let mut slowest: Option<SlowestAsset> = None;
        for m in &successful {
            let Some(d) = m.duration_ms else { continue };
            if slowest.as_ref().map_or(true, |s| d > s.duration_ms) {
                slowest = Some(SlowestAsset {
                    url: m.url.clone(),
                    duration_ms: d,
                });
            }
        }

        PerformanceSummary {
            total_assets: metrics.len(),
            successful: successful.len(),
            failed,
            total_bytes,
            average_load_time_ms,
            slowest_asset: slowest,
        }
    }

    /// Fraction of CDN transfers served from a cache. With no CDN transfers
    /// recorded yet there is nothing to penalize, so the ratio reports 1.0.
    pub fn get_cache_hit_ratio(&self) -> f64 {
        let entries = self.ledger.entries();
        let cdn: Vec<_> = entries
            .iter()
            .filter(|r| {
                let url = r.url.to_lowercase();
                CDN_URL_HINTS.iter().any(|hint| url.contains(hint))
            })
            .collect();

        if cdn.is_empty() {
            return 1.0;
        }
        let hits = cdn.iter().filter(|r| r.served_from_cache()).count();
        hits as f64 / cdn.len() as f64
    }

    pub fn validate_performance_thresholds(&self) -> ThresholdReport {
        let summary = self.get_performance_summary();
        let cache_hit_ratio = self.get_cache_hit_ratio();
        let mut violations = Vec::new();

        let bundle_size_ok = summary.total_bytes <= BUNDLE_SIZE_BUDGET_BYTES;
        if !bundle_size_ok {
            violations.push(format!(
                "total bundle size {:.1} MB exceeds {:.0} MB budget",
                summary.total_bytes as f64 / (1024.0 * 1024.0),
                BUNDLE_SIZE_BUDGET_BYTES as f64 / (1024.0 * 1024.0)
            ));
        }

        let load_time_ok = summary.average_load_time_ms <= LOAD_TIME_BUDGET_MS as f64;
        if !load_time_ok {
            violations.push(format!(
                "average load time {:.0} ms exceeds {} ms budget",
                summary.average_load_time_ms, LOAD_TIME_BUDGET_MS
            ));
        }

        let cache_hit_ok = cache_hit_ratio >= CACHE_HIT_TARGET;
        if !cache_hit_ok {
            violations.push(format!(
                "cache hit ratio {:.2} below {:.2} target",
                cache_hit_ratio, CACHE_HIT_TARGET
            ));
        }

        ThresholdReport {
            bundle_size_ok,
            load_time_ok,
            cache_hit_ok,
            violations,
        }
    }

    /// Stop collecting transfer records. Already-captured metrics stay readable.
    pub fn cleanup(&self) {
        self.ledger.disconnect();
        debug!("asset monitor disconnected from timing ledger");
    }
}

impl Default for AssetLoadMonitor {
    fn default() -> Self {
        Self::new()
    }
}
