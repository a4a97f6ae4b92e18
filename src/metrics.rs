//! Counters for one EXIF field

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct FieldMetrics {
    pub extractions: AtomicU64,
    pub fresh_skips: AtomicU64,
    pub extraction_failures: AtomicU64,
    pub empty_results: AtomicU64,
    pub denormalize_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub extractions: u64,
    pub fresh_skips: u64,
    pub extraction_failures: u64,
    pub empty_results: u64,
    pub denormalize_failures: u64,
}

impl FieldMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            extractions: self.extractions.load(Ordering::Relaxed),
            fresh_skips: self.fresh_skips.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            empty_results: self.empty_results.load(Ordering::Relaxed),
            denormalize_failures: self.denormalize_failures.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Share of extractor runs that failed
    pub fn failure_rate(&self) -> f64 {
        let attempts = self.extractions + self.extraction_failures + self.empty_results;
        if attempts == 0 {
            0.0
        } else {
            self.extraction_failures as f64 / attempts as f64
        }
    }
}
