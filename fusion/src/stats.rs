use std::sync::atomic::{AtomicU64, Ordering};

use crate::StreamStats;

/**
    Pipeline-wide counters, updated lock-free by the worker and presenter.
*/
#[derive(Debug, Default)]
pub struct PipelineStats {
    fused: AtomicU64,
    failed: AtomicU64,
    presented: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_fused(&self) {
        self.fused.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_presented(&self) {
        self.presented.fetch_add(1, Ordering::Relaxed);
    }

    /// Sets fused successfully.
    pub fn fused(&self) -> u64 {
        self.fused.load(Ordering::Relaxed)
    }

    /// Sets discarded because the fuser failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Fused frames handed to a presenter.
    pub fn presented(&self) -> u64 {
        self.presented.load(Ordering::Relaxed)
    }
}

/**
    Point-in-time copy of all pipeline counters.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub fused: u64,
    pub failed: u64,
    pub presented: u64,
    pub streams: Vec<StreamStats>,
}

impl StatsSnapshot {
    pub(crate) fn capture(stats: &PipelineStats, streams: Vec<StreamStats>) -> Self {
        Self {
            fused: stats.fused(),
            failed: stats.failed(),
            presented: stats.presented(),
            streams,
        }
    }
}
