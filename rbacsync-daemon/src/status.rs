//! Runtime status shared between the scheduler and the HTTP surface.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use rbacsync_sync::CycleReport;

pub type SharedStatus = Arc<RwLock<DaemonStatus>>;

#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    pub started_at: DateTime<Utc>,
    /// Cycles that ran to completion, including ones with failed writes.
    pub cycles: u64,
    /// Cycles aborted before any mutation.
    pub aborted_cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_report: Option<CycleReport>,
    pub last_error: Option<String>,
}

impl DaemonStatus {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            cycles: 0,
            aborted_cycles: 0,
            last_cycle_at: None,
            last_report: None,
            last_error: None,
        }
    }

    pub fn shared(started_at: DateTime<Utc>) -> SharedStatus {
        Arc::new(RwLock::new(Self::new(started_at)))
    }

    pub fn record_report(&mut self, report: CycleReport) {
        self.cycles += 1;
        self.last_cycle_at = Some(report.finished_at);
        self.last_report = Some(report);
        self.last_error = None;
    }

    pub fn record_abort(&mut self, at: DateTime<Utc>, error: String) {
        self.aborted_cycles += 1;
        self.last_cycle_at = Some(at);
        self.last_error = Some(error);
    }
}
