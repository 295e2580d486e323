//! Success/failure counters, labelled by operation.
//!
//! The reconciler reports through the [`Metrics`] trait; [`Counters`] is the
//! in-process implementation the daemon exposes on `/metrics`.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::MetricsError;

pub const SUCCESS_METRIC: &str = "rbac_sync_success";
pub const ERRORS_METRIC: &str = "rbac_sync_errors";

/// Operation a counter is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    DeleteOrphan,
    CreateRolebinding,
    UpdatedRolebinding,
    NoMatchingRolebinding,
    GetMembers,
    GetCurrentRolebindings,
    ListNamespaces,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::DeleteOrphan,
        Category::CreateRolebinding,
        Category::UpdatedRolebinding,
        Category::NoMatchingRolebinding,
        Category::GetMembers,
        Category::GetCurrentRolebindings,
        Category::ListNamespaces,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::DeleteOrphan => "delete-orphan",
            Category::CreateRolebinding => "create-rolebinding",
            Category::UpdatedRolebinding => "updated-rolebinding",
            Category::NoMatchingRolebinding => "no-matching-rolebinding",
            Category::GetMembers => "get-members",
            Category::GetCurrentRolebindings => "get-current-rolebindings",
            Category::ListNamespaces => "list-namespaces",
        }
    }
}

/// Sink the engine reports operation outcomes into.
pub trait Metrics: Send + Sync {
    fn record_success(&self, category: Category);
    fn record_failure(&self, category: Category);
}

/// Success and error counters labelled by `operation`, registered in a
/// registry owned by this instance.
#[derive(Clone)]
pub struct Counters {
    registry: Registry,
    success: IntCounterVec,
    errors: IntCounterVec,
}

impl Counters {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let success = IntCounterVec::new(
            Opts::new(SUCCESS_METRIC, "Cumulative number of role update operations"),
            &["operation"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new(
                ERRORS_METRIC,
                "Cumulative number of errors during role update operations",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(success.clone()))?;
        registry.register(Box::new(errors.clone()))?;

        // Every operation is exported from the first scrape, at zero.
        for category in Category::ALL {
            success.with_label_values(&[category.label()]);
            errors.with_label_values(&[category.label()]);
        }

        Ok(Self {
            registry,
            success,
            errors,
        })
    }

    pub fn success(&self, category: Category) -> u64 {
        self.success.with_label_values(&[category.label()]).get()
    }

    pub fn errors(&self, category: Category) -> u64 {
        self.errors.with_label_values(&[category.label()]).get()
    }

    /// Content type of [`Counters::encode_text`] output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Prometheus text exposition of both families.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }
}

impl std::fmt::Debug for Counters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Counters").finish_non_exhaustive()
    }
}

impl Metrics for Counters {
    fn record_success(&self, category: Category) {
        self.success.with_label_values(&[category.label()]).inc();
    }

    fn record_failure(&self, category: Category) {
        self.errors.with_label_values(&[category.label()]).inc();
    }
}
