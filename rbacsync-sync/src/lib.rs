//! # rbacsync-sync
//!
//! Reconciliation engine: reads tenant declarations and owned bindings from
//! the cluster, resolves group membership through a directory, and applies
//! the minimal set of binding deletes, creates and updates.
//!
//! [`Reconciler::run_cycle`] runs one full cycle; [`Reconciler::plan_cycle`]
//! stops before mutating anything.

pub mod desired;
pub mod diff;
pub mod error;
pub mod google;
pub mod kube_store;
pub mod metrics;
pub mod pipeline;
pub mod resolver;
pub mod store;

pub use desired::{build_desired, DesiredState, HeldTenant};
pub use diff::{plan, Plan};
pub use error::{MetricsError, ResolveError, StoreError, SyncError};
pub use kube_store::KubeStore;
pub use metrics::{Category, Counters, Metrics};
pub use pipeline::{CyclePlan, CycleReport, Reconciler};
pub use resolver::{FixedResolver, MemberResolver};
pub use store::{ClusterStore, MemoryStore};
