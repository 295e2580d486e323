//! Long-running reconciliation daemon: interval scheduler plus the health,
//! metrics and status HTTP surface.

mod error;
pub mod http;
mod runtime;
pub mod status;

pub use error::DaemonError;
pub use runtime::{
    build_reconciler, init_tracing, plan_blocking, run, start_blocking, sync_blocking,
};
pub use status::{DaemonStatus, SharedStatus};
