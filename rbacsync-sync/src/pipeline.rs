//! One reconciliation cycle: read, plan, apply.
//!
//! Shared by the daemon scheduler and the one-shot `sync` / `diff` commands.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use rbacsync_core::declaration::declarations;
use rbacsync_core::{BindingDefaults, RoleBinding, MANAGED_LABEL};

use crate::desired::{build_desired, HeldTenant};
use crate::diff::{plan, Plan};
use crate::error::SyncError;
use crate::metrics::{Category, Metrics};
use crate::resolver::MemberResolver;
use crate::store::ClusterStore;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Everything a cycle decided, before any mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CyclePlan {
    #[serde(flatten)]
    pub plan: Plan,
    pub held: Vec<HeldTenant>,
    pub desired: usize,
    pub current: usize,
}

/// Outcome of an applied cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub finished_at: DateTime<Utc>,
    pub deleted: usize,
    pub created: usize,
    pub updated: usize,
    pub mismatched: usize,
    pub failed: usize,
    pub held: Vec<HeldTenant>,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn ClusterStore>,
    resolver: Arc<dyn MemberResolver>,
    metrics: Arc<dyn Metrics>,
    defaults: BindingDefaults,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        resolver: Arc<dyn MemberResolver>,
        metrics: Arc<dyn Metrics>,
        defaults: BindingDefaults,
    ) -> Self {
        Self {
            store,
            resolver,
            metrics,
            defaults,
        }
    }

    /// Read the cluster and decide what to change. Makes no mutations.
    ///
    /// Either read failing aborts the cycle.
    pub async fn plan_cycle(&self) -> Result<CyclePlan, SyncError> {
        let mut current = match self.store.list_managed_bindings().await {
            Ok(bindings) => {
                self.metrics.record_success(Category::GetCurrentRolebindings);
                bindings
            }
            Err(e) => {
                self.metrics.record_failure(Category::GetCurrentRolebindings);
                return Err(SyncError::ListBindings(e));
            }
        };
        // Never act on a binding without the ownership marker, whatever the
        // store returned.
        current.retain(|b| b.has_label_true(MANAGED_LABEL));

        let namespaces = match self.store.list_namespaces().await {
            Ok(namespaces) => {
                self.metrics.record_success(Category::ListNamespaces);
                namespaces
            }
            Err(e) => {
                self.metrics.record_failure(Category::ListNamespaces);
                return Err(SyncError::ListNamespaces(e));
            }
        };

        let decls = declarations(&namespaces, &self.defaults);
        let desired = build_desired(&decls, self.resolver.as_ref(), self.metrics.as_ref()).await;

        // A held namespace keeps whatever it had.
        current.retain(|b| !desired.is_held(b.namespace()));

        let plan = plan(&desired.bindings, &current);
        tracing::debug!(
            tenants = decls.len(),
            desired = desired.bindings.len(),
            current = current.len(),
            orphans = plan.orphans.len(),
            additions = plan.additions.len(),
            updates = plan.updates.len(),
            "planned cycle"
        );

        Ok(CyclePlan {
            plan,
            held: desired.held,
            desired: desired.bindings.len(),
            current: current.len(),
        })
    }

    /// Apply a plan: deletes, then creates, then updates. A failed
    /// operation is counted and logged; the rest of the batch still runs.
    pub async fn apply(&self, cycle: CyclePlan) -> CycleReport {
        let started = Instant::now();
        let CyclePlan { plan, held, .. } = cycle;
        let mut report = Tally::default();

        for orphan in &plan.orphans {
            match self.store.delete_binding(&orphan.key).await {
                Ok(()) => {
                    self.metrics.record_success(Category::DeleteOrphan);
                    tracing::info!(
                        namespace = orphan.namespace(),
                        name = orphan.name(),
                        "deleted orphan rolebinding"
                    );
                    report.deleted += 1;
                }
                Err(error) => {
                    self.metrics.record_failure(Category::DeleteOrphan);
                    tracing::error!(
                        namespace = orphan.namespace(),
                        name = orphan.name(),
                        %error,
                        "unable to delete orphan rolebinding"
                    );
                    report.failed += 1;
                }
            }
        }

        for addition in &plan.additions {
            if self.create(addition, Category::CreateRolebinding).await {
                tracing::info!(
                    namespace = addition.namespace(),
                    name = addition.name(),
                    "created rolebinding"
                );
                report.created += 1;
            } else {
                report.failed += 1;
            }
        }

        for key in &plan.mismatches {
            self.metrics.record_failure(Category::NoMatchingRolebinding);
            tracing::warn!(
                namespace = %key.namespace,
                name = %key.name,
                "no matching rolebinding found, skipping"
            );
            report.mismatched += 1;
        }

        for update in &plan.updates {
            if self.replace(update).await {
                tracing::info!(
                    namespace = update.namespace(),
                    name = update.name(),
                    "updated rolebinding"
                );
                report.updated += 1;
            } else {
                report.failed += 1;
            }
        }

        CycleReport {
            finished_at: Utc::now(),
            deleted: report.deleted,
            created: report.created,
            updated: report.updated,
            mismatched: report.mismatched,
            failed: report.failed,
            held,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Plan and apply one cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport, SyncError> {
        let cycle = self.plan_cycle().await?;
        let report = self.apply(cycle).await;
        tracing::info!(
            deleted = report.deleted,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            held = report.held.len(),
            duration_ms = report.duration_ms,
            "reconciliation cycle complete"
        );
        Ok(report)
    }

    async fn create(&self, binding: &RoleBinding, category: Category) -> bool {
        match self.store.create_binding(binding).await {
            Ok(()) => {
                self.metrics.record_success(category);
                true
            }
            Err(error) => {
                self.metrics.record_failure(category);
                tracing::error!(
                    namespace = binding.namespace(),
                    name = binding.name(),
                    %error,
                    "unable to create rolebinding"
                );
                false
            }
        }
    }

    /// `roleRef` is immutable, so an update is a delete followed by a
    /// create. If the delete fails the create is not attempted.
    async fn replace(&self, binding: &RoleBinding) -> bool {
        if let Err(error) = self.store.delete_binding(&binding.key).await {
            self.metrics.record_failure(Category::UpdatedRolebinding);
            tracing::error!(
                namespace = binding.namespace(),
                name = binding.name(),
                %error,
                "unable to delete rolebinding for update"
            );
            return false;
        }
        self.create(binding, Category::UpdatedRolebinding).await
    }
}

#[derive(Default)]
struct Tally {
    deleted: usize,
    created: usize,
    updated: usize,
    mismatched: usize,
    failed: usize,
}

#[cfg(test)]
mod tests {
    use rbacsync_core::declaration::GROUP_NAME_ANNOTATION;
    use rbacsync_core::{BindingKey, Namespace};

    use super::*;
    use crate::metrics::Counters;
    use crate::resolver::FixedResolver;
    use crate::store::{MemoryStore, StoreOp};

    fn reconciler(store: Arc<MemoryStore>, counters: Arc<Counters>) -> Reconciler {
        let resolver = FixedResolver::new().with_group("eng@x", ["alice"]);
        Reconciler::new(store, Arc::new(resolver), counters, BindingDefaults::default())
    }

    #[tokio::test]
    async fn plan_cycle_does_not_mutate() {
        let store = Arc::new(MemoryStore::new());
        store.put_namespace(Namespace::new("ns1").with_annotation(GROUP_NAME_ANNOTATION, "eng@x"));
        let counters = Arc::new(Counters::new().expect("counters"));

        let cycle = reconciler(store.clone(), counters.clone())
            .plan_cycle()
            .await
            .expect("plan");

        assert_eq!(cycle.plan.additions.len(), 1);
        assert_eq!(cycle.desired, 1);
        assert!(store.operations().is_empty());
        assert_eq!(counters.success(Category::ListNamespaces), 1);
        assert_eq!(counters.success(Category::GetCurrentRolebindings), 1);
    }

    #[tokio::test]
    async fn mismatches_are_counted_and_skipped() {
        let store = Arc::new(MemoryStore::new());
        let counters = Arc::new(Counters::new().expect("counters"));
        let cycle = CyclePlan {
            plan: Plan {
                mismatches: vec![BindingKey::new("ns1", "rbacsync-default-x")],
                ..Plan::default()
            },
            ..CyclePlan::default()
        };

        let report = reconciler(store.clone(), counters.clone()).apply(cycle).await;

        assert_eq!(report.mismatched, 1);
        assert_eq!(counters.errors(Category::NoMatchingRolebinding), 1);
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn failed_update_delete_skips_the_create() {
        let store = Arc::new(MemoryStore::new());
        let counters = Arc::new(Counters::new().expect("counters"));
        let rec = reconciler(store.clone(), counters.clone());

        store.put_namespace(Namespace::new("ns1").with_annotation(GROUP_NAME_ANNOTATION, "eng@x"));
        rec.run_cycle().await.expect("first cycle");
        let key = BindingKey::new("ns1", "rbacsync-default-rbacsync-default");
        assert!(store.binding(&key).is_some());

        let mut stale = store.binding(&key).expect("binding");
        stale.subjects.clear();
        store.seed_binding(stale);
        store.clear_operations();
        store.fail_writes_for(key.clone());

        let report = rec.run_cycle().await.expect("second cycle");
        assert_eq!(report.failed, 1);
        assert_eq!(report.updated, 0);
        assert_eq!(counters.errors(Category::UpdatedRolebinding), 1);
        assert!(!store.operations().contains(&StoreOp::Create(key)));
    }
}
