//! Pure reconciliation planning.
//!
//! Bindings are compared by `(namespace, name)`. Given the desired and the
//! currently owned bindings, [`plan`] decides which to delete, create and
//! replace without touching the cluster.

use std::collections::HashSet;

use serde::Serialize;

use rbacsync_core::{BindingKey, RoleBinding};

/// Mutations that bring the current bindings in line with the desired ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Owned bindings with no desired counterpart.
    pub orphans: Vec<RoleBinding>,
    /// Desired bindings that do not exist yet.
    pub additions: Vec<RoleBinding>,
    /// Desired bindings whose role or subjects differ from the current one.
    /// Applied as delete then create.
    pub updates: Vec<RoleBinding>,
    /// Desired bindings that found no counterpart after additions were
    /// merged in. Never expected; counted and skipped.
    pub mismatches: Vec<BindingKey>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.orphans.is_empty()
            && self.additions.is_empty()
            && self.updates.is_empty()
            && self.mismatches.is_empty()
    }
}

/// Items of `bindings` with no same-keyed counterpart in `base`.
pub fn diff(base: &[RoleBinding], bindings: &[RoleBinding]) -> Vec<RoleBinding> {
    let keys: HashSet<&BindingKey> = base.iter().map(|b| &b.key).collect();
    bindings
        .iter()
        .filter(|b| !keys.contains(&b.key))
        .cloned()
        .collect()
}

/// Subjects compared as sets of names.
pub fn has_different_subjects(a: &RoleBinding, b: &RoleBinding) -> bool {
    a.subject_names() != b.subject_names()
}

pub fn find_matching<'a>(
    bindings: &'a [RoleBinding],
    key: &BindingKey,
) -> Option<&'a RoleBinding> {
    bindings.iter().find(|b| &b.key == key)
}

/// Compute the plan for one cycle.
pub fn plan(desired: &[RoleBinding], current: &[RoleBinding]) -> Plan {
    let orphans = diff(desired, current);

    let orphan_keys: HashSet<&BindingKey> = orphans.iter().map(|b| &b.key).collect();
    let remaining: Vec<RoleBinding> = current
        .iter()
        .filter(|b| !orphan_keys.contains(&b.key))
        .cloned()
        .collect();

    let additions = diff(&remaining, desired);

    let mut working = remaining;
    working.extend(additions.iter().cloned());

    let mut updates = Vec::new();
    let mut mismatches = Vec::new();
    for wanted in desired {
        match find_matching(&working, &wanted.key) {
            None => mismatches.push(wanted.key.clone()),
            Some(existing) => {
                if existing.role_ref.name != wanted.role_ref.name
                    || has_different_subjects(existing, wanted)
                {
                    updates.push(wanted.clone());
                }
            }
        }
    }

    Plan {
        orphans,
        additions,
        updates,
        mismatches,
    }
}
