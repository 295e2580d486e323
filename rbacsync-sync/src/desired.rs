//! Desired-state builder: declarations plus resolved members in, desired
//! bindings out.

use std::collections::HashMap;

use serde::Serialize;

use rbacsync_core::{GroupId, NamespaceName, RoleBinding, TenantDeclaration};

use crate::metrics::{Category, Metrics};
use crate::resolver::MemberResolver;

/// A tenant whose group could not be resolved this cycle. Its existing
/// bindings are left exactly as they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeldTenant {
    pub namespace: NamespaceName,
    pub group: GroupId,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    pub bindings: Vec<RoleBinding>,
    pub held: Vec<HeldTenant>,
}

impl DesiredState {
    pub fn is_held(&self, namespace: &str) -> bool {
        self.held.iter().any(|h| h.namespace.0 == namespace)
    }
}

/// Resolve every declaration and expand it to its bindings.
///
/// A group shared by several namespaces is resolved once. A resolution
/// failure holds every namespace naming that group and counts one
/// `get-members` failure per namespace.
pub async fn build_desired(
    declarations: &[TenantDeclaration],
    resolver: &dyn MemberResolver,
    metrics: &dyn Metrics,
) -> DesiredState {
    let mut resolved: HashMap<GroupId, Result<Vec<String>, String>> = HashMap::new();
    let mut state = DesiredState::default();

    for decl in declarations {
        if !resolved.contains_key(&decl.group) {
            let outcome = resolver
                .resolve_members(&decl.group)
                .await
                .map_err(|e| e.to_string());
            resolved.insert(decl.group.clone(), outcome);
        }

        match resolved.get(&decl.group) {
            Some(Ok(members)) => {
                metrics.record_success(Category::GetMembers);
                tracing::debug!(
                    namespace = %decl.namespace,
                    group = %decl.group,
                    members = members.len(),
                    "resolved group members"
                );
                state.bindings.extend(decl.desired_bindings(members));
            }
            Some(Err(error)) => {
                metrics.record_failure(Category::GetMembers);
                tracing::error!(
                    namespace = %decl.namespace,
                    group = %decl.group,
                    %error,
                    "unable to get members, leaving namespace untouched this cycle"
                );
                state.held.push(HeldTenant {
                    namespace: decl.namespace.clone(),
                    group: decl.group.clone(),
                    error: error.clone(),
                });
            }
            None => {}
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use rbacsync_core::{BindingDefaults, RoleName};

    use super::*;
    use crate::metrics::Counters;
    use crate::resolver::FixedResolver;

    fn decl(ns: &str, group: &str, roles: &[&str]) -> TenantDeclaration {
        TenantDeclaration {
            namespace: NamespaceName::from(ns),
            group: GroupId::from(group),
            roles: roles.iter().map(|r| RoleName::from(*r)).collect(),
            binding_prefix: BindingDefaults::default().binding_prefix,
        }
    }

    #[tokio::test]
    async fn one_binding_per_role_with_sorted_subjects() {
        let resolver = FixedResolver::new().with_group("eng@x", ["bob", "alice"]);
        let counters = Counters::new().expect("counters");

        let state = build_desired(&[decl("ns1", "eng@x", &["admin", "view"])], &resolver, &counters)
            .await;

        assert!(state.held.is_empty());
        assert_eq!(state.bindings.len(), 2);
        for binding in &state.bindings {
            let names: Vec<_> = binding.subjects.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(names, vec!["alice", "bob"]);
        }
        assert_eq!(counters.success(Category::GetMembers), 1);
    }

    #[tokio::test]
    async fn failed_group_holds_only_its_namespace() {
        let resolver = FixedResolver::new()
            .with_group("ok@x", ["alice"])
            .with_failure("broken@x");
        let counters = Counters::new().expect("counters");

        let state = build_desired(
            &[decl("ns1", "broken@x", &["view"]), decl("ns2", "ok@x", &["view"])],
            &resolver,
            &counters,
        )
        .await;

        assert!(state.is_held("ns1"));
        assert!(!state.is_held("ns2"));
        assert!(state.bindings.iter().all(|b| b.namespace() == "ns2"));
        assert_eq!(counters.errors(Category::GetMembers), 1);
        assert_eq!(counters.success(Category::GetMembers), 1);
    }

    #[tokio::test]
    async fn empty_group_still_produces_bindings() {
        let resolver = FixedResolver::new().with_group("empty@x", Vec::<String>::new());
        let counters = Counters::new().expect("counters");
        let state = build_desired(&[decl("ns1", "empty@x", &["view"])], &resolver, &counters).await;
        assert_eq!(state.bindings.len(), 1);
        assert!(state.bindings[0].subjects.is_empty());
    }
}
