//! Tenant declarations: the access intent a namespace expresses through its
//! annotations, and the role-bindings that intent expands to.

use std::collections::BTreeMap;

use crate::config::BindingDefaults;
use crate::types::{
    BindingKey, GroupId, Namespace, NamespaceName, RoleBinding, RoleName, RoleRef, Subject,
};

/// Ownership marker, set as a label on every binding the engine writes.
pub const MANAGED_LABEL: &str = "rbac-sync.nais.io/managed";
pub const GROUP_NAME_ANNOTATION: &str = "rbac-sync.nais.io/group-name";
pub const ROLES_ANNOTATION: &str = "rbac-sync.nais.io/roles";
pub const ROLEBINDING_PREFIX_ANNOTATION: &str = "rbac-sync.nais.io/rolebinding-prefix";

/// Label selector matching every binding the engine owns.
pub fn managed_selector() -> String {
    format!("{MANAGED_LABEL}=true")
}

/// An active tenant declaration. Inactive namespaces never produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantDeclaration {
    pub namespace: NamespaceName,
    pub group: GroupId,
    pub roles: Vec<RoleName>,
    pub binding_prefix: String,
}

impl TenantDeclaration {
    /// Read the declaration from `namespace`, or `None` when the group
    /// annotation is absent or blank.
    pub fn from_namespace(namespace: &Namespace, defaults: &BindingDefaults) -> Option<Self> {
        let group = namespace
            .annotation(GROUP_NAME_ANNOTATION)
            .map(str::trim)
            .filter(|g| !g.is_empty())?;

        let roles = namespace
            .annotation(ROLES_ANNOTATION)
            .map(parse_role_list)
            .filter(|roles| !roles.is_empty())
            .unwrap_or_else(|| defaults.roles.clone());

        let binding_prefix = namespace
            .annotation(ROLEBINDING_PREFIX_ANNOTATION)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(defaults.binding_prefix.as_str())
            .to_string();

        Some(Self {
            namespace: NamespaceName::from(namespace.name.as_str()),
            group: GroupId::from(group),
            roles,
            binding_prefix,
        })
    }

    /// `<prefix>-<role>`
    pub fn binding_name(&self, role: &RoleName) -> String {
        format!("{}-{}", self.binding_prefix, role.0)
    }

    /// One managed binding per role, each granting every member.
    ///
    /// Members are sorted and deduplicated so the produced subjects are
    /// reproducible regardless of directory ordering.
    pub fn desired_bindings(&self, members: &[String]) -> Vec<RoleBinding> {
        let mut names: Vec<&str> = members.iter().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();
        let subjects: Vec<Subject> = names.into_iter().map(Subject::user).collect();

        self.roles
            .iter()
            .map(|role| RoleBinding {
                key: BindingKey::new(self.namespace.0.clone(), self.binding_name(role)),
                labels: BTreeMap::from([(MANAGED_LABEL.to_string(), "true".to_string())]),
                role_ref: RoleRef::cluster_role(role),
                subjects: subjects.clone(),
            })
            .collect()
    }
}

/// Collect the active declarations among `namespaces`, sorted by namespace.
pub fn declarations(
    namespaces: &[Namespace],
    defaults: &BindingDefaults,
) -> Vec<TenantDeclaration> {
    let mut out: Vec<_> = namespaces
        .iter()
        .filter_map(|ns| TenantDeclaration::from_namespace(ns, defaults))
        .collect();
    out.sort_by(|a, b| a.namespace.cmp(&b.namespace));
    out
}

/// Split a comma separated role list: entries trimmed, blanks dropped,
/// later duplicates dropped.
pub fn parse_role_list(raw: &str) -> Vec<RoleName> {
    let mut roles: Vec<RoleName> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        let role = RoleName::from(entry);
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    roles
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn defaults() -> BindingDefaults {
        BindingDefaults::from_csv("nais:developer", "nais:teammember")
    }

    #[rstest]
    #[case("admin,view", &["admin", "view"])]
    #[case(" admin , view ", &["admin", "view"])]
    #[case("admin,,view,", &["admin", "view"])]
    #[case("view,admin,view", &["view", "admin"])]
    #[case("", &[])]
    #[case(" , ", &[])]
    fn role_list_parsing(#[case] raw: &str, #[case] expected: &[&str]) {
        let parsed: Vec<String> = parse_role_list(raw).into_iter().map(|r| r.0).collect();
        assert_eq!(parsed, expected);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("   "))]
    fn namespace_without_group_is_inactive(#[case] group: Option<&str>) {
        let mut ns = Namespace::new("ns1");
        if let Some(group) = group {
            ns = ns.with_annotation(GROUP_NAME_ANNOTATION, group);
        }
        assert!(TenantDeclaration::from_namespace(&ns, &defaults()).is_none());
    }

    #[test]
    fn unset_roles_and_prefix_fall_back_to_defaults() {
        let ns = Namespace::new("ns1").with_annotation(GROUP_NAME_ANNOTATION, "eng@example.com");
        let decl = TenantDeclaration::from_namespace(&ns, &defaults()).expect("active");
        assert_eq!(decl.roles, vec![RoleName::from("nais:developer")]);
        assert_eq!(decl.binding_prefix, "nais:teammember");
    }

    #[test]
    fn blank_roles_annotation_falls_back_to_defaults() {
        let ns = Namespace::new("ns1")
            .with_annotation(GROUP_NAME_ANNOTATION, "eng@example.com")
            .with_annotation(ROLES_ANNOTATION, " ");
        let decl = TenantDeclaration::from_namespace(&ns, &defaults()).expect("active");
        assert_eq!(decl.roles, vec![RoleName::from("nais:developer")]);
    }

    #[test]
    fn annotations_override_defaults() {
        let ns = Namespace::new("ns1")
            .with_annotation(GROUP_NAME_ANNOTATION, "eng@example.com")
            .with_annotation(ROLES_ANNOTATION, "admin,view")
            .with_annotation(ROLEBINDING_PREFIX_ANNOTATION, "team");
        let decl = TenantDeclaration::from_namespace(&ns, &defaults()).expect("active");
        assert_eq!(decl.group, GroupId::from("eng@example.com"));
        assert_eq!(decl.binding_name(&RoleName::from("admin")), "team-admin");
        assert_eq!(decl.roles.len(), 2);
    }

    #[test]
    fn desired_bindings_one_per_role_with_sorted_subjects() {
        let ns = Namespace::new("ns1")
            .with_annotation(GROUP_NAME_ANNOTATION, "eng@example.com")
            .with_annotation(ROLES_ANNOTATION, "admin,view")
            .with_annotation(ROLEBINDING_PREFIX_ANNOTATION, "team");
        let decl = TenantDeclaration::from_namespace(&ns, &defaults()).expect("active");

        let members = vec!["bob".to_string(), "alice".to_string(), "bob".to_string()];
        let bindings = decl.desired_bindings(&members);

        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].key, BindingKey::new("ns1", "team-admin"));
        assert_eq!(bindings[1].key, BindingKey::new("ns1", "team-view"));
        assert_eq!(bindings[1].role_ref.name, "view");
        assert_eq!(bindings[1].role_ref.kind, "ClusterRole");
        for binding in &bindings {
            assert!(binding.has_label_true(MANAGED_LABEL));
            let names: Vec<_> = binding.subjects.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(names, vec!["alice", "bob"]);
        }
    }

    #[test]
    fn declarations_skip_inactive_and_sort_by_namespace() {
        let namespaces = vec![
            Namespace::new("zeta").with_annotation(GROUP_NAME_ANNOTATION, "z@example.com"),
            Namespace::new("kube-system"),
            Namespace::new("alpha").with_annotation(GROUP_NAME_ANNOTATION, "a@example.com"),
        ];
        let decls = declarations(&namespaces, &defaults());
        let names: Vec<_> = decls.iter().map(|d| d.namespace.0.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn managed_selector_matches_label() {
        assert_eq!(managed_selector(), "rbac-sync.nais.io/managed=true");
    }
}
