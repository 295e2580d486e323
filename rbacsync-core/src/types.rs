//! Domain types for tenant namespaces and the role-bindings derived from them.
//!
//! These mirror the subset of the Kubernetes `rbac.authorization.k8s.io/v1`
//! RoleBinding shape the engine cares about, without depending on a cluster
//! client. Store adapters convert to and from the wire types.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// API group shared by role references and subjects.
pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// Kind of every role reference the engine writes.
pub const ROLE_REF_KIND: &str = "ClusterRole";

/// Kind of every subject the engine writes.
pub const USER_SUBJECT_KIND: &str = "User";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of a Kubernetes namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NamespaceName(pub String);

impl fmt::Display for NamespaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for NamespaceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NamespaceName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Directory group identifier, usually the group's e-mail address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Name of the cluster role granted by a binding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleName(pub String);

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RoleName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoleName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Namespaces
// ---------------------------------------------------------------------------

/// The parts of a namespace the engine reads: its name and annotations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotations: BTreeMap::new(),
        }
    }

    /// Builder-style helper, mostly for tests and fixtures.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Role-bindings
// ---------------------------------------------------------------------------

/// `(name, namespace)` pair identifying a binding across desired and observed sets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BindingKey {
    pub namespace: String,
    pub name: String,
}

impl BindingKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// The role granted by a binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    pub kind: String,
    pub api_group: String,
    pub name: String,
}

impl RoleRef {
    pub fn cluster_role(role: &RoleName) -> Self {
        Self {
            kind: ROLE_REF_KIND.to_string(),
            api_group: RBAC_API_GROUP.to_string(),
            name: role.0.clone(),
        }
    }
}

/// An identity granted a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
    pub name: String,
}

impl Subject {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: USER_SUBJECT_KIND.to_string(),
            api_group: Some(RBAC_API_GROUP.to_string()),
            name: name.into(),
        }
    }
}

/// A namespaced role-binding, desired or observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    #[serde(flatten)]
    pub key: BindingKey,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub role_ref: RoleRef,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

impl RoleBinding {
    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn namespace(&self) -> &str {
        &self.key.namespace
    }

    /// Distinct subject names, ignoring order and duplicates.
    pub fn subject_names(&self) -> BTreeSet<&str> {
        self.subjects.iter().map(|s| s.name.as_str()).collect()
    }

    /// True when `label` is present with value `"true"`.
    pub fn has_label_true(&self, label: &str) -> bool {
        self.labels.get(label).map(String::as_str) == Some("true")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(NamespaceName::from("team-a").to_string(), "team-a");
        assert_eq!(GroupId::from("eng@example.com").to_string(), "eng@example.com");
        assert_eq!(RoleName::from("view").to_string(), "view");
    }

    #[test]
    fn binding_key_display_is_namespace_slash_name() {
        assert_eq!(BindingKey::new("ns1", "team-admin").to_string(), "ns1/team-admin");
    }

    #[test]
    fn user_subject_carries_rbac_api_group() {
        let subject = Subject::user("alice@example.com");
        assert_eq!(subject.kind, "User");
        assert_eq!(subject.api_group.as_deref(), Some(RBAC_API_GROUP));
    }

    #[test]
    fn subject_names_ignores_order_and_duplicates() {
        let binding = RoleBinding {
            key: BindingKey::new("ns1", "team-view"),
            labels: BTreeMap::new(),
            role_ref: RoleRef::cluster_role(&RoleName::from("view")),
            subjects: vec![Subject::user("bob"), Subject::user("alice"), Subject::user("bob")],
        };
        let names: Vec<_> = binding.subject_names().into_iter().collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }
}
