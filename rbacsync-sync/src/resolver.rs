//! Group membership resolution.
//!
//! [`MemberResolver`] is the only capability the engine consumes: a group id
//! in, a flat deduplicated member list out. [`DirectoryResolver`] builds it on
//! top of any [`DirectoryClient`] that can list one group's direct members,
//! expanding nested groups and never expanding the same group twice within
//! one call.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use rbacsync_core::groups::{load_static_groups, StaticGroups};
use rbacsync_core::{DirectorySource, GroupId};

use crate::error::ResolveError;
use crate::google::GoogleDirectory;

#[async_trait]
pub trait MemberResolver: Send + Sync {
    /// Members of `group`, nested groups expanded, deduplicated. Order is
    /// unspecified.
    async fn resolve_members(&self, group: &GroupId) -> Result<Vec<String>, ResolveError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    User,
    Group,
}

/// A direct member of a directory group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryMember {
    pub id: String,
    pub kind: MemberKind,
}

impl DirectoryMember {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: MemberKind::User,
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: MemberKind::Group,
        }
    }
}

/// Lists the direct members of one group. No recursion.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn list_members(&self, group: &GroupId) -> Result<Vec<DirectoryMember>, ResolveError>;
}

/// Recursive, cycle-safe resolver over a [`DirectoryClient`].
///
/// A failure listing any group in the expansion fails the whole call: a
/// partial member list would silently revoke access.
pub struct DirectoryResolver<C> {
    client: C,
}

impl<C: DirectoryClient> DirectoryResolver<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: DirectoryClient> MemberResolver for DirectoryResolver<C> {
    async fn resolve_members(&self, group: &GroupId) -> Result<Vec<String>, ResolveError> {
        let mut expanded: HashSet<GroupId> = HashSet::new();
        let mut pending = vec![group.clone()];
        let mut seen: HashSet<String> = HashSet::new();
        let mut members = Vec::new();

        while let Some(next) = pending.pop() {
            if !expanded.insert(next.clone()) {
                tracing::debug!(group = %next, "group already expanded, skipping");
                continue;
            }
            for member in self.client.list_members(&next).await? {
                match member.kind {
                    MemberKind::Group => pending.push(GroupId::from(member.id)),
                    MemberKind::User => {
                        if seen.insert(member.id.clone()) {
                            members.push(member.id);
                        }
                    }
                }
            }
        }

        Ok(members)
    }
}

/// Directory backed by a static group map. A member that is itself a key
/// of the map is a nested group.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    groups: StaticGroups,
}

impl StaticDirectory {
    pub fn new(groups: StaticGroups) -> Self {
        Self { groups }
    }

    pub fn load(path: &Path) -> Result<Self, ResolveError> {
        Ok(Self::new(load_static_groups(path)?))
    }
}

#[async_trait]
impl DirectoryClient for StaticDirectory {
    async fn list_members(&self, group: &GroupId) -> Result<Vec<DirectoryMember>, ResolveError> {
        let members = self
            .groups
            .get(group)
            .ok_or_else(|| ResolveError::GroupNotFound(group.clone()))?;
        Ok(members
            .iter()
            .map(|m| {
                if self.groups.contains_key(&GroupId::from(m.as_str())) {
                    DirectoryMember::group(m.as_str())
                } else {
                    DirectoryMember::user(m.as_str())
                }
            })
            .collect())
    }
}

/// Fixed responses per group, with optional injected failures. Unknown
/// groups fail with [`ResolveError::GroupNotFound`].
#[derive(Debug, Clone, Default)]
pub struct FixedResolver {
    responses: BTreeMap<GroupId, Vec<String>>,
    failing: BTreeSet<GroupId>,
}

impl FixedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group<I, S>(mut self, group: impl Into<GroupId>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses
            .insert(group.into(), members.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_failure(mut self, group: impl Into<GroupId>) -> Self {
        self.failing.insert(group.into());
        self
    }
}

#[async_trait]
impl MemberResolver for FixedResolver {
    async fn resolve_members(&self, group: &GroupId) -> Result<Vec<String>, ResolveError> {
        if self.failing.contains(group) {
            return Err(ResolveError::Unavailable(format!(
                "injected failure for {group}"
            )));
        }
        self.responses
            .get(group)
            .cloned()
            .ok_or_else(|| ResolveError::GroupNotFound(group.clone()))
    }
}

/// Build the production resolver for a configured directory source.
pub fn from_source(source: &DirectorySource) -> Result<Arc<dyn MemberResolver>, ResolveError> {
    match source {
        DirectorySource::Google {
            key_file,
            admin_user,
        } => {
            let client = GoogleDirectory::from_key_file(key_file, admin_user)?;
            Ok(Arc::new(DirectoryResolver::new(client)))
        }
        DirectorySource::Static { path } => {
            Ok(Arc::new(DirectoryResolver::new(StaticDirectory::load(path)?)))
        }
    }
}
