//! rbac-sync core library: domain types, tenant declarations, configuration.
//!
//! - [`types`]: namespaces, role-bindings and their newtypes
//! - [`declaration`]: annotation keys and [`TenantDeclaration`]
//! - [`config`]: [`SyncConfig`] and its defaults
//! - [`groups`]: static group membership file
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod declaration;
pub mod error;
pub mod groups;
pub mod types;

pub use config::{BindingDefaults, DirectorySource, SyncConfig};
pub use declaration::{TenantDeclaration, MANAGED_LABEL};
pub use error::ConfigError;
pub use types::{
    BindingKey, GroupId, Namespace, NamespaceName, RoleBinding, RoleName, RoleRef, Subject,
};
