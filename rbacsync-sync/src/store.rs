//! Cluster store seam.
//!
//! The engine needs exactly four primitives: list namespaces, list owned
//! bindings across all namespaces, create a binding, delete a binding. There
//! is no get/watch; every cycle re-lists.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use rbacsync_core::{BindingKey, Namespace, RoleBinding, MANAGED_LABEL};

use crate::error::StoreError;

#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, StoreError>;

    /// Bindings carrying the ownership marker, across all namespaces.
    async fn list_managed_bindings(&self) -> Result<Vec<RoleBinding>, StoreError>;

    async fn create_binding(&self, binding: &RoleBinding) -> Result<(), StoreError>;

    async fn delete_binding(&self, key: &BindingKey) -> Result<(), StoreError>;
}

/// A successful mutation, recorded by [`MemoryStore`] in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Create(BindingKey),
    Delete(BindingKey),
}

#[derive(Debug, Default)]
struct MemoryState {
    namespaces: BTreeMap<String, Namespace>,
    bindings: BTreeMap<BindingKey, RoleBinding>,
    fail_namespace_list: bool,
    fail_binding_list: bool,
    fail_writes: BTreeSet<BindingKey>,
    ops: Vec<StoreOp>,
}

/// In-memory cluster with fault injection, used in tests in place of a
/// real API server. Label filtering mirrors the server-side selector.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a namespace.
    pub fn put_namespace(&self, namespace: Namespace) {
        self.lock()
            .namespaces
            .insert(namespace.name.clone(), namespace);
    }

    pub fn remove_namespace(&self, name: &str) {
        self.lock().namespaces.remove(name);
    }

    /// Seed a binding directly, bypassing the op log. Use for hand-authored
    /// or pre-existing bindings.
    pub fn seed_binding(&self, binding: RoleBinding) {
        self.lock().bindings.insert(binding.key.clone(), binding);
    }

    /// Every binding in the store, owned or not.
    pub fn all_bindings(&self) -> Vec<RoleBinding> {
        self.lock().bindings.values().cloned().collect()
    }

    pub fn binding(&self, key: &BindingKey) -> Option<RoleBinding> {
        self.lock().bindings.get(key).cloned()
    }

    pub fn operations(&self) -> Vec<StoreOp> {
        self.lock().ops.clone()
    }

    pub fn clear_operations(&self) {
        self.lock().ops.clear();
    }

    pub fn fail_namespace_list(&self, fail: bool) {
        self.lock().fail_namespace_list = fail;
    }

    pub fn fail_binding_list(&self, fail: bool) {
        self.lock().fail_binding_list = fail;
    }

    /// Make every create and delete of `key` fail.
    pub fn fail_writes_for(&self, key: BindingKey) {
        self.lock().fail_writes.insert(key);
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, StoreError> {
        let state = self.lock();
        if state.fail_namespace_list {
            return Err(StoreError::Unavailable("namespace list refused".to_string()));
        }
        Ok(state.namespaces.values().cloned().collect())
    }

    async fn list_managed_bindings(&self) -> Result<Vec<RoleBinding>, StoreError> {
        let state = self.lock();
        if state.fail_binding_list {
            return Err(StoreError::Unavailable("rolebinding list refused".to_string()));
        }
        Ok(state
            .bindings
            .values()
            .filter(|b| b.has_label_true(MANAGED_LABEL))
            .cloned()
            .collect())
    }

    async fn create_binding(&self, binding: &RoleBinding) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.fail_writes.contains(&binding.key) {
            return Err(StoreError::Unavailable(format!("create {} refused", binding.key)));
        }
        if state.bindings.contains_key(&binding.key) {
            return Err(StoreError::AlreadyExists(binding.key.clone()));
        }
        state.bindings.insert(binding.key.clone(), binding.clone());
        state.ops.push(StoreOp::Create(binding.key.clone()));
        Ok(())
    }

    async fn delete_binding(&self, key: &BindingKey) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.fail_writes.contains(key) {
            return Err(StoreError::Unavailable(format!("delete {key} refused")));
        }
        if state.bindings.remove(key).is_none() {
            return Err(StoreError::NotFound(key.clone()));
        }
        state.ops.push(StoreOp::Delete(key.clone()));
        Ok(())
    }
}
