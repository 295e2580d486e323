//! [`ClusterStore`] backed by the Kubernetes API (`rbac.authorization.k8s.io/v1`).

use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace as K8sNamespace;
use k8s_openapi::api::rbac::v1::{
    RoleBinding as K8sRoleBinding, RoleRef as K8sRoleRef, Subject as K8sSubject,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, ResourceExt};

use rbacsync_core::declaration::managed_selector;
use rbacsync_core::{BindingKey, Namespace, RoleBinding, RoleRef, Subject};

use crate::error::StoreError;
use crate::store::ClusterStore;

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using `kubeconfig` when given, otherwise the in-cluster
    /// service account (falling back to the local kubeconfig).
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self, StoreError> {
        let config = match kubeconfig {
            Some(path) => {
                tracing::info!(path = %path.display(), "using kubernetes configuration from file");
                let kc = Kubeconfig::read_from(path)?;
                Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default()).await?
            }
            None => {
                tracing::info!("using in-cluster or inferred kubernetes configuration");
                Config::infer().await?
            }
        };
        Ok(Self::new(Client::try_from(config)?))
    }

    fn bindings_in(&self, namespace: &str) -> Api<K8sRoleBinding> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, StoreError> {
        let api: Api<K8sNamespace> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .map(|ns| Namespace {
                name: ns.name_any(),
                annotations: ns.annotations().clone(),
            })
            .collect())
    }

    async fn list_managed_bindings(&self) -> Result<Vec<RoleBinding>, StoreError> {
        let api: Api<K8sRoleBinding> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default().labels(&managed_selector()))
            .await?;
        list.items.into_iter().map(from_k8s).collect()
    }

    async fn create_binding(&self, binding: &RoleBinding) -> Result<(), StoreError> {
        self.bindings_in(binding.namespace())
            .create(&PostParams::default(), &to_k8s(binding))
            .await
            .map_err(|e| write_error(e, &binding.key))?;
        Ok(())
    }

    async fn delete_binding(&self, key: &BindingKey) -> Result<(), StoreError> {
        self.bindings_in(&key.namespace)
            .delete(&key.name, &DeleteParams::default())
            .await
            .map_err(|e| write_error(e, key))?;
        Ok(())
    }
}

/// Conflicts and missing objects get the same variants as [`MemoryStore`].
///
/// [`MemoryStore`]: crate::store::MemoryStore
pub(crate) fn write_error(error: kube::Error, key: &BindingKey) -> StoreError {
    match error {
        kube::Error::Api(response) if response.code == 409 => {
            StoreError::AlreadyExists(key.clone())
        }
        kube::Error::Api(response) if response.code == 404 => StoreError::NotFound(key.clone()),
        other => StoreError::Kube(other),
    }
}

pub(crate) fn from_k8s(rb: K8sRoleBinding) -> Result<RoleBinding, StoreError> {
    let namespace = rb
        .metadata
        .namespace
        .ok_or(StoreError::Malformed("metadata.namespace"))?;
    let name = rb
        .metadata
        .name
        .ok_or(StoreError::Malformed("metadata.name"))?;

    Ok(RoleBinding {
        key: BindingKey { namespace, name },
        labels: rb.metadata.labels.unwrap_or_default(),
        role_ref: RoleRef {
            kind: rb.role_ref.kind,
            api_group: rb.role_ref.api_group,
            name: rb.role_ref.name,
        },
        subjects: rb
            .subjects
            .unwrap_or_default()
            .into_iter()
            .map(|s| Subject {
                kind: s.kind,
                api_group: s.api_group,
                name: s.name,
            })
            .collect(),
    })
}

pub(crate) fn to_k8s(binding: &RoleBinding) -> K8sRoleBinding {
    K8sRoleBinding {
        metadata: ObjectMeta {
            name: Some(binding.key.name.clone()),
            namespace: Some(binding.key.namespace.clone()),
            labels: Some(binding.labels.clone()),
            ..ObjectMeta::default()
        },
        role_ref: K8sRoleRef {
            kind: binding.role_ref.kind.clone(),
            api_group: binding.role_ref.api_group.clone(),
            name: binding.role_ref.name.clone(),
        },
        subjects: Some(
            binding
                .subjects
                .iter()
                .map(|s| K8sSubject {
                    kind: s.kind.clone(),
                    api_group: s.api_group.clone(),
                    name: s.name.clone(),
                    namespace: None,
                })
                .collect(),
        ),
    }
}
