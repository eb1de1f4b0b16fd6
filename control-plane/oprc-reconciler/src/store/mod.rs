//! Object store capability consumed by the pipeline.

mod kube_store;

pub use kube_store::KubeStore;

use async_trait::async_trait;
use kube::core::DynamicObject;
use kube::discovery::ApiResource;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("conflict writing {kind} {name}: {message}")]
    Conflict {
        kind: String,
        name: String,
        message: String,
    },

    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn not_found(ar: &ApiResource, name: &str) -> Self {
        StoreError::NotFound {
            kind: ar.kind.clone(),
            name: name.to_string(),
        }
    }
}

/// Reads and writes live objects. Namespaced kinds are addressed by
/// `namespace`; cluster-scoped kinds pass `None`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, StoreError>;

    async fn create(
        &self,
        ar: &ApiResource,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Full replace; the object's resourceVersion guards against lost updates.
    async fn update(
        &self,
        ar: &ApiResource,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    async fn delete(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError>;

    /// Write only the status sub-document.
    async fn update_status(
        &self,
        ar: &ApiResource,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;
}
