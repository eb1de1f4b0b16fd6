use async_trait::async_trait;
use kube::api::{DeleteParams, PostParams};
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, trace};

use super::{ObjectStore, StoreError};

/// `ObjectStore` backed by the API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, ar: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace.filter(|ns| !ns.is_empty()) {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, ar),
            None => Api::all_with(self.client.clone(), ar),
        }
    }
}

pub(crate) fn map_kube_error(e: kube::Error, ar: &ApiResource, name: &str) -> StoreError {
    match e {
        kube::Error::Api(ae) if ae.code == 404 => StoreError::not_found(ar, name),
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            StoreError::AlreadyExists {
                kind: ar.kind.clone(),
                name: name.to_string(),
            }
        }
        kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict {
            kind: ar.kind.clone(),
            name: name.to_string(),
            message: ae.message,
        },
        other => StoreError::Kube(other),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, StoreError> {
        trace!(kind = %ar.kind, ?namespace, %name, "store: get");
        self.api(ar, namespace)
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, ar, name))
    }

    async fn create(
        &self,
        ar: &ApiResource,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let name = obj.name_any();
        debug!(kind = %ar.kind, %name, "store: create");
        self.api(ar, obj.namespace().as_deref())
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| map_kube_error(e, ar, &name))
    }

    async fn update(
        &self,
        ar: &ApiResource,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let name = obj.name_any();
        debug!(kind = %ar.kind, %name, rv = ?obj.resource_version(), "store: replace");
        self.api(ar, obj.namespace().as_deref())
            .replace(&name, &PostParams::default(), obj)
            .await
            .map_err(|e| map_kube_error(e, ar, &name))
    }

    async fn delete(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        debug!(kind = %ar.kind, ?namespace, %name, "store: delete");
        self.api(ar, namespace)
            .delete(name, &DeleteParams::background())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(e, ar, name))
    }

    async fn update_status(
        &self,
        ar: &ApiResource,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let name = obj.name_any();
        debug!(kind = %ar.kind, %name, "store: replace status");
        let body = serde_json::to_vec(obj)?;
        self.api(ar, obj.namespace().as_deref())
            .replace_status(&name, &PostParams::default(), body)
            .await
            .map_err(|e| map_kube_error(e, ar, &name))
    }
}
