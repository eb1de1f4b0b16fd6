use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::discovery::ApiResource;
use kube::{Resource, ResourceExt};
use tracing::trace;

use super::{ControllerResource, Reconciler, StepName};
use crate::error::{ReconcileErr, Wrap};
use crate::object::{from_dynamic, to_dynamic};
use crate::reference::ObjectKey;
use crate::status::Status;

/// State of one pipeline run for one controller resource key.
pub struct Invocation<R: Reconciler> {
    reconciler: Arc<R>,
    request: ObjectKey,
    resource: Option<R::Resource>,
    pub state: R::State,
}

impl<R: Reconciler> Invocation<R> {
    pub fn new(reconciler: Arc<R>, request: ObjectKey) -> Self {
        Invocation {
            reconciler,
            request,
            resource: None,
            state: R::State::default(),
        }
    }

    pub fn reconciler(&self) -> &R {
        &self.reconciler
    }

    /// Owned handle on the reconciler, for use while `self` is borrowed
    /// mutably.
    pub fn reconciler_arc(&self) -> Arc<R> {
        self.reconciler.clone()
    }

    pub fn request(&self) -> &ObjectKey {
        &self.request
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource::erase::<R::Resource>(&())
    }

    pub fn resource(&self) -> Result<&R::Resource, ReconcileErr> {
        self.resource.as_ref().ok_or(ReconcileErr::Unbound)
    }

    pub fn resource_mut(&mut self) -> Result<&mut R::Resource, ReconcileErr> {
        self.resource.as_mut().ok_or(ReconcileErr::Unbound)
    }

    pub fn set_resource(&mut self, resource: R::Resource) {
        self.resource = Some(resource);
    }

    pub fn is_bound(&self) -> bool {
        self.resource.is_some()
    }

    pub fn status(&self) -> Option<&Status> {
        self.resource.as_ref().and_then(|r| r.status())
    }

    pub fn status_mut(&mut self) -> Result<&mut Status, ReconcileErr> {
        Ok(self.resource_mut()?.status_mut())
    }

    pub fn is_finalizing(&self) -> bool {
        self.resource
            .as_ref()
            .is_some_and(|r| r.meta().deletion_timestamp.is_some())
    }

    pub fn generation(&self) -> i64 {
        self.resource
            .as_ref()
            .and_then(|r| r.meta().generation)
            .unwrap_or(0)
    }

    pub fn finalizer(&self) -> &str {
        self.reconciler.finalizer()
    }

    /// Owner reference pointing at the bound resource; `controller` marks it
    /// as the managing controller.
    pub fn owner_reference(
        &self,
        controller: bool,
    ) -> Result<OwnerReference, ReconcileErr> {
        let resource = self.resource()?;
        let owner = if controller {
            resource.controller_owner_ref(&())
        } else {
            resource.owner_ref(&())
        };
        owner.ok_or_else(|| ReconcileErr::MissingUid(resource.name_any()))
    }

    pub(crate) fn record_step(&mut self, name: &StepName) {
        if let Some(resource) = self.resource.as_mut() {
            resource.status_mut().last_step = Some(name.to_string());
        }
    }

    /// Write the status sub-document and re-bind the server's copy.
    pub async fn persist_status(&mut self) -> Result<(), ReconcileErr> {
        let reconciler = self.reconciler_arc();
        let ar = self.api_resource();
        let obj = to_dynamic(self.resource()?)?;
        trace!(key = %self.request, "persisting status");
        let updated = reconciler
            .store()
            .update_status(&ar, &obj)
            .await
            .wrap("failed to update status")?;
        self.resource = Some(from_dynamic(&updated)?);
        Ok(())
    }

    /// Write the resource itself (metadata and spec) and re-bind the server's
    /// copy.
    pub async fn persist_resource(&mut self) -> Result<(), ReconcileErr> {
        let reconciler = self.reconciler_arc();
        let ar = self.api_resource();
        let obj = to_dynamic(self.resource()?)?;
        trace!(key = %self.request, "persisting controller resource");
        let updated = reconciler
            .store()
            .update(&ar, &obj)
            .await
            .wrap("failed to update controller resource")?;
        self.resource = Some(from_dynamic(&updated)?);
        Ok(())
    }
}
