use std::fmt::Debug;

use async_trait::async_trait;
use kube::Resource;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{Invocation, Stepper};
use crate::config::ReconcilerConfig;
use crate::descriptor::{ChildDescriptor, DependencyDescriptor};
use crate::error::ReconcileErr;
use crate::status::Status;
use crate::store::ObjectStore;
use crate::watch::{WatchCache, Watcher};

/// A resource kind reconciled by the engine. Its status sub-document is the
/// engine's [`Status`].
pub trait ControllerResource:
    Resource<DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    fn status(&self) -> Option<&Status>;

    /// Status document, created empty when absent.
    fn status_mut(&mut self) -> &mut Status;
}

/// What a concrete operator supplies to plug into the pipeline. One value is
/// shared by every invocation of the controller.
#[async_trait]
pub trait Reconciler: Send + Sync + Sized + 'static {
    type Resource: ControllerResource;
    /// Per-invocation operator state, typically holding descriptor bindings.
    type State: Default + Send + Sync;

    /// Token that blocks deletion of the controller resource.
    fn finalizer(&self) -> &str;

    fn store(&self) -> &dyn ObjectStore;

    fn watcher(&self) -> &dyn Watcher;

    fn watch_cache(&self) -> &WatchCache;

    fn config(&self) -> &ReconcilerConfig;

    async fn dependencies(
        &self,
        _inv: &Invocation<Self>,
    ) -> Result<Vec<Box<dyn DependencyDescriptor>>, ReconcileErr> {
        Ok(Vec::new())
    }

    async fn children(
        &self,
        _inv: &Invocation<Self>,
    ) -> Result<Vec<Box<dyn ChildDescriptor<Self>>>, ReconcileErr> {
        Ok(Vec::new())
    }

    fn pipeline(&self) -> Stepper<Self> {
        Stepper::standard(Vec::new())
    }
}
