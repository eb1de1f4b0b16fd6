use kube::Resource;
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{Binding, Generated, StatusGetter, always_ready};
use crate::controller::{Invocation, Reconciler};
use crate::error::ReconcileErr;
use crate::object::{ensure_type_meta, from_dynamic, to_dynamic};
use crate::status::Status;

type Generator<R, T> =
    Box<dyn Fn(&Invocation<R>) -> Result<Generated<T>, ReconcileErr> + Send + Sync>;

/// Uniform view over child descriptors of any kind.
pub trait ChildDescriptor<R: Reconciler>: Send + Sync {
    fn kind(&self) -> &str {
        &self.api_resource().kind
    }
    fn api_resource(&self) -> &ApiResource;
    /// Desired state of the child, with type metadata filled in.
    fn generate(
        &self,
        inv: &Invocation<R>,
    ) -> Result<Generated<DynamicObject>, ReconcileErr>;
    fn bind(&self, obj: &DynamicObject) -> Result<(), ReconcileErr>;
    fn status(&self, obj: &DynamicObject) -> Result<Status, ReconcileErr>;
}

/// A resource created, updated and deleted on behalf of the controller
/// resource.
pub struct ChildResource<R: Reconciler, T> {
    ar: ApiResource,
    generator: Generator<R, T>,
    status_getter: StatusGetter<T>,
    output: Binding<T>,
}

impl<R, T> ChildResource<R, T>
where
    R: Reconciler,
    T: Resource<DynamicType = ()>,
{
    pub fn new<F>(generator: F) -> Self
    where
        F: Fn(&Invocation<R>) -> Result<Generated<T>, ReconcileErr>
            + Send
            + Sync
            + 'static,
    {
        Self::with_api_resource(ApiResource::erase::<T>(&()), Box::new(generator))
    }
}

impl<R: Reconciler> ChildResource<R, DynamicObject> {
    /// Child known only by its group/version/kind.
    pub fn untyped<F>(ar: ApiResource, generator: F) -> Self
    where
        F: Fn(&Invocation<R>) -> Result<Generated<DynamicObject>, ReconcileErr>
            + Send
            + Sync
            + 'static,
    {
        Self::with_api_resource(ar, Box::new(generator))
    }
}

impl<R: Reconciler, T> ChildResource<R, T> {
    fn with_api_resource(ar: ApiResource, generator: Generator<R, T>) -> Self {
        ChildResource {
            ar,
            generator,
            status_getter: always_ready(),
            output: Binding::new(),
        }
    }

    pub fn with_status<F>(mut self, getter: F) -> Self
    where
        F: Fn(&T) -> Status + Send + Sync + 'static,
    {
        self.status_getter = Box::new(getter);
        self
    }

    pub fn with_output(mut self, output: Binding<T>) -> Self {
        self.output = output;
        self
    }

    pub fn output(&self) -> Binding<T> {
        self.output.clone()
    }
}

impl<R, T> ChildDescriptor<R> for ChildResource<R, T>
where
    R: Reconciler,
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn api_resource(&self) -> &ApiResource {
        &self.ar
    }

    fn generate(
        &self,
        inv: &Invocation<R>,
    ) -> Result<Generated<DynamicObject>, ReconcileErr> {
        match (self.generator)(inv)? {
            Generated::Skip(name) => Ok(Generated::Skip(name)),
            Generated::Resource(desired) => {
                let mut obj = to_dynamic(&desired)?;
                ensure_type_meta(&mut obj, &self.ar);
                Ok(Generated::Resource(obj))
            }
        }
    }

    fn bind(&self, obj: &DynamicObject) -> Result<(), ReconcileErr> {
        self.output.set(from_dynamic(obj)?);
        Ok(())
    }

    fn status(&self, obj: &DynamicObject) -> Result<Status, ReconcileErr> {
        let typed: T = from_dynamic(obj)?;
        Ok((self.status_getter)(&typed))
    }
}
