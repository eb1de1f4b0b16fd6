use kube::Resource;
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use serde::de::DeserializeOwned;

use super::{Binding, StatusGetter, always_ready};
use crate::error::ReconcileErr;
use crate::object::from_dynamic;
use crate::reference::ObjectKey;
use crate::status::Status;

/// Uniform view over dependency descriptors of any kind.
pub trait DependencyDescriptor: Send + Sync {
    fn kind(&self) -> &str {
        &self.api_resource().kind
    }
    fn api_resource(&self) -> &ApiResource;
    fn key(&self) -> ObjectKey;
    fn is_optional(&self) -> bool;
    fn should_wait_for_ready(&self) -> bool;
    /// Store the fetched object in the descriptor's output slot.
    fn bind(&self, obj: &DynamicObject) -> Result<(), ReconcileErr>;
    /// Readiness of the fetched object.
    fn status(&self, obj: &DynamicObject) -> Result<Status, ReconcileErr>;
}

/// A resource the controller resource reads but does not own.
pub struct DependencyResource<T> {
    ar: ApiResource,
    name: String,
    namespace: Option<String>,
    optional: bool,
    wait_for_ready: bool,
    status_getter: StatusGetter<T>,
    output: Binding<T>,
}

impl<T> DependencyResource<T>
where
    T: Resource<DynamicType = ()>,
{
    pub fn new(name: &str) -> Self {
        Self::with_api_resource(ApiResource::erase::<T>(&()), name)
    }
}

impl DependencyResource<DynamicObject> {
    /// Dependency known only by its group/version/kind.
    pub fn untyped(ar: ApiResource, name: &str) -> Self {
        Self::with_api_resource(ar, name)
    }
}

impl<T> DependencyResource<T> {
    fn with_api_resource(ar: ApiResource, name: &str) -> Self {
        DependencyResource {
            ar,
            name: name.to_string(),
            namespace: None,
            optional: false,
            wait_for_ready: false,
            status_getter: always_ready(),
            output: Binding::new(),
        }
    }

    pub fn within(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn wait_for_ready(mut self, wait: bool) -> Self {
        self.wait_for_ready = wait;
        self
    }

    pub fn with_status<F>(mut self, getter: F) -> Self
    where
        F: Fn(&T) -> Status + Send + Sync + 'static,
    {
        self.status_getter = Box::new(getter);
        self
    }

    /// Route the fetched object into `output`.
    pub fn with_output(mut self, output: Binding<T>) -> Self {
        self.output = output;
        self
    }

    pub fn output(&self) -> Binding<T> {
        self.output.clone()
    }
}

impl<T> DependencyDescriptor for DependencyResource<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn api_resource(&self) -> &ApiResource {
        &self.ar
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.as_deref(), &self.name)
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn should_wait_for_ready(&self) -> bool {
        self.wait_for_ready
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

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::core::GroupVersionKind;

    use super::*;
    use crate::object::to_dynamic;
    use crate::status::{Condition, ConditionStatus};

    fn cm(name: &str) -> DynamicObject {
        let cm = ConfigMap {
            metadata: kube::api::ObjectMeta {
                name: Some(name.into()),
                namespace: Some("default".into()),
                ..Default::default()
            },
            data: Some([("k".to_string(), "v".to_string())].into()),
            ..Default::default()
        };
        to_dynamic(&cm).unwrap()
    }

    #[test]
    fn typed_dependency_binds_output() {
        let out = Binding::new();
        let dep = DependencyResource::<ConfigMap>::new("cfg")
            .within("default")
            .with_output(out.clone());
        assert_eq!(dep.kind(), "ConfigMap");
        assert_eq!(dep.key(), ObjectKey::new(Some("default"), "cfg"));
        assert!(!dep.is_optional());

        dep.bind(&cm("cfg")).unwrap();
        let bound = out.get().unwrap();
        assert_eq!(bound.data.unwrap().get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn default_status_is_ready() {
        let dep = DependencyResource::<ConfigMap>::new("cfg");
        let status = dep.status(&cm("cfg")).unwrap();
        assert!(status.conditions[0].is_true());
    }

    #[test]
    fn custom_status_getter_is_used() {
        let dep = DependencyResource::<ConfigMap>::new("cfg")
            .wait_for_ready(true)
            .with_status(|c: &ConfigMap| {
                let ready = c.data.as_ref().is_some_and(|d| d.contains_key("ready"));
                Status {
                    conditions: vec![Condition::new(
                        "Ready",
                        if ready { ConditionStatus::True } else { ConditionStatus::False },
                    )],
                    ..Default::default()
                }
            });
        assert!(dep.should_wait_for_ready());
        let status = dep.status(&cm("cfg")).unwrap();
        assert_eq!(status.conditions[0].status, ConditionStatus::False);
    }

    #[test]
    fn untyped_dependency_uses_given_kind() {
        let ar = ApiResource::from_gvk(&GroupVersionKind::gvk(
            "gateway.networking.k8s.io",
            "v1",
            "Gateway",
        ));
        let dep = DependencyResource::untyped(ar, "gw").optional(true);
        assert_eq!(dep.kind(), "Gateway");
        assert_eq!(dep.api_resource().group, "gateway.networking.k8s.io");
        assert!(dep.is_optional());
        assert_eq!(dep.key().namespace, None);
    }
}
