//! Helpers over live objects: typed/dynamic conversion, annotations,
//! finalizers and owner references.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;
use kube::core::{DynamicObject, GroupVersionKind, TypeMeta};
use kube::discovery::ApiResource;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ReconcileErr;
use crate::reference::split_api_version;

pub fn to_dynamic<T: Serialize>(obj: &T) -> Result<DynamicObject, ReconcileErr> {
    let value = serde_json::to_value(obj)?;
    Ok(serde_json::from_value(value)?)
}

pub fn from_dynamic<T: DeserializeOwned>(
    obj: &DynamicObject,
) -> Result<T, ReconcileErr> {
    let value = serde_json::to_value(obj)?;
    Ok(serde_json::from_value(value)?)
}

/// Group/version/kind of a dynamic object from its type metadata.
pub fn gvk_of(obj: &DynamicObject) -> Result<GroupVersionKind, ReconcileErr> {
    let types = obj
        .types
        .as_ref()
        .filter(|t| !t.kind.is_empty() && !t.api_version.is_empty())
        .ok_or_else(|| ReconcileErr::MissingTypeMeta(obj.name_any()))?;
    let (group, version) = split_api_version(&types.api_version);
    Ok(GroupVersionKind::gvk(group, version, &types.kind))
}

/// Fill missing type metadata from the descriptor's api resource.
pub fn ensure_type_meta(obj: &mut DynamicObject, ar: &ApiResource) {
    let missing = obj
        .types
        .as_ref()
        .is_none_or(|t| t.kind.is_empty() || t.api_version.is_empty());
    if missing {
        obj.types = Some(TypeMeta {
            api_version: ar.api_version.clone(),
            kind: ar.kind.clone(),
        });
    }
}

pub fn get_annotation<'a>(obj: &'a DynamicObject, key: &str) -> Option<&'a str> {
    obj.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}

pub fn set_annotation(obj: &mut DynamicObject, key: &str, value: String) {
    obj.annotations_mut().insert(key.to_string(), value);
}

pub fn remove_annotation(obj: &mut DynamicObject, key: &str) -> bool {
    match obj.metadata.annotations.as_mut() {
        Some(a) => a.remove(key).is_some(),
        None => false,
    }
}

pub fn has_finalizer<K: ResourceExt>(obj: &K, finalizer: &str) -> bool {
    obj.finalizers().iter().any(|f| f == finalizer)
}

pub fn add_finalizer<K: ResourceExt>(obj: &mut K, finalizer: &str) -> bool {
    if has_finalizer(obj, finalizer) {
        return false;
    }
    obj.finalizers_mut().push(finalizer.to_string());
    true
}

pub fn remove_finalizer<K: ResourceExt>(obj: &mut K, finalizer: &str) -> bool {
    let finals = obj.finalizers_mut();
    let before = finals.len();
    finals.retain(|f| f != finalizer);
    before != finals.len()
}

fn same_owner(a: &OwnerReference, b: &OwnerReference) -> bool {
    split_api_version(&a.api_version).0 == split_api_version(&b.api_version).0
        && a.kind == b.kind
        && a.name == b.name
}

pub fn has_owner_reference(obj: &DynamicObject, owner: &OwnerReference) -> bool {
    obj.owner_references().iter().any(|o| same_owner(o, owner))
}

pub fn add_owner_reference(obj: &mut DynamicObject, owner: OwnerReference) -> bool {
    if has_owner_reference(obj, &owner) {
        return false;
    }
    obj.owner_references_mut().push(owner);
    true
}

pub fn remove_owner_reference(
    obj: &mut DynamicObject,
    owner: &OwnerReference,
) -> bool {
    let refs = obj.owner_references_mut();
    let before = refs.len();
    refs.retain(|o| !same_owner(o, owner));
    before != refs.len()
}

/// Install `owner` as the controlling owner. Fails when a different
/// controller reference is already present.
pub fn set_controller_reference(
    obj: &mut DynamicObject,
    owner: OwnerReference,
) -> Result<(), ReconcileErr> {
    let existing = obj
        .owner_references()
        .iter()
        .find(|o| o.controller == Some(true))
        .cloned();
    if let Some(existing) = existing {
        if !same_owner(&existing, &owner) {
            return Err(ReconcileErr::AlreadyOwned {
                object: obj.name_any(),
                controller: format!("{}/{}", existing.kind, existing.name),
            });
        }
    }
    let refs = obj.owner_references_mut();
    match refs.iter_mut().find(|o| same_owner(o, &owner)) {
        Some(slot) => *slot = owner,
        None => refs.push(owner),
    }
    Ok(())
}
