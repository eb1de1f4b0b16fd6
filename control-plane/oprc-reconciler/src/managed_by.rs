//! Managed-by annotation: a JSON list of controller resources that manage an
//! object without owning it. Used to route events back to those controllers.

use kube::core::DynamicObject;
use kube::{Resource, ResourceExt};
use serde::{Deserialize, Serialize};

use crate::dictionary::MANAGED_BY_ANNOTATION;
use crate::object::{get_annotation, set_annotation};
use crate::reference::{ObjectKey, split_api_version};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ManagedBy {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl ManagedBy {
    pub fn of<K: Resource<DynamicType = ()>>(manager: &K) -> Self {
        let api_version = K::api_version(&());
        let (group, version) = split_api_version(&api_version);
        ManagedBy {
            name: manager.name_any(),
            namespace: manager.namespace().unwrap_or_default(),
            group: group.to_string(),
            version: version.to_string(),
            kind: K::kind(&()).to_string(),
        }
    }

    fn is_kind<K: Resource<DynamicType = ()>>(&self) -> bool {
        self.group == K::group(&()) && self.kind == K::kind(&())
    }
}

pub fn get_managed_by(
    obj: &DynamicObject,
) -> Result<Vec<ManagedBy>, serde_json::Error> {
    match get_annotation(obj, MANAGED_BY_ANNOTATION) {
        Some(v) => serde_json::from_str(v),
        None => Ok(Vec::new()),
    }
}

fn write_managed_by(
    obj: &mut DynamicObject,
    refs: &[ManagedBy],
) -> Result<(), serde_json::Error> {
    let value = serde_json::to_string(refs)?;
    set_annotation(obj, MANAGED_BY_ANNOTATION, value);
    Ok(())
}

/// Record `manager` in the annotation. Returns whether the object changed.
pub fn add_managed_by<K: Resource<DynamicType = ()>>(
    obj: &mut DynamicObject,
    manager: &K,
) -> Result<bool, serde_json::Error> {
    let mut refs = get_managed_by(obj)?;
    let entry = ManagedBy::of(manager);
    if refs.contains(&entry) {
        return Ok(false);
    }
    refs.push(entry);
    write_managed_by(obj, &refs)?;
    Ok(true)
}

pub fn remove_managed_by<K: Resource<DynamicType = ()>>(
    obj: &mut DynamicObject,
    manager: &K,
) -> Result<bool, serde_json::Error> {
    let mut refs = get_managed_by(obj)?;
    let entry = ManagedBy::of(manager);
    let before = refs.len();
    refs.retain(|r| r != &entry);
    if refs.len() == before {
        return Ok(false);
    }
    write_managed_by(obj, &refs)?;
    Ok(true)
}

/// Keys of the `K` resources that manage `obj`. A malformed annotation yields
/// no keys.
pub fn managed_by_requests<K: Resource<DynamicType = ()>>(
    obj: &DynamicObject,
) -> Vec<ObjectKey> {
    get_managed_by(obj)
        .unwrap_or_default()
        .iter()
        .filter(|r| r.is_kind::<K>())
        .map(|r| ObjectKey::new(Some(&r.namespace), &r.name))
        .collect()
}
