use chrono::Utc;
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use kube::{Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::status::ConditionStatus;

/// Namespace/name pair addressing one object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        ObjectKey {
            namespace: namespace
                .filter(|ns| !ns.is_empty())
                .map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn from_resource<K: Resource>(obj: &K) -> Self {
        ObjectKey::new(obj.namespace().as_deref(), &obj.name_any())
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Split an apiVersion into (group, version); core kinds have an empty group.
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Pointer to a related object together with its last observed readiness.
/// Identity is (group, kind, name); namespace and uid are carried along.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub group: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_time: Option<String>,
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ObjectReference {
    pub fn new(
        ar: &ApiResource,
        key: &ObjectKey,
        status: ConditionStatus,
        generation: i64,
    ) -> Self {
        ObjectReference {
            api_version: ar.api_version.clone(),
            kind: ar.kind.clone(),
            group: ar.group.clone(),
            name: key.name.clone(),
            namespace: key.namespace.clone().unwrap_or_default(),
            status,
            observed_generation: generation,
            ..Default::default()
        }
    }

    /// Reference carrying only identity fields.
    pub fn empty(ar: &ApiResource, key: &ObjectKey) -> Self {
        ObjectReference::new(ar, key, ConditionStatus::Unknown, 0)
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(Some(&self.namespace), &self.name)
    }

    pub fn group_version_kind(&self) -> GroupVersionKind {
        let (group, version) = split_api_version(&self.api_version);
        GroupVersionKind::gvk(group, version, &self.kind)
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk(&self.group_version_kind())
    }

    pub fn same_identity(&self, other: &ObjectReference) -> bool {
        self.group == other.group
            && self.kind == other.kind
            && self.name == other.name
    }

    /// True when any field other than the transition time differs.
    pub fn changed(&self, other: &ObjectReference) -> bool {
        self.api_version != other.api_version
            || self.kind != other.kind
            || self.group != other.group
            || self.name != other.name
            || self.namespace != other.namespace
            || self.uid != other.uid
            || self.status != other.status
            || self.observed_generation != other.observed_generation
            || self.reason != other.reason
            || self.message != other.message
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(transparent)]
pub struct ObjectReferenceList(Vec<ObjectReference>);

impl ObjectReferenceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ObjectReference> {
        self.0.iter()
    }

    /// Upsert by identity. The transition time is refreshed on every call; an
    /// existing entry is replaced only when another field differs.
    /// Returns whether the list needs to be persisted.
    pub fn set(&mut self, mut reference: ObjectReference) -> bool {
        reference.transition_time = Some(Utc::now().to_rfc3339());
        match self.0.iter_mut().find(|r| r.same_identity(&reference)) {
            Some(existing) => {
                existing.transition_time = reference.transition_time.clone();
                let changed = existing.changed(&reference);
                if changed {
                    *existing = reference;
                }
                changed
            }
            None => {
                self.0.push(reference);
                true
            }
        }
    }

    pub fn remove(&mut self, reference: &ObjectReference) -> bool {
        match self.0.iter().position(|r| r.same_identity(reference)) {
            Some(idx) => {
                self.0.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn get(
        &self,
        group: &str,
        kind: &str,
        name: &str,
    ) -> Option<&ObjectReference> {
        self.0
            .iter()
            .find(|r| r.group == group && r.kind == kind && r.name == name)
    }

    pub fn contains(&self, reference: &ObjectReference) -> bool {
        self.0.iter().any(|r| r.same_identity(reference))
    }

    /// Entries of `self` whose identity does not appear in `declared`.
    pub fn missing_from(
        &self,
        declared: &ObjectReferenceList,
    ) -> Vec<ObjectReference> {
        self.0
            .iter()
            .filter(|r| !declared.contains(r))
            .cloned()
            .collect()
    }
}

impl<'a> IntoIterator for &'a ObjectReferenceList {
    type Item = &'a ObjectReference;
    type IntoIter = std::slice::Iter<'a, ObjectReference>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<ObjectReference> for ObjectReferenceList {
    fn from_iter<I: IntoIterator<Item = ObjectReference>>(iter: I) -> Self {
        let mut list = ObjectReferenceList::new();
        for r in iter {
            list.set(r);
        }
        list
    }
}
