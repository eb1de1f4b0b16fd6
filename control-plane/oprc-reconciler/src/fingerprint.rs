//! Change-detection fingerprint stamped on generated children.

use kube::core::DynamicObject;
use sha2::{Digest, Sha256};

use crate::dictionary::HASH_ANNOTATION;
use crate::error::ReconcileErr;
use crate::object::{get_annotation, remove_annotation, set_annotation};

/// Hex SHA-256 over the JSON form of `obj`, ignoring any existing hash
/// annotation. Map keys serialize in sorted order so equal objects hash equal.
pub fn compute(obj: &DynamicObject) -> Result<String, ReconcileErr> {
    let mut copy = obj.clone();
    remove_annotation(&mut copy, HASH_ANNOTATION);
    if copy.metadata.annotations.as_ref().is_some_and(|a| a.is_empty()) {
        copy.metadata.annotations = None;
    }
    let bytes = serde_json::to_vec(&copy)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Compute the fingerprint and write it into the hash annotation.
pub fn stamp(obj: &mut DynamicObject) -> Result<String, ReconcileErr> {
    let hash = compute(obj)?;
    set_annotation(obj, HASH_ANNOTATION, hash.clone());
    Ok(hash)
}

pub fn stamped(obj: &DynamicObject) -> Option<&str> {
    get_annotation(obj, HASH_ANNOTATION)
}

/// Whether the live object carries the same fingerprint as the desired one.
pub fn matches(desired: &DynamicObject, actual: &DynamicObject) -> bool {
    stamped(desired) == stamped(actual)
}
