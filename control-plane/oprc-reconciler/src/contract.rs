//! Typed "contract" documents published by one resource under its status and
//! read by other operators.

use kube::core::DynamicObject;
use serde::de::DeserializeOwned;

#[derive(thiserror::Error, Debug)]
pub enum ContractError {
    #[error("contract not found at path: {0}")]
    NotFound(String),
    #[error("contract at path {0} is not an object")]
    NotAnObject(String),
    #[error("failed to decode contract at path {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode `status.<path...>` of `obj` into `K`. Timestamp fields typed as
/// `chrono::DateTime<Utc>` accept RFC3339 strings.
pub fn get_contract<K: DeserializeOwned>(
    obj: &DynamicObject,
    path: &[&str],
) -> Result<K, ContractError> {
    let full_path = std::iter::once("status")
        .chain(path.iter().copied())
        .collect::<Vec<_>>()
        .join(".");

    let mut node = &obj.data;
    for segment in std::iter::once("status").chain(path.iter().copied()) {
        node = node
            .get(segment)
            .ok_or_else(|| ContractError::NotFound(full_path.clone()))?;
    }
    if !node.is_object() {
        return Err(ContractError::NotAnObject(full_path));
    }
    serde_json::from_value(node.clone()).map_err(|source| ContractError::Decode {
        path: full_path,
        source,
    })
}
