//! Watch registration for dependency and child kinds.

mod kube_watcher;

pub use kube_watcher::{KubeWatcher, owner_requests};

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use kube::discovery::ApiResource;

use crate::error::ReconcileErr;

/// Registers a watch on a kind; events on objects of that kind enqueue the
/// controller resource that owns or manages them.
#[async_trait]
pub trait Watcher: Send + Sync {
    async fn watch(&self, ar: &ApiResource) -> Result<(), ReconcileErr>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheType {
    EnqueueForOwner,
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheType::EnqueueForOwner => write!(f, "enqueueForOwner"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WatchKey {
    pub group: String,
    pub kind: String,
    pub object_name: String,
    pub cache_type: CacheType,
}

impl WatchKey {
    pub fn new(ar: &ApiResource, object_name: &str, cache_type: CacheType) -> Self {
        WatchKey {
            group: ar.group.clone(),
            kind: ar.kind.clone(),
            object_name: object_name.to_string(),
            cache_type,
        }
    }
}

impl std::fmt::Display for WatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}/{}/{}",
            self.kind, self.group, self.object_name, self.cache_type
        )
    }
}

/// Set of watch registrations already made by one reconciler. Shared by all
/// concurrent invocations, so every access takes the lock.
#[derive(Debug, Default)]
pub struct WatchCache(Mutex<HashSet<WatchKey>>);

impl WatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_watching(&self, key: &WatchKey) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Returns false when the key was already present.
    pub fn add(&self, key: WatchKey) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key)
    }

    /// Forget a key so the next invocation retries the registration.
    pub fn remove(&self, key: &WatchKey) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
