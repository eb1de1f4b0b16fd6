use kube::discovery::ApiResource;
use tracing::debug;

use crate::controller::{Reconciler, StepResult};
use crate::watch::{CacheType, WatchKey};

/// Register a watch on the kind of `ar` unless this reconciler already did so
/// for `object_name`. The key is claimed before registering so concurrent
/// invocations register at most once; a failed registration releases it.
pub async fn setup_watch<R: Reconciler>(
    reconciler: &R,
    ar: &ApiResource,
    object_name: &str,
) -> StepResult {
    let key = WatchKey::new(ar, object_name, CacheType::EnqueueForOwner);
    if !reconciler.watch_cache().add(key.clone()) {
        return StepResult::Success;
    }
    if let Err(e) = reconciler.watcher().watch(ar).await {
        reconciler.watch_cache().remove(&key);
        return StepResult::Error(e.context("failed to add watch source"));
    }
    debug!(%key, "watch registered");
    StepResult::Success
}
