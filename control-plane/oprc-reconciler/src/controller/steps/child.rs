use async_trait::async_trait;
use kube::ResourceExt;
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use tracing::{debug, info, instrument, warn};

use super::{forget_child, mirror_ready_condition, record_child, setup_watch};
use crate::controller::{Invocation, Reconciler, Step, StepName, StepResult};
use crate::descriptor::{ChildDescriptor, Generated};
use crate::dictionary::{REASON_FAILED, STEP_RECONCILE_CHILD};
use crate::error::{ReconcileErr, Wrap};
use crate::fingerprint;
use crate::object::set_controller_reference;
use crate::reference::{ObjectKey, ObjectReference};
use crate::status::ConditionStatus;
use crate::store::ObjectStore;

/// Reconcile a single child as a standalone step.
pub struct ReconcileChild<R: Reconciler> {
    child: Box<dyn ChildDescriptor<R>>,
}

impl<R: Reconciler> ReconcileChild<R> {
    pub fn new(child: impl ChildDescriptor<R> + 'static) -> Self {
        ReconcileChild {
            child: Box::new(child),
        }
    }
}

#[async_trait]
impl<R: Reconciler> Step<R> for ReconcileChild<R> {
    fn name(&self) -> StepName {
        StepName::for_kind(STEP_RECONCILE_CHILD, self.child.kind())
    }

    async fn execute(&self, inv: &mut Invocation<R>) -> StepResult {
        reconcile_child(inv, self.child.as_ref()).await.0
    }
}

macro_rules! halt {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(err) => return (StepResult::Error(err), None),
        }
    };
}

/// Converge one child toward its generated desired state. Also returns the
/// reference of the child that was reconciled, if any, so callers can build
/// the declared set.
#[instrument(skip_all, fields(key = %inv.request(), kind = %child.kind()))]
pub async fn reconcile_child<R: Reconciler>(
    inv: &mut Invocation<R>,
    child: &dyn ChildDescriptor<R>,
) -> (StepResult, Option<ObjectReference>) {
    let reconciler = inv.reconciler_arc();
    let store = reconciler.store();
    let ar = child.api_resource();
    let generation = inv.generation();
    let is_finalizing = inv.is_finalizing();

    let mut desired = match child
        .generate(inv)
        .wrap("failed to generate child resource")
    {
        Ok(Generated::Resource(obj)) => obj,
        Ok(Generated::Skip(name)) => {
            debug!(?name, "child skipped");
            if let Some(name) = name {
                let reference = ObjectReference::empty(ar, &ObjectKey::new(None, &name));
                halt!(forget_child(inv, &reference).await);
            }
            return (StepResult::Success, None);
        }
        Err(e) => return (StepResult::Error(e), None),
    };

    if desired.metadata.name.is_none() {
        return (StepResult::Error(ReconcileErr::MissingName(ar.kind.clone())), None);
    }
    let owner = halt!(inv.owner_reference(true));
    halt!(set_controller_reference(&mut desired, owner).wrap("failed to set controller reference"));
    halt!(fingerprint::stamp(&mut desired).wrap("failed to hash child resource"));

    let key = ObjectKey::from_resource(&desired);
    let mut reference =
        ObjectReference::new(ar, &key, ConditionStatus::Unknown, generation);

    let actual = match store
        .get(ar, key.namespace.as_deref(), &key.name)
        .await
        .wrap("failed to get child resource")
    {
        Ok(obj) => Some(obj),
        Err(e) if e.is_not_found() => None,
        Err(e) => return (StepResult::Error(e), Some(reference)),
    };

    if is_finalizing {
        if actual.is_some() {
            info!(%key, "deleting child");
            halt!(
                store
                    .delete(ar, key.namespace.as_deref(), &key.name)
                    .await
                    .wrap("failed to delete child resource")
            );
        }
        halt!(forget_child(inv, &reference).await);
        return (StepResult::Success, Some(reference));
    }

    let result = setup_watch(reconciler.as_ref(), ar, &key.name).await;
    if result.should_return() {
        return (result.from_sub_step(), Some(reference));
    }

    let live = match create_or_update(store, ar, desired, actual).await {
        Ok(live) => live,
        Err(e) => {
            reference.status = ConditionStatus::False;
            reference.reason = Some(REASON_FAILED.to_string());
            reference.message = Some(e.to_string());
            if let Err(status_err) = record_child(inv, reference.clone()).await {
                warn!(%key, error = %status_err, "failed to record child failure");
                let e = e.context(&format!("failed to record child failure ({status_err})"));
                return (StepResult::Error(e), Some(reference));
            }
            return (StepResult::Error(e), Some(reference));
        }
    };

    reference.uid = live.metadata.uid.clone();
    halt!(child.bind(&live));
    let status = halt!(child.status(&live));
    let ready = mirror_ready_condition(&mut reference, &status, "the child resource is not ready");
    halt!(record_child(inv, reference.clone()).await);

    if !ready {
        info!(%key, "child not ready");
        return (StepResult::EarlyReturn, Some(reference));
    }
    (StepResult::Success, Some(reference))
}

/// Create the child when absent; update it only when the fingerprint differs.
async fn create_or_update(
    store: &dyn ObjectStore,
    ar: &ApiResource,
    mut desired: DynamicObject,
    actual: Option<DynamicObject>,
) -> Result<DynamicObject, ReconcileErr> {
    match actual {
        None => {
            info!(kind = %ar.kind, name = %desired.name_any(), "creating child");
            store
                .create(ar, &desired)
                .await
                .wrap("failed to create child resource")
        }
        Some(actual) if fingerprint::matches(&desired, &actual) => {
            debug!(kind = %ar.kind, name = %desired.name_any(), "child up to date");
            Ok(actual)
        }
        Some(actual) => {
            info!(kind = %ar.kind, name = %desired.name_any(), "updating child");
            desired.metadata.resource_version = actual.metadata.resource_version;
            store
                .update(ar, &desired)
                .await
                .wrap("failed to update child resource")
        }
    }
}
