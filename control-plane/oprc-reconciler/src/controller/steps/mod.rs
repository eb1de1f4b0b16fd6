//! Built-in pipeline steps.

mod child;
mod children;
mod dependencies;
mod dependency;
mod end;
mod find_resource;
mod watch;

pub use child::{ReconcileChild, reconcile_child};
pub use children::ReconcileChildren;
pub use dependencies::ResolveDependencies;
pub use dependency::{ResolveDependency, resolve_dependency};
pub use end::EndReconciliation;
pub use find_resource::FindControllerResource;
pub use watch::setup_watch;

use super::{Invocation, Reconciler, StepResult};
use crate::conditions::find_condition;
use crate::dictionary::{CONDITION_TYPE_READY, REASON_UNKNOWN};
use crate::error::ReconcileErr;
use crate::reference::ObjectReference;
use crate::status::{ConditionStatus, Status};

/// Copy the Ready condition of `status` into `reference`. Returns whether the
/// object is ready.
pub(crate) fn mirror_ready_condition(
    reference: &mut ObjectReference,
    status: &Status,
    not_ready_message: &str,
) -> bool {
    match find_condition(&status.conditions, CONDITION_TYPE_READY) {
        Some(ready) if ready.is_true() => {
            reference.status = ConditionStatus::True;
            reference.reason = None;
            reference.message = None;
            true
        }
        Some(ready) => {
            reference.status = ready.status;
            reference.reason = ready.reason.clone();
            reference.message = ready.message.clone();
            false
        }
        None => {
            reference.status = ConditionStatus::Unknown;
            reference.reason = Some(REASON_UNKNOWN.to_string());
            reference.message = Some(not_ready_message.to_string());
            false
        }
    }
}

/// Errors win over other halting results; otherwise the first one halts.
pub(crate) fn first_halting(results: Vec<StepResult>) -> StepResult {
    let mut first = None;
    for result in results {
        if result.is_error() {
            return result;
        }
        if first.is_none() && result.should_return() {
            first = Some(result);
        }
    }
    first.unwrap_or(StepResult::Success)
}

pub(crate) async fn record_dependency<R: Reconciler>(
    inv: &mut Invocation<R>,
    reference: ObjectReference,
) -> Result<(), ReconcileErr> {
    if inv.status_mut()?.dependencies.set(reference) {
        inv.persist_status().await?;
    }
    Ok(())
}

pub(crate) async fn forget_dependency<R: Reconciler>(
    inv: &mut Invocation<R>,
    reference: &ObjectReference,
) -> Result<(), ReconcileErr> {
    if inv.status_mut()?.dependencies.remove(reference) {
        inv.persist_status().await?;
    }
    Ok(())
}

pub(crate) async fn record_child<R: Reconciler>(
    inv: &mut Invocation<R>,
    reference: ObjectReference,
) -> Result<(), ReconcileErr> {
    if inv.status_mut()?.child_resources.set(reference) {
        inv.persist_status().await?;
    }
    Ok(())
}

pub(crate) async fn forget_child<R: Reconciler>(
    inv: &mut Invocation<R>,
    reference: &ObjectReference,
) -> Result<(), ReconcileErr> {
    if inv.status_mut()?.child_resources.remove(reference) {
        inv.persist_status().await?;
    }
    Ok(())
}
