use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::{mirror_ready_condition, record_dependency, setup_watch};
use crate::controller::{Invocation, Reconciler, Step, StepName, StepResult};
use crate::descriptor::DependencyDescriptor;
use crate::dictionary::{REASON_FAILED, REASON_NOT_FOUND, STEP_RESOLVE_DEPENDENCY};
use crate::error::Wrap;
use crate::object::{add_owner_reference, has_owner_reference, remove_owner_reference};
use crate::reference::ObjectReference;
use crate::status::ConditionStatus;
use crate::step_try;

/// Resolve a single dependency as a standalone step.
pub struct ResolveDependency {
    dependency: Box<dyn DependencyDescriptor>,
}

impl ResolveDependency {
    pub fn new(dependency: impl DependencyDescriptor + 'static) -> Self {
        ResolveDependency {
            dependency: Box::new(dependency),
        }
    }
}

#[async_trait]
impl<R: Reconciler> Step<R> for ResolveDependency {
    fn name(&self) -> StepName {
        StepName::for_kind(STEP_RESOLVE_DEPENDENCY, self.dependency.kind())
    }

    async fn execute(&self, inv: &mut Invocation<R>) -> StepResult {
        resolve_dependency(inv, self.dependency.as_ref()).await
    }
}

/// Fetch the dependency, tag it with an owner reference, optionally wait for
/// it to become ready and record the outcome in the status.
#[instrument(skip_all, fields(key = %inv.request(), kind = %dependency.kind(), name = %dependency.key()))]
pub async fn resolve_dependency<R: Reconciler>(
    inv: &mut Invocation<R>,
    dependency: &dyn DependencyDescriptor,
) -> StepResult {
    let reconciler = inv.reconciler_arc();
    let store = reconciler.store();
    let ar = dependency.api_resource();
    let key = dependency.key();
    let generation = inv.generation();
    let is_finalizing = inv.is_finalizing();

    let mut reference =
        ObjectReference::new(ar, &key, ConditionStatus::Unknown, generation);

    let fetched = store
        .get(ar, key.namespace.as_deref(), &key.name)
        .await
        .wrap("failed to get dependency resource");
    let mut obj = match fetched {
        Ok(obj) => obj,
        Err(e) => {
            let not_found = e.is_not_found();
            reference.status = ConditionStatus::False;
            reference.reason = Some(
                if not_found { REASON_NOT_FOUND } else { REASON_FAILED }.to_string(),
            );
            reference.message = Some(e.root().to_string());
            step_try!(record_dependency(inv, reference).await);

            if !not_found {
                return StepResult::Error(e);
            }
            if is_finalizing || dependency.is_optional() {
                debug!(%key, "dependency absent; continuing");
                return StepResult::Success;
            }
            let retry = reconciler.config().dependency_retry();
            info!(%key, ?retry, "dependency not found; retrying later");
            return StepResult::RequeueAfter(retry);
        }
    };

    step_try!(dependency.bind(&obj));
    let owner = step_try!(inv.owner_reference(false));
    let owned = has_owner_reference(&obj, &owner);

    if is_finalizing {
        if owned {
            debug!(%key, "releasing dependency");
            remove_owner_reference(&mut obj, &owner);
            step_try!(
                store
                    .update(ar, &obj)
                    .await
                    .wrap("failed to remove owner reference from dependency")
            );
        }
        return StepResult::Success;
    }

    let result = setup_watch(reconciler.as_ref(), ar, &key.name).await;
    if result.should_return() {
        return result.from_sub_step();
    }

    if !owned {
        debug!(%key, "adding owner reference to dependency");
        add_owner_reference(&mut obj, owner);
        obj = step_try!(
            store
                .update(ar, &obj)
                .await
                .wrap("failed to add owner reference to dependency")
        );
        step_try!(dependency.bind(&obj));
    }
    reference.uid = obj.metadata.uid.clone();

    if dependency.should_wait_for_ready() {
        let status = step_try!(dependency.status(&obj));
        let ready = mirror_ready_condition(
            &mut reference,
            &status,
            "the dependency resource is not ready",
        );
        step_try!(record_dependency(inv, reference.clone()).await);
        if !ready {
            info!(%key, "dependency not ready");
            return StepResult::EarlyReturn;
        }
    }

    reference.status = ConditionStatus::True;
    reference.reason = None;
    reference.message = None;
    reference.observed_generation = generation;
    step_try!(record_dependency(inv, reference).await);
    StepResult::Success
}
