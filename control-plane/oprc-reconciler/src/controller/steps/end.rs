use async_trait::async_trait;
use tracing::{info, instrument};

use crate::conditions::{reconciled, set_condition};
use crate::controller::{Invocation, Reconciler, Step, StepName, StepResult};
use crate::dictionary::STEP_END_RECONCILIATION;
use crate::object::remove_finalizer;
use crate::step_try;

/// Mark the resource reconciled; when finalizing, release the finalizer so
/// the store can complete the delete.
pub struct EndReconciliation;

#[async_trait]
impl<R: Reconciler> Step<R> for EndReconciliation {
    fn name(&self) -> StepName {
        StepName::new(STEP_END_RECONCILIATION)
    }

    #[instrument(skip_all, fields(key = %inv.request()))]
    async fn execute(&self, inv: &mut Invocation<R>) -> StepResult {
        let generation = inv.generation();
        let status = step_try!(inv.status_mut());
        if set_condition(&mut status.conditions, reconciled(generation)) {
            step_try!(inv.persist_status().await);
        }

        if inv.is_finalizing() {
            let reconciler = inv.reconciler_arc();
            let finalizer = reconciler.finalizer();
            if remove_finalizer(step_try!(inv.resource_mut()), finalizer) {
                info!(key = %inv.request(), %finalizer, "removing finalizer");
                step_try!(inv.persist_resource().await);
            }
        }
        StepResult::Success
    }
}
