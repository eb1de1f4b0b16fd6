use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::conditions::{default_ready, finalizing, reconciling, set_condition};
use crate::controller::{Invocation, Reconciler, Step, StepName, StepResult};
use crate::dictionary::STEP_FIND_CONTROLLER_RESOURCE;
use crate::error::Wrap;
use crate::object::{add_finalizer, from_dynamic};
use crate::step_try;

/// Fetch and bind the controller resource, ensure the finalizer and a Ready
/// condition that reflects the current generation.
pub struct FindControllerResource;

#[async_trait]
impl<R: Reconciler> Step<R> for FindControllerResource {
    fn name(&self) -> StepName {
        StepName::new(STEP_FIND_CONTROLLER_RESOURCE)
    }

    #[instrument(skip_all, fields(key = %inv.request()))]
    async fn execute(&self, inv: &mut Invocation<R>) -> StepResult {
        let reconciler = inv.reconciler_arc();
        let ar = inv.api_resource();
        let key = inv.request().clone();

        let obj = match reconciler
            .store()
            .get(&ar, key.namespace.as_deref(), &key.name)
            .await
            .wrap("failed to get controller resource")
        {
            Ok(obj) => obj,
            Err(e) if e.is_not_found() => {
                info!(%key, "controller resource not found; nothing to do");
                return StepResult::EarlyReturn;
            }
            Err(e) => return StepResult::Error(e),
        };
        inv.set_resource(step_try!(from_dynamic(&obj)));
        // nothing was bound when the stepper recorded this step
        inv.record_step(&Step::<R>::name(self));

        if !inv.is_finalizing() {
            let finalizer = reconciler.finalizer();
            if add_finalizer(step_try!(inv.resource_mut()), finalizer) {
                info!(%key, %finalizer, "adding finalizer");
                step_try!(inv.persist_resource().await);
            }
        }

        let generation = inv.generation();
        let is_finalizing = inv.is_finalizing();
        let status = step_try!(inv.status_mut());
        let (ready, defaulted) = status
            .find_or_default_condition(default_ready().with_generation(generation));

        let mut changed = false;
        if defaulted {
            changed |= set_condition(&mut status.conditions, ready);
        } else if ready.observed_generation != Some(generation) {
            debug!(%key, generation, "generation changed; resetting Ready");
            changed |= set_condition(&mut status.conditions, reconciling(generation));
        }
        if is_finalizing {
            changed |= set_condition(&mut status.conditions, finalizing(generation));
        }

        if changed {
            step_try!(inv.persist_status().await);
        }
        StepResult::Success
    }
}
