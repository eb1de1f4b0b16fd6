use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{first_halting, forget_child, reconcile_child};
use crate::controller::{Invocation, Reconciler, Step, StepName, StepResult};
use crate::dictionary::STEP_RECONCILE_CHILDREN;
use crate::error::{ReconcileErr, Wrap};
use crate::reference::{ObjectReference, ObjectReferenceList};
use crate::step_try;

/// Reconcile every child the reconciler declares, then delete the ones
/// recorded before this pass that are no longer declared.
pub struct ReconcileChildren;

#[async_trait]
impl<R: Reconciler> Step<R> for ReconcileChildren {
    fn name(&self) -> StepName {
        StepName::new(STEP_RECONCILE_CHILDREN)
    }

    #[instrument(skip_all, fields(key = %inv.request()))]
    async fn execute(&self, inv: &mut Invocation<R>) -> StepResult {
        let reconciler = inv.reconciler_arc();
        let children = step_try!(
            reconciler
                .children(inv)
                .await
                .wrap("failed to get children")
        );
        let previous = inv
            .status()
            .map(|s| s.child_resources.clone())
            .unwrap_or_default();

        let mut halted = Vec::new();
        let mut declared = ObjectReferenceList::new();
        for child in &children {
            let (result, reference) = reconcile_child(inv, child.as_ref()).await;
            if result.should_return() {
                halted.push(result);
                continue;
            }
            if let Some(reference) = reference {
                declared.set(reference);
            }
        }

        let result = first_halting(halted);
        if result.should_return() {
            return result;
        }

        for orphan in previous.missing_from(&declared) {
            step_try!(delete_orphan(inv, &orphan).await);
        }
        StepResult::Success
    }
}

async fn delete_orphan<R: Reconciler>(
    inv: &mut Invocation<R>,
    orphan: &ObjectReference,
) -> Result<(), ReconcileErr> {
    let reconciler = inv.reconciler_arc();
    let store = reconciler.store();
    let ar = orphan.api_resource();
    let key = orphan.key();
    debug!(kind = %orphan.kind, %key, "deleting orphaned child");

    match store
        .get(&ar, key.namespace.as_deref(), &key.name)
        .await
        .wrap("failed to get child resource")
    {
        Ok(_) => store
            .delete(&ar, key.namespace.as_deref(), &key.name)
            .await
            .wrap("failed to delete child resource")?,
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    forget_child(inv, orphan).await
}
