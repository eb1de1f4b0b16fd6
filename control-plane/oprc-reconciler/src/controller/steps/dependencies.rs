use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{first_halting, forget_dependency, resolve_dependency};
use crate::controller::{Invocation, Reconciler, Step, StepName, StepResult};
use crate::dictionary::STEP_RESOLVE_DEPENDENCIES;
use crate::error::Wrap;
use crate::object::remove_owner_reference;
use crate::reference::{ObjectReference, ObjectReferenceList};
use crate::step_try;

/// Resolve every dependency the reconciler declares, then release the ones
/// recorded earlier that are no longer declared.
pub struct ResolveDependencies;

#[async_trait]
impl<R: Reconciler> Step<R> for ResolveDependencies {
    fn name(&self) -> StepName {
        StepName::new(STEP_RESOLVE_DEPENDENCIES)
    }

    #[instrument(skip_all, fields(key = %inv.request()))]
    async fn execute(&self, inv: &mut Invocation<R>) -> StepResult {
        let reconciler = inv.reconciler_arc();
        let dependencies = step_try!(
            reconciler
                .dependencies(inv)
                .await
                .wrap("failed to get dependencies")
        );
        let is_finalizing = inv.is_finalizing();

        let mut halted = Vec::new();
        let mut declared = ObjectReferenceList::new();
        for dependency in &dependencies {
            let result = resolve_dependency(inv, dependency.as_ref()).await;
            if result.should_return() {
                halted.push(result);
                continue;
            }
            if is_finalizing {
                continue;
            }
            declared.set(ObjectReference::empty(
                dependency.api_resource(),
                &dependency.key(),
            ));
        }

        let result = first_halting(halted);
        if result.should_return() {
            return result;
        }

        let previous = inv
            .status()
            .map(|s| s.dependencies.clone())
            .unwrap_or_default();
        for orphan in previous.missing_from(&declared) {
            step_try!(release_orphan(inv, &orphan).await);
        }
        StepResult::Success
    }
}

/// Strip our owner reference from a dependency that is no longer declared.
/// The dependency itself is never deleted.
async fn release_orphan<R: Reconciler>(
    inv: &mut Invocation<R>,
    orphan: &ObjectReference,
) -> Result<(), crate::error::ReconcileErr> {
    let reconciler = inv.reconciler_arc();
    let store = reconciler.store();
    let ar = orphan.api_resource();
    let key = orphan.key();
    debug!(kind = %orphan.kind, %key, "releasing orphaned dependency");

    match store
        .get(&ar, key.namespace.as_deref(), &key.name)
        .await
        .wrap("failed to get dependency resource")
    {
        Ok(mut obj) => {
            let owner = inv.owner_reference(false)?;
            if remove_owner_reference(&mut obj, &owner) {
                store
                    .update(&ar, &obj)
                    .await
                    .wrap("failed to update dependency resource")?;
            }
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    forget_dependency(inv, orphan).await
}
