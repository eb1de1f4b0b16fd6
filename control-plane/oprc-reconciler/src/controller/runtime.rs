use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::{Controller, watcher::Config};
use kube::{Api, Client, ResourceExt};
use tracing::{error, info, instrument, warn};

use super::{Invocation, Reconciler};
use crate::error::ReconcileErr;
use crate::reference::ObjectKey;

/// Run the standard controller loop for `R::Resource`. `triggers` carries
/// extra keys to reconcile, usually the stream returned by
/// [`crate::watch::KubeWatcher::new`].
pub async fn run_controller<R, S>(
    client: Client,
    reconciler: Arc<R>,
    triggers: S,
) -> anyhow::Result<()>
where
    R: Reconciler,
    S: Stream<Item = ObjectRef<R::Resource>> + Send + 'static,
{
    let api: Api<R::Resource> = Api::all(client);
    let kind = <R::Resource as kube::Resource>::kind(&()).to_string();
    info!(%kind, "starting controller");

    Controller::new(api, Config::default())
        .reconcile_on(triggers)
        .shutdown_on_signal()
        .run(reconcile::<R>, error_policy::<R>, reconciler)
        .for_each(|res| async move {
            match res {
                Ok((obj_ref, action)) => {
                    info!(object = %obj_ref, ?action, "reconciled")
                }
                Err(e) => warn!(error = %e, "reconcile failed"),
            }
        })
        .await;

    Ok(())
}

#[instrument(skip_all, fields(ns = %obj.namespace().unwrap_or_default(), name = %obj.name_any()))]
pub async fn reconcile<R: Reconciler>(
    obj: Arc<R::Resource>,
    reconciler: Arc<R>,
) -> Result<Action, ReconcileErr> {
    let key = ObjectKey::from_resource(obj.as_ref());
    let mut inv = Invocation::new(reconciler.clone(), key);
    let outcome = reconciler.pipeline().execute(&mut inv).await?;
    Ok(outcome.into_action(reconciler.config()))
}

pub fn error_policy<R: Reconciler>(
    obj: Arc<R::Resource>,
    err: &ReconcileErr,
    reconciler: Arc<R>,
) -> Action {
    error!(name = %obj.name_any(), error = %err, "reconcile error; requeueing");
    Action::requeue(reconciler.config().error_requeue())
}
