use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::StreamExt;
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client, Resource, ResourceExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use super::Watcher;
use crate::error::ReconcileErr;
use crate::managed_by::managed_by_requests;
use crate::reference::split_api_version;

/// Controller resources of kind `K` that should be reconciled when `obj`
/// changes: owners of kind `K` plus managed-by entries of kind `K`.
pub fn owner_requests<K>(obj: &DynamicObject) -> Vec<ObjectRef<K>>
where
    K: Resource<DynamicType = ()>,
{
    let namespace = obj.namespace();
    let mut requests = obj
        .owner_references()
        .iter()
        .filter(|o| {
            o.kind == K::kind(&())
                && split_api_version(&o.api_version).0 == K::group(&())
        })
        .map(|o| {
            let r = ObjectRef::new(&o.name);
            match &namespace {
                Some(ns) => r.within(ns),
                None => r,
            }
        })
        .collect::<Vec<_>>();
    for key in managed_by_requests::<K>(obj) {
        let r = ObjectRef::new(&key.name);
        requests.push(match &key.namespace {
            Some(ns) => r.within(ns),
            None => r,
        });
    }
    requests
}

/// `Watcher` that runs one API watch per kind and feeds owner keys into a
/// stream for `Controller::reconcile_on`.
pub struct KubeWatcher<K: Resource<DynamicType = ()>> {
    client: Client,
    tx: mpsc::UnboundedSender<ObjectRef<K>>,
    started: Mutex<HashSet<(String, String)>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeWatcher<K>
where
    K: Resource<DynamicType = ()> + Send + Sync + 'static,
{
    pub fn new(client: Client) -> (Self, UnboundedReceiverStream<ObjectRef<K>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = KubeWatcher {
            client,
            tx,
            started: Mutex::new(HashSet::new()),
            _kind: PhantomData,
        };
        (watcher, UnboundedReceiverStream::new(rx))
    }
}

#[async_trait]
impl<K> Watcher for KubeWatcher<K>
where
    K: Resource<DynamicType = ()> + Send + Sync + 'static,
{
    async fn watch(&self, ar: &ApiResource) -> Result<(), ReconcileErr> {
        let key = (ar.api_version.clone(), ar.kind.clone());
        let fresh = self
            .started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
        if !fresh {
            debug!(kind = %ar.kind, "watch: already running");
            return Ok(());
        }
        if self.tx.is_closed() {
            return Err(ReconcileErr::Watch(format!(
                "trigger stream for {} closed",
                K::kind(&())
            )));
        }

        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), ar);
        let tx = self.tx.clone();
        let kind = ar.kind.clone();
        info!(%kind, "watch: starting");
        tokio::spawn(async move {
            let mut events =
                watcher::watcher(api, watcher::Config::default())
                    .default_backoff()
                    .boxed();
            while let Some(event) = events.next().await {
                match event {
                    Ok(Event::Apply(obj))
                    | Ok(Event::InitApply(obj))
                    | Ok(Event::Delete(obj)) => {
                        for r in owner_requests::<K>(&obj) {
                            if tx.send(r).is_err() {
                                debug!(%kind, "watch: trigger stream closed, stopping");
                                return;
                            }
                        }
                    }
                    Ok(Event::Init) | Ok(Event::InitDone) => {
                        debug!(%kind, "watch: initialized");
                    }
                    Err(e) => warn!(%kind, error = %e, "watch: error, will retry"),
                }
            }
        });
        Ok(())
    }
}
