#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::ObjectMeta;
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use kube::{CustomResource, Resource, ResourceExt};
use oprc_reconciler::controller::steps::setup_watch;
use oprc_reconciler::descriptor::{ChildDescriptor, DependencyDescriptor};
use oprc_reconciler::object::{from_dynamic, to_dynamic};
use oprc_reconciler::{
    Binding, ChildResource, ControllerResource, DependencyResource, Generated,
    Invocation, ObjectKey, ObjectStore, Outcome, ReconcileErr, Reconciler,
    ReconcilerConfig, Status, Step, StepName, StepResult, Stepper, StoreError,
    WatchCache, Watcher,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const NS: &str = "default";
pub const APP: &str = "app";
pub const FINALIZER: &str = "oaas.io/test-finalizer";

#[derive(
    CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema,
)]
#[kube(
    group = "oaas.io",
    version = "v1alpha1",
    kind = "App",
    namespaced,
    status = "Status"
)]
pub struct AppSpec {
    pub image: String,
    #[serde(default)]
    pub replicas: i32,
}

impl ControllerResource for App {
    fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    fn status_mut(&mut self) -> &mut Status {
        self.status.get_or_insert_with(Status::default)
    }
}

pub fn app(name: &str, image: &str) -> App {
    let mut app = App::new(name, AppSpec {
        image: image.to_string(),
        replicas: 1,
    });
    app.metadata.namespace = Some(NS.to_string());
    app
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Get(String, String),
    Create(String, String),
    Update(String, String),
    Delete(String, String),
    UpdateStatus(String, String),
}

impl Call {
    pub fn kind(&self) -> &str {
        match self {
            Call::Get(k, _)
            | Call::Create(k, _)
            | Call::Update(k, _)
            | Call::Delete(k, _)
            | Call::UpdateStatus(k, _) => k,
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Call::Get(..))
    }
}

type StoreKey = (String, String, String, String);

#[derive(Default)]
struct Inner {
    objects: BTreeMap<StoreKey, DynamicObject>,
    calls: Vec<Call>,
    version: u64,
    failing_creates: Vec<String>,
    failing_gets: Vec<String>,
    failing_status: bool,
}

impl Inner {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

/// In-memory object store with resource versions, optimistic concurrency and
/// finalizer-gated deletion.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn store_key(ar: &ApiResource, namespace: Option<&str>, name: &str) -> StoreKey {
    (
        ar.group.clone(),
        ar.kind.clone(),
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

fn without_status(obj: &DynamicObject) -> serde_json::Value {
    let mut data = obj.data.clone();
    if let Some(map) = data.as_object_mut() {
        map.remove("status");
    }
    data
}

impl MemoryStore {
    pub fn seed<K>(&self, obj: &K) -> DynamicObject
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let ar = ApiResource::erase::<K>(&());
        let dynamic = to_dynamic(obj).unwrap();
        self.seed_dynamic(&ar, dynamic)
    }

    pub fn seed_dynamic(&self, ar: &ApiResource, mut obj: DynamicObject) -> DynamicObject {
        let mut inner = self.inner.lock().unwrap();
        let key = store_key(ar, obj.namespace().as_deref(), &obj.name_any());
        obj.metadata.uid = Some(format!("uid-{}-{}", ar.kind.to_lowercase(), obj.name_any()));
        obj.metadata.resource_version = Some(inner.next_version());
        obj.metadata.generation.get_or_insert(1);
        inner.objects.insert(key, obj.clone());
        obj
    }

    pub fn fetch<K>(&self, namespace: &str, name: &str) -> Option<K>
    where
        K: Resource<DynamicType = ()> + serde::de::DeserializeOwned,
    {
        let ar = ApiResource::erase::<K>(&());
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .get(&store_key(&ar, Some(namespace), name))
            .map(|o| from_dynamic(o).unwrap())
    }

    /// Edit a stored object's spec as a user would, bumping its generation.
    pub fn edit<K, F>(&self, namespace: &str, name: &str, edit: F)
    where
        K: Resource<DynamicType = ()> + Serialize + serde::de::DeserializeOwned,
        F: FnOnce(&mut K),
    {
        let ar = ApiResource::erase::<K>(&());
        let mut inner = self.inner.lock().unwrap();
        let version = inner.next_version();
        let slot = inner
            .objects
            .get_mut(&store_key(&ar, Some(namespace), name))
            .expect("object to edit");
        let mut typed: K = from_dynamic(slot).unwrap();
        edit(&mut typed);
        let mut updated = to_dynamic(&typed).unwrap();
        updated.metadata.resource_version = Some(version);
        if without_status(&updated) != without_status(slot) {
            updated.metadata.generation = Some(slot.metadata.generation.unwrap_or(1) + 1);
        }
        *slot = updated;
    }

    pub fn fail_creates_of(&self, kind: &str) {
        self.inner.lock().unwrap().failing_creates.push(kind.to_string());
    }

    pub fn fail_gets_of(&self, kind: &str) {
        self.inner.lock().unwrap().failing_gets.push(kind.to_string());
    }

    pub fn fail_status_updates(&self) {
        self.inner.lock().unwrap().failing_status = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    fn record(&self, call: Call) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, StoreError> {
        self.record(Call::Get(ar.kind.clone(), name.to_string()));
        let inner = self.inner.lock().unwrap();
        if inner.failing_gets.contains(&ar.kind) {
            return Err(StoreError::Other(format!("api unavailable for {}", name)));
        }
        inner
            .objects
            .get(&store_key(ar, namespace, name))
            .cloned()
            .ok_or_else(|| StoreError::not_found(ar, name))
    }

    async fn create(
        &self,
        ar: &ApiResource,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let name = obj.name_any();
        self.record(Call::Create(ar.kind.clone(), name.clone()));
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_creates.contains(&ar.kind) {
            return Err(StoreError::Other(format!("admission denied {}", name)));
        }
        let key = store_key(ar, obj.namespace().as_deref(), &name);
        if inner.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: ar.kind.clone(),
                name,
            });
        }
        let mut created = obj.clone();
        created.metadata.uid = Some(format!("uid-{}-{}", ar.kind.to_lowercase(), name));
        created.metadata.resource_version = Some(inner.next_version());
        created.metadata.generation = Some(1);
        inner.objects.insert(key, created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        ar: &ApiResource,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let name = obj.name_any();
        self.record(Call::Update(ar.kind.clone(), name.clone()));
        let mut inner = self.inner.lock().unwrap();
        let key = store_key(ar, obj.namespace().as_deref(), &name);
        let version = inner.next_version();
        let Some(stored) = inner.objects.get(&key).cloned() else {
            return Err(StoreError::not_found(ar, &name));
        };
        if obj.metadata.resource_version.is_some()
            && obj.metadata.resource_version != stored.metadata.resource_version
        {
            return Err(StoreError::Conflict {
                kind: ar.kind.clone(),
                name,
                message: "resourceVersion mismatch".into(),
            });
        }

        let mut updated = obj.clone();
        // status is only written through the status endpoint
        match (updated.data.as_object_mut(), stored.data.get("status")) {
            (Some(map), Some(status)) => {
                map.insert("status".into(), status.clone());
            }
            (Some(map), None) => {
                map.remove("status");
            }
            _ => {}
        }
        updated.metadata.uid = stored.metadata.uid.clone();
        updated.metadata.deletion_timestamp = stored.metadata.deletion_timestamp.clone();
        updated.metadata.resource_version = Some(version);
        let generation = stored.metadata.generation.unwrap_or(1);
        updated.metadata.generation = Some(if without_status(&updated) != without_status(&stored) {
            generation + 1
        } else {
            generation
        });

        if updated.metadata.deletion_timestamp.is_some() && updated.finalizers().is_empty() {
            inner.objects.remove(&key);
        } else {
            inner.objects.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn delete(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        self.record(Call::Delete(ar.kind.clone(), name.to_string()));
        let mut inner = self.inner.lock().unwrap();
        let key = store_key(ar, namespace, name);
        let version = inner.next_version();
        let Some(stored) = inner.objects.get_mut(&key) else {
            return Err(StoreError::not_found(ar, name));
        };
        if stored.finalizers().is_empty() {
            inner.objects.remove(&key);
        } else {
            stored.metadata.deletion_timestamp = Some(Time(Utc::now()));
            stored.metadata.resource_version = Some(version);
        }
        Ok(())
    }

    async fn update_status(
        &self,
        ar: &ApiResource,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let name = obj.name_any();
        self.record(Call::UpdateStatus(ar.kind.clone(), name.clone()));
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_status {
            return Err(StoreError::Other(format!("status write rejected for {}", name)));
        }
        let key = store_key(ar, obj.namespace().as_deref(), &name);
        let version = inner.next_version();
        let Some(stored) = inner.objects.get_mut(&key) else {
            return Err(StoreError::not_found(ar, &name));
        };
        if obj.metadata.resource_version.is_some()
            && obj.metadata.resource_version != stored.metadata.resource_version
        {
            return Err(StoreError::Conflict {
                kind: ar.kind.clone(),
                name,
                message: "resourceVersion mismatch".into(),
            });
        }
        if let Some(map) = stored.data.as_object_mut() {
            match obj.data.get("status") {
                Some(status) => map.insert("status".into(), status.clone()),
                None => map.remove("status"),
            };
        }
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }
}

/// Watcher that only records which kinds were registered. It can be made
/// slow or failing.
#[derive(Default)]
pub struct RecordingWatcher {
    kinds: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
    failing: Mutex<bool>,
}

impl RecordingWatcher {
    pub fn kinds(&self) -> Vec<String> {
        self.kinds.lock().unwrap().clone()
    }

    pub fn slow(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl Watcher for RecordingWatcher {
    async fn watch(&self, ar: &ApiResource) -> Result<(), ReconcileErr> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.failing.lock().unwrap() {
            return Err(ReconcileErr::Watch(format!("cannot watch {}", ar.kind)));
        }
        self.kinds.lock().unwrap().push(ar.kind.clone());
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ConfigMapDep {
    pub name: String,
    pub optional: bool,
}

#[derive(Clone, Debug)]
pub struct ServiceChild {
    pub name: String,
    pub port: i32,
    pub skip: bool,
    pub ready: bool,
}

impl ServiceChild {
    pub fn new(name: &str, port: i32) -> Self {
        ServiceChild {
            name: name.to_string(),
            port,
            skip: false,
            ready: true,
        }
    }
}

/// What the test operator declares on its next invocation.
#[derive(Clone, Debug, Default)]
pub struct Declarations {
    pub config_maps: Vec<ConfigMapDep>,
    pub services: Vec<ServiceChild>,
    /// Another App that must report Ready before this one proceeds.
    pub upstream: Option<String>,
}

/// Slots the operator reads after the dependency and child steps ran.
#[derive(Default)]
pub struct TestState {
    pub config_map: Binding<ConfigMap>,
    pub service: Binding<Service>,
    pub upstream: Binding<App>,
}

/// Records the Ready condition seen between the children step and the end
/// step.
pub struct ReadyProbe;

#[async_trait]
impl Step<TestReconciler> for ReadyProbe {
    fn name(&self) -> StepName {
        StepName::new("ReadyProbe")
    }

    async fn execute(&self, inv: &mut Invocation<TestReconciler>) -> StepResult {
        let ready = inv
            .status()
            .and_then(|s| s.conditions.iter().find(|c| c.type_ == "Ready").cloned());
        inv.reconciler().probes.lock().unwrap().push(ready);
        StepResult::Success
    }
}

pub struct TestReconciler {
    pub store: MemoryStore,
    pub watcher: RecordingWatcher,
    pub cache: WatchCache,
    pub config: ReconcilerConfig,
    pub declarations: Mutex<Declarations>,
    pub probes: Mutex<Vec<Option<oprc_reconciler::Condition>>>,
}

impl TestReconciler {
    pub fn new() -> Arc<Self> {
        Arc::new(TestReconciler {
            store: MemoryStore::default(),
            watcher: RecordingWatcher::default(),
            cache: WatchCache::new(),
            config: ReconcilerConfig::default(),
            declarations: Mutex::new(Declarations::default()),
            probes: Mutex::new(Vec::new()),
        })
    }

    pub fn declare<F: FnOnce(&mut Declarations)>(&self, f: F) {
        f(&mut self.declarations.lock().unwrap());
    }

    fn declared(&self) -> Declarations {
        self.declarations.lock().unwrap().clone()
    }

    pub fn last_probe(&self) -> Option<oprc_reconciler::Condition> {
        self.probes.lock().unwrap().last().cloned().flatten()
    }
}

pub fn service(namespace: &str, child: &ServiceChild) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(child.name.clone()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                port: child.port,
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn config_map(name: &str) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NS.to_string()),
            ..Default::default()
        },
        data: Some([("key".to_string(), "value".to_string())].into()),
        ..Default::default()
    }
}

pub fn child_descriptor(
    state: &TestState,
    decl: ServiceChild,
    first: bool,
) -> Box<dyn ChildDescriptor<TestReconciler>> {
    let ready = decl.ready;
    let mut child = ChildResource::<TestReconciler, Service>::new(move |inv| {
        if decl.skip {
            return Ok(Generated::Skip(Some(decl.name.clone())));
        }
        let ns = inv.request().namespace.clone().unwrap_or_default();
        Ok(Generated::Resource(service(&ns, &decl)))
    })
    .with_status(move |_| if ready { Status::ready() } else { Status::default() });
    if first {
        child = child.with_output(state.service.clone());
    }
    Box::new(child)
}

#[async_trait]
impl Reconciler for TestReconciler {
    type Resource = App;
    type State = TestState;

    fn finalizer(&self) -> &str {
        FINALIZER
    }

    fn store(&self) -> &dyn ObjectStore {
        &self.store
    }

    fn watcher(&self) -> &dyn Watcher {
        &self.watcher
    }

    fn watch_cache(&self) -> &WatchCache {
        &self.cache
    }

    fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    async fn dependencies(
        &self,
        inv: &Invocation<Self>,
    ) -> Result<Vec<Box<dyn DependencyDescriptor>>, ReconcileErr> {
        let decl = self.declared();
        let ns = inv.request().namespace.clone().unwrap_or_default();
        let mut deps: Vec<Box<dyn DependencyDescriptor>> = Vec::new();
        for (i, cm) in decl.config_maps.iter().enumerate() {
            let mut dep = DependencyResource::<ConfigMap>::new(&cm.name)
                .within(&ns)
                .optional(cm.optional);
            if i == 0 {
                dep = dep.with_output(inv.state.config_map.clone());
            }
            deps.push(Box::new(dep));
        }
        if let Some(upstream) = decl.upstream {
            let dep = DependencyResource::<App>::new(&upstream)
                .within(&ns)
                .wait_for_ready(true)
                .with_status(|a: &App| a.status.clone().unwrap_or_default())
                .with_output(inv.state.upstream.clone());
            deps.push(Box::new(dep));
        }
        Ok(deps)
    }

    async fn children(
        &self,
        inv: &Invocation<Self>,
    ) -> Result<Vec<Box<dyn ChildDescriptor<Self>>>, ReconcileErr> {
        Ok(self
            .declared()
            .services
            .into_iter()
            .enumerate()
            .map(|(i, svc)| child_descriptor(&inv.state, svc, i == 0))
            .collect())
    }

    fn pipeline(&self) -> Stepper<Self> {
        Stepper::standard(vec![Box::new(ReadyProbe)])
    }
}

pub fn invocation(reconciler: &Arc<TestReconciler>) -> Invocation<TestReconciler> {
    Invocation::new(reconciler.clone(), ObjectKey::new(Some(NS), APP))
}

/// Run the full pipeline once for the default App key.
pub async fn run(
    reconciler: &Arc<TestReconciler>,
) -> (Result<Outcome, ReconcileErr>, Invocation<TestReconciler>) {
    let mut inv = invocation(reconciler);
    let outcome = reconciler.pipeline().execute(&mut inv).await;
    (outcome, inv)
}

pub fn stored_app(reconciler: &TestReconciler) -> App {
    reconciler.store.fetch::<App>(NS, APP).expect("app in store")
}

pub fn ready_of(app: &App) -> oprc_reconciler::Condition {
    app.status
        .as_ref()
        .and_then(|s| s.conditions.iter().find(|c| c.type_ == "Ready"))
        .cloned()
        .expect("ready condition")
}

/// Watch registration via the shared helper, for direct use in tests.
pub async fn watch_once(reconciler: &TestReconciler, ar: &ApiResource, name: &str) -> StepResult {
    setup_watch(reconciler, ar, name).await
}
