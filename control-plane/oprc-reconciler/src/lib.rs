//! Generic reconciliation engine for building Kubernetes operators.
//!
//! An operator describes the resources its controller resource depends on and
//! the children it owns; the engine runs a fixed step pipeline that resolves
//! dependencies, converges children, keeps the status document current and
//! handles finalization.

pub mod conditions;
pub mod config;
pub mod contract;
pub mod controller;
pub mod descriptor;
pub mod dictionary;
pub mod error;
pub mod fingerprint;
pub mod managed_by;
pub mod object;
pub mod reference;
pub mod status;
pub mod store;
pub mod watch;

pub use config::ReconcilerConfig;
pub use controller::{
    ControllerResource, Invocation, Outcome, Reconciler, Step, StepName,
    StepResult, Stepper,
};
pub use descriptor::{
    Binding, ChildDescriptor, ChildResource, DependencyDescriptor,
    DependencyResource, Generated,
};
pub use error::{ReconcileErr, Wrap};
pub use reference::{ObjectKey, ObjectReference, ObjectReferenceList};
pub use status::{Condition, ConditionStatus, Status};
pub use store::{KubeStore, ObjectStore, StoreError};
pub use watch::{KubeWatcher, WatchCache, WatchKey, Watcher};

use tracing_subscriber::{
    EnvFilter, filter::LevelFilter, layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub fn init_tracing(default_env: &str) {
    let filter = EnvFilter::builder()
        .with_env_var("RUST_LOG")
        .from_env_lossy()
        .add_directive(
            default_env
                .parse()
                .unwrap_or_else(|_| LevelFilter::INFO.into()),
        );

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .try_init();
}
