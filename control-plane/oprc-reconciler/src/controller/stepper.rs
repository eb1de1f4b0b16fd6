use std::time::{Duration, Instant};

use async_trait::async_trait;
use kube::runtime::controller::Action;
use tracing::{debug, error, info};

use super::{Invocation, Reconciler};
use crate::config::ReconcilerConfig;
use crate::error::ReconcileErr;

/// Step name plus the kind it operates on, kept apart for structured logs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepName {
    pub step: &'static str,
    pub kind: Option<String>,
}

impl StepName {
    pub fn new(step: &'static str) -> Self {
        StepName { step, kind: None }
    }

    pub fn for_kind(step: &'static str, kind: &str) -> Self {
        StepName {
            step,
            kind: Some(kind.to_string()),
        }
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{}/{}", self.step, kind),
            None => write!(f, "{}", self.step),
        }
    }
}

#[derive(Debug)]
pub enum StepResult {
    /// Continue with the next step.
    Success,
    /// Stop the pipeline without error or requeue.
    EarlyReturn,
    Requeue,
    RequeueAfter(Duration),
    Error(ReconcileErr),
}

impl StepResult {
    pub fn should_return(&self) -> bool {
        !matches!(self, StepResult::Success)
    }

    /// Result of a sub-step as seen by its aggregating parent: an early
    /// return at the leaf lets the parent carry on.
    pub fn from_sub_step(self) -> Self {
        match self {
            StepResult::EarlyReturn => StepResult::Success,
            other => other,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StepResult::Error(_))
    }
}

impl From<ReconcileErr> for StepResult {
    fn from(e: ReconcileErr) -> Self {
        StepResult::Error(e)
    }
}

/// Unwrap a `Result`, turning the error into a halting `StepResult`.
#[macro_export]
macro_rules! step_try {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(err) => return $crate::controller::StepResult::Error(err.into()),
        }
    };
}

/// What the outer control loop should do after a pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Requeue,
    RequeueAfter(Duration),
}

impl Outcome {
    pub fn into_action(self, cfg: &ReconcilerConfig) -> Action {
        match self {
            Outcome::Done => Action::await_change(),
            Outcome::Requeue => Action::requeue(cfg.requeue()),
            Outcome::RequeueAfter(d) => Action::requeue(d),
        }
    }
}

#[async_trait]
pub trait Step<R: Reconciler>: Send + Sync {
    fn name(&self) -> StepName;

    async fn execute(&self, inv: &mut Invocation<R>) -> StepResult;
}

/// Ordered list of steps run until one halts.
pub struct Stepper<R: Reconciler> {
    steps: Vec<Box<dyn Step<R>>>,
}

impl<R: Reconciler> Default for Stepper<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Reconciler> Stepper<R> {
    pub fn new() -> Self {
        Stepper { steps: Vec::new() }
    }

    pub fn with_step(mut self, step: impl Step<R> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// FindControllerResource, ResolveDependencies, ReconcileChildren, then
    /// `domain` steps, then EndReconciliation.
    pub fn standard(domain: Vec<Box<dyn Step<R>>>) -> Self {
        use super::steps::{
            EndReconciliation, FindControllerResource, ReconcileChildren,
            ResolveDependencies,
        };
        let mut stepper = Stepper::new()
            .with_step(FindControllerResource)
            .with_step(ResolveDependencies)
            .with_step(ReconcileChildren);
        stepper.steps.extend(domain);
        stepper.with_step(EndReconciliation)
    }

    pub fn step_names(&self) -> Vec<StepName> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub async fn execute(
        &self,
        inv: &mut Invocation<R>,
    ) -> Result<Outcome, ReconcileErr> {
        let started = Instant::now();
        let key = inv.request().to_string();
        debug!(%key, steps = self.steps.len(), "stepper: starting");

        for step in &self.steps {
            let name = step.name();
            inv.record_step(&name);
            let step_started = Instant::now();
            let result = step.execute(inv).await;
            let elapsed = step_started.elapsed();

            match result {
                StepResult::Success => {
                    debug!(%key, step = %name, ?elapsed, "stepper: step done");
                }
                StepResult::EarlyReturn => {
                    info!(%key, step = %name, ?elapsed, "stepper: early return");
                    return Ok(Outcome::Done);
                }
                StepResult::Requeue => {
                    info!(%key, step = %name, ?elapsed, "stepper: requeue");
                    return Ok(Outcome::Requeue);
                }
                StepResult::RequeueAfter(after) => {
                    info!(%key, step = %name, ?after, ?elapsed, "stepper: requeue after");
                    return Ok(Outcome::RequeueAfter(after));
                }
                StepResult::Error(e) => {
                    error!(%key, step = %name, ?elapsed, error = %e, "stepper: step failed");
                    return Err(e);
                }
            }
        }

        info!(%key, elapsed = ?started.elapsed(), "stepper: all steps executed");
        Ok(Outcome::Done)
    }
}
