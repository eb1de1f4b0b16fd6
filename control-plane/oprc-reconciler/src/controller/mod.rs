mod invocation;
mod reconciler;
mod runtime;
mod stepper;
pub mod steps;

pub use invocation::Invocation;
pub use reconciler::{ControllerResource, Reconciler};
pub use runtime::{error_policy, reconcile, run_controller};
pub use stepper::{Outcome, Step, StepName, StepResult, Stepper};
