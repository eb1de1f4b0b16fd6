use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Delay before retrying when a declared dependency does not exist yet.
    /// Env: OPRC_RECONCILER_DEPENDENCY_RETRY_SECS
    #[envconfig(from = "OPRC_RECONCILER_DEPENDENCY_RETRY_SECS", default = "30")]
    pub dependency_retry_secs: u64,

    /// Delay used when a step asks for a plain requeue.
    /// Env: OPRC_RECONCILER_REQUEUE_SECS
    #[envconfig(from = "OPRC_RECONCILER_REQUEUE_SECS", default = "5")]
    pub requeue_secs: u64,

    /// Delay applied by the error policy after a failed reconcile.
    /// Env: OPRC_RECONCILER_ERROR_REQUEUE_SECS
    #[envconfig(from = "OPRC_RECONCILER_ERROR_REQUEUE_SECS", default = "60")]
    pub error_requeue_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            dependency_retry_secs: 30,
            requeue_secs: 5,
            error_requeue_secs: 60,
        }
    }
}

impl ReconcilerConfig {
    pub fn dependency_retry(&self) -> Duration {
        Duration::from_secs(self.dependency_retry_secs)
    }

    pub fn requeue(&self) -> Duration {
        Duration::from_secs(self.requeue_secs)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }
}
