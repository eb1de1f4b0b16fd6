pub const CONDITION_TYPE_READY: &str = "Ready";

pub const REASON_RECONCILING: &str = "Reconciling";
pub const REASON_RECONCILED: &str = "Reconciled";
pub const REASON_FINALIZING: &str = "Finalizing";
pub const REASON_UNKNOWN: &str = "Unknown";
pub const REASON_NOT_FOUND: &str = "NotFound";
pub const REASON_FAILED: &str = "Failed";

pub const STEP_FIND_CONTROLLER_RESOURCE: &str = "FindControllerResource";
pub const STEP_RESOLVE_DEPENDENCY: &str = "ResolveDependency";
pub const STEP_RESOLVE_DEPENDENCIES: &str = "ResolveDependencies";
pub const STEP_RECONCILE_CHILD: &str = "ReconcileChild";
pub const STEP_RECONCILE_CHILDREN: &str = "ReconcileChildren";
pub const STEP_END_RECONCILIATION: &str = "EndReconciliation";

pub const HASH_ANNOTATION: &str = "oaas.io/last-applied-hash";
pub const MANAGED_BY_ANNOTATION: &str = "oaas.io/managed-by";
