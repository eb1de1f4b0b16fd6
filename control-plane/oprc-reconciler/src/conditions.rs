use chrono::Utc;

use crate::dictionary::{
    CONDITION_TYPE_READY, REASON_FINALIZING, REASON_RECONCILED,
    REASON_RECONCILING,
};
use crate::status::{Condition, ConditionStatus};

pub fn find_condition<'a>(
    conditions: &'a [Condition],
    type_: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Insert or update a condition keyed by its type. The transition time moves
/// only when the status flips. Returns true when anything changed.
pub fn set_condition(conditions: &mut Vec<Condition>, new: Condition) -> bool {
    let now = || Utc::now().to_rfc3339();
    let Some(idx) = conditions.iter().position(|c| c.type_ == new.type_) else {
        let mut new = new;
        if new.last_transition_time.is_none() {
            new.last_transition_time = Some(now());
        }
        conditions.push(new);
        return true;
    };

    let existing = &mut conditions[idx];
    let mut changed = false;
    if existing.status != new.status {
        existing.status = new.status;
        existing.last_transition_time =
            Some(new.last_transition_time.unwrap_or_else(now));
        changed = true;
    }
    if existing.reason != new.reason {
        existing.reason = new.reason;
        changed = true;
    }
    if existing.message != new.message {
        existing.message = new.message;
        changed = true;
    }
    if existing.observed_generation != new.observed_generation {
        existing.observed_generation = new.observed_generation;
        changed = true;
    }
    changed
}

pub fn remove_condition(conditions: &mut Vec<Condition>, type_: &str) -> bool {
    let before = conditions.len();
    conditions.retain(|c| c.type_ != type_);
    before != conditions.len()
}

/// Ready condition placed on a resource seen for the first time.
pub fn default_ready() -> Condition {
    Condition::new(CONDITION_TYPE_READY, ConditionStatus::False).with_reason(
        REASON_RECONCILING,
        "the resource is being reconciled for the first time",
    )
}

pub fn reconciling(generation: i64) -> Condition {
    Condition::new(CONDITION_TYPE_READY, ConditionStatus::False)
        .with_reason(REASON_RECONCILING, "the resource is being reconciled")
        .with_generation(generation)
}

pub fn finalizing(generation: i64) -> Condition {
    Condition::new(CONDITION_TYPE_READY, ConditionStatus::False)
        .with_reason(REASON_FINALIZING, "the resource is being finalized")
        .with_generation(generation)
}

pub fn reconciled(generation: i64) -> Condition {
    Condition::new(CONDITION_TYPE_READY, ConditionStatus::True)
        .with_reason(
            REASON_RECONCILED,
            "the resource reached the end of reconciliation",
        )
        .with_generation(generation)
}
