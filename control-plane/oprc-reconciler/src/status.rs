use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::conditions::find_condition;
use crate::reference::ObjectReferenceList;

/// Status document maintained by the engine for a controller resource.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default, skip_serializing_if = "ObjectReferenceList::is_empty")]
    pub dependencies: ObjectReferenceList,
    #[serde(default, skip_serializing_if = "ObjectReferenceList::is_empty")]
    pub child_resources: ObjectReferenceList,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_step: Option<String>,
}

impl Status {
    /// Existing condition of the same type, or `default` when absent. The flag
    /// reports whether the default was used.
    pub fn find_or_default_condition(
        &self,
        default: Condition,
    ) -> (Condition, bool) {
        match find_condition(&self.conditions, &default.type_) {
            Some(existing) => (existing.clone(), false),
            None => (default, true),
        }
    }

    /// Status reporting a single Ready=True condition; the readiness used for
    /// resources that expose none.
    pub fn ready() -> Self {
        Status {
            conditions: vec![Condition::new(
                crate::dictionary::CONDITION_TYPE_READY,
                ConditionStatus::True,
            )],
            ..Default::default()
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn new(type_: &str, status: ConditionStatus) -> Self {
        Condition {
            type_: type_.to_string(),
            status,
            reason: None,
            message: None,
            observed_generation: None,
            last_transition_time: None,
        }
    }

    pub fn with_reason(mut self, reason: &str, message: &str) -> Self {
        self.reason = Some(reason.to_string());
        self.message = Some(message.to_string());
        self
    }

    pub fn with_generation(mut self, generation: i64) -> Self {
        self.observed_generation = Some(generation);
        self
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}
