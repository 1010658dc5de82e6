use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ClientNotReady,
    FlagNotFound,
    MalformedFlag,
    UserNotSpecified,
    WrongType,
    Exception,
}

/// Explains how an evaluation arrived at its value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    Off,
    Fallthrough {
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        in_experiment: bool,
    },
    TargetMatch,
    RuleMatch {
        rule_index: usize,
        rule_id: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        in_experiment: bool,
    },
    PrerequisiteFailed {
        prerequisite_key: String,
    },
    Error {
        error_kind: ErrorKind,
    },
}

impl Reason {
    pub fn error(kind: ErrorKind) -> Reason {
        Reason::Error { error_kind: kind }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reason::Error { .. })
    }
}

/// The full result of evaluating one flag for one context.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalDetail<V> {
    pub value: V,
    pub variation_index: Option<usize>,
    pub reason: Reason,
}

impl<V> EvalDetail<V> {
    pub fn new(value: V, variation_index: Option<usize>, reason: Reason) -> EvalDetail<V> {
        EvalDetail {
            value,
            variation_index,
            reason,
        }
    }
}
