//! Error types for condition and rule evaluation.
//!
//! Variants are cloneable and serializable so they can be captured into
//! result records: evaluation-time failures of individual conditions are
//! recorded on the result rather than propagated, while validation and
//! decode failures surface to the caller as `Err`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the evaluation engine and the interchange codec.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleError {
    /// No condition data was supplied to a set or rule evaluation.
    #[error("no condition data was supplied")]
    NoConditionData,

    /// No evaluator resolver was supplied to a set or rule evaluation.
    #[error("no evaluator resolver was supplied")]
    MissingResolver,

    /// No data context matched a leaf, by owning-condition name or by
    /// declared context type.
    #[error("no data context found for condition '{condition}'")]
    DataContextNotFound { condition: String },

    /// The evaluator resolver returned nothing for a leaf.
    #[error("no evaluator '{evaluator}' registered for context type '{context_type}'")]
    EvaluatorNotFound {
        evaluator: String,
        context_type: String,
    },

    /// A leaf without a compiled predicate was asked to apply one.
    #[error("condition '{condition}' has no compiled predicate")]
    MissingPredicate { condition: String },

    /// A tree node could not be reconstructed during deep clone or decode.
    #[error("invalid boolean condition node: {0}")]
    InvalidNode(String),

    /// A condition or condition set descriptor is malformed.
    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    /// A leaf carries no expression text to evaluate.
    #[error("condition '{condition}' has no expression to evaluate")]
    MissingExpression { condition: String },

    /// The expression text could not be compiled.
    #[error("failed to compile expression: {0}")]
    Expression(String),

    /// A stored context type name did not resolve against the type registry.
    #[error("context type '{0}' is not registered")]
    UnknownContextType(String),

    /// A stored event type name did not resolve against the type registry.
    #[error("event type '{0}' is not registered")]
    UnknownEventType(String),

    /// A stored value type name did not match the requested rule value type.
    #[error("value type '{0}' is not registered or does not match")]
    UnknownValueType(String),

    /// A decoded rule carries no condition sets.
    #[error("rule '{rule}' has no condition sets")]
    MissingConditionSets { rule: String },

    /// An event could not be constructed or handed to the publisher.
    #[error("failed to raise event '{event}': {reason}")]
    EventDispatch { event: String, reason: String },

    /// A data context or value failed to serialize to JSON.
    #[error("failed to serialize data: {0}")]
    Serialization(String),

    /// Any other failure while decoding a transport rule.
    #[error("failed to decode rule: {0}")]
    Decode(String),

    /// Evaluation was cancelled before the leaf ran.
    #[error("evaluation was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_display() {
        let err = RuleError::DataContextNotFound {
            condition: "IsAdult".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no data context found for condition 'IsAdult'"
        );

        let err = RuleError::UnknownContextType("acme::Customer".to_string());
        assert!(err.to_string().contains("acme::Customer"));
    }

    #[test]
    fn test_errors_are_cloneable() {
        let err = RuleError::Cancelled;
        let copy = err.clone();
        assert_eq!(err, copy);
    }
}
