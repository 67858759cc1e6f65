//! Per-invocation and per-leaf results.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::error::RuleError;

/// The atomic outcome of a single evaluator invocation.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    /// Whether the invocation passed.
    pub success: bool,

    /// Failure message, empty on success.
    pub failure_message: String,

    /// Error the evaluator ran into, if any.
    pub error: Option<RuleError>,
}

impl EvaluationResult {
    /// A passing outcome.
    pub fn pass() -> Self {
        Self {
            success: true,
            failure_message: String::new(),
            error: None,
        }
    }

    /// A failing outcome with a message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            failure_message: message.into(),
            error: None,
        }
    }

    /// A failing outcome carrying the error that caused it.
    pub fn fail_with(error: RuleError) -> Self {
        Self {
            success: false,
            failure_message: error.to_string(),
            error: Some(error),
        }
    }
}

/// The outcome of evaluating one leaf, linked to the leaf evaluated just
/// before it in the same tree walk.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionResult {
    /// Name of the evaluated condition.
    pub condition_name: String,

    /// Declared context type name.
    pub context_type: String,

    /// Expression text of the condition.
    pub expression: String,

    /// Snapshot of the data the leaf evaluated, when one was resolved.
    pub data: Option<Value>,

    /// Evaluator the leaf asked for.
    pub evaluator: String,

    /// Whether the leaf passed.
    pub success: bool,

    /// Rendered failure message, empty on success.
    pub failure_message: String,

    /// Time spent inside the evaluator alone.
    pub evaluation_duration: Duration,

    /// Time from entering the leaf to emitting this result, including
    /// evaluator resolution and event construction.
    pub total_duration: Duration,

    /// Tenant the evaluation ran for.
    pub tenant: String,

    /// Result of the leaf evaluated immediately before this one, `None`
    /// for the first leaf of a walk.
    pub result_chain: Option<Box<ConditionResult>>,

    /// Errors captured during this leaf's evaluation, never thrown.
    pub errors: Vec<RuleError>,
}

impl ConditionResult {
    /// Walk the chain from this result back to the first leaf evaluated.
    pub fn chain(&self) -> ChainIter<'_> {
        ChainIter { next: Some(self) }
    }

    /// Number of leaves evaluated in this walk.
    pub fn evaluation_count(&self) -> usize {
        self.chain().count()
    }

    /// Sum of per-leaf total durations across the walk.
    pub fn chained_duration(&self) -> Duration {
        self.chain().map(|r| r.total_duration).sum()
    }

    /// Failure messages in evaluation order, oldest first, blanks skipped.
    pub fn chained_failure_messages(&self) -> Vec<String> {
        let mut messages: Vec<String> = self
            .chain()
            .filter(|r| !r.failure_message.is_empty())
            .map(|r| r.failure_message.clone())
            .collect();
        messages.reverse();
        messages
    }

    /// Captured errors in evaluation order, oldest first.
    pub fn chained_errors(&self) -> Vec<RuleError> {
        let mut errors: Vec<RuleError> = self
            .chain()
            .flat_map(|r| r.errors.iter().rev().cloned())
            .collect();
        errors.reverse();
        errors
    }
}

/// Iterator over a result chain, most recent first.
pub struct ChainIter<'a> {
    next: Option<&'a ConditionResult>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a ConditionResult;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.result_chain.as_deref();
        Some(current)
    }
}
