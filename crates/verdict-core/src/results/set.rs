//! Per-set results.

use std::time::Duration;

use serde::Serialize;

use crate::error::RuleError;
use crate::results::ConditionResult;

/// Precedence string reported when no printer was supplied.
pub const NO_PRECEDENCE: &str = "N/A";

/// The outcome of evaluating one condition set.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionSetResult<V> {
    /// Name of the evaluated set.
    pub set_name: String,

    /// The set's declared success value, reported regardless of outcome.
    pub value: V,

    /// Outcome of the set's final evaluated leaf.
    pub success: bool,

    /// Number of leaves evaluated.
    pub evaluation_count: usize,

    /// Sum of per-leaf total durations.
    pub total_duration: Duration,

    /// Parenthesized rendering of the set's tree, `"N/A"` when no printer
    /// was supplied, or an error string when the printer failed.
    pub precedence: String,

    /// Final leaf result; earlier leaves hang off its chain.
    pub results: Option<Box<ConditionResult>>,

    /// Failure messages across the walk, oldest first.
    pub failure_messages: Vec<String>,

    /// Captured errors across the walk, oldest first.
    pub errors: Vec<RuleError>,

    previous: Option<Box<ConditionSetResult<V>>>,
}

impl<V> ConditionSetResult<V> {
    /// Aggregate a finished tree walk into a set result.
    pub(crate) fn aggregate(
        set_name: impl Into<String>,
        value: V,
        precedence: String,
        head: ConditionResult,
    ) -> Self {
        Self {
            set_name: set_name.into(),
            value,
            success: head.success,
            evaluation_count: head.evaluation_count(),
            total_duration: head.chained_duration(),
            precedence,
            failure_messages: head.chained_failure_messages(),
            errors: head.chained_errors(),
            results: Some(Box::new(head)),
            previous: None,
        }
    }

    /// Result of the set evaluated before this one within the same rule,
    /// if any.
    pub fn previous(&self) -> Option<&ConditionSetResult<V>> {
        self.previous.as_deref()
    }

    /// Link this result onto the one evaluated before it. Only the rule
    /// evaluator stitches set chains.
    pub(crate) fn set_previous(&mut self, previous: ConditionSetResult<V>) {
        self.previous = Some(Box::new(previous));
    }

    /// Walk the set chain from this result back to the first set
    /// evaluated.
    pub fn chain(&self) -> SetChainIter<'_, V> {
        SetChainIter { next: Some(self) }
    }
}

/// Iterator over a set-result chain, most recent first.
pub struct SetChainIter<'a, V> {
    next: Option<&'a ConditionSetResult<V>>,
}

impl<'a, V> Iterator for SetChainIter<'a, V> {
    type Item = &'a ConditionSetResult<V>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.previous.as_deref();
        Some(current)
    }
}
