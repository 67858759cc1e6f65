//! Per-rule results.

use std::time::Duration;

use serde::Serialize;

use crate::error::RuleError;
use crate::results::ConditionSetResult;

/// The outcome of evaluating one rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleResult<V> {
    /// Name of the evaluated rule.
    pub rule_name: String,

    /// Overall outcome: the outcome of the last set evaluated, or `true`
    /// for a disabled rule.
    pub success: bool,

    /// The rule's declared failure value.
    pub failure_value: V,

    /// Name of the last set evaluated, empty when none ran.
    pub final_set_name: String,

    /// Value of the last set evaluated, when one ran.
    pub final_set_value: Option<V>,

    /// Tenant the rule is declared for.
    pub tenant: String,

    /// Wall-clock time from entering the rule to completion.
    pub total_duration: Duration,

    /// Total leaves evaluated across all evaluated sets.
    pub evaluation_count: usize,

    /// Whether the rule was disabled and short-circuited.
    pub disabled: bool,

    /// Failure messages across all evaluated sets, oldest first.
    pub failure_messages: Vec<String>,

    /// Captured errors across all evaluated sets, oldest first.
    pub errors: Vec<RuleError>,

    /// Result of the last set evaluated; earlier sets hang off its chain.
    pub set_results: Option<Box<ConditionSetResult<V>>>,

    previous: Option<Box<RuleResult<V>>>,
}

impl<V: Clone> RuleResult<V> {
    /// Short-circuit result for a disabled rule: successful, zero
    /// evaluations, the failure value as payload.
    pub(crate) fn disabled(
        rule_name: impl Into<String>,
        failure_value: V,
        tenant: impl Into<String>,
        total_duration: Duration,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            success: true,
            failure_value,
            final_set_name: String::new(),
            final_set_value: None,
            tenant: tenant.into(),
            total_duration,
            evaluation_count: 0,
            disabled: true,
            failure_messages: Vec::new(),
            errors: Vec::new(),
            set_results: None,
            previous: None,
        }
    }

    /// Aggregate a finished set chain into a rule result.
    pub(crate) fn aggregate(
        rule_name: impl Into<String>,
        failure_value: V,
        tenant: impl Into<String>,
        total_duration: Duration,
        head: ConditionSetResult<V>,
    ) -> Self {
        let mut failure_messages = Vec::new();
        let mut errors = Vec::new();
        let mut evaluation_count = 0;
        // The chain iterates most recent first; aggregates must read
        // oldest first.
        let mut sets: Vec<&ConditionSetResult<V>> = head.chain().collect();
        sets.reverse();
        for set in sets {
            failure_messages.extend(set.failure_messages.iter().cloned());
            errors.extend(set.errors.iter().cloned());
            evaluation_count += set.evaluation_count;
        }
        Self {
            rule_name: rule_name.into(),
            success: head.success,
            failure_value,
            final_set_name: head.set_name.clone(),
            final_set_value: Some(head.value.clone()),
            tenant: tenant.into(),
            total_duration,
            evaluation_count,
            disabled: false,
            failure_messages,
            errors,
            set_results: Some(Box::new(head)),
            previous: None,
        }
    }

    /// The value this evaluation resolves to: the final set's value on
    /// success, the rule's failure value otherwise.
    pub fn result_value(&self) -> &V {
        if self.success {
            self.final_set_value.as_ref().unwrap_or(&self.failure_value)
        } else {
            &self.failure_value
        }
    }

    /// Result of a previous, separately evaluated rule this one was
    /// explicitly chained onto.
    pub fn previous(&self) -> Option<&RuleResult<V>> {
        self.previous.as_deref()
    }

    /// Chain this result onto an earlier rule evaluation. The engine never
    /// sets this; it exists for callers stitching multi-rule flows.
    pub fn chain_previous(&mut self, previous: RuleResult<V>) {
        self.previous = Some(Box::new(previous));
    }

    /// Append an error captured after aggregation, e.g. a failed
    /// rule-level event construction.
    pub(crate) fn push_error(&mut self, error: RuleError) {
        self.errors.push(error);
    }
}
