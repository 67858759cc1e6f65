//! The boolean condition tree and its evaluation protocol.
//!
//! A [`BooleanCondition`] is a closed sum of `And`, `Or`, and `Leaf`
//! nodes. Composition never mutates: `and`/`or` allocate a new node over
//! the operands. Evaluation is strictly sequential and depth-first with
//! short-circuiting, and every evaluated leaf links its result to the one
//! evaluated immediately before it, so walking the final result's chain
//! replays the walk in reverse.
//!
//! A leaf never raises out of `evaluate`: missing data, a missing
//! evaluator, an evaluator error, or an observed cancellation all become a
//! failed [`ConditionResult`] carrying the error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::condition::{Condition, LeafCondition};
use crate::context::ConditionData;
use crate::error::RuleError;
use crate::evaluator::{CancellationToken, EvaluatorResolver};
use crate::events::{EventPublisher, RuleEvent};
use crate::message;
use crate::results::ConditionResult;

/// A node of a condition tree.
#[derive(Clone)]
pub enum BooleanCondition {
    And(Box<BooleanCondition>, Box<BooleanCondition>),
    Or(Box<BooleanCondition>, Box<BooleanCondition>),
    Leaf(Arc<dyn LeafCondition>),
}

impl BooleanCondition {
    /// Conjoin: the right operand runs only if this one succeeds.
    pub fn and(self, right: impl Into<BooleanCondition>) -> Self {
        BooleanCondition::And(Box::new(self), Box::new(right.into()))
    }

    /// Disjoin: the right operand runs only if this one fails.
    pub fn or(self, right: impl Into<BooleanCondition>) -> Self {
        BooleanCondition::Or(Box::new(self), Box::new(right.into()))
    }

    /// Evaluate this subtree, chaining onto `previous`.
    ///
    /// The returned result is the subtree's decisive leaf result; its
    /// [`result_chain`](ConditionResult::result_chain) links every leaf
    /// evaluated before it, most recent first.
    pub fn evaluate(
        &self,
        resolver: &dyn EvaluatorResolver,
        data: &ConditionData,
        publisher: Option<&dyn EventPublisher>,
        previous: Option<ConditionResult>,
        cancel: Option<&CancellationToken>,
    ) -> ConditionResult {
        match self {
            BooleanCondition::And(left, right) => {
                let left_result = left.evaluate(resolver, data, publisher, previous, cancel);
                if !left_result.success {
                    return left_result;
                }
                right.evaluate(resolver, data, publisher, Some(left_result), cancel)
            }
            BooleanCondition::Or(left, right) => {
                let left_result = left.evaluate(resolver, data, publisher, previous, cancel);
                if left_result.success {
                    return left_result;
                }
                right.evaluate(resolver, data, publisher, Some(left_result), cancel)
            }
            BooleanCondition::Leaf(leaf) => {
                evaluate_leaf(leaf.as_ref(), resolver, data, publisher, previous, cancel)
            }
        }
    }

    /// Reconstruct a structurally identical, fully independent tree.
    pub fn deep_clone(&self) -> Result<BooleanCondition, RuleError> {
        match self {
            BooleanCondition::And(left, right) => Ok(BooleanCondition::And(
                Box::new(left.deep_clone()?),
                Box::new(right.deep_clone()?),
            )),
            BooleanCondition::Or(left, right) => Ok(BooleanCondition::Or(
                Box::new(left.deep_clone()?),
                Box::new(right.deep_clone()?),
            )),
            BooleanCondition::Leaf(leaf) => leaf
                .clone_leaf()
                .map(BooleanCondition::Leaf)
                .map_err(|e| RuleError::InvalidNode(e.to_string())),
        }
    }
}

impl<T: 'static> From<Condition<T>> for BooleanCondition {
    fn from(condition: Condition<T>) -> Self {
        BooleanCondition::Leaf(Arc::new(condition))
    }
}

impl std::fmt::Debug for BooleanCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BooleanCondition::And(l, r) => f.debug_tuple("And").field(l).field(r).finish(),
            BooleanCondition::Or(l, r) => f.debug_tuple("Or").field(l).field(r).finish(),
            BooleanCondition::Leaf(leaf) => f.debug_tuple("Leaf").field(&leaf.name()).finish(),
        }
    }
}

fn evaluate_leaf(
    leaf: &dyn LeafCondition,
    resolver: &dyn EvaluatorResolver,
    data: &ConditionData,
    publisher: Option<&dyn EventPublisher>,
    previous: Option<ConditionResult>,
    cancel: Option<&CancellationToken>,
) -> ConditionResult {
    let started = Instant::now();
    let tenant = data.tenant().to_string();

    // Cancellation aborts the leaf before any work, including data
    // resolution.
    if cancel.is_some_and(CancellationToken::is_cancelled) {
        return failed_leaf(leaf, None, tenant, RuleError::Cancelled, previous, started);
    }

    let Some(context) = data.resolve(leaf.name(), leaf.context_type()) else {
        let error = RuleError::DataContextNotFound {
            condition: leaf.name().to_string(),
        };
        return failed_leaf(leaf, None, tenant, error, previous, started);
    };
    let snapshot = context.snapshot().clone();

    let Some(evaluator) = resolver.resolve(leaf.evaluator_name(), leaf.context_type()) else {
        let error = RuleError::EvaluatorNotFound {
            evaluator: leaf.evaluator_name().to_string(),
            context_type: leaf.context_type().name().to_string(),
        };
        return failed_leaf(leaf, Some(snapshot), tenant, error, previous, started);
    };

    let evaluation_started = Instant::now();
    let outcome = evaluator.evaluate(leaf, context);
    let evaluation_duration = evaluation_started.elapsed();

    let mut errors = Vec::new();
    if let Some(error) = outcome.error {
        errors.push(error);
    }

    let failure_message = if outcome.success {
        String::new()
    } else if !outcome.failure_message.is_empty() {
        outcome.failure_message
    } else {
        message::render(leaf.failure_message(), Some(&snapshot))
    };

    if let (Some(descriptor), Some(publisher)) = (leaf.event(), publisher) {
        if descriptor.trigger.matches(outcome.success) {
            match RuleEvent::new(
                descriptor,
                leaf.name(),
                outcome.success,
                failure_message.clone(),
                &tenant,
                Some(snapshot.clone()),
            ) {
                Ok(event) => publisher.publish(event),
                Err(error) => {
                    warn!(condition = leaf.name(), %error, "event construction failed");
                    errors.push(error);
                }
            }
        }
    }

    trace!(
        condition = leaf.name(),
        success = outcome.success,
        "condition evaluated"
    );

    ConditionResult {
        condition_name: leaf.name().to_string(),
        context_type: leaf.context_type().name().to_string(),
        expression: leaf.expression().to_string(),
        data: Some(snapshot),
        evaluator: leaf.evaluator_name().to_string(),
        success: outcome.success,
        failure_message,
        evaluation_duration,
        total_duration: started.elapsed(),
        tenant,
        result_chain: previous.map(Box::new),
        errors,
    }
}

fn failed_leaf(
    leaf: &dyn LeafCondition,
    data: Option<serde_json::Value>,
    tenant: String,
    error: RuleError,
    previous: Option<ConditionResult>,
    started: Instant,
) -> ConditionResult {
    ConditionResult {
        condition_name: leaf.name().to_string(),
        context_type: leaf.context_type().name().to_string(),
        expression: leaf.expression().to_string(),
        data,
        evaluator: leaf.evaluator_name().to_string(),
        success: false,
        failure_message: error.to_string(),
        evaluation_duration: Duration::ZERO,
        total_duration: started.elapsed(),
        tenant,
        result_chain: previous.map(Box::new),
        errors: vec![error],
    }
}
