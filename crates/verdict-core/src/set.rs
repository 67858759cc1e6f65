//! Condition sets: a tree plus the value a rule earns when it passes.

use tracing::debug;

use crate::error::RuleError;
use crate::evaluator::EvaluationContext;
use crate::results::{ConditionSetResult, NO_PRECEDENCE};
use crate::tree::BooleanCondition;

/// A named boolean tree with a success value.
#[derive(Debug, Clone)]
pub struct ConditionSet<V> {
    name: String,
    value: V,
    root: BooleanCondition,
}

impl<V: Clone> ConditionSet<V> {
    /// Build a set over a tree. Rejects a blank name.
    pub fn new(
        name: impl Into<String>,
        value: V,
        root: impl Into<BooleanCondition>,
    ) -> Result<Self, RuleError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(RuleError::InvalidCondition(
                "condition set name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name,
            value,
            root: root.into(),
        })
    }

    /// Set name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value a rule resolves to when this set passes.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Root of the set's tree.
    pub fn root(&self) -> &BooleanCondition {
        &self.root
    }

    /// Evaluate the set's tree against the supplied data.
    ///
    /// Fails fast when the context lacks data or a resolver. Everything
    /// after validation is captured into the result: the precedence
    /// string is computed up front (a failing printer is stringified, a
    /// missing one reported as `"N/A"`), the tree is walked with
    /// short-circuiting, and the result aggregates the walk oldest-first.
    pub fn evaluate(
        &self,
        context: &EvaluationContext<'_>,
    ) -> Result<ConditionSetResult<V>, RuleError> {
        let data = context.data()?;
        let resolver = context.resolver()?;

        let precedence = match context.printer() {
            Some(printer) => printer
                .print(&self.root)
                .unwrap_or_else(|e| format!("unable to print precedence: {e}")),
            None => NO_PRECEDENCE.to_string(),
        };

        let head = self.root.evaluate(
            resolver,
            data,
            context.publisher(),
            None,
            context.cancellation(),
        );

        let result =
            ConditionSetResult::aggregate(&self.name, self.value.clone(), precedence, head);
        debug!(
            set = %self.name,
            success = result.success,
            evaluations = result.evaluation_count,
            "condition set evaluated"
        );
        Ok(result)
    }

    /// Reconstruct an independent copy, deep-cloning the tree.
    pub fn deep_clone(&self) -> Result<Self, RuleError> {
        Ok(Self {
            name: self.name.clone(),
            value: self.value.clone(),
            root: self.root.deep_clone()?,
        })
    }
}
