//! Leaf condition descriptors.
//!
//! A [`Condition<T>`] is an atomic, named, typed predicate over a data
//! context of type `T`. Conditions are immutable once built: construction
//! validates the name, compiles the expression for `LambdaPredicate`
//! conditions, and fails rather than producing a half-formed leaf.
//!
//! Trees erase the context type behind the [`LeafCondition`] trait so a
//! single [`BooleanCondition`](crate::tree::BooleanCondition) can mix
//! leaves over different data types.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::{ContextType, DataContext};
use crate::error::RuleError;
use crate::events::EventDescriptor;
use crate::expression::{CompiledPredicate, ExpressionCompiler, PredicateCompiler};

/// Evaluator name used when a condition does not declare one.
pub const DEFAULT_EVALUATOR: &str = "N/A";

/// Failure message used when a condition does not declare one.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Condition failed";

/// How a condition's expression text is meant to be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionKind {
    /// The expression is predicate source in the built-in dialect,
    /// compiled at construction time.
    LambdaPredicate,

    /// The expression is free-form text interpreted by a named custom
    /// evaluator.
    CustomExpression,
}

/// Host-supplied predicate over a typed context.
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

enum LeafLogic<T> {
    Compiled(CompiledPredicate),
    Native(Predicate<T>),
    Custom,
}

impl<T> Clone for LeafLogic<T> {
    fn clone(&self) -> Self {
        match self {
            LeafLogic::Compiled(p) => LeafLogic::Compiled(p.clone()),
            LeafLogic::Native(f) => LeafLogic::Native(Arc::clone(f)),
            LeafLogic::Custom => LeafLogic::Custom,
        }
    }
}

/// An atomic predicate descriptor over a context of type `T`.
pub struct Condition<T> {
    name: String,
    expression: String,
    kind: ConditionKind,
    evaluator: String,
    failure_message: String,
    metadata: BTreeMap<String, String>,
    event: Option<EventDescriptor>,
    logic: LeafLogic<T>,
    context_type: ContextType,
    _marker: PhantomData<fn(&T) -> bool>,
}

impl<T: 'static> Condition<T> {
    /// Build a `LambdaPredicate` condition, compiling the expression with
    /// the default dialect. Fails on a blank name, a blank expression, or
    /// an expression that does not compile.
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Result<Self, RuleError> {
        Self::with_compiler(name, expression, &ExpressionCompiler)
    }

    /// Build a `LambdaPredicate` condition with a caller-supplied compiler.
    pub fn with_compiler(
        name: impl Into<String>,
        expression: impl Into<String>,
        compiler: &dyn PredicateCompiler,
    ) -> Result<Self, RuleError> {
        let name = validated_name(name)?;
        let expression = validated_expression(expression, &name)?;
        let predicate = compiler.compile(&expression)?;
        Ok(Self::assemble(
            name,
            expression,
            ConditionKind::LambdaPredicate,
            LeafLogic::Compiled(predicate),
        ))
    }

    /// Build a `LambdaPredicate` condition from a host closure. The
    /// expression text is carried for diagnostics and the wire format; a
    /// round-tripped copy is recompiled from it.
    pub fn from_predicate(
        name: impl Into<String>,
        expression: impl Into<String>,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Result<Self, RuleError> {
        let name = validated_name(name)?;
        let expression = validated_expression(expression, &name)?;
        Ok(Self::assemble(
            name,
            expression,
            ConditionKind::LambdaPredicate,
            LeafLogic::Native(Arc::new(predicate)),
        ))
    }

    /// Build a `CustomExpression` condition whose text is interpreted by
    /// the named evaluator.
    pub fn custom(
        name: impl Into<String>,
        expression: impl Into<String>,
        evaluator: impl Into<String>,
    ) -> Result<Self, RuleError> {
        let name = validated_name(name)?;
        let expression = validated_expression(expression, &name)?;
        let mut condition = Self::assemble(
            name,
            expression,
            ConditionKind::CustomExpression,
            LeafLogic::Custom,
        );
        condition.evaluator = evaluator.into();
        Ok(condition)
    }

    fn assemble(
        name: String,
        expression: String,
        kind: ConditionKind,
        logic: LeafLogic<T>,
    ) -> Self {
        Self {
            name,
            expression,
            kind,
            evaluator: DEFAULT_EVALUATOR.to_string(),
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
            metadata: BTreeMap::new(),
            event: None,
            logic,
            context_type: ContextType::of::<T>(),
            _marker: PhantomData,
        }
    }

    /// Replace the evaluator name.
    pub fn with_evaluator(mut self, evaluator: impl Into<String>) -> Self {
        self.evaluator = evaluator.into();
        self
    }

    /// Replace the failure-message template. The template may embed
    /// `@{property.path}` tokens substituted from the data snapshot.
    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    /// Add one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach an event descriptor.
    pub fn with_event(mut self, event: EventDescriptor) -> Self {
        self.event = Some(event);
        self
    }
}

impl<T> Clone for Condition<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            expression: self.expression.clone(),
            kind: self.kind,
            evaluator: self.evaluator.clone(),
            failure_message: self.failure_message.clone(),
            metadata: self.metadata.clone(),
            event: self.event.clone(),
            logic: self.logic.clone(),
            context_type: self.context_type,
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Condition<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Condition")
            .field("name", &self.name)
            .field("context_type", &self.context_type.name())
            .field("expression", &self.expression)
            .field("kind", &self.kind)
            .field("evaluator", &self.evaluator)
            .finish()
    }
}

fn validated_name(name: impl Into<String>) -> Result<String, RuleError> {
    let name = name.into().trim().to_string();
    if name.is_empty() {
        return Err(RuleError::InvalidCondition(
            "condition name must not be empty".to_string(),
        ));
    }
    Ok(name)
}

fn validated_expression(expression: impl Into<String>, name: &str) -> Result<String, RuleError> {
    let expression = expression.into();
    if expression.trim().is_empty() {
        return Err(RuleError::MissingExpression {
            condition: name.to_string(),
        });
    }
    Ok(expression)
}

/// Type-erased view of a [`Condition<T>`], the form leaves take inside a
/// tree.
pub trait LeafCondition: Send + Sync {
    /// Condition name, unique within a tree.
    fn name(&self) -> &str;

    /// Declared context type.
    fn context_type(&self) -> ContextType;

    /// Expression text.
    fn expression(&self) -> &str;

    /// How the expression is executed.
    fn kind(&self) -> ConditionKind;

    /// Name of the evaluator that must run this leaf.
    fn evaluator_name(&self) -> &str;

    /// Failure-message template.
    fn failure_message(&self) -> &str;

    /// Additional metadata.
    fn metadata(&self) -> &BTreeMap<String, String>;

    /// Attached event descriptor, if any.
    fn event(&self) -> Option<&EventDescriptor>;

    /// Run the compiled predicate against a resolved data context.
    fn apply(&self, data: &DataContext) -> Result<bool, RuleError>;

    /// Reconstruct an independent copy of this leaf.
    fn clone_leaf(&self) -> Result<Arc<dyn LeafCondition>, RuleError>;
}

impl<T: 'static> LeafCondition for Condition<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn context_type(&self) -> ContextType {
        self.context_type
    }

    fn expression(&self) -> &str {
        &self.expression
    }

    fn kind(&self) -> ConditionKind {
        self.kind
    }

    fn evaluator_name(&self) -> &str {
        &self.evaluator
    }

    fn failure_message(&self) -> &str {
        &self.failure_message
    }

    fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    fn event(&self) -> Option<&EventDescriptor> {
        self.event.as_ref()
    }

    fn apply(&self, data: &DataContext) -> Result<bool, RuleError> {
        match &self.logic {
            LeafLogic::Compiled(predicate) => Ok(predicate.evaluate(data.snapshot())),
            LeafLogic::Native(predicate) => match data.downcast_ref::<T>() {
                Some(value) => Ok(predicate(value)),
                None => Err(RuleError::DataContextNotFound {
                    condition: self.name.clone(),
                }),
            },
            LeafLogic::Custom => Err(RuleError::MissingPredicate {
                condition: self.name.clone(),
            }),
        }
    }

    fn clone_leaf(&self) -> Result<Arc<dyn LeafCondition>, RuleError> {
        Ok(Arc::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TriggerPolicy;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Customer {
        age: u32,
    }

    #[test]
    fn test_construction_compiles_expression() {
        let condition = Condition::<Customer>::new("IsAdult", "age >= 18").unwrap();
        assert_eq!(condition.name(), "IsAdult");
        assert_eq!(condition.kind(), ConditionKind::LambdaPredicate);
        assert_eq!(condition.evaluator_name(), DEFAULT_EVALUATOR);

        let data = DataContext::new(Customer { age: 20 }).unwrap();
        assert!(condition.apply(&data).unwrap());

        let data = DataContext::new(Customer { age: 12 }).unwrap();
        assert!(!condition.apply(&data).unwrap());
    }

    #[test]
    fn test_construction_fails_on_bad_expression() {
        let result = Condition::<Customer>::new("IsAdult", "age >=");
        assert!(matches!(result, Err(RuleError::Expression(_))));
    }

    #[test]
    fn test_name_is_trimmed_and_required() {
        let condition = Condition::<Customer>::new("  IsAdult  ", "age >= 18").unwrap();
        assert_eq!(condition.name(), "IsAdult");

        let result = Condition::<Customer>::new("   ", "age >= 18");
        assert!(matches!(result, Err(RuleError::InvalidCondition(_))));
    }

    #[test]
    fn test_blank_expression_rejected() {
        let result = Condition::<Customer>::new("IsAdult", "  ");
        assert!(matches!(
            result,
            Err(RuleError::MissingExpression { condition }) if condition == "IsAdult"
        ));
    }

    #[test]
    fn test_native_predicate() {
        let condition =
            Condition::<Customer>::from_predicate("IsAdult", "age >= 18", |c| c.age >= 18)
                .unwrap();
        let data = DataContext::new(Customer { age: 30 }).unwrap();
        assert!(condition.apply(&data).unwrap());
    }

    #[test]
    fn test_custom_condition_has_no_predicate() {
        let condition =
            Condition::<Customer>::custom("Loyalty", "tier in gold,platinum", "LoyaltyEvaluator")
                .unwrap();
        assert_eq!(condition.kind(), ConditionKind::CustomExpression);
        assert_eq!(condition.evaluator_name(), "LoyaltyEvaluator");

        let data = DataContext::new(Customer { age: 30 }).unwrap();
        assert!(matches!(
            condition.apply(&data),
            Err(RuleError::MissingPredicate { .. })
        ));
    }

    #[test]
    fn test_builder_setters() {
        let condition = Condition::<Customer>::new("IsAdult", "age >= 18")
            .unwrap()
            .with_failure_message("customer is @{age}")
            .with_evaluator("AgeEvaluator")
            .with_metadata("owner", "risk-team")
            .with_event(EventDescriptor::new("AdultVerified", TriggerPolicy::OnSuccess));

        assert_eq!(condition.failure_message(), "customer is @{age}");
        assert_eq!(condition.evaluator_name(), "AgeEvaluator");
        assert_eq!(condition.metadata().get("owner").unwrap(), "risk-team");
        assert_eq!(condition.event().unwrap().event_type, "AdultVerified");
    }
}
