//! # verdict-core
//!
//! Typed condition/rule evaluation engine with a lossless JSON
//! interchange format.
//!
//! Callers build boolean trees of typed conditions, group them into
//! condition sets with short-circuit OR semantics, group sets into rules,
//! and evaluate rules against supplied data to get a typed pass/fail
//! result with a value, a diagnostic trail, and timing.
//!
//! ## Key Guarantees
//!
//! 1. **Short-circuiting**: an operand is never evaluated once its
//!    sibling has decided the outcome
//! 2. **Total leaves**: missing data, missing evaluators, evaluator
//!    errors, and cancellation become failed results, never panics or
//!    thrown errors
//! 3. **Traceable**: every result links to the one evaluated before it,
//!    so the full walk can be replayed in reverse
//! 4. **Immutable**: descriptors and results never mutate after
//!    construction, which is what makes concurrent evaluation safe
//!    without locks
//!
//! ## Example
//!
//! ```rust,ignore
//! use verdict_core::{
//!     BooleanCondition, Condition, ConditionData, ConditionSet,
//!     EvaluationContext, Rule,
//! };
//!
//! let adult = Condition::<Customer>::new("IsAdult", "age >= 18")?;
//! let uk = Condition::<Customer>::new("IsUk", r#"country == "UK""#)?;
//! let set = ConditionSet::new("UkAdults", 0.15, BooleanCondition::from(adult).and(uk))?;
//! let rule = Rule::new("Discount", 0.0, set)?;
//!
//! let data = ConditionData::single(Customer { age: 20, country: "UK".into() })?;
//! let context = EvaluationContext::new()
//!     .with_resolver(&resolver)
//!     .with_data(&data);
//! let result = rule.evaluate(&context)?;
//!
//! assert!(result.success);
//! assert_eq!(*result.result_value(), 0.15);
//! ```

pub mod codec;
pub mod condition;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod expression;
pub mod message;
pub mod printer;
pub mod results;
pub mod rule;
pub mod set;
pub mod tree;

// Re-export main types at crate root
pub use codec::{
    rule_from_json, rule_from_yaml, rule_to_json, rule_to_yaml, TransportNode, TransportRule,
    TypeRegistry,
};
pub use condition::{
    Condition, ConditionKind, LeafCondition, Predicate, DEFAULT_EVALUATOR,
    DEFAULT_FAILURE_MESSAGE,
};
pub use context::{ConditionData, ContextType, DataContext, DEFAULT_TENANT};
pub use error::RuleError;
pub use evaluator::{
    CancellationToken, EvaluationContext, Evaluator, EvaluatorResolver, PredicateEvaluator,
};
pub use events::{EventDescriptor, EventPublisher, RuleEvent, TriggerPolicy};
pub use expression::{CompiledPredicate, ExpressionCompiler, PredicateCompiler};
pub use printer::{DefaultPrinter, PrecedencePrinter, PrintMode};
pub use results::{ConditionResult, ConditionSetResult, EvaluationResult, RuleResult};
pub use rule::{Rule, DEFAULT_LOCALE};
pub use set::ConditionSet;
pub use tree::BooleanCondition;
