//! Result records produced by evaluation.
//!
//! One [`EvaluationResult`] per evaluator invocation, one
//! [`ConditionResult`] per leaf, one [`ConditionSetResult`] per set, one
//! [`RuleResult`] per rule. Each layer links back to what ran before it,
//! so the full diagnostic trail survives aggregation.

mod condition;
mod rule;
mod set;

pub use condition::{ChainIter, ConditionResult, EvaluationResult};
pub use rule::RuleResult;
pub use set::{ConditionSetResult, SetChainIter, NO_PRECEDENCE};
