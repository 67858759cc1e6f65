//! Evaluator contracts and evaluation inputs.
//!
//! The engine never executes leaf logic itself: each leaf names an
//! evaluator, the caller supplies an [`EvaluatorResolver`], and the
//! resolved [`Evaluator`] produces the atomic
//! [`EvaluationResult`](crate::results::EvaluationResult). A resolver
//! that returns `None` becomes a captured condition failure, never a
//! thrown error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::condition::LeafCondition;
use crate::context::{ConditionData, ContextType, DataContext};
use crate::error::RuleError;
use crate::events::EventPublisher;
use crate::printer::PrecedencePrinter;
use crate::results::EvaluationResult;

/// Executes one leaf against one resolved data context.
///
/// Implementations must be safe to share across concurrent evaluations;
/// the engine resolves once per leaf per evaluation and holds no other
/// state.
pub trait Evaluator: Send + Sync {
    /// Run the leaf's logic. Errors are reported inside the returned
    /// result, not thrown.
    fn evaluate(&self, leaf: &dyn LeafCondition, data: &DataContext) -> EvaluationResult;
}

/// Resolves an evaluator by name and declared context type.
///
/// Any `Fn(&str, ContextType) -> Option<Arc<dyn Evaluator>>` is a
/// resolver, so tests and small hosts can pass a closure.
pub trait EvaluatorResolver: Send + Sync {
    /// Look up the evaluator for a leaf. `None` means the leaf fails with
    /// a captured error.
    fn resolve(&self, name: &str, context_type: ContextType) -> Option<Arc<dyn Evaluator>>;
}

impl<F> EvaluatorResolver for F
where
    F: Fn(&str, ContextType) -> Option<Arc<dyn Evaluator>> + Send + Sync,
{
    fn resolve(&self, name: &str, context_type: ContextType) -> Option<Arc<dyn Evaluator>> {
        self(name, context_type)
    }
}

/// Built-in evaluator that runs a leaf's compiled predicate.
///
/// A failing predicate yields an empty message so the leaf's own
/// failure-message template applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredicateEvaluator;

impl Evaluator for PredicateEvaluator {
    fn evaluate(&self, leaf: &dyn LeafCondition, data: &DataContext) -> EvaluationResult {
        match leaf.apply(data) {
            Ok(true) => EvaluationResult::pass(),
            Ok(false) => EvaluationResult::fail(""),
            Err(error) => EvaluationResult::fail_with(error),
        }
    }
}

/// Cooperative cancellation flag checked before each leaf runs.
///
/// Cancellation aborts the in-flight leaf with a captured
/// [`RuleError::Cancelled`] outcome; it never panics or tears down the
/// walk.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Everything a set or rule evaluation may be given.
///
/// Only the resolver and the data are required, and only at the point a
/// non-disabled rule or a set actually validates them; a disabled rule
/// evaluates against a completely empty context.
#[derive(Default, Clone, Copy)]
pub struct EvaluationContext<'a> {
    resolver: Option<&'a dyn EvaluatorResolver>,
    data: Option<&'a ConditionData>,
    publisher: Option<&'a dyn EventPublisher>,
    printer: Option<&'a dyn PrecedencePrinter>,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply the evaluator resolver.
    pub fn with_resolver(mut self, resolver: &'a dyn EvaluatorResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Supply the condition data.
    pub fn with_data(mut self, data: &'a ConditionData) -> Self {
        self.data = Some(data);
        self
    }

    /// Supply an event publisher. Without one, matching event descriptors
    /// are silently skipped.
    pub fn with_publisher(mut self, publisher: &'a dyn EventPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Supply a precedence printer for set diagnostics.
    pub fn with_printer(mut self, printer: &'a dyn PrecedencePrinter) -> Self {
        self.printer = Some(printer);
        self
    }

    /// Supply a cancellation token.
    pub fn with_cancel(mut self, cancel: &'a CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(crate) fn resolver(&self) -> Result<&'a dyn EvaluatorResolver, RuleError> {
        self.resolver.ok_or(RuleError::MissingResolver)
    }

    pub(crate) fn data(&self) -> Result<&'a ConditionData, RuleError> {
        self.data.ok_or(RuleError::NoConditionData)
    }

    pub(crate) fn publisher(&self) -> Option<&'a dyn EventPublisher> {
        self.publisher
    }

    pub(crate) fn printer(&self) -> Option<&'a dyn PrecedencePrinter> {
        self.printer
    }

    pub(crate) fn cancellation(&self) -> Option<&'a CancellationToken> {
        self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Customer {
        age: u32,
    }

    #[test]
    fn test_predicate_evaluator_maps_outcomes() {
        let condition = Condition::<Customer>::new("IsAdult", "age >= 18").unwrap();
        let adult = DataContext::new(Customer { age: 30 }).unwrap();
        let minor = DataContext::new(Customer { age: 10 }).unwrap();

        let result = PredicateEvaluator.evaluate(&condition, &adult);
        assert!(result.success);

        let result = PredicateEvaluator.evaluate(&condition, &minor);
        assert!(!result.success);
        assert!(result.failure_message.is_empty());
        assert!(result.error.is_none());
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |name: &str, _context: ContextType| -> Option<Arc<dyn Evaluator>> {
            (name == "N/A").then(|| Arc::new(PredicateEvaluator) as Arc<dyn Evaluator>)
        };
        assert!(resolver.resolve("N/A", ContextType::of::<Customer>()).is_some());
        assert!(resolver.resolve("Other", ContextType::of::<Customer>()).is_none());
    }

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        let shared = token.clone();
        shared.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_context_validation() {
        let context = EvaluationContext::new();
        assert!(matches!(context.resolver(), Err(RuleError::MissingResolver)));
        assert!(matches!(context.data(), Err(RuleError::NoConditionData)));
        assert!(context.cancellation().is_none());
    }
}
