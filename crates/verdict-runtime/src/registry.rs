//! Evaluator registration and resolution.
//!
//! Leaves name the evaluator that must run them; this registry maps those
//! names to instances. An evaluator may be registered for one concrete
//! context type or for any type under its name alone; typed entries win.
//! The registry is built once at startup and shared read-only across
//! concurrent evaluations.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;
use verdict_core::{
    ContextType, Evaluator, EvaluatorResolver, PredicateEvaluator, DEFAULT_EVALUATOR,
};

/// Registry of named evaluators.
#[derive(Default)]
pub struct EvaluatorRegistry {
    typed: BTreeMap<(String, TypeId), Arc<dyn Evaluator>>,
    named: BTreeMap<String, Arc<dyn Evaluator>>,
}

impl EvaluatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in predicate evaluator registered under
    /// the default evaluator name.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_EVALUATOR, Arc::new(PredicateEvaluator));
        registry
    }

    /// Register an evaluator for any context type.
    ///
    /// A later registration under the same name replaces the earlier one.
    pub fn register(&mut self, name: impl Into<String>, evaluator: Arc<dyn Evaluator>) {
        self.named.insert(name.into(), evaluator);
    }

    /// Register an evaluator for one concrete context type. Typed entries
    /// take precedence over same-named untyped ones.
    pub fn register_for<T: 'static>(
        &mut self,
        name: impl Into<String>,
        evaluator: Arc<dyn Evaluator>,
    ) {
        self.typed.insert((name.into(), TypeId::of::<T>()), evaluator);
    }

    /// Whether any evaluator is registered under this name.
    pub fn has_evaluator(&self, name: &str) -> bool {
        self.named.contains_key(name) || self.typed.keys().any(|(n, _)| n == name)
    }

    /// Registered evaluator names, typed and untyped.
    pub fn available(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .named
            .keys()
            .map(String::as_str)
            .chain(self.typed.keys().map(|(n, _)| n.as_str()))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl EvaluatorResolver for EvaluatorRegistry {
    fn resolve(&self, name: &str, context_type: ContextType) -> Option<Arc<dyn Evaluator>> {
        let resolved = self
            .typed
            .get(&(name.to_string(), context_type.id()))
            .or_else(|| self.named.get(name))
            .cloned();
        if resolved.is_none() {
            debug!(evaluator = name, context = %context_type, "evaluator not found");
        }
        resolved
    }
}

impl std::fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatorRegistry")
            .field("evaluators", &self.available())
            .finish()
    }
}
