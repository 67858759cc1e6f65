//! Decode-time type resolution.
//!
//! The wire format carries types as qualified name strings. Rust has no
//! way to conjure a generic instantiation from a name at runtime, so
//! decoding goes through a registry populated at startup: every context
//! type the application uses registers a factory that knows how to build
//! the concrete typed leaf, and value/event types register the names
//! decode is allowed to resolve. Lookup is by exact name first, then by
//! suffix match on the trailing qualified segment, so `"Customer"`
//! resolves against `"my_app::model::Customer"`.

use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::condition::{Condition, ConditionKind, LeafCondition};
use crate::context::ContextType;
use crate::error::RuleError;
use crate::events::EventDescriptor;

/// A decoded leaf descriptor with wire defaults already applied, handed
/// to a registered factory for typed reconstruction.
#[derive(Debug, Clone)]
pub struct LeafSpec {
    pub name: String,
    pub expression: String,
    pub kind: ConditionKind,
    pub evaluator: String,
    pub failure_message: String,
    pub metadata: BTreeMap<String, String>,
    pub event: Option<EventDescriptor>,
}

type LeafFactory = Arc<dyn Fn(&LeafSpec) -> Result<Arc<dyn LeafCondition>, RuleError> + Send + Sync>;

struct ContextEntry {
    context_type: ContextType,
    factory: LeafFactory,
}

/// Registry of the context, event, and value types decode may resolve.
pub struct TypeRegistry {
    contexts: BTreeMap<String, ContextEntry>,
    events: BTreeSet<String>,
    values: BTreeMap<String, TypeId>,
}

impl TypeRegistry {
    /// An empty registry with the built-in scalar value types (and the
    /// `"none"` void marker) pre-registered.
    pub fn new() -> Self {
        let mut registry = Self {
            contexts: BTreeMap::new(),
            events: BTreeSet::new(),
            values: BTreeMap::new(),
        };
        registry.register_value::<i32>();
        registry.register_value::<i64>();
        registry.register_value::<u32>();
        registry.register_value::<u64>();
        registry.register_value::<f32>();
        registry.register_value::<f64>();
        registry.register_value::<bool>();
        registry.register_value::<String>();
        registry.values.insert("none".to_string(), TypeId::of::<()>());
        registry
    }

    /// Register a context type. Leaves whose stored type name resolves to
    /// `T` are rebuilt as `Condition<T>`, recompiling `LambdaPredicate`
    /// expressions.
    pub fn register_context<T: 'static>(&mut self) {
        let context_type = ContextType::of::<T>();
        self.contexts.insert(
            context_type.name().to_string(),
            ContextEntry {
                context_type,
                factory: Arc::new(reconstruct_leaf::<T>),
            },
        );
    }

    /// Register an event type name decode may resolve.
    pub fn register_event(&mut self, name: impl Into<String>) {
        self.events.insert(name.into());
    }

    /// Register a value type for whole-rule decode.
    pub fn register_value<T: 'static>(&mut self) {
        self.values
            .insert(std::any::type_name::<T>().to_string(), TypeId::of::<T>());
    }

    /// Registered context type names.
    pub fn context_types(&self) -> Vec<&str> {
        self.contexts.keys().map(String::as_str).collect()
    }

    /// Resolve a stored context type name and build the typed leaf.
    pub fn build_leaf(&self, type_name: &str, spec: &LeafSpec) -> Result<Arc<dyn LeafCondition>, RuleError> {
        let entry = self
            .lookup(&self.contexts, type_name)
            .ok_or_else(|| RuleError::UnknownContextType(type_name.to_string()))?;
        (entry.factory)(spec)
    }

    /// The registered [`ContextType`] for a stored name, if any.
    pub fn resolve_context(&self, type_name: &str) -> Option<ContextType> {
        self.lookup(&self.contexts, type_name)
            .map(|entry| entry.context_type)
    }

    /// Whether a stored event type name resolves.
    pub fn has_event(&self, name: &str) -> bool {
        if self.events.contains(name) {
            return true;
        }
        let segment = trailing_segment(name);
        self.events
            .iter()
            .any(|registered| trailing_segment(registered) == segment)
    }

    /// Resolve a stored value type name to its `TypeId`.
    pub fn resolve_value(&self, name: &str) -> Option<TypeId> {
        if let Some(id) = self.values.get(name) {
            return Some(*id);
        }
        let segment = trailing_segment(name);
        self.values
            .iter()
            .find(|(registered, _)| trailing_segment(registered) == segment)
            .map(|(_, id)| *id)
    }

    fn lookup<'a>(
        &self,
        map: &'a BTreeMap<String, ContextEntry>,
        name: &str,
    ) -> Option<&'a ContextEntry> {
        if let Some(entry) = map.get(name) {
            return Some(entry);
        }
        let segment = trailing_segment(name);
        map.iter()
            .find(|(registered, _)| trailing_segment(registered) == segment)
            .map(|(_, entry)| entry)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("contexts", &self.context_types())
            .field("events", &self.events)
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Trailing segment of a qualified name, accepting both `::` and `.`
/// separators.
fn trailing_segment(name: &str) -> &str {
    let tail = name.rsplit("::").next().unwrap_or(name);
    tail.rsplit('.').next().unwrap_or(tail)
}

fn reconstruct_leaf<T: 'static>(spec: &LeafSpec) -> Result<Arc<dyn LeafCondition>, RuleError> {
    let mut condition = match spec.kind {
        ConditionKind::LambdaPredicate => Condition::<T>::new(&spec.name, &spec.expression)?,
        ConditionKind::CustomExpression => {
            Condition::<T>::custom(&spec.name, &spec.expression, &spec.evaluator)?
        }
    };
    condition = condition
        .with_evaluator(&spec.evaluator)
        .with_failure_message(&spec.failure_message);
    for (key, value) in &spec.metadata {
        condition = condition.with_metadata(key, value);
    }
    if let Some(event) = &spec.event {
        condition = condition.with_event(event.clone());
    }
    Ok(Arc::new(condition))
}
