//! Typed data contexts supplied to an evaluation.
//!
//! A [`DataContext`] pairs an arbitrary caller value with the runtime type
//! information the engine needs to route it to the right leaf, plus a JSON
//! snapshot used by compiled predicates, failure-message templates, and
//! event payloads. [`ConditionData`] is the ordered, non-empty collection
//! of contexts handed to a set or rule evaluation.

use std::any::{Any, TypeId};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::RuleError;

/// Runtime tag for a context type: its `TypeId` plus the fully qualified
/// Rust type name used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextType {
    id: TypeId,
    name: &'static str,
}

impl ContextType {
    /// The tag for a concrete type.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, e.g. `acme::model::Customer`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Trailing segment of the qualified name, e.g. `Customer`.
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl std::fmt::Display for ContextType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// A single piece of caller data, optionally bound to one condition by name.
#[derive(Clone)]
pub struct DataContext {
    value: Arc<dyn Any + Send + Sync>,
    snapshot: Value,
    context_type: ContextType,
    condition_name: Option<String>,
}

impl DataContext {
    /// Wrap a value that any leaf with a matching declared context type may
    /// consume.
    pub fn new<T>(value: T) -> Result<Self, RuleError>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let snapshot =
            serde_json::to_value(&value).map_err(|e| RuleError::Serialization(e.to_string()))?;
        Ok(Self {
            value: Arc::new(value),
            snapshot,
            context_type: ContextType::of::<T>(),
            condition_name: None,
        })
    }

    /// Wrap a value reserved for the named condition. Name lookup takes
    /// precedence over type matching when a leaf resolves its data.
    pub fn for_condition<T>(value: T, condition_name: impl Into<String>) -> Result<Self, RuleError>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let mut context = Self::new(value)?;
        context.condition_name = Some(condition_name.into());
        Ok(context)
    }

    /// The condition this context is reserved for, if any.
    pub fn condition_name(&self) -> Option<&str> {
        self.condition_name.as_deref()
    }

    /// Runtime type tag of the wrapped value.
    pub fn context_type(&self) -> ContextType {
        self.context_type
    }

    /// JSON snapshot of the wrapped value, taken at construction.
    pub fn snapshot(&self) -> &Value {
        &self.snapshot
    }

    /// Borrow the wrapped value as its concrete type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for DataContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataContext")
            .field("context_type", &self.context_type.name())
            .field("condition_name", &self.condition_name)
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

/// Default tenant identifier applied when none is given.
pub const DEFAULT_TENANT: &str = "All_Tenants";

/// Ordered, non-empty collection of data contexts for one evaluation.
#[derive(Debug, Clone)]
pub struct ConditionData {
    contexts: Vec<DataContext>,
    tenant: String,
}

impl ConditionData {
    /// Build from an ordered list of contexts. Rejects an empty list.
    pub fn new(contexts: Vec<DataContext>) -> Result<Self, RuleError> {
        Self::for_tenant(contexts, DEFAULT_TENANT)
    }

    /// Build for a specific tenant. Rejects an empty list.
    pub fn for_tenant(
        contexts: Vec<DataContext>,
        tenant: impl Into<String>,
    ) -> Result<Self, RuleError> {
        if contexts.is_empty() {
            return Err(RuleError::NoConditionData);
        }
        Ok(Self {
            contexts,
            tenant: tenant.into(),
        })
    }

    /// Convenience constructor for a single unbound value.
    pub fn single<T>(value: T) -> Result<Self, RuleError>
    where
        T: Serialize + Send + Sync + 'static,
    {
        Self::new(vec![DataContext::new(value)?])
    }

    /// The contexts, in insertion order.
    pub fn contexts(&self) -> &[DataContext] {
        &self.contexts
    }

    /// Tenant this data belongs to.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Resolve the context for a leaf: first by owning-condition name, then
    /// by the first entry whose runtime type matches the declared one.
    pub fn resolve(&self, condition_name: &str, context_type: ContextType) -> Option<&DataContext> {
        self.contexts
            .iter()
            .find(|c| c.condition_name() == Some(condition_name))
            .or_else(|| {
                self.contexts
                    .iter()
                    .find(|c| c.context_type() == context_type)
            })
    }
}
