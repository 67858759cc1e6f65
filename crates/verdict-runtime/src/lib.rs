//! # verdict-runtime
//!
//! Host-side collaborators for the Verdict engine.
//!
//! The engine in `verdict-core` consumes its collaborators through narrow
//! traits and never owns them. This crate ships the standard
//! implementations:
//!
//! - [`EvaluatorRegistry`]: name + context-type keyed evaluator
//!   resolution, with the built-in predicate evaluator pre-registered
//! - [`RuleCache`]: an in-memory rule cache keyed by name, tenant, and
//!   locale that deep-clones on both insert and retrieval, so cached
//!   rules are always safe to reuse across concurrent evaluations
//! - [`EventBroker`]: a fan-out event publisher with explicit
//!   subscription handles; dispatch never blocks the evaluation path
//!
//! ## Example
//!
//! ```rust,ignore
//! use verdict_core::EvaluationContext;
//! use verdict_runtime::{EventBroker, EvaluatorRegistry, RuleCache};
//!
//! let registry = EvaluatorRegistry::with_defaults();
//! let broker = EventBroker::new();
//! let mut updates = broker.subscribe();
//!
//! let cache = RuleCache::default();
//! cache.set(&rule).await?;
//! let rule = cache.get::<f64>("Discount", "acme", "en-GB").await.unwrap();
//!
//! let context = EvaluationContext::new()
//!     .with_resolver(&registry)
//!     .with_data(&data)
//!     .with_publisher(&broker);
//! let result = rule.evaluate(&context)?;
//! ```

pub mod broker;
pub mod cache;
pub mod registry;

pub use broker::{EventBroker, Subscription};
pub use cache::{CacheConfig, RuleCache};
pub use registry::EvaluatorRegistry;

use thiserror::Error;
use verdict_core::RuleError;

/// Errors from the runtime collaborators.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("engine error: {0}")]
    Core(#[from] RuleError),
}
