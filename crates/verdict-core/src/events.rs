//! Evaluation events.
//!
//! Conditions and rules may carry an [`EventDescriptor`] naming an event
//! type and a [`TriggerPolicy`]. When the policy matches the outcome, the
//! engine constructs a [`RuleEvent`] and hands it to the supplied
//! [`EventPublisher`]. Publishing is fire-and-forget: the engine never
//! awaits or inspects dispatch, and a failure to construct an event is
//! captured into the result's error list without changing the outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuleError;

/// When an attached event fires relative to the evaluation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerPolicy {
    Never,
    OnSuccess,
    OnFailure,
    OnSuccessOrFailure,
}

impl TriggerPolicy {
    /// Whether an evaluation with the given outcome should raise the event.
    pub fn matches(self, success: bool) -> bool {
        match self {
            TriggerPolicy::Never => false,
            TriggerPolicy::OnSuccess => success,
            TriggerPolicy::OnFailure => !success,
            TriggerPolicy::OnSuccessOrFailure => true,
        }
    }

    /// Wire name of this policy.
    pub fn name(self) -> &'static str {
        match self {
            TriggerPolicy::Never => "Never",
            TriggerPolicy::OnSuccess => "OnSuccess",
            TriggerPolicy::OnFailure => "OnFailure",
            TriggerPolicy::OnSuccessOrFailure => "OnSuccessOrFailure",
        }
    }

    /// Parse a wire name. Unrecognized names fall back to `Never` so stale
    /// payloads degrade to silence rather than failing decode.
    pub fn from_name(name: &str) -> Self {
        match name {
            "OnSuccess" => TriggerPolicy::OnSuccess,
            "OnFailure" => TriggerPolicy::OnFailure,
            "OnSuccessOrFailure" => TriggerPolicy::OnSuccessOrFailure,
            _ => TriggerPolicy::Never,
        }
    }
}

/// Declares the event a condition or rule raises and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// Name of the event type to construct.
    pub event_type: String,

    /// When to raise it.
    pub trigger: TriggerPolicy,
}

impl EventDescriptor {
    pub fn new(event_type: impl Into<String>, trigger: TriggerPolicy) -> Self {
        Self {
            event_type: event_type.into(),
            trigger,
        }
    }
}

/// An event raised by a condition or rule evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct RuleEvent {
    /// Event type named by the descriptor.
    pub event_type: String,

    /// Name of the condition or rule that raised it.
    pub source: String,

    /// Outcome of the evaluation that raised it.
    pub success: bool,

    /// Failure message of the evaluation, empty on success.
    pub message: String,

    /// Tenant the evaluation ran for.
    pub tenant: String,

    /// Snapshot of the data the source evaluated, when available.
    pub payload: Option<Value>,

    /// When the event was constructed.
    pub raised_at: DateTime<Utc>,
}

impl RuleEvent {
    /// Construct an event for an evaluation outcome. Fails on a blank event
    /// type; the caller captures that failure into the result.
    pub fn new(
        descriptor: &EventDescriptor,
        source: impl Into<String>,
        success: bool,
        message: impl Into<String>,
        tenant: impl Into<String>,
        payload: Option<Value>,
    ) -> Result<Self, RuleError> {
        if descriptor.event_type.trim().is_empty() {
            return Err(RuleError::EventDispatch {
                event: descriptor.event_type.clone(),
                reason: "event type must not be empty".to_string(),
            });
        }
        Ok(Self {
            event_type: descriptor.event_type.clone(),
            source: source.into(),
            success,
            message: message.into(),
            tenant: tenant.into(),
            payload,
            raised_at: Utc::now(),
        })
    }
}

/// Sink for raised events.
///
/// Implementations must not block: the engine calls [`publish`] inline on
/// the evaluation path and never awaits delivery. Closures work too:
/// any `Fn(RuleEvent) + Send + Sync` is a publisher.
///
/// [`publish`]: EventPublisher::publish
pub trait EventPublisher: Send + Sync {
    /// Hand off an event for delivery.
    fn publish(&self, event: RuleEvent);
}

impl<F> EventPublisher for F
where
    F: Fn(RuleEvent) + Send + Sync,
{
    fn publish(&self, event: RuleEvent) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_matrix() {
        assert!(!TriggerPolicy::Never.matches(true));
        assert!(!TriggerPolicy::Never.matches(false));
        assert!(TriggerPolicy::OnSuccess.matches(true));
        assert!(!TriggerPolicy::OnSuccess.matches(false));
        assert!(!TriggerPolicy::OnFailure.matches(true));
        assert!(TriggerPolicy::OnFailure.matches(false));
        assert!(TriggerPolicy::OnSuccessOrFailure.matches(true));
        assert!(TriggerPolicy::OnSuccessOrFailure.matches(false));
    }

    #[test]
    fn test_unrecognized_trigger_name_is_never() {
        assert_eq!(TriggerPolicy::from_name("OnSuccess"), TriggerPolicy::OnSuccess);
        assert_eq!(TriggerPolicy::from_name("Whenever"), TriggerPolicy::Never);
        assert_eq!(TriggerPolicy::from_name(""), TriggerPolicy::Never);
    }

    #[test]
    fn test_blank_event_type_fails_construction() {
        let descriptor = EventDescriptor::new("  ", TriggerPolicy::OnFailure);
        let result = RuleEvent::new(&descriptor, "IsAdult", false, "too young", "acme", None);
        assert!(matches!(result, Err(RuleError::EventDispatch { .. })));
    }

    #[test]
    fn test_closure_publisher() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let count = AtomicUsize::new(0);
        let publisher = |_event: RuleEvent| {
            count.fetch_add(1, Ordering::SeqCst);
        };
        let descriptor = EventDescriptor::new("AdultVerified", TriggerPolicy::OnSuccess);
        let event = RuleEvent::new(&descriptor, "IsAdult", true, "", "acme", None).unwrap();
        EventPublisher::publish(&publisher, event);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
