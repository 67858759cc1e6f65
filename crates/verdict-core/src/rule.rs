//! Rules: ordered condition sets evaluated with short-circuit OR.

use std::time::Instant;

use tracing::debug;

use crate::context::DEFAULT_TENANT;
use crate::error::RuleError;
use crate::evaluator::EvaluationContext;
use crate::events::{EventDescriptor, RuleEvent};
use crate::results::{ConditionSetResult, RuleResult};
use crate::set::ConditionSet;

/// Locale identifier applied when none is given.
pub const DEFAULT_LOCALE: &str = "en-GB";

/// A named, tenant-scoped list of condition sets with a failure value.
///
/// Sets are tried in insertion order and the first passing set decides
/// the rule; its value becomes the rule's payload. When every set fails,
/// the rule fails with its declared failure value.
#[derive(Debug, Clone)]
pub struct Rule<V> {
    name: String,
    failure_value: V,
    tenant: String,
    locale: String,
    disabled: bool,
    sets: Vec<ConditionSet<V>>,
    event: Option<EventDescriptor>,
}

impl<V: Clone> Rule<V> {
    /// Build a rule over its first condition set. Rejects a blank name.
    pub fn new(
        name: impl Into<String>,
        failure_value: V,
        first_set: ConditionSet<V>,
    ) -> Result<Self, RuleError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(RuleError::InvalidCondition(
                "rule name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name,
            failure_value,
            tenant: DEFAULT_TENANT.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            disabled: false,
            sets: vec![first_set],
            event: None,
        })
    }

    /// Append a set tried when every earlier one fails.
    pub fn or_condition_set(mut self, set: ConditionSet<V>) -> Self {
        self.sets.push(set);
        self
    }

    /// Scope the rule to a tenant.
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    /// Scope the rule to a locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Enable or disable the rule.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Attach a rule-level event descriptor.
    pub fn with_event(mut self, event: EventDescriptor) -> Self {
        self.event = Some(event);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_value(&self) -> &V {
        &self.failure_value
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// The condition sets, in insertion order.
    pub fn condition_sets(&self) -> &[ConditionSet<V>] {
        &self.sets
    }

    /// Rule-level event descriptor, if any.
    pub fn event(&self) -> Option<&EventDescriptor> {
        self.event.as_ref()
    }

    /// Evaluate the rule.
    ///
    /// A disabled rule short-circuits to a successful result carrying the
    /// failure value, without validating data or resolver. Otherwise sets
    /// run in insertion order until one passes, each result chained onto
    /// the one before it; a matching rule-level event is raised after the
    /// loop, and its construction failure is captured, never thrown.
    pub fn evaluate(&self, context: &EvaluationContext<'_>) -> Result<RuleResult<V>, RuleError> {
        let started = Instant::now();

        if self.disabled {
            debug!(rule = %self.name, "rule disabled, skipping evaluation");
            return Ok(RuleResult::disabled(
                &self.name,
                self.failure_value.clone(),
                &self.tenant,
                started.elapsed(),
            ));
        }

        context.data()?;
        context.resolver()?;

        let mut head: Option<ConditionSetResult<V>> = None;
        for set in &self.sets {
            let mut result = set.evaluate(context)?;
            if let Some(previous) = head.take() {
                result.set_previous(previous);
            }
            let success = result.success;
            head = Some(result);
            if success {
                break;
            }
        }

        // The constructor guarantees at least one set.
        let Some(head) = head else {
            return Err(RuleError::MissingConditionSets {
                rule: self.name.clone(),
            });
        };
        let mut result = RuleResult::aggregate(
            &self.name,
            self.failure_value.clone(),
            &self.tenant,
            started.elapsed(),
            head,
        );

        if let (Some(descriptor), Some(publisher)) = (&self.event, context.publisher()) {
            if descriptor.trigger.matches(result.success) {
                let message = result.failure_messages.join("; ");
                match RuleEvent::new(
                    descriptor,
                    &self.name,
                    result.success,
                    message,
                    &self.tenant,
                    None,
                ) {
                    Ok(event) => publisher.publish(event),
                    Err(error) => result.push_error(error),
                }
            }
        }

        // Stamp the wall-clock elapsed last so event construction counts.
        result.total_duration = started.elapsed();
        debug!(
            rule = %self.name,
            success = result.success,
            evaluations = result.evaluation_count,
            final_set = %result.final_set_name,
            "rule evaluated"
        );
        Ok(result)
    }

    /// Reconstruct an independent copy, deep-cloning every set's tree.
    /// Rules handed to a cache go through this so cached copies are safe
    /// to reuse across evaluations.
    pub fn deep_clone(&self) -> Result<Self, RuleError> {
        let sets = self
            .sets
            .iter()
            .map(ConditionSet::deep_clone)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: self.name.clone(),
            failure_value: self.failure_value.clone(),
            tenant: self.tenant.clone(),
            locale: self.locale.clone(),
            disabled: self.disabled,
            sets,
            event: self.event.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::context::{ConditionData, ContextType};
    use crate::evaluator::{Evaluator, PredicateEvaluator};
    use crate::events::TriggerPolicy;
    use crate::tree::BooleanCondition;
    use serde::Serialize;
    use std::sync::{Arc, Mutex};

    #[derive(Serialize)]
    struct Customer {
        age: u32,
        country: String,
    }

    fn resolver(_name: &str, _context: ContextType) -> Option<Arc<dyn Evaluator>> {
        Some(Arc::new(PredicateEvaluator))
    }

    fn data(age: u32, country: &str) -> ConditionData {
        ConditionData::single(Customer {
            age,
            country: country.to_string(),
        })
        .unwrap()
    }

    fn set(name: &str, value: f64, expression: &str) -> ConditionSet<f64> {
        let condition =
            Condition::<Customer>::new(format!("{name}Cond"), expression).unwrap();
        ConditionSet::new(name, value, BooleanCondition::from(condition)).unwrap()
    }

    fn discount_rule() -> Rule<f64> {
        Rule::new("Discount", 0.0, set("Seniors", 0.25, "age >= 65"))
            .unwrap()
            .or_condition_set(set("Adults", 0.10, "age >= 18"))
    }

    #[test]
    fn test_first_passing_set_wins() {
        let rule = discount_rule();
        let data = data(70, "UK");
        let context = EvaluationContext::new()
            .with_resolver(&resolver)
            .with_data(&data);

        let result = rule.evaluate(&context).unwrap();
        assert!(result.success);
        assert_eq!(result.final_set_name, "Seniors");
        assert_eq!(*result.result_value(), 0.25);
        assert_eq!(result.evaluation_count, 1);
        assert!(result.set_results.unwrap().previous().is_none());
    }

    #[test]
    fn test_failing_set_falls_through_and_chains() {
        let rule = discount_rule();
        let data = data(30, "UK");
        let context = EvaluationContext::new()
            .with_resolver(&resolver)
            .with_data(&data);

        let result = rule.evaluate(&context).unwrap();
        assert!(result.success);
        assert_eq!(result.final_set_name, "Adults");
        assert_eq!(*result.result_value(), 0.10);
        // Both sets evaluated one leaf each.
        assert_eq!(result.evaluation_count, 2);
        let head = result.set_results.unwrap();
        assert_eq!(head.previous().unwrap().set_name, "Seniors");
    }

    #[test]
    fn test_all_sets_fail() {
        let rule = discount_rule();
        let data = data(10, "UK");
        let context = EvaluationContext::new()
            .with_resolver(&resolver)
            .with_data(&data);

        let result = rule.evaluate(&context).unwrap();
        assert!(!result.success);
        assert_eq!(*result.result_value(), 0.0);
        assert_eq!(result.final_set_name, "Adults");
        assert_eq!(result.evaluation_count, 2);
        assert_eq!(result.failure_messages.len(), 2);
    }

    #[test]
    fn test_disabled_rule_short_circuits() {
        let rule = discount_rule().with_disabled(true);
        // No data, no resolver: a disabled rule must not validate inputs.
        let context = EvaluationContext::new();

        let result = rule.evaluate(&context).unwrap();
        assert!(result.disabled);
        assert!(result.success);
        assert_eq!(result.evaluation_count, 0);
        assert_eq!(*result.result_value(), 0.0);
        assert!(result.set_results.is_none());
    }

    #[test]
    fn test_validation_fails_fast() {
        let rule = discount_rule();
        let context = EvaluationContext::new().with_resolver(&resolver);
        assert!(matches!(
            rule.evaluate(&context),
            Err(RuleError::NoConditionData)
        ));
    }

    #[test]
    fn test_rule_level_event() {
        let seen: Arc<Mutex<Vec<RuleEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let publisher = move |event: RuleEvent| {
            sink.lock().unwrap().push(event);
        };

        let rule = discount_rule()
            .with_event(EventDescriptor::new("DiscountDenied", TriggerPolicy::OnFailure));
        let data = data(10, "UK");
        let context = EvaluationContext::new()
            .with_resolver(&resolver)
            .with_data(&data)
            .with_publisher(&publisher);

        let result = rule.evaluate(&context).unwrap();
        assert!(!result.success);
        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "DiscountDenied");
        assert_eq!(events[0].source, "Discount");
        assert!(!events[0].message.is_empty());
    }

    #[test]
    fn test_rule_event_construction_failure_is_captured() {
        let publisher = |_event: RuleEvent| {};
        let rule = discount_rule()
            .with_event(EventDescriptor::new(" ", TriggerPolicy::OnSuccessOrFailure));
        let data = data(70, "UK");
        let context = EvaluationContext::new()
            .with_resolver(&resolver)
            .with_data(&data)
            .with_publisher(&publisher);

        let result = rule.evaluate(&context).unwrap();
        assert!(result.success);
        assert!(matches!(
            result.errors.as_slice(),
            [RuleError::EventDispatch { .. }]
        ));
    }

    #[test]
    fn test_defaults_and_builders() {
        let rule = discount_rule();
        assert_eq!(rule.tenant(), DEFAULT_TENANT);
        assert_eq!(rule.locale(), DEFAULT_LOCALE);
        assert!(!rule.is_disabled());

        let rule = rule.with_tenant("acme").with_locale("en-US");
        assert_eq!(rule.tenant(), "acme");
        assert_eq!(rule.locale(), "en-US");
    }

    #[test]
    fn test_chain_previous_rule_result() {
        let rule = discount_rule();
        let data = data(70, "UK");
        let context = EvaluationContext::new()
            .with_resolver(&resolver)
            .with_data(&data);

        let first = rule.evaluate(&context).unwrap();
        let mut second = rule.evaluate(&context).unwrap();
        second.chain_previous(first);
        assert_eq!(second.previous().unwrap().rule_name, "Discount");
    }

    #[test]
    fn test_deep_clone_evaluates_identically() {
        let rule = discount_rule();
        let clone = rule.deep_clone().unwrap();
        let data = data(30, "UK");
        let context = EvaluationContext::new()
            .with_resolver(&resolver)
            .with_data(&data);

        let original = rule.evaluate(&context).unwrap();
        let cloned = clone.evaluate(&context).unwrap();
        assert_eq!(original.success, cloned.success);
        assert_eq!(original.evaluation_count, cloned.evaluation_count);
        assert_eq!(original.final_set_name, cloned.final_set_name);
    }
}
