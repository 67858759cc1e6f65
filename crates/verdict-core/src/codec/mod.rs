//! Lossless interchange between condition trees/rules and their wire form.
//!
//! Encoding flattens each leaf's descriptor and renders types as
//! qualified name strings; decoding resolves those names through a
//! [`TypeRegistry`] and rebuilds compiled, typed leaves. Round-tripping a
//! rule reconstructs one that evaluates identically.
//!
//! Decode failures with a specific cause surface as their own error kind
//! (`MissingExpression`, `UnknownContextType`, `UnknownEventType`,
//! `MissingConditionSets`, `UnknownValueType`, `InvalidCondition`); any
//! other failure is wrapped into [`RuleError::Decode`].

mod registry;
mod schema;
mod transport;

pub use registry::{LeafSpec, TypeRegistry};
pub use schema::validate_rule_schema;
pub use transport::{
    TransportEvent, TransportNode, TransportOperator, TransportRule, TransportSet,
};

use std::any::TypeId;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::condition::{ConditionKind, DEFAULT_EVALUATOR, DEFAULT_FAILURE_MESSAGE};
use crate::error::RuleError;
use crate::events::{EventDescriptor, TriggerPolicy};
use crate::rule::Rule;
use crate::set::ConditionSet;
use crate::tree::BooleanCondition;

/// Encode a condition tree to its transport form.
pub fn to_transport(node: &BooleanCondition) -> TransportNode {
    match node {
        BooleanCondition::And(left, right) => operator_node(
            TransportOperator::AndAlso,
            to_transport(left),
            to_transport(right),
        ),
        BooleanCondition::Or(left, right) => operator_node(
            TransportOperator::OrElse,
            to_transport(left),
            to_transport(right),
        ),
        BooleanCondition::Leaf(leaf) => TransportNode {
            condition_name: Some(leaf.name().to_string()),
            context_type: Some(leaf.context_type().name().to_string()),
            expression: Some(leaf.expression().to_string()),
            failure_message: Some(leaf.failure_message().to_string()),
            evaluator: Some(leaf.evaluator_name().to_string()),
            kind: Some(leaf.kind()),
            metadata: leaf.metadata().clone(),
            event: leaf.event().map(encode_event),
            ..Default::default()
        },
    }
}

/// Decode a transport tree, resolving context types through the registry.
pub fn from_transport(
    node: &TransportNode,
    registry: &TypeRegistry,
) -> Result<BooleanCondition, RuleError> {
    if let Some(operator) = node.operator {
        let (Some(left), Some(right)) = (&node.left, &node.right) else {
            return Err(RuleError::InvalidNode(
                "operator node requires both left and right children".to_string(),
            ));
        };
        let left = from_transport(left, registry)?;
        let right = from_transport(right, registry)?;
        return Ok(match operator {
            TransportOperator::AndAlso => left.and(right),
            TransportOperator::OrElse => left.or(right),
        });
    }

    let name = node
        .condition_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if name.is_empty() {
        return Err(RuleError::InvalidCondition(
            "leaf node requires a condition name".to_string(),
        ));
    }

    let expression = node.expression.as_deref().unwrap_or_default();
    if expression.trim().is_empty() {
        return Err(RuleError::MissingExpression {
            condition: name.to_string(),
        });
    }

    let type_name = node.context_type.as_deref().unwrap_or_default();
    if type_name.is_empty() {
        return Err(RuleError::UnknownContextType(String::new()));
    }

    let event = node.event.as_ref().map(|e| decode_event(e, registry)).transpose()?;

    let spec = LeafSpec {
        name: name.to_string(),
        expression: expression.to_string(),
        kind: node.kind.unwrap_or(ConditionKind::LambdaPredicate),
        evaluator: node
            .evaluator
            .clone()
            .unwrap_or_else(|| DEFAULT_EVALUATOR.to_string()),
        failure_message: node
            .failure_message
            .clone()
            .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
        metadata: node.metadata.clone(),
        event,
    };
    registry
        .build_leaf(type_name, &spec)
        .map(BooleanCondition::Leaf)
}

/// Encode a whole rule to its transport form.
pub fn to_transport_rule<V>(rule: &Rule<V>) -> Result<TransportRule, RuleError>
where
    V: Serialize + Clone + 'static,
{
    let condition_sets = rule
        .condition_sets()
        .iter()
        .map(|set| {
            Ok(TransportSet {
                name: set.name().to_string(),
                value: serde_json::to_value(set.value())
                    .map_err(|e| RuleError::Serialization(e.to_string()))?,
                root: to_transport(set.root()),
            })
        })
        .collect::<Result<Vec<_>, RuleError>>()?;

    Ok(TransportRule {
        name: rule.name().to_string(),
        value_type: value_type_name::<V>(),
        failure_value: serde_json::to_value(rule.failure_value())
            .map_err(|e| RuleError::Serialization(e.to_string()))?,
        tenant: rule.tenant().to_string(),
        locale: rule.locale().to_string(),
        disabled: rule.is_disabled(),
        condition_sets,
        event: rule.event().map(encode_event),
    })
}

/// Decode a whole rule. The stored value type name must resolve to `V`.
pub fn from_transport_rule<V>(
    transport: &TransportRule,
    registry: &TypeRegistry,
) -> Result<Rule<V>, RuleError>
where
    V: DeserializeOwned + Clone + 'static,
{
    let name = transport.name.trim();
    if name.is_empty() {
        return Err(RuleError::Decode("rule name must not be empty".to_string()));
    }

    let resolved = registry
        .resolve_value(&transport.value_type)
        .ok_or_else(|| RuleError::UnknownValueType(transport.value_type.clone()))?;
    if resolved != TypeId::of::<V>() {
        return Err(RuleError::UnknownValueType(transport.value_type.clone()));
    }

    if transport.condition_sets.is_empty() {
        return Err(RuleError::MissingConditionSets {
            rule: name.to_string(),
        });
    }

    let failure_value: V = serde_json::from_value(transport.failure_value.clone())
        .map_err(|e| RuleError::Decode(format!("failure value: {e}")))?;

    let mut sets = transport.condition_sets.iter();
    // Non-empty checked above.
    let first = sets.next().ok_or_else(|| RuleError::MissingConditionSets {
        rule: name.to_string(),
    })?;

    let mut rule = Rule::new(name, failure_value, decode_set(first, registry)?)
        .map_err(escalate)?
        .with_tenant(&transport.tenant)
        .with_locale(&transport.locale)
        .with_disabled(transport.disabled);
    for set in sets {
        rule = rule.or_condition_set(decode_set(set, registry)?);
    }
    if let Some(event) = &transport.event {
        rule = rule.with_event(decode_event(event, registry)?);
    }
    Ok(rule)
}

/// Serialize a rule to interchange JSON.
pub fn rule_to_json<V>(rule: &Rule<V>) -> Result<String, RuleError>
where
    V: Serialize + Clone + 'static,
{
    let transport = to_transport_rule(rule)?;
    serde_json::to_string_pretty(&transport).map_err(|e| RuleError::Serialization(e.to_string()))
}

/// Decode a rule from interchange JSON, validating against the embedded
/// schema first.
pub fn rule_from_json<V>(json: &str, registry: &TypeRegistry) -> Result<Rule<V>, RuleError>
where
    V: DeserializeOwned + Clone + 'static,
{
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| RuleError::Decode(e.to_string()))?;
    if let Err(errors) = schema::validate_rule_schema(&value) {
        return Err(RuleError::Decode(errors.join("; ")));
    }
    let transport: TransportRule =
        serde_json::from_value(value).map_err(|e| RuleError::Decode(e.to_string()))?;
    from_transport_rule(&transport, registry)
}

/// Serialize a rule to interchange YAML.
pub fn rule_to_yaml<V>(rule: &Rule<V>) -> Result<String, RuleError>
where
    V: Serialize + Clone + 'static,
{
    let transport = to_transport_rule(rule)?;
    serde_yaml::to_string(&transport).map_err(|e| RuleError::Serialization(e.to_string()))
}

/// Decode a rule from interchange YAML.
pub fn rule_from_yaml<V>(yaml: &str, registry: &TypeRegistry) -> Result<Rule<V>, RuleError>
where
    V: DeserializeOwned + Clone + 'static,
{
    let value: serde_json::Value =
        serde_yaml::from_str(yaml).map_err(|e| RuleError::Decode(e.to_string()))?;
    if let Err(errors) = schema::validate_rule_schema(&value) {
        return Err(RuleError::Decode(errors.join("; ")));
    }
    let transport: TransportRule =
        serde_json::from_value(value).map_err(|e| RuleError::Decode(e.to_string()))?;
    from_transport_rule(&transport, registry)
}

/// Wire name of a rule's value type; `()` travels as the `"none"` marker.
fn value_type_name<V: 'static>() -> String {
    if TypeId::of::<V>() == TypeId::of::<()>() {
        "none".to_string()
    } else {
        std::any::type_name::<V>().to_string()
    }
}

fn operator_node(
    operator: TransportOperator,
    left: TransportNode,
    right: TransportNode,
) -> TransportNode {
    TransportNode {
        operator: Some(operator),
        left: Some(Box::new(left)),
        right: Some(Box::new(right)),
        ..Default::default()
    }
}

fn encode_event(event: &EventDescriptor) -> TransportEvent {
    TransportEvent {
        event_type: event.event_type.clone(),
        trigger: event.trigger.name().to_string(),
    }
}

fn decode_event(
    event: &TransportEvent,
    registry: &TypeRegistry,
) -> Result<EventDescriptor, RuleError> {
    if !registry.has_event(&event.event_type) {
        return Err(RuleError::UnknownEventType(event.event_type.clone()));
    }
    Ok(EventDescriptor::new(
        event.event_type.clone(),
        TriggerPolicy::from_name(&event.trigger),
    ))
}

fn decode_set<V>(set: &TransportSet, registry: &TypeRegistry) -> Result<ConditionSet<V>, RuleError>
where
    V: DeserializeOwned + Clone,
{
    let value: V = serde_json::from_value(set.value.clone())
        .map_err(|e| RuleError::Decode(format!("set '{}' value: {e}", set.name)))?;
    let root = from_transport(&set.root, registry).map_err(escalate)?;
    ConditionSet::new(&set.name, value, root).map_err(escalate)
}

/// Keep the specifically named decode errors; wrap anything else.
fn escalate(error: RuleError) -> RuleError {
    match error {
        e @ (RuleError::InvalidCondition(_)
        | RuleError::MissingExpression { .. }
        | RuleError::UnknownContextType(_)
        | RuleError::UnknownEventType(_)
        | RuleError::UnknownValueType(_)
        | RuleError::MissingConditionSets { .. }
        | RuleError::InvalidNode(_)
        | RuleError::Decode(_)) => e,
        other => RuleError::Decode(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::context::{ConditionData, ContextType};
    use crate::evaluator::{EvaluationContext, Evaluator, PredicateEvaluator};
    use crate::events::TriggerPolicy;
    use crate::printer::{DefaultPrinter, PrecedencePrinter};
    use proptest::prelude::*;
    use serde::Serialize;
    use std::sync::Arc;

    #[derive(Serialize)]
    struct Customer {
        age: u32,
        country: String,
        total_orders: u32,
    }

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register_context::<Customer>();
        registry.register_event("AdultVerified");
        registry.register_event("DiscountDenied");
        registry
    }

    fn resolver(_name: &str, _context: ContextType) -> Option<Arc<dyn Evaluator>> {
        Some(Arc::new(PredicateEvaluator))
    }

    fn data(age: u32, country: &str, total_orders: u32) -> ConditionData {
        ConditionData::single(Customer {
            age,
            country: country.to_string(),
            total_orders,
        })
        .unwrap()
    }

    fn leaf(name: &str, expression: &str) -> Condition<Customer> {
        Condition::<Customer>::new(name, expression).unwrap()
    }

    fn discount_rule() -> Rule<f64> {
        let loyal = BooleanCondition::from(leaf("IsAdult", "age >= 18"))
            .and(leaf("IsUk", r#"country == "UK""#))
            .and(
                leaf("IsLoyal", "total_orders >= 5")
                    .with_failure_message("only @{total_orders} orders")
                    .with_metadata("owner", "growth"),
            );
        let senior = BooleanCondition::from(
            leaf("IsSenior", "age >= 65")
                .with_event(EventDescriptor::new("AdultVerified", TriggerPolicy::OnSuccess)),
        );
        Rule::new(
            "Discount",
            0.0,
            ConditionSet::new("LoyalUkAdults", 0.15, loyal).unwrap(),
        )
        .unwrap()
        .or_condition_set(ConditionSet::new("Seniors", 0.25, senior).unwrap())
        .with_tenant("acme")
        .with_event(EventDescriptor::new("DiscountDenied", TriggerPolicy::OnFailure))
    }

    #[test]
    fn test_roundtrip_preserves_structure_and_descriptor() {
        let rule = discount_rule();
        let json = rule_to_json(&rule).unwrap();
        let decoded: Rule<f64> = rule_from_json(&json, &registry()).unwrap();

        assert_eq!(decoded.name(), rule.name());
        assert_eq!(decoded.tenant(), "acme");
        assert_eq!(decoded.locale(), rule.locale());
        assert_eq!(decoded.condition_sets().len(), 2);
        assert_eq!(decoded.event(), rule.event());

        let printer = DefaultPrinter::default();
        for (original, copy) in rule.condition_sets().iter().zip(decoded.condition_sets()) {
            assert_eq!(original.name(), copy.name());
            assert_eq!(original.value(), copy.value());
            assert_eq!(
                printer.print(original.root()).unwrap(),
                printer.print(copy.root()).unwrap()
            );
        }
    }

    #[test]
    fn test_roundtrip_evaluates_identically() {
        let rule = discount_rule();
        let json = rule_to_json(&rule).unwrap();
        let decoded: Rule<f64> = rule_from_json(&json, &registry()).unwrap();

        for data in [data(20, "UK", 7), data(70, "FR", 0), data(12, "UK", 0)] {
            let context = EvaluationContext::new()
                .with_resolver(&resolver)
                .with_data(&data);
            let original = rule.evaluate(&context).unwrap();
            let copy = decoded.evaluate(&context).unwrap();
            assert_eq!(original.success, copy.success);
            assert_eq!(original.result_value(), copy.result_value());
            assert_eq!(original.evaluation_count, copy.evaluation_count);
            assert_eq!(original.failure_messages, copy.failure_messages);
            assert_eq!(original.final_set_name, copy.final_set_name);
        }
    }

    #[test]
    fn test_roundtrip_preserves_leaf_metadata() {
        let rule = discount_rule();
        let json = rule_to_json(&rule).unwrap();
        let decoded: Rule<f64> = rule_from_json(&json, &registry()).unwrap();

        let BooleanCondition::And(_, loyal) = decoded.condition_sets()[0].root() else {
            panic!("expected And root");
        };
        let BooleanCondition::Leaf(loyal) = loyal.as_ref() else {
            panic!("expected leaf");
        };
        assert_eq!(loyal.name(), "IsLoyal");
        assert_eq!(loyal.failure_message(), "only @{total_orders} orders");
        assert_eq!(loyal.metadata().get("owner").unwrap(), "growth");
    }

    #[test]
    fn test_decode_applies_wire_defaults() {
        let json = format!(
            r#"{{
                "name": "Discount",
                "valueType": "f64",
                "failureValue": 0.0,
                "conditionSets": [{{
                    "name": "Adults",
                    "value": 0.1,
                    "root": {{
                        "conditionName": "IsAdult",
                        "contextType": "{}",
                        "expression": "age >= 18",
                        "event": {{ "eventType": "AdultVerified", "trigger": "SometimesMaybe" }}
                    }}
                }}]
            }}"#,
            std::any::type_name::<Customer>()
        );
        let decoded: Rule<f64> = rule_from_json(&json, &registry()).unwrap();
        let BooleanCondition::Leaf(leaf) = decoded.condition_sets()[0].root() else {
            panic!("expected leaf root");
        };
        assert_eq!(leaf.evaluator_name(), DEFAULT_EVALUATOR);
        assert_eq!(leaf.failure_message(), DEFAULT_FAILURE_MESSAGE);
        assert_eq!(leaf.kind(), ConditionKind::LambdaPredicate);
        // Unrecognized trigger names degrade to Never.
        assert_eq!(leaf.event().unwrap().trigger, TriggerPolicy::Never);
    }

    #[test]
    fn test_decode_resolves_type_by_suffix() {
        let json = r#"{
            "name": "Discount",
            "valueType": "f64",
            "failureValue": 0.0,
            "conditionSets": [{
                "name": "Adults",
                "value": 0.1,
                "root": {
                    "conditionName": "IsAdult",
                    "contextType": "Models.Customer",
                    "expression": "age >= 18"
                }
            }]
        }"#;
        let decoded: Rule<f64> = rule_from_json(json, &registry()).unwrap();
        assert_eq!(decoded.condition_sets().len(), 1);
    }

    #[test]
    fn test_decode_specific_errors() {
        let registry = registry();
        let node = |json: &str| -> Result<BooleanCondition, RuleError> {
            from_transport(&serde_json::from_str(json).unwrap(), &registry)
        };

        assert!(matches!(
            node(r#"{"contextType": "Customer", "expression": "age >= 18"}"#),
            Err(RuleError::InvalidCondition(_))
        ));
        assert!(matches!(
            node(r#"{"conditionName": "IsAdult", "contextType": "Customer"}"#),
            Err(RuleError::MissingExpression { condition }) if condition == "IsAdult"
        ));
        assert!(matches!(
            node(r#"{"conditionName": "IsAdult", "contextType": "Order", "expression": "total >= 1"}"#),
            Err(RuleError::UnknownContextType(name)) if name == "Order"
        ));
        assert!(matches!(
            node(
                r#"{"conditionName": "IsAdult", "contextType": "Customer",
                    "expression": "age >= 18",
                    "event": {"eventType": "Unregistered"}}"#
            ),
            Err(RuleError::UnknownEventType(name)) if name == "Unregistered"
        ));
        assert!(matches!(
            node(r#"{"operator": "AndAlso", "left": {"operator": "OrElse"}}"#),
            Err(RuleError::InvalidNode(_))
        ));
    }

    #[test]
    fn test_decode_rule_without_sets_fails() {
        let transport = TransportRule {
            name: "Discount".to_string(),
            value_type: "f64".to_string(),
            failure_value: serde_json::json!(0.0),
            ..Default::default()
        };
        assert!(matches!(
            from_transport_rule::<f64>(&transport, &registry()),
            Err(RuleError::MissingConditionSets { rule }) if rule == "Discount"
        ));
    }

    #[test]
    fn test_decode_rule_value_type_mismatch() {
        let rule = discount_rule();
        let transport = to_transport_rule(&rule).unwrap();

        // Right wire document, wrong requested instantiation.
        assert!(matches!(
            from_transport_rule::<i64>(&transport, &registry()),
            Err(RuleError::UnknownValueType(_))
        ));

        let mut unknown = transport;
        unknown.value_type = "Decimal".to_string();
        assert!(matches!(
            from_transport_rule::<f64>(&unknown, &registry()),
            Err(RuleError::UnknownValueType(name)) if name == "Decimal"
        ));
    }

    #[test]
    fn test_decode_rule_blank_name_wrapped() {
        let rule = discount_rule();
        let mut transport = to_transport_rule(&rule).unwrap();
        transport.name = "  ".to_string();
        assert!(matches!(
            from_transport_rule::<f64>(&transport, &registry()),
            Err(RuleError::Decode(_))
        ));
    }

    #[test]
    fn test_void_value_marker() {
        let gate = BooleanCondition::from(leaf("IsAdult", "age >= 18"));
        let rule = Rule::new("Gate", (), ConditionSet::new("Adults", (), gate).unwrap()).unwrap();

        let transport = to_transport_rule(&rule).unwrap();
        assert_eq!(transport.value_type, "none");
        assert!(transport.failure_value.is_null());

        let decoded: Rule<()> = from_transport_rule(&transport, &registry()).unwrap();
        assert_eq!(decoded.name(), "Gate");
    }

    #[test]
    fn test_malformed_json_wrapped_in_decode() {
        assert!(matches!(
            rule_from_json::<f64>("{ not json", &registry()),
            Err(RuleError::Decode(_))
        ));
        // Schema-invalid: name is a number.
        assert!(matches!(
            rule_from_json::<f64>(r#"{"name": 1, "valueType": "f64"}"#, &registry()),
            Err(RuleError::Decode(_))
        ));
        // Uncompilable expression is not a named decode kind; it wraps.
        let json = r#"{
            "name": "Discount",
            "valueType": "f64",
            "failureValue": 0.0,
            "conditionSets": [{
                "name": "Adults",
                "value": 0.1,
                "root": {
                    "conditionName": "IsAdult",
                    "contextType": "Customer",
                    "expression": "age >="
                }
            }]
        }"#;
        match rule_from_json::<f64>(json, &registry()) {
            Err(RuleError::Expression(_)) => {
                panic!("compile failure should be wrapped into Decode")
            }
            Err(RuleError::Decode(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_yaml_roundtrip() {
        let rule = discount_rule();
        let yaml = rule_to_yaml(&rule).unwrap();
        let decoded: Rule<f64> = rule_from_yaml(&yaml, &registry()).unwrap();
        assert_eq!(decoded.name(), rule.name());
        assert_eq!(decoded.condition_sets().len(), 2);
    }

    fn leaf_strategy() -> impl Strategy<Value = BooleanCondition> {
        prop_oneof![
            Just(BooleanCondition::from(leaf("IsAdult", "age >= 18"))),
            Just(BooleanCondition::from(leaf("IsUk", r#"country == "UK""#))),
            Just(BooleanCondition::from(leaf("IsLoyal", "total_orders >= 5"))),
        ]
    }

    fn tree_strategy() -> impl Strategy<Value = BooleanCondition> {
        leaf_strategy().prop_recursive(4, 24, 2, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l.and(r)),
                (inner.clone(), inner).prop_map(|(l, r)| l.or(r)),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_tree_roundtrip_preserves_shape(tree in tree_strategy()) {
            let registry = registry();
            let decoded = from_transport(&to_transport(&tree), &registry).unwrap();
            let printer = DefaultPrinter::default();
            prop_assert_eq!(
                printer.print(&tree).unwrap(),
                printer.print(&decoded).unwrap()
            );
        }

        #[test]
        fn prop_tree_roundtrip_evaluates_identically(
            tree in tree_strategy(),
            age in 0u32..100,
            orders in 0u32..10,
            uk in proptest::bool::ANY,
        ) {
            let registry = registry();
            let decoded = from_transport(&to_transport(&tree), &registry).unwrap();
            let data = data(age, if uk { "UK" } else { "FR" }, orders);

            let original = tree.evaluate(&resolver, &data, None, None, None);
            let copy = decoded.evaluate(&resolver, &data, None, None, None);
            prop_assert_eq!(original.success, copy.success);
            prop_assert_eq!(original.evaluation_count(), copy.evaluation_count());
        }
    }
}
