//! Wire representation of condition trees and rules.
//!
//! A transport tree is a plain node tree: operator nodes carry
//! `operator`/`left`/`right`, leaf nodes carry the flattened condition
//! descriptor with the context type as a qualified name string. Absent
//! optional fields are omitted on encode and tolerated on decode, where
//! they take their documented defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::ConditionKind;
use crate::context::DEFAULT_TENANT;
use crate::rule::DEFAULT_LOCALE;

/// Boolean operator of a transport node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportOperator {
    AndAlso,
    OrElse,
}

/// Event descriptor on the wire. The trigger travels as its policy name;
/// unrecognized names decode as `Never`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportEvent {
    pub event_type: String,
    pub trigger: String,
}

impl Default for TransportEvent {
    fn default() -> Self {
        Self {
            event_type: String::new(),
            trigger: "Never".to_string(),
        }
    }
}

/// One node of a transport tree: an operator node or a leaf.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<TransportOperator>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<Box<TransportNode>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Box<TransportNode>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluator: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ConditionKind>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<TransportEvent>,
}

/// One condition set on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSet {
    pub name: String,

    #[serde(skip_serializing_if = "Value::is_null")]
    pub value: Value,

    pub root: TransportNode,
}

/// A whole rule on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportRule {
    pub name: String,

    /// Qualified name of the rule's value type; `"none"` marks the
    /// void-valued rule.
    pub value_type: String,

    #[serde(skip_serializing_if = "Value::is_null")]
    pub failure_value: Value,

    #[serde(skip_serializing_if = "is_default_tenant")]
    pub tenant: String,

    #[serde(skip_serializing_if = "is_default_locale")]
    pub locale: String,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,

    pub condition_sets: Vec<TransportSet>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<TransportEvent>,
}

impl Default for TransportRule {
    fn default() -> Self {
        Self {
            name: String::new(),
            value_type: String::new(),
            failure_value: Value::Null,
            tenant: DEFAULT_TENANT.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            disabled: false,
            condition_sets: Vec::new(),
            event: None,
        }
    }
}

fn is_default_tenant(tenant: &str) -> bool {
    tenant == DEFAULT_TENANT
}

fn is_default_locale(locale: &str) -> bool {
    locale == DEFAULT_LOCALE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_node_roundtrips() {
        let node = TransportNode {
            operator: Some(TransportOperator::AndAlso),
            left: Some(Box::new(TransportNode {
                condition_name: Some("IsAdult".to_string()),
                ..Default::default()
            })),
            right: Some(Box::new(TransportNode::default())),
            ..Default::default()
        };
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains(r#""operator":"AndAlso""#));
        let back: TransportNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let node = TransportNode {
            condition_name: Some("IsAdult".to_string()),
            expression: Some("age >= 18".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&node).unwrap();
        assert!(!json.contains("operator"));
        assert!(!json.contains("metadata"));
        assert!(!json.contains("event"));
    }

    #[test]
    fn test_missing_fields_tolerated_on_decode() {
        let rule: TransportRule =
            serde_json::from_str(r#"{"name":"r","valueType":"f64"}"#).unwrap();
        assert_eq!(rule.tenant, DEFAULT_TENANT);
        assert_eq!(rule.locale, DEFAULT_LOCALE);
        assert!(!rule.disabled);
        assert!(rule.condition_sets.is_empty());
        assert!(rule.failure_value.is_null());
    }

    #[test]
    fn test_default_tenant_omitted_on_encode() {
        let rule = TransportRule {
            name: "r".to_string(),
            value_type: "f64".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&rule).unwrap();
        assert!(!json.contains("tenant"));
        assert!(!json.contains("locale"));
        assert!(!json.contains("disabled"));
    }
}
