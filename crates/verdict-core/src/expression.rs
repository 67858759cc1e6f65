//! Restricted expression grammar for leaf predicates.
//!
//! `LambdaPredicate` conditions carry their logic as source text in a small
//! boolean dialect: comparisons between a dot-separated property path and a
//! literal, combined with `&&`, `||`, `!`, and parentheses.
//!
//! ```text
//! Age >= 18 && (Country == "UK" || Country == "IE") && !Blocked == true
//! ```
//!
//! The compiled form evaluates against the JSON snapshot of a data context.
//! Evaluation is total: a missing property or a comparison between
//! incompatible types is simply false, never an error. The engine itself
//! only ever calls the compiled callable; how a predicate was produced is
//! the compiler's concern.

use std::sync::Arc;

use serde_json::Value;
use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat};
use winnow::error::{ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, take_while};

use crate::error::RuleError;
use crate::message::lookup_path;

/// Comparison operators usable in a predicate expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Literal operand of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum BoolExpr {
    Compare {
        path: String,
        op: CompareOp,
        value: Literal,
    },
    And(Box<BoolExpr>, Box<BoolExpr>),
    Or(Box<BoolExpr>, Box<BoolExpr>),
    Not(Box<BoolExpr>),
}

impl BoolExpr {
    /// Evaluate against a JSON data snapshot.
    pub fn evaluate(&self, data: &Value) -> bool {
        match self {
            BoolExpr::Compare { path, op, value } => lookup_path(data, path)
                .map(|actual| compare(actual, *op, value))
                .unwrap_or(false),
            BoolExpr::And(l, r) => l.evaluate(data) && r.evaluate(data),
            BoolExpr::Or(l, r) => l.evaluate(data) || r.evaluate(data),
            BoolExpr::Not(inner) => !inner.evaluate(data),
        }
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn literal_as_f64(literal: &Literal) -> Option<f64> {
    match literal {
        Literal::Int(i) => Some(*i as f64),
        Literal::Float(f) => Some(*f),
        _ => None,
    }
}

fn equals(actual: &Value, expected: &Literal) -> bool {
    // Numeric comparison goes through f64 so 100 == 100.0 holds.
    if let (Some(a), Some(b)) = (as_f64(actual), literal_as_f64(expected)) {
        return (a - b).abs() < f64::EPSILON;
    }
    match (actual, expected) {
        (Value::String(a), Literal::Str(b)) => a == b,
        (Value::Bool(a), Literal::Bool(b)) => a == b,
        _ => false,
    }
}

fn compare(actual: &Value, op: CompareOp, expected: &Literal) -> bool {
    match op {
        CompareOp::Eq => equals(actual, expected),
        CompareOp::Neq => !equals(actual, expected),
        CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
            if let (Some(a), Some(b)) = (as_f64(actual), literal_as_f64(expected)) {
                return ordered(a.partial_cmp(&b), op);
            }
            if let (Value::String(a), Literal::Str(b)) = (actual, expected) {
                return ordered(Some(a.as_str().cmp(b.as_str())), op);
            }
            false
        }
    }
}

fn ordered(ordering: Option<std::cmp::Ordering>, op: CompareOp) -> bool {
    use std::cmp::Ordering::*;
    match (ordering, op) {
        (Some(Greater), CompareOp::Gt | CompareOp::Gte) => true,
        (Some(Less), CompareOp::Lt | CompareOp::Lte) => true,
        (Some(Equal), CompareOp::Gte | CompareOp::Lte) => true,
        _ => false,
    }
}

// -- Grammar ----------------------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        take_while(1.., |c: char| c.is_ascii_whitespace()).void(),
    )
    .parse_next(input)?;
    Ok(())
}

fn path<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '.'
        }),
    )
        .take()
        .parse_next(input)
}

fn string_literal(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = any.parse_next(input)?;
        match ch {
            '"' => return Ok(s),
            '\\' => {
                let esc = any.parse_next(input)?;
                match esc {
                    '"' => s.push('"'),
                    '\\' => s.push('\\'),
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            c => s.push(c),
        }
    }
}

fn number_literal(input: &mut &str) -> ModalResult<Literal> {
    let text = (
        opt('-'),
        take_while(1.., |c: char| c.is_ascii_digit() || c == '.'),
    )
        .take()
        .parse_next(input)?;
    if text.contains('.') {
        text.parse::<f64>()
            .map(Literal::Float)
            .map_err(|_| ErrMode::from_input(input).cut())
    } else {
        text.parse::<i64>()
            .map(Literal::Int)
            .map_err(|_| ErrMode::from_input(input).cut())
    }
}

fn literal(input: &mut &str) -> ModalResult<Literal> {
    ws.parse_next(input)?;
    alt((
        string_literal.map(Literal::Str),
        "true".value(Literal::Bool(true)),
        "false".value(Literal::Bool(false)),
        number_literal,
    ))
    .context(StrContext::Expected(StrContextValue::Description("literal")))
    .parse_next(input)
}

fn compare_op(input: &mut &str) -> ModalResult<CompareOp> {
    ws.parse_next(input)?;
    alt((
        ">=".value(CompareOp::Gte),
        ">".value(CompareOp::Gt),
        "<=".value(CompareOp::Lte),
        "<".value(CompareOp::Lt),
        "==".value(CompareOp::Eq),
        "!=".value(CompareOp::Neq),
    ))
    .parse_next(input)
}

fn comparison(input: &mut &str) -> ModalResult<BoolExpr> {
    let field = path.parse_next(input)?;
    let op = compare_op.parse_next(input)?;
    let value = cut_err(literal).parse_next(input)?;
    Ok(BoolExpr::Compare {
        path: field.to_owned(),
        op,
        value,
    })
}

fn primary(input: &mut &str) -> ModalResult<BoolExpr> {
    ws.parse_next(input)?;
    alt((delimited('(', expr, (ws, ')')), comparison))
        .context(StrContext::Expected(StrContextValue::Description(
            "comparison or group",
        )))
        .parse_next(input)
}

fn unary(input: &mut &str) -> ModalResult<BoolExpr> {
    ws.parse_next(input)?;
    if opt('!').parse_next(input)?.is_some() {
        let inner = cut_err(unary).parse_next(input)?;
        Ok(BoolExpr::Not(Box::new(inner)))
    } else {
        primary(input)
    }
}

fn and_expr(input: &mut &str) -> ModalResult<BoolExpr> {
    let first = unary(input)?;
    let rest: Vec<BoolExpr> =
        repeat(0.., preceded((ws, "&&"), cut_err(unary))).parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, r| BoolExpr::And(Box::new(acc), Box::new(r))))
}

fn or_expr(input: &mut &str) -> ModalResult<BoolExpr> {
    let first = and_expr(input)?;
    let rest: Vec<BoolExpr> =
        repeat(0.., preceded((ws, "||"), cut_err(and_expr))).parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, r| BoolExpr::Or(Box::new(acc), Box::new(r))))
}

fn expr(input: &mut &str) -> ModalResult<BoolExpr> {
    ws.parse_next(input)?;
    or_expr(input)
}

// -- Compiler ---------------------------------------------------------------

/// A predicate compiled from expression source, evaluated against a JSON
/// data snapshot.
#[derive(Clone)]
pub struct CompiledPredicate {
    expr: Arc<BoolExpr>,
    source: String,
}

impl CompiledPredicate {
    /// The source text this predicate was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Run the predicate. Total: unresolvable paths and incompatible
    /// comparisons are false.
    pub fn evaluate(&self, data: &Value) -> bool {
        self.expr.evaluate(data)
    }
}

impl std::fmt::Debug for CompiledPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledPredicate")
            .field("source", &self.source)
            .finish()
    }
}

/// Turns predicate source text into a compiled callable.
///
/// The evaluation core never depends on how a predicate was compiled; leaf
/// construction and transport decode go through this seam so hosts can plug
/// in their own dialect.
pub trait PredicateCompiler: Send + Sync {
    /// Compile source text, failing on a syntax error.
    fn compile(&self, source: &str) -> Result<CompiledPredicate, RuleError>;
}

/// Default compiler for the built-in expression dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionCompiler;

impl PredicateCompiler for ExpressionCompiler {
    fn compile(&self, source: &str) -> Result<CompiledPredicate, RuleError> {
        let parsed = delimited(ws, expr, ws)
            .parse(source)
            .map_err(|e| RuleError::Expression(e.to_string()))?;
        Ok(CompiledPredicate {
            expr: Arc::new(parsed),
            source: source.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(source: &str) -> CompiledPredicate {
        ExpressionCompiler.compile(source).unwrap()
    }

    #[test]
    fn test_comparison_operators() {
        let data = json!({"age": 21});
        for (source, expected) in [
            ("age == 21", true),
            ("age != 21", false),
            ("age > 20", true),
            ("age >= 21", true),
            ("age < 21", false),
            ("age <= 21", true),
        ] {
            assert_eq!(compile(source).evaluate(&data), expected, "{source}");
        }
    }

    #[test]
    fn test_string_and_bool_literals() {
        let data = json!({"country": "UK", "blocked": false});
        assert!(compile(r#"country == "UK""#).evaluate(&data));
        assert!(compile(r#"country != "FR""#).evaluate(&data));
        assert!(compile("blocked == false").evaluate(&data));
        assert!(compile("!blocked == true").evaluate(&data));
    }

    #[test]
    fn test_numeric_coercion() {
        let data = json!({"total": 100});
        assert!(compile("total == 100.0").evaluate(&data));
        assert!(compile("total >= 99.5").evaluate(&data));
    }

    #[test]
    fn test_nested_paths() {
        let data = json!({"address": {"city": "London"}});
        assert!(compile(r#"address.city == "London""#).evaluate(&data));
    }

    #[test]
    fn test_boolean_combinators_and_precedence() {
        let data = json!({"a": 1, "b": 2, "c": 3});
        // && binds tighter than ||.
        assert!(compile("a == 9 || b == 2 && c == 3").evaluate(&data));
        assert!(!compile("(a == 9 || b == 2) && c == 9").evaluate(&data));
        assert!(compile("!(a == 9) && c == 3").evaluate(&data));
    }

    #[test]
    fn test_missing_property_is_false() {
        let data = json!({"age": 21});
        assert!(!compile("height > 100").evaluate(&data));
        // And through negation it is observable again.
        assert!(compile("!(height > 100)").evaluate(&data));
    }

    #[test]
    fn test_incompatible_types_are_false() {
        let data = json!({"age": "twenty"});
        assert!(!compile("age > 18").evaluate(&data));
        assert!(!compile("age == 18").evaluate(&data));
    }

    #[test]
    fn test_negative_numbers() {
        let data = json!({"balance": -5});
        assert!(compile("balance == -5").evaluate(&data));
        assert!(compile("balance < 0").evaluate(&data));
    }

    #[test]
    fn test_syntax_error_fails_compile() {
        assert!(ExpressionCompiler.compile("age >=").is_err());
        assert!(ExpressionCompiler.compile("&& age == 1").is_err());
        assert!(ExpressionCompiler.compile("age == 1 garbage").is_err());
    }
}
