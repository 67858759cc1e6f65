//! Precedence rendering for condition trees.
//!
//! Used by set evaluation to attach a human-readable view of the tree to
//! each result. A custom printer that fails is caught by the set
//! evaluator and stringified; it never aborts an evaluation.

use crate::error::RuleError;
use crate::tree::BooleanCondition;

/// What a leaf renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintMode {
    /// Render the condition name.
    #[default]
    ConditionName,

    /// Render the expression text.
    Expression,
}

/// Renders a condition tree as a parenthesized string.
pub trait PrecedencePrinter: Send + Sync {
    fn print(&self, root: &BooleanCondition) -> Result<String, RuleError>;
}

/// Default printer: `(L AndAlso R)` / `(L OrElse R)` with configurable
/// leaf rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPrinter {
    mode: PrintMode,
}

impl DefaultPrinter {
    pub fn new(mode: PrintMode) -> Self {
        Self { mode }
    }
}

impl PrecedencePrinter for DefaultPrinter {
    fn print(&self, root: &BooleanCondition) -> Result<String, RuleError> {
        Ok(render(root, self.mode))
    }
}

fn render(node: &BooleanCondition, mode: PrintMode) -> String {
    match node {
        BooleanCondition::And(left, right) => {
            format!("({} AndAlso {})", render(left, mode), render(right, mode))
        }
        BooleanCondition::Or(left, right) => {
            format!("({} OrElse {})", render(left, mode), render(right, mode))
        }
        BooleanCondition::Leaf(leaf) => match mode {
            PrintMode::ConditionName => leaf.name().to_string(),
            PrintMode::Expression => leaf.expression().to_string(),
        },
    }
}
