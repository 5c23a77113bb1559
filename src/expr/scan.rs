//! Static identifier extraction, used by the validator.
//!
//! Pure: nothing is evaluated, no environment is touched. The scan walks
//! the parsed AST and records which identifiers an expression reads and
//! which it writes.

use std::collections::BTreeSet;

use crate::error::EvalError;
use crate::expr::ast::{Expr, Program, Stmt};
use crate::expr::parser;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarUsage {
    pub reads: BTreeSet<String>,
    pub writes: BTreeSet<String>,
}

impl VarUsage {
    /// Every identifier the expression mentions, in name order.
    pub fn all(&self) -> BTreeSet<String> {
        self.reads.union(&self.writes).cloned().collect()
    }
}

/// Scans an action (statement list).
pub fn scan_action(src: &str) -> Result<VarUsage, EvalError> {
    let program = parser::parse_program(src)?;
    Ok(scan_program(&program))
}

/// Scans a guard expression. Assignment inside a guard is rejected by the
/// parser before scanning begins.
pub fn scan_condition(src: &str) -> Result<VarUsage, EvalError> {
    let expr = parser::parse_condition(src)?;
    let mut usage = VarUsage::default();
    collect_reads(&expr, &mut usage.reads);
    Ok(usage)
}

fn scan_program(program: &Program) -> VarUsage {
    let mut usage = VarUsage::default();
    for stmt in &program.stmts {
        match stmt {
            Stmt::Assign { target, value } => {
                usage.writes.insert(target.clone());
                collect_reads(value, &mut usage.reads);
            }
            Stmt::Expr(expr) => collect_reads(expr, &mut usage.reads),
        }
    }
    usage
}

fn collect_reads(expr: &Expr, reads: &mut BTreeSet<String>) {
    match expr {
        Expr::Ident(name) => {
            reads.insert(name.clone());
        }
        Expr::Unary { operand, .. } => collect_reads(operand, reads),
        Expr::Binary { lhs, rhs, .. } => {
            collect_reads(lhs, reads);
            collect_reads(rhs, reads);
        }
        Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) | Expr::Str(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_writes_are_separated() {
        let usage = scan_action("x = y + 1; z = x * 2").unwrap();
        assert_eq!(
            usage.writes,
            BTreeSet::from(["x".to_string(), "z".to_string()])
        );
        assert_eq!(
            usage.reads,
            BTreeSet::from(["x".to_string(), "y".to_string()])
        );
    }

    #[test]
    fn conditions_only_read() {
        let usage = scan_condition("timer >= limit && !armed").unwrap();
        assert!(usage.writes.is_empty());
        assert_eq!(
            usage.reads,
            BTreeSet::from([
                "armed".to_string(),
                "limit".to_string(),
                "timer".to_string(),
            ])
        );
    }

    #[test]
    fn malformed_input_propagates_the_parser_error() {
        assert!(matches!(scan_action("x = = 2"), Err(EvalError::Syntax(_))));
    }
}
