//! Re-emission of generic-dialect expressions as Python source.
//!
//! The generated class keeps its variables as attributes, so declared
//! identifiers gain a `self.` prefix and the tick built-in maps onto the
//! class counter. Foreign dialects never pass through here.

use std::collections::BTreeSet;

use crate::error::EvalError;
use crate::expr::ast::{BinOp, Expr, Stmt, UnOp};
use crate::expr::{BUILTIN_TICK, parser};

/// Renders an action as one Python statement per line.
pub(crate) fn action_to_python(
    src: &str,
    declared: &BTreeSet<String>,
) -> Result<Vec<String>, EvalError> {
    let program = parser::parse_program(src)?;
    Ok(program
        .stmts
        .iter()
        .map(|stmt| emit_stmt(stmt, declared))
        .collect())
}

/// Renders a guard as one Python expression.
pub(crate) fn condition_to_python(
    src: &str,
    declared: &BTreeSet<String>,
) -> Result<String, EvalError> {
    let expr = parser::parse_condition(src)?;
    Ok(emit(&expr, declared))
}

pub(crate) fn py_str(s: &str) -> String {
    format!(
        "\"{}\"",
        s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
    )
}

fn emit_stmt(stmt: &Stmt, declared: &BTreeSet<String>) -> String {
    match stmt {
        Stmt::Assign { target, value } => {
            format!("{} = {}", emit_ident(target, declared), emit(value, declared))
        }
        Stmt::Expr(expr) => emit(expr, declared),
    }
}

fn emit_ident(name: &str, declared: &BTreeSet<String>) -> String {
    if name == BUILTIN_TICK {
        "self.tick_count".to_string()
    } else if declared.contains(name) {
        format!("self.{name}")
    } else {
        name.to_string()
    }
}

/// Binary expressions come out fully parenthesized; precedence never
/// depends on the reader knowing Python's table.
fn emit(expr: &Expr, declared: &BTreeSet<String>) -> String {
    match expr {
        Expr::Int(i) => i.to_string(),
        Expr::Float(x) => format!("{x:?}"),
        Expr::Bool(true) => "True".to_string(),
        Expr::Bool(false) => "False".to_string(),
        Expr::Str(s) => py_str(s),
        Expr::Ident(name) => emit_ident(name, declared),
        Expr::Unary { op, operand } => match op {
            UnOp::Not => format!("not {}", emit(operand, declared)),
            UnOp::Neg => format!("-{}", emit(operand, declared)),
        },
        Expr::Binary { op, lhs, rhs } => format!(
            "({} {} {})",
            emit(lhs, declared),
            py_op(*op),
            emit(rhs, declared)
        ),
    }
}

fn py_op(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Rem => "%",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "and",
        BinOp::Or => "or",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared() -> BTreeSet<String> {
        BTreeSet::from(["timer".to_string(), "armed".to_string()])
    }

    #[test]
    fn declared_variables_gain_the_self_prefix() {
        let lines = action_to_python("timer = timer + 1; armed = true", &declared()).unwrap();
        assert_eq!(
            lines,
            vec!["self.timer = (self.timer + 1)", "self.armed = True"]
        );
    }

    #[test]
    fn boolean_operators_become_keywords() {
        let expr =
            condition_to_python("timer >= 5 && !armed || current_tick == 0", &declared()).unwrap();
        assert_eq!(
            expr,
            "(((self.timer >= 5) and not self.armed) or (self.tick_count == 0))"
        );
    }
}
