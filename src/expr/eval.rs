//! Side-effecting evaluation of actions and pure evaluation of guards.

use crate::config;
use crate::error::EvalError;
use crate::expr::ast::{BinOp, Expr, Stmt, UnOp};
use crate::expr::env::VarEnv;
use crate::expr::{BUILTIN_TICK, parser};
use crate::model::Value;

/// Executes an action (a `;`-separated statement list) against `env`.
pub fn run_action(src: &str, env: &mut VarEnv, tick: u64) -> Result<(), EvalError> {
    let program = parser::parse_program(src)?;
    let mut steps = 0usize;
    for stmt in &program.stmts {
        match stmt {
            Stmt::Assign { target, value } => {
                let value = eval_expr(value, env, tick, &mut steps)?;
                if crate::expr::is_builtin(target) {
                    return Err(EvalError::ReadOnly(target.clone()));
                }
                env.write(target, value)?;
            }
            Stmt::Expr(expr) => {
                eval_expr(expr, env, tick, &mut steps)?;
            }
        }
    }
    Ok(())
}

/// Evaluates a guard to a boolean. Integers coerce (`0` is false); any
/// other result type is a mismatch.
pub fn eval_condition(src: &str, env: &VarEnv, tick: u64) -> Result<bool, EvalError> {
    let expr = parser::parse_condition(src)?;
    let mut steps = 0usize;
    match eval_expr(&expr, env, tick, &mut steps)? {
        Value::Bool(b) => Ok(b),
        Value::Int(i) => Ok(i != 0),
        other => Err(EvalError::TypeMismatch(format!(
            "condition evaluated to {} instead of bool",
            other.var_type()
        ))),
    }
}

fn eval_expr(
    expr: &Expr,
    env: &VarEnv,
    tick: u64,
    steps: &mut usize,
) -> Result<Value, EvalError> {
    *steps += 1;
    if *steps > config::MAX_EVAL_STEPS {
        return Err(EvalError::ResourceLimit(format!(
            "evaluation exceeds {} steps",
            config::MAX_EVAL_STEPS
        )));
    }

    match expr {
        Expr::Int(i) => Ok(Value::Int(*i)),
        Expr::Float(x) => Ok(Value::Float(*x)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Ident(name) => {
            if name == BUILTIN_TICK {
                return Ok(Value::Int(tick as i64));
            }
            env.read(name)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedVariable(name.clone()))
        }
        Expr::Unary { op, operand } => {
            let value = eval_expr(operand, env, tick, steps)?;
            apply_unary(*op, value)
        }
        Expr::Binary { op, lhs, rhs } => match op {
            // Short-circuit forms evaluate the right side only when needed.
            BinOp::And => {
                if !expect_bool(eval_expr(lhs, env, tick, steps)?, "&&")? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(expect_bool(
                    eval_expr(rhs, env, tick, steps)?,
                    "&&",
                )?))
            }
            BinOp::Or => {
                if expect_bool(eval_expr(lhs, env, tick, steps)?, "||")? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(expect_bool(
                    eval_expr(rhs, env, tick, steps)?,
                    "||",
                )?))
            }
            _ => {
                let lhs = eval_expr(lhs, env, tick, steps)?;
                let rhs = eval_expr(rhs, env, tick, steps)?;
                apply_binary(*op, lhs, rhs)
            }
        },
    }
}

fn apply_unary(op: UnOp, value: Value) -> Result<Value, EvalError> {
    match (op, value) {
        (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| EvalError::Overflow(format!("-({i})"))),
        (UnOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnOp::Not, other) => Err(EvalError::TypeMismatch(format!(
            "'!' expects bool, found {}",
            other.var_type()
        ))),
        (UnOp::Neg, other) => Err(EvalError::TypeMismatch(format!(
            "unary '-' expects a number, found {}",
            other.var_type()
        ))),
    }
}

fn apply_binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    use Value::*;

    match op {
        BinOp::Add => match (lhs, rhs) {
            (Int(a), Int(b)) => a
                .checked_add(b)
                .map(Int)
                .ok_or_else(|| EvalError::Overflow(format!("{a} + {b}"))),
            (Str(a), Str(b)) => Ok(Str(a + &b)),
            (a, b) => numeric(a, b, "+", |x, y| x + y),
        },
        BinOp::Sub => match (lhs, rhs) {
            (Int(a), Int(b)) => a
                .checked_sub(b)
                .map(Int)
                .ok_or_else(|| EvalError::Overflow(format!("{a} - {b}"))),
            (a, b) => numeric(a, b, "-", |x, y| x - y),
        },
        BinOp::Mul => match (lhs, rhs) {
            (Int(a), Int(b)) => a
                .checked_mul(b)
                .map(Int)
                .ok_or_else(|| EvalError::Overflow(format!("{a} * {b}"))),
            (a, b) => numeric(a, b, "*", |x, y| x * y),
        },
        BinOp::Div => match (lhs, rhs) {
            (_, Int(0)) => Err(EvalError::DivisionByZero),
            (Int(a), Int(b)) => a
                .checked_div(b)
                .map(Int)
                .ok_or_else(|| EvalError::Overflow(format!("{a} / {b}"))),
            (_, Float(b)) if b == 0.0 => Err(EvalError::DivisionByZero),
            (a, b) => numeric(a, b, "/", |x, y| x / y),
        },
        BinOp::Rem => match (lhs, rhs) {
            (_, Int(0)) => Err(EvalError::DivisionByZero),
            (Int(a), Int(b)) => a
                .checked_rem(b)
                .map(Int)
                .ok_or_else(|| EvalError::Overflow(format!("{a} % {b}"))),
            (_, Float(b)) if b == 0.0 => Err(EvalError::DivisionByZero),
            (a, b) => numeric(a, b, "%", |x, y| x % y),
        },
        BinOp::Eq => compare(lhs, rhs, "==").map(|o| Bool(o == std::cmp::Ordering::Equal)),
        BinOp::Ne => compare(lhs, rhs, "!=").map(|o| Bool(o != std::cmp::Ordering::Equal)),
        BinOp::Lt => compare(lhs, rhs, "<").map(|o| Bool(o == std::cmp::Ordering::Less)),
        BinOp::Le => compare(lhs, rhs, "<=").map(|o| Bool(o != std::cmp::Ordering::Greater)),
        BinOp::Gt => compare(lhs, rhs, ">").map(|o| Bool(o == std::cmp::Ordering::Greater)),
        BinOp::Ge => compare(lhs, rhs, ">=").map(|o| Bool(o != std::cmp::Ordering::Less)),
        BinOp::BitAnd => bitwise(lhs, rhs, "&", |a, b| a & b),
        BinOp::BitOr => bitwise(lhs, rhs, "|", |a, b| a | b),
        BinOp::BitXor => bitwise(lhs, rhs, "^", |a, b| a ^ b),
        // Short-circuit forms are handled by the caller.
        BinOp::And | BinOp::Or => unreachable!("short-circuit ops evaluated in eval_expr"),
    }
}

/// Mixed int/float arithmetic promotes to float.
fn numeric(
    lhs: Value,
    rhs: Value,
    op: &str,
    f: impl FnOnce(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    match (as_float(lhs), as_float(rhs)) {
        (Some(a), Some(b)) => Ok(Value::Float(f(a, b))),
        _ => Err(EvalError::TypeMismatch(format!(
            "'{op}' expects numeric operands"
        ))),
    }
}

fn bitwise(
    lhs: Value,
    rhs: Value,
    op: &str,
    f: impl FnOnce(i64, i64) -> i64,
) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(f(a, b))),
        _ => Err(EvalError::TypeMismatch(format!(
            "'{op}' expects integer operands"
        ))),
    }
}

fn compare(lhs: Value, rhs: Value, op: &str) -> Result<std::cmp::Ordering, EvalError> {
    use Value::*;
    match (&lhs, &rhs) {
        (Int(a), Int(b)) => Ok(a.cmp(b)),
        (Str(a), Str(b)) => Ok(a.cmp(b)),
        (Bool(a), Bool(b)) if op == "==" || op == "!=" => Ok(a.cmp(b)),
        _ => match (as_float(lhs.clone()), as_float(rhs.clone())) {
            (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| {
                EvalError::TypeMismatch(format!("'{op}' cannot order NaN"))
            }),
            _ => Err(EvalError::TypeMismatch(format!(
                "'{op}' cannot compare {} with {}",
                lhs.var_type(),
                rhs.var_type()
            ))),
        },
    }
}

fn as_float(value: Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(i as f64),
        Value::Float(x) => Some(x),
        _ => None,
    }
}

fn expect_bool(value: Value, op: &str) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::TypeMismatch(format!(
            "'{op}' expects bool operands, found {}",
            other.var_type()
        ))),
    }
}
