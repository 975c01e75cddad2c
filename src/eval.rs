//! Expression evaluation: a pure recursive walk with per-operator type
//! checks and no coercion. The only state it touches is variable lookup.

use crate::ast::{BinaryOp, Expr, Part, Template, UnaryOp};
use crate::error::{Error, Result};
use crate::value::{Value, VariableStore};

/// Outcome of evaluating a whole expression. Reading an unset variable
/// produces the undefined sentinel; feeding that sentinel to any operator
/// is an error, but a bare copy of it is allowed (assignment unsets).
pub(crate) enum Evaluated {
    Value(Value),
    Undefined(String),
}

pub(crate) fn evaluate(expr: &Expr, vars: &VariableStore) -> Result<Evaluated> {
    match expr {
        Expr::Number(n) => Ok(Evaluated::Value(Value::Number(*n))),
        Expr::Str(s) => Ok(Evaluated::Value(Value::Str(s.clone()))),
        Expr::Bool(b) => Ok(Evaluated::Value(Value::Bool(*b))),
        Expr::Variable(name) => Ok(match vars.get(name) {
            Some(value) => Evaluated::Value(value.clone()),
            None => Evaluated::Undefined(name.clone()),
        }),
        Expr::Unary(op, operand) => {
            let operand = evaluate_value(operand, vars)?;
            apply_unary(*op, operand).map(Evaluated::Value)
        }
        Expr::Binary(op, left, right) => {
            let left = evaluate_value(left, vars)?;
            let right = evaluate_value(right, vars)?;
            apply_binary(*op, left, right).map(Evaluated::Value)
        }
    }
}

/// Evaluate where a concrete value is required; undefined is an error here.
pub(crate) fn evaluate_value(expr: &Expr, vars: &VariableStore) -> Result<Value> {
    match evaluate(expr, vars)? {
        Evaluated::Value(value) => Ok(value),
        Evaluated::Undefined(name) => Err(Error::UndefinedVariable(name)),
    }
}

/// Evaluate an `<<if>>` condition or shortcut guard.
pub(crate) fn evaluate_condition(expr: &Expr, vars: &VariableStore) -> Result<bool> {
    match evaluate_value(expr, vars)? {
        Value::Bool(b) => Ok(b),
        other => Err(Error::TypeMismatch(format!(
            "condition must be a boolean, got {} '{}'",
            other.type_name(),
            other
        ))),
    }
}

/// Render an interpolatable text line or option label.
pub(crate) fn render(template: &Template, vars: &VariableStore) -> Result<String> {
    let mut out = String::new();
    for part in &template.parts {
        match part {
            Part::Text(text) => out.push_str(text),
            Part::Expr(expr) => {
                let value = evaluate_value(expr, vars)?;
                out.push_str(&value.to_string());
            }
        }
    }
    Ok(out)
}

fn apply_unary(op: UnaryOp, operand: Value) -> Result<Value> {
    match (op, operand) {
        (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, other) => Err(Error::TypeMismatch(format!(
            "'-' expects a number, got {}",
            other.type_name()
        ))),
        (UnaryOp::Not, other) => Err(Error::TypeMismatch(format!(
            "'not' expects a boolean, got {}",
            other.type_name()
        ))),
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    use BinaryOp::*;
    match op {
        Add => match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::Str(l), Value::Str(r)) => Ok(Value::Str(l + &r)),
            (l, r) => Err(type_error(op, &l, &r, "two numbers or two strings")),
        },
        Sub | Mul | Div | Rem => match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(match op {
                Sub => l - r,
                Mul => l * r,
                Div => l / r,
                _ => l % r,
            })),
            (l, r) => Err(type_error(op, &l, &r, "numbers")),
        },
        Lt | Le | Gt | Ge => match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Bool(match op {
                Lt => l < r,
                Le => l <= r,
                Gt => l > r,
                _ => l >= r,
            })),
            (l, r) => Err(type_error(op, &l, &r, "numbers")),
        },
        Eq | Ne => {
            let equal = match (&left, &right) {
                (Value::Number(l), Value::Number(r)) => l == r,
                (Value::Str(l), Value::Str(r)) => l == r,
                (Value::Bool(l), Value::Bool(r)) => l == r,
                (l, r) => {
                    return Err(Error::TypeMismatch(format!(
                        "'{}' cannot compare {} with {}",
                        op.symbol(),
                        l.type_name(),
                        r.type_name()
                    )))
                }
            };
            Ok(Value::Bool(if op == Eq { equal } else { !equal }))
        }
        And | Or => match (left, right) {
            (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(if op == And {
                l && r
            } else {
                l || r
            })),
            (l, r) => Err(type_error(op, &l, &r, "booleans")),
        },
    }
}

fn type_error(op: BinaryOp, left: &Value, right: &Value, expected: &str) -> Error {
    Error::TypeMismatch(format!(
        "'{}' expects {}, got {} and {}",
        op.symbol(),
        expected,
        left.type_name(),
        right.type_name()
    ))
}
