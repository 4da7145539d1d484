use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::ExprError;
use super::parser::{BinaryOp, CompareOp, Expr, UnaryOp};
use crate::script::value::{Number, Value, VarStore};

pub fn eval(expr: &Expr, vars: &VarStore) -> Result<Value, ExprError> {
    match expr {
        Expr::Int(n) => Ok(Value::Int(*n)),
        Expr::Float(f) => Ok(Value::Float(*f)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Nil => Ok(Value::Nil),
        Expr::Var(name) => vars
            .get(name)
            .cloned()
            .ok_or_else(|| ExprError::UndefinedVariable(name.clone())),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, vars))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Map(entries) => {
            let mut map = BTreeMap::new();
            for (key, value) in entries {
                let key = eval(key, vars)?;
                let key = key.to_key().ok_or_else(|| {
                    ExprError::Type(format!("unhashable map key type '{}'", key.type_name()))
                })?;
                map.insert(key, eval(value, vars)?);
            }
            Ok(Value::Map(map))
        }
        Expr::Index(target, index) => index_value(&eval(target, vars)?, &eval(index, vars)?),
        Expr::Unary(op, operand) => unary(*op, eval(operand, vars)?),
        Expr::Binary(op, left, right) => binary(*op, &eval(left, vars)?, &eval(right, vars)?),
        Expr::Compare(first, links) => {
            let mut left = eval(first, vars)?;
            for (op, right) in links {
                let right = eval(right, vars)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Expr::And(left, right) => {
            let left = eval(left, vars)?;
            if left.is_truthy() { eval(right, vars) } else { Ok(left) }
        }
        Expr::Or(left, right) => {
            let left = eval(left, vars)?;
            if left.is_truthy() { Ok(left) } else { eval(right, vars) }
        }
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, ExprError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Pos | UnaryOp::Neg => {
            let number = value.as_number().ok_or_else(|| {
                ExprError::Type(format!("bad operand type for unary -: '{}'", value.type_name()))
            })?;
            match (op, number) {
                (UnaryOp::Pos, Number::Int(n)) => Ok(Value::Int(n)),
                (UnaryOp::Pos, Number::Float(f)) => Ok(Value::Float(f)),
                (_, Number::Int(n)) => n.checked_neg().map(Value::Int).ok_or(ExprError::Overflow),
                (_, Number::Float(f)) => Ok(Value::Float(-f)),
            }
        }
    }
}

fn unsupported(op: BinaryOp, a: &Value, b: &Value) -> ExprError {
    ExprError::Type(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        a.type_name(),
        b.type_name()
    ))
}

/// Largest string (bytes) or list (items) a repetition may build
const MAX_REPEAT_LEN: usize = 1 << 24;

/// Repetition count for a sequence of `len`, or `Overflow` when the result
/// would exceed [`MAX_REPEAT_LEN`]
fn repeat_times(len: usize, times: i64) -> Result<usize, ExprError> {
    if len == 0 {
        return Ok(0);
    }
    let times = usize::try_from(times.max(0)).map_err(|_| ExprError::Overflow)?;
    match len.checked_mul(times) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(times),
        _ => Err(ExprError::Overflow),
    }
}

fn repeat<T: Clone>(items: &[T], times: i64) -> Result<Vec<T>, ExprError> {
    let times = repeat_times(items.len(), times)?;
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    Ok(out)
}

/// Apply an arithmetic operator to two values
pub fn binary(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, ExprError> {
    // sequence forms first
    match (op, a, b) {
        (BinaryOp::Add, Value::Str(x), Value::Str(y)) => return Ok(Value::Str(format!("{}{}", x, y))),
        (BinaryOp::Add, Value::List(x), Value::List(y)) => {
            return Ok(Value::List(x.iter().chain(y).cloned().collect()));
        }
        (BinaryOp::Mul, Value::Str(s), Value::Int(n)) | (BinaryOp::Mul, Value::Int(n), Value::Str(s)) => {
            return Ok(Value::Str(s.repeat(repeat_times(s.len(), *n)?)));
        }
        (BinaryOp::Mul, Value::List(items), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::List(items)) => {
            return repeat(items, *n).map(Value::List);
        }
        _ => {}
    }

    let (Some(x), Some(y)) = (a.as_number(), b.as_number()) else {
        return Err(unsupported(op, a, b));
    };

    match (x, y) {
        (Number::Int(x), Number::Int(y)) => int_op(op, x, y),
        (x, y) => float_op(op, x.as_f64(), y.as_f64()),
    }
}

fn int_op(op: BinaryOp, x: i64, y: i64) -> Result<Value, ExprError> {
    let result = match op {
        BinaryOp::Add => x.checked_add(y),
        BinaryOp::Sub => x.checked_sub(y),
        BinaryOp::Mul => x.checked_mul(y),
        BinaryOp::Div => return float_op(op, x as f64, y as f64),
        BinaryOp::FloorDiv => {
            if y == 0 {
                return Err(ExprError::DivisionByZero);
            }
            x.checked_div(y).map(|q| {
                if x % y != 0 && ((x < 0) != (y < 0)) { q - 1 } else { q }
            })
        }
        BinaryOp::Mod => {
            if y == 0 {
                return Err(ExprError::DivisionByZero);
            }
            x.checked_rem(y)
                .map(|r| if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r })
        }
        BinaryOp::Pow => {
            if y < 0 {
                return float_op(op, x as f64, y as f64);
            }
            u32::try_from(y).ok().and_then(|e| x.checked_pow(e))
        }
    };
    result.map(Value::Int).ok_or(ExprError::Overflow)
}

fn float_op(op: BinaryOp, x: f64, y: f64) -> Result<Value, ExprError> {
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if y == 0.0 => {
            return Err(ExprError::DivisionByZero);
        }
        BinaryOp::Div => x / y,
        BinaryOp::FloorDiv => (x / y).floor(),
        BinaryOp::Mod => x - y * (x / y).floor(),
        BinaryOp::Pow => x.powf(y),
    };
    Ok(Value::Float(result))
}

fn ordering(a: &Value, b: &Value) -> Result<Ordering, ExprError> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::List(x), Value::List(y)) => {
            for (l, r) in x.iter().zip(y) {
                if !l.loose_eq(r) {
                    return ordering(l, r);
                }
            }
            Ok(x.len().cmp(&y.len()))
        }
        _ => match (a.as_number(), b.as_number()) {
            (Some(Number::Int(x)), Some(Number::Int(y))) => Ok(x.cmp(&y)),
            (Some(x), Some(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .ok_or_else(|| ExprError::Type("cannot order nan".to_string())),
            _ => Err(ExprError::Type(format!(
                "'<' not supported between '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

fn contains(haystack: &Value, needle: &Value) -> Result<bool, ExprError> {
    match haystack {
        Value::List(items) => Ok(items.iter().any(|item| item.loose_eq(needle))),
        Value::Map(entries) => Ok(needle.to_key().is_some_and(|k| entries.contains_key(&k))),
        Value::Str(s) => match needle {
            Value::Str(sub) => Ok(s.contains(sub.as_str())),
            other => Err(ExprError::Type(format!(
                "'in <str>' requires str as left operand, not {}",
                other.type_name()
            ))),
        },
        other => Err(ExprError::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn compare(op: CompareOp, a: &Value, b: &Value) -> Result<bool, ExprError> {
    Ok(match op {
        CompareOp::Eq => a.loose_eq(b),
        CompareOp::NotEq => !a.loose_eq(b),
        CompareOp::Lt => ordering(a, b)? == Ordering::Less,
        CompareOp::Le => ordering(a, b)? != Ordering::Greater,
        CompareOp::Gt => ordering(a, b)? == Ordering::Greater,
        CompareOp::Ge => ordering(a, b)? != Ordering::Less,
        CompareOp::In => contains(b, a)?,
        CompareOp::NotIn => !contains(b, a)?,
    })
}

/// Resolve a possibly negative index against a sequence length
pub fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { index + len } else { index };
    (0..len).contains(&idx).then_some(idx as usize)
}

fn index_value(target: &Value, index: &Value) -> Result<Value, ExprError> {
    match target {
        Value::List(items) => {
            let Some(Number::Int(i)) = index.as_number() else {
                return Err(ExprError::Type(format!(
                    "list indices must be integers, not {}",
                    index.type_name()
                )));
            };
            resolve_index(i, items.len())
                .map(|idx| items[idx].clone())
                .ok_or_else(|| ExprError::Index(format!("list index {} out of range", i)))
        }
        Value::Str(s) => {
            let Some(Number::Int(i)) = index.as_number() else {
                return Err(ExprError::Type(format!(
                    "string indices must be integers, not {}",
                    index.type_name()
                )));
            };
            let chars: Vec<char> = s.chars().collect();
            resolve_index(i, chars.len())
                .map(|idx| Value::Str(chars[idx].to_string()))
                .ok_or_else(|| ExprError::Index(format!("string index {} out of range", i)))
        }
        Value::Map(entries) => {
            let key = index.to_key().ok_or_else(|| {
                ExprError::Type(format!("unhashable map key type '{}'", index.type_name()))
            })?;
            entries
                .get(&key)
                .cloned()
                .ok_or_else(|| ExprError::Index(format!("key {} not found", index.repr())))
        }
        other => Err(ExprError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}
