use std::cmp::Ordering;

use crate::errors::{Error, Result};
use crate::expression::BinOp;
use crate::value::Value;

/// Numeric strings compare numerically against numbers, so `x > 3` works
/// directly on a record.
fn numeric_pair(a: &Value, b: &Value) -> Option<(f64, f64)> {
    match (a, b) {
        (Value::Str(s), n) if !matches!(n, Value::Str(_)) => {
            Some((s.trim().parse::<f64>().ok()?, n.as_f64()?))
        }
        (n, Value::Str(s)) if !matches!(n, Value::Str(_)) => {
            Some((n.as_f64()?, s.trim().parse::<f64>().ok()?))
        }
        _ => Some((a.as_f64()?, b.as_f64()?)),
    }
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Str(_), Value::Str(_)) => a == b,
        (Value::Str(_), Value::Int(_) | Value::Float(_))
        | (Value::Int(_) | Value::Float(_), Value::Str(_)) => match numeric_pair(a, b) {
            Some((x, y)) => x == y,
            None => false,
        },
        _ => a == b,
    }
}

pub fn compare_values(a: &Value, b: &Value) -> Result<Ordering> {
    match (a, b) {
        (Value::Str(sa), Value::Str(sb)) => Ok(sa.cmp(sb)),
        (Value::List(la), Value::List(lb)) => {
            for (x, y) in la.iter().zip(lb.iter()) {
                match compare_values(x, y)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(la.len().cmp(&lb.len()))
        }
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        _ => match numeric_pair(a, b) {
            Some((x, y)) => x.partial_cmp(&y).ok_or_else(|| {
                Error::Value("cannot order nan".into())
            }),
            None => Err(Error::type_error(format!(
                "'<' not supported between '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

/// Evaluate a comparison operator.
pub fn cmp_values(op: BinOp, a: &Value, b: &Value) -> Result<bool> {
    Ok(match op {
        BinOp::Eq => values_equal(a, b),
        BinOp::Ne => !values_equal(a, b),
        BinOp::Lt => compare_values(a, b)? == Ordering::Less,
        BinOp::Lte => compare_values(a, b)? != Ordering::Greater,
        BinOp::Gt => compare_values(a, b)? == Ordering::Greater,
        BinOp::Gte => compare_values(a, b)? != Ordering::Less,
        other => {
            return Err(Error::type_error(format!("'{}' is not a comparison", other.symbol())))
        }
    })
}

fn unsupported(op: BinOp, a: &Value, b: &Value) -> Error {
    Error::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        a.type_name(),
        b.type_name()
    ))
}

fn overflow() -> Error {
    Error::Value("integer overflow".into())
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

/// Repeated sequences above this many elements are refused.
const MAX_REPEAT_LEN: usize = 1 << 28;

fn repeat_count(len: usize, n: i64) -> Result<usize> {
    let n = usize::try_from(n.max(0)).map_err(|_| too_long())?;
    match len.checked_mul(n) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(n),
        _ => Err(too_long()),
    }
}

fn too_long() -> Error {
    Error::Value("repeated sequence too long".into())
}

fn repeat<T: Clone>(items: &[T], n: i64) -> Result<Vec<T>> {
    let n = repeat_count(items.len(), n)?;
    let mut out = Vec::with_capacity(items.len() * n);
    for _ in 0..n {
        out.extend_from_slice(items);
    }
    Ok(out)
}

/// Evaluate an arithmetic operator.
pub fn arithmetic(op: BinOp, a: &Value, b: &Value) -> Result<Value> {
    match (op, a, b) {
        (BinOp::Add, Value::Str(x), Value::Str(y)) => return Ok(Value::Str(format!("{x}{y}"))),
        (BinOp::Add, Value::List(x), Value::List(y)) => {
            let mut out = x.clone();
            out.extend(y.iter().cloned());
            return Ok(Value::List(out));
        }
        (BinOp::Mul, Value::Str(s), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
            return Ok(Value::Str(s.repeat(repeat_count(s.len(), *n)?)));
        }
        (BinOp::Mul, Value::List(l), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::List(l)) => {
            return repeat(l, *n).map(Value::List);
        }
        _ => {}
    }

    if matches!(a, Value::Str(_) | Value::List(_) | Value::Map(_) | Value::Null)
        || matches!(b, Value::Str(_) | Value::List(_) | Value::Map(_) | Value::Null)
    {
        return Err(unsupported(op, a, b));
    }

    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        let (x, y) = (*x, *y);
        return match op {
            BinOp::Add => x.checked_add(y).map(Value::Int).ok_or_else(overflow),
            BinOp::Sub => x.checked_sub(y).map(Value::Int).ok_or_else(overflow),
            BinOp::Mul => x.checked_mul(y).map(Value::Int).ok_or_else(overflow),
            BinOp::Div if y == 0 => Err(Error::ZeroDivision),
            BinOp::Div => Ok(Value::Float(x as f64 / y as f64)),
            BinOp::FloorDiv if y == 0 => Err(Error::ZeroDivision),
            BinOp::FloorDiv => floor_div(x, y).map(Value::Int).ok_or_else(overflow),
            BinOp::Mod if y == 0 => Err(Error::ZeroDivision),
            BinOp::Mod => floor_mod(x, y).map(Value::Int).ok_or_else(overflow),
            _ => Err(unsupported(op, a, b)),
        };
    }

    let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
        return Err(unsupported(op, a, b));
    };
    match op {
        BinOp::Add => Ok(Value::Float(x + y)),
        BinOp::Sub => Ok(Value::Float(x - y)),
        BinOp::Mul => Ok(Value::Float(x * y)),
        BinOp::Div | BinOp::FloorDiv | BinOp::Mod if y == 0.0 => Err(Error::ZeroDivision),
        BinOp::Div => Ok(Value::Float(x / y)),
        BinOp::FloorDiv => Ok(Value::Float((x / y).floor())),
        BinOp::Mod => Ok(Value::Float(x - y * (x / y).floor())),
        _ => Err(unsupported(op, a, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numeric_strings_compare_as_numbers() {
        assert!(cmp_values(BinOp::Gt, &Value::from("10"), &Value::Int(9)).unwrap());
        assert!(cmp_values(BinOp::Eq, &Value::Int(3), &Value::from(" 3")).unwrap());
        assert!(!cmp_values(BinOp::Eq, &Value::from("3"), &Value::from("3.0")).unwrap());
        assert!(cmp_values(BinOp::Lt, &Value::from("abc"), &Value::from("abd")).unwrap());
    }

    #[test]
    fn ordering_mismatched_types_is_a_type_error() {
        let err = cmp_values(BinOp::Lt, &Value::from("a"), &Value::Int(1)).unwrap_err();
        assert_eq!(err.kind(), "TypeError");
    }

    #[test]
    fn floor_semantics() {
        assert_eq!(arithmetic(BinOp::FloorDiv, &Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(-4));
        assert_eq!(arithmetic(BinOp::Mod, &Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(1));
        assert_eq!(arithmetic(BinOp::Div, &Value::Int(7), &Value::Int(2)).unwrap(), Value::Float(3.5));
    }

    #[test]
    fn division_by_zero() {
        for op in [BinOp::Div, BinOp::FloorDiv, BinOp::Mod] {
            assert!(matches!(arithmetic(op, &Value::Int(1), &Value::Int(0)), Err(Error::ZeroDivision)));
        }
        assert!(matches!(
            arithmetic(BinOp::Div, &Value::Float(1.0), &Value::Int(0)),
            Err(Error::ZeroDivision)
        ));
    }

    #[test]
    fn sequences() {
        assert_eq!(arithmetic(BinOp::Add, &Value::from("a"), &Value::from("b")).unwrap(), Value::from("ab"));
        assert_eq!(arithmetic(BinOp::Mul, &Value::from("-"), &Value::Int(3)).unwrap(), Value::from("---"));
        let err = arithmetic(BinOp::Add, &Value::from("1"), &Value::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: unsupported operand type(s) for +: 'str' and 'int'");
    }

    #[test]
    fn huge_repeat_is_a_value_error() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        for (a, b) in [(list.clone(), Value::Int(i64::MAX)), (Value::from("ab"), Value::Int(i64::MAX))] {
            let err = arithmetic(BinOp::Mul, &a, &b).unwrap_err();
            assert_eq!(err.to_string(), "ValueError: repeated sequence too long");
        }
        assert_eq!(arithmetic(BinOp::Mul, &list, &Value::Int(-3)).unwrap(), Value::List(vec![]));
        assert_eq!(arithmetic(BinOp::Mul, &Value::Int(0), &Value::from("ab")).unwrap(), Value::from(""));
    }
}
