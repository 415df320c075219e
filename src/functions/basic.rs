//! Printing and scalar conversions.

use std::ops::RangeInclusive;

use itertools::Itertools;

use super::{arg_int, Function, Registry, MANY};
use crate::errors::{Error, Result};
use crate::eval::Machine;
use crate::value::Value;

pub(super) fn register(reg: &mut Registry) {
    reg.register(Print);
    reg.register(Int);
    reg.register(Float);
    reg.register(Str);
    reg.register(Bool);
    reg.register(Len);
    reg.register(TypeOf);
    reg.register(Abs);
    reg.register(Round);
}

/// `print(a, b, ..)` writes the display forms separated by spaces.
pub struct Print;
impl Function for Print {
    fn name(&self) -> &'static str { "print" }
    fn arity(&self) -> RangeInclusive<usize> { 0..=MANY }
    fn call(&self, args: Vec<Value>, machine: &mut Machine<'_>) -> Result<Value> {
        let line = args.iter().join(" ");
        machine.write_line(&line)?;
        Ok(Value::Null)
    }
}

/// 2^63; floats at or beyond it do not fit an `i64`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

pub struct Int;
impl Function for Int {
    fn name(&self) -> &'static str { "int" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=2 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        if args.len() == 2 {
            let base = arg_int("int", &args, 1)?;
            let text = super::arg_str("int", &args, 0)?;
            if !(2..=36).contains(&base) {
                return Err(Error::Value("int() base must be >= 2 and <= 36".into()));
            }
            return i64::from_str_radix(text.trim(), base as u32)
                .map(Value::Int)
                .map_err(|_| {
                    Error::Value(format!("invalid literal for int() with base {base}: '{text}'"))
                });
        }
        match &args[0] {
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            Value::Float(f) if f.is_finite() => {
                let t = f.trunc();
                if t >= I64_BOUND || t < -I64_BOUND {
                    return Err(Error::Value("int too large".into()));
                }
                Ok(Value::Int(t as i64))
            }
            Value::Float(f) => Err(Error::Value(format!("cannot convert float {f} to int"))),
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| Error::Value(format!("invalid literal for int(): '{s}'"))),
            other => Err(Error::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        }
    }
}

pub struct Float;
impl Function for Float {
    fn name(&self) -> &'static str { "float" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        match &args[0] {
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| Error::Value(format!("could not convert string to float: '{s}'"))),
            other => other.as_f64().map(Value::Float).ok_or_else(|| {
                Error::type_error(format!(
                    "float() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))
            }),
        }
    }
}

pub struct Str;
impl Function for Str {
    fn name(&self) -> &'static str { "str" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        Ok(Value::Str(args[0].to_string()))
    }
}

pub struct Bool;
impl Function for Bool {
    fn name(&self) -> &'static str { "bool" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        Ok(Value::Bool(args[0].truthy()))
    }
}

pub struct Len;
impl Function for Len {
    fn name(&self) -> &'static str { "len" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let len = match &args[0] {
            Value::Str(s) => s.chars().count(),
            Value::List(a) => a.len(),
            Value::Map(m) => m.len(),
            other => {
                return Err(Error::type_error(format!(
                    "object of type '{}' has no len()",
                    other.type_name()
                )))
            }
        };
        Ok(Value::Int(len as i64))
    }
}

pub struct TypeOf;
impl Function for TypeOf {
    fn name(&self) -> &'static str { "type" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        Ok(Value::from(args[0].type_name()))
    }
}

pub struct Abs;
impl Function for Abs {
    fn name(&self) -> &'static str { "abs" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        match &args[0] {
            Value::Int(i) => i
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| Error::Value("integer overflow".into())),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            other => Err(Error::type_error(format!(
                "bad operand type for abs(): '{}'",
                other.type_name()
            ))),
        }
    }
}

/// `round(x)` gives an int, `round(x, n)` a float with `n` decimals.
/// Halves round away from zero.
pub struct Round;
impl Function for Round {
    fn name(&self) -> &'static str { "round" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=2 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let x = args[0].as_f64().ok_or_else(|| {
            Error::type_error(format!("round() needs a number, not '{}'", args[0].type_name()))
        })?;
        if args.len() == 1 {
            if let Value::Int(i) = args[0] {
                return Ok(Value::Int(i));
            }
            if !x.is_finite() {
                return Err(Error::Value(format!("cannot round {x} to int")));
            }
            return Ok(Value::Int(x.round() as i64));
        }
        let digits = arg_int("round", &args, 1)?;
        let factor = 10f64.powi(digits.clamp(-308, 308) as i32);
        Ok(Value::Float((x * factor).round() / factor))
    }
}
