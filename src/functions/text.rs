//! String, regex and JSON helpers.

use std::ops::RangeInclusive;

use itertools::Itertools;

use super::{arg_str, compile_regex, Function, Registry};
use crate::errors::{Error, Result};
use crate::eval::Machine;
use crate::value::Value;

pub(super) fn register(reg: &mut Registry) {
    reg.register(Split);
    reg.register(Join);
    reg.register(Upper);
    reg.register(Lower);
    reg.register(Trim);
    reg.register(Replace);
    reg.register(StartsWith);
    reg.register(EndsWith);
    reg.register(ReMatch);
    reg.register(ReFind);
    reg.register(ReSplit);
    reg.register(FromJson);
    reg.register(ToJson);
}

fn strings(parts: impl IntoIterator<Item = impl Into<String>>) -> Value {
    Value::List(parts.into_iter().map(|p| Value::Str(p.into())).collect())
}

/// `split(s)` splits on runs of whitespace, `split(s, sep)` on a literal.
pub struct Split;
impl Function for Split {
    fn name(&self) -> &'static str { "split" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=2 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let s = arg_str("split", &args, 0)?;
        if args.len() == 1 {
            return Ok(strings(s.split_whitespace()));
        }
        let sep = arg_str("split", &args, 1)?;
        if sep.is_empty() {
            return Err(Error::Value("empty separator".into()));
        }
        Ok(strings(s.split(sep)))
    }
}

/// `join(items, sep = "")`.
pub struct Join;
impl Function for Join {
    fn name(&self) -> &'static str { "join" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=2 }
    fn call(&self, mut args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let sep = if args.len() == 2 { arg_str("join", &args, 1)?.to_string() } else { String::new() };
        let items = args.remove(0).into_items()?.collect::<Result<Vec<_>>>()?;
        Ok(Value::Str(items.iter().join(&sep)))
    }
}

pub struct Upper;
impl Function for Upper {
    fn name(&self) -> &'static str { "upper" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        Ok(Value::Str(arg_str("upper", &args, 0)?.to_uppercase()))
    }
}

pub struct Lower;
impl Function for Lower {
    fn name(&self) -> &'static str { "lower" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        Ok(Value::Str(arg_str("lower", &args, 0)?.to_lowercase()))
    }
}

/// `trim(s)` strips whitespace, `trim(s, chars)` any of `chars`.
pub struct Trim;
impl Function for Trim {
    fn name(&self) -> &'static str { "trim" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=2 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let s = arg_str("trim", &args, 0)?;
        if args.len() == 1 {
            return Ok(Value::from(s.trim()));
        }
        let set = arg_str("trim", &args, 1)?;
        Ok(Value::from(s.trim_matches(|c| set.contains(c))))
    }
}

pub struct Replace;
impl Function for Replace {
    fn name(&self) -> &'static str { "replace" }
    fn arity(&self) -> RangeInclusive<usize> { 3..=3 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let s = arg_str("replace", &args, 0)?;
        let from = arg_str("replace", &args, 1)?;
        let to = arg_str("replace", &args, 2)?;
        Ok(Value::Str(s.replace(from, to)))
    }
}

pub struct StartsWith;
impl Function for StartsWith {
    fn name(&self) -> &'static str { "starts_with" }
    fn arity(&self) -> RangeInclusive<usize> { 2..=2 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let s = arg_str("starts_with", &args, 0)?;
        Ok(Value::Bool(s.starts_with(arg_str("starts_with", &args, 1)?)))
    }
}

pub struct EndsWith;
impl Function for EndsWith {
    fn name(&self) -> &'static str { "ends_with" }
    fn arity(&self) -> RangeInclusive<usize> { 2..=2 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let s = arg_str("ends_with", &args, 0)?;
        Ok(Value::Bool(s.ends_with(arg_str("ends_with", &args, 1)?)))
    }
}

/// `re_match(s, pattern)`: whether the pattern matches anywhere in `s`.
pub struct ReMatch;
impl Function for ReMatch {
    fn name(&self) -> &'static str { "re_match" }
    fn arity(&self) -> RangeInclusive<usize> { 2..=2 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let re = compile_regex(arg_str("re_match", &args, 1)?)?;
        Ok(Value::Bool(re.is_match(arg_str("re_match", &args, 0)?)))
    }
}

/// `re_find(s, pattern)`: every match; the first capture group when the
/// pattern has one.
pub struct ReFind;
impl Function for ReFind {
    fn name(&self) -> &'static str { "re_find" }
    fn arity(&self) -> RangeInclusive<usize> { 2..=2 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let re = compile_regex(arg_str("re_find", &args, 1)?)?;
        let s = arg_str("re_find", &args, 0)?;
        let found = re
            .captures_iter(s)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str()))
            .collect::<Vec<_>>();
        Ok(strings(found))
    }
}

pub struct ReSplit;
impl Function for ReSplit {
    fn name(&self) -> &'static str { "re_split" }
    fn arity(&self) -> RangeInclusive<usize> { 2..=2 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let re = compile_regex(arg_str("re_split", &args, 1)?)?;
        Ok(strings(re.split(arg_str("re_split", &args, 0)?)))
    }
}

pub struct FromJson;
impl Function for FromJson {
    fn name(&self) -> &'static str { "from_json" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let text = arg_str("from_json", &args, 0)?;
        serde_json::from_str::<serde_json::Value>(text)
            .map(Value::from)
            .map_err(|e| Error::Value(format!("invalid JSON: {e}")))
    }
}

/// `to_json(v)` compact, `to_json(v, true)` pretty.
pub struct ToJson;
impl Function for ToJson {
    fn name(&self) -> &'static str { "to_json" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=2 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let pretty = args.get(1).map(Value::truthy).unwrap_or(false);
        let out = if pretty {
            serde_json::to_string_pretty(&args[0])
        } else {
            serde_json::to_string(&args[0])
        };
        out.map(Value::Str).map_err(|e| Error::type_error(e.to_string()))
    }
}
