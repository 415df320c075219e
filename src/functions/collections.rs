//! Aggregation and sequence helpers. Everything accepting a sequence also
//! accepts the lazy record sequence `l`, pulling records one at a time.

use std::cmp::Ordering;
use std::ops::RangeInclusive;

use itertools::Itertools;

use super::{arg_int, Function, Registry, MANY};
use crate::comparison::{arithmetic, compare_values, values_equal};
use crate::errors::{Error, Result};
use crate::eval::Machine;
use crate::expression::BinOp;
use crate::value::Value;

pub(super) fn register(reg: &mut Registry) {
    reg.register(Sum);
    reg.register(Min);
    reg.register(Max);
    reg.register(Range);
    reg.register(List);
    reg.register(Sorted);
    reg.register(Reversed);
    reg.register(Unique);
    reg.register(Enumerate);
    reg.register(MapFn);
    reg.register(FilterFn);
    reg.register(Keys);
    reg.register(Values);
    reg.register(Get);
    reg.register(Contains);
}

/// `sum(items)` or `sum(items, start)`.
pub struct Sum;
impl Function for Sum {
    fn name(&self) -> &'static str { "sum" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=2 }
    fn call(&self, mut args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let mut total = if args.len() == 2 { args.pop().unwrap_or(Value::Int(0)) } else { Value::Int(0) };
        for item in args.remove(0).into_items()? {
            total = arithmetic(BinOp::Add, &total, &item?)?;
        }
        Ok(total)
    }
}

/// `min(items)` or `min(a, b, ..)`.
fn extreme(name: &str, args: Vec<Value>, want: Ordering) -> Result<Value> {
    let items = if args.len() == 1 { args.into_iter().next().unwrap_or(Value::Null).into_vec()? } else { args };
    let mut best: Option<Value> = None;
    for item in items {
        best = match best {
            None => Some(item),
            Some(b) => {
                if compare_values(&item, &b)? == want {
                    Some(item)
                } else {
                    Some(b)
                }
            }
        };
    }
    best.ok_or_else(|| Error::Value(format!("{name}() arg is an empty sequence")))
}

pub struct Min;
impl Function for Min {
    fn name(&self) -> &'static str { "min" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=MANY }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        extreme("min", args, Ordering::Less)
    }
}

pub struct Max;
impl Function for Max {
    fn name(&self) -> &'static str { "max" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=MANY }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        extreme("max", args, Ordering::Greater)
    }
}

/// `range(stop)`, `range(start, stop)` or `range(start, stop, step)`.
pub struct Range;
impl Function for Range {
    fn name(&self) -> &'static str { "range" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=3 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let (start, stop) = if args.len() == 1 {
            (0, arg_int("range", &args, 0)?)
        } else {
            (arg_int("range", &args, 0)?, arg_int("range", &args, 1)?)
        };
        let step = if args.len() == 3 { arg_int("range", &args, 2)? } else { 1 };
        if step == 0 {
            return Err(Error::Value("range() arg 3 must not be zero".into()));
        }
        let mut out = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            out.push(Value::Int(i));
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(Value::List(out))
    }
}

pub struct List;
impl Function for List {
    fn name(&self) -> &'static str { "list" }
    fn arity(&self) -> RangeInclusive<usize> { 0..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        match args.into_iter().next() {
            None => Ok(Value::List(Vec::new())),
            Some(v) => Ok(Value::List(v.into_vec()?)),
        }
    }
}

/// `sorted(items)` or `sorted(items, key)`, stable.
pub struct Sorted;
impl Function for Sorted {
    fn name(&self) -> &'static str { "sorted" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=2 }
    fn call(&self, mut args: Vec<Value>, machine: &mut Machine<'_>) -> Result<Value> {
        let key = if args.len() == 2 { args.pop() } else { None };
        let items = args.remove(0).into_vec()?;
        let mut keyed = Vec::with_capacity(items.len());
        for item in items {
            let k = match &key {
                Some(f) => machine.apply(f, vec![item.clone()])?,
                None => item.clone(),
            };
            keyed.push((k, item));
        }
        // Surface mixed-type errors before sorting.
        for (a, b) in keyed.iter().tuple_windows() {
            compare_values(&a.0, &b.0)?;
        }
        keyed.sort_by(|a, b| compare_values(&a.0, &b.0).unwrap_or(Ordering::Equal));
        Ok(Value::List(keyed.into_iter().map(|(_, v)| v).collect()))
    }
}

pub struct Reversed;
impl Function for Reversed {
    fn name(&self) -> &'static str { "reversed" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        match args.into_iter().next() {
            Some(Value::Str(s)) => Ok(Value::Str(s.chars().rev().collect())),
            Some(v) => {
                let mut items = v.into_vec()?;
                items.reverse();
                Ok(Value::List(items))
            }
            None => Ok(Value::Null),
        }
    }
}

/// First occurrence wins, order kept.
pub struct Unique;
impl Function for Unique {
    fn name(&self) -> &'static str { "unique" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let items = args.into_iter().next().unwrap_or(Value::Null).into_vec()?;
        let dedup = items
            .into_iter()
            .unique_by(|x| format!("{}:{}", x.type_name(), x.repr()))
            .collect::<Vec<_>>();
        Ok(Value::List(dedup))
    }
}

/// `enumerate(items, start = 0)` → `[[index, item], ..]`.
pub struct Enumerate;
impl Function for Enumerate {
    fn name(&self) -> &'static str { "enumerate" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=2 }
    fn call(&self, mut args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let start = if args.len() == 2 { arg_int("enumerate", &args, 1)? } else { 0 };
        args.truncate(1);
        let mut out = Vec::new();
        for (n, item) in args.remove(0).into_items()?.enumerate() {
            out.push(Value::List(vec![Value::Int(start + n as i64), item?]));
        }
        Ok(Value::List(out))
    }
}

/// Split `(f, items)` or `(items, f)` so both `map(int, l)` and
/// `l.map(int)` work.
fn callable_and_items(args: Vec<Value>) -> (Value, Value) {
    let mut it = args.into_iter();
    let a = it.next().unwrap_or(Value::Null);
    let b = it.next().unwrap_or(Value::Null);
    if b.is_callable() || (b.is_null() && !a.is_callable()) {
        (b, a)
    } else {
        (a, b)
    }
}

/// `map(f, items)`.
pub struct MapFn;
impl Function for MapFn {
    fn name(&self) -> &'static str { "map" }
    fn arity(&self) -> RangeInclusive<usize> { 2..=2 }
    fn call(&self, args: Vec<Value>, machine: &mut Machine<'_>) -> Result<Value> {
        let (f, items) = callable_and_items(args);
        let mut out = Vec::new();
        for item in items.into_items()? {
            out.push(machine.apply(&f, vec![item?])?);
        }
        Ok(Value::List(out))
    }
}

/// `filter(f, items)`; `f = null` keeps truthy items.
pub struct FilterFn;
impl Function for FilterFn {
    fn name(&self) -> &'static str { "filter" }
    fn arity(&self) -> RangeInclusive<usize> { 2..=2 }
    fn call(&self, args: Vec<Value>, machine: &mut Machine<'_>) -> Result<Value> {
        let (f, items) = callable_and_items(args);
        let mut out = Vec::new();
        for item in items.into_items()? {
            let item = item?;
            let keep = if f.is_null() { item.truthy() } else { machine.apply(&f, vec![item.clone()])?.truthy() };
            if keep {
                out.push(item);
            }
        }
        Ok(Value::List(out))
    }
}

fn expect_map(func: &str, v: Value) -> Result<crate::value::Map> {
    match v {
        Value::Map(m) => Ok(m),
        other => Err(Error::type_error(format!("{func}() needs a map, not '{}'", other.type_name()))),
    }
}

pub struct Keys;
impl Function for Keys {
    fn name(&self) -> &'static str { "keys" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let m = expect_map("keys", args.into_iter().next().unwrap_or(Value::Null))?;
        Ok(Value::List(m.into_keys().map(Value::Str).collect()))
    }
}

pub struct Values;
impl Function for Values {
    fn name(&self) -> &'static str { "values" }
    fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let m = expect_map("values", args.into_iter().next().unwrap_or(Value::Null))?;
        Ok(Value::List(m.into_values().collect()))
    }
}

/// `get(container, key, default = null)` never raises for a missing key.
pub struct Get;
impl Function for Get {
    fn name(&self) -> &'static str { "get" }
    fn arity(&self) -> RangeInclusive<usize> { 2..=3 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let default = args.get(2).cloned().unwrap_or(Value::Null);
        match crate::eval::index_value(&args[0], &args[1]) {
            Ok(v) => Ok(v),
            Err(Error::Key(_)) | Err(Error::Index(_)) => Ok(default),
            Err(e) => Err(e),
        }
    }
}

/// `contains(container, item)`: substring, list member or map key.
pub struct Contains;
impl Function for Contains {
    fn name(&self) -> &'static str { "contains" }
    fn arity(&self) -> RangeInclusive<usize> { 2..=2 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
        let found = match (&args[0], &args[1]) {
            (Value::Str(s), Value::Str(needle)) => s.contains(needle.as_str()),
            (Value::List(items), needle) => items.iter().any(|v| values_equal(v, needle)),
            (Value::Map(m), Value::Str(k)) => m.contains_key(k),
            (container, item) => {
                return Err(Error::type_error(format!(
                    "cannot test '{}' for membership in '{}'",
                    item.type_name(),
                    container.type_name()
                )))
            }
        };
        Ok(Value::Bool(found))
    }
}
