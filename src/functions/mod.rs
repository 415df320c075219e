use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::eval::Machine;
use crate::value::Value;

mod basic;
mod collections;
mod text;

/// Variadic upper bound for `arity`.
pub const MANY: usize = usize::MAX;

/// Trait for pluggable functions callable from fragments.
pub trait Function: Send + Sync {
    fn name(&self) -> &'static str;
    fn arity(&self) -> RangeInclusive<usize>;
    /// `args` has already been checked against `arity`.
    fn call(&self, args: Vec<Value>, machine: &mut Machine<'_>) -> Result<Value>;
}

/// Thread-safe function registry.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<HashMap<&'static str, Arc<dyn Function>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        basic::register(&mut reg);
        collections::register(&mut reg);
        text::register(&mut reg);
        reg
    }

    pub fn register<F: Function + 'static>(&mut self, f: F) {
        let mut_map = Arc::make_mut(&mut self.inner);
        mut_map.insert(f.name(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.inner.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.inner.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

pub(crate) fn arg_str<'v>(func: &str, args: &'v [Value], idx: usize) -> Result<&'v str> {
    match args.get(idx) {
        Some(Value::Str(s)) => Ok(s),
        Some(other) => Err(Error::type_error(format!(
            "{func}() argument {} must be str, not '{}'",
            idx + 1,
            other.type_name()
        ))),
        None => Err(Error::type_error(format!("{func}() missing argument {}", idx + 1))),
    }
}

pub(crate) fn arg_int(func: &str, args: &[Value], idx: usize) -> Result<i64> {
    match args.get(idx) {
        Some(Value::Int(i)) => Ok(*i),
        Some(Value::Bool(b)) => Ok(*b as i64),
        Some(other) => Err(Error::type_error(format!(
            "{func}() argument {} must be int, not '{}'",
            idx + 1,
            other.type_name()
        ))),
        None => Err(Error::type_error(format!("{func}() missing argument {}", idx + 1))),
    }
}

pub(crate) fn compile_regex(pattern: &str) -> Result<regex::Regex> {
    regex::Regex::new(pattern).map_err(|e| Error::Value(format!("invalid pattern: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Answer;
    impl Function for Answer {
        fn name(&self) -> &'static str {
            "answer"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            0..=0
        }
        fn call(&self, _args: Vec<Value>, _machine: &mut Machine<'_>) -> Result<Value> {
            Ok(Value::Int(42))
        }
    }

    #[test]
    fn register_custom_function() {
        let mut reg = Registry::with_builtins();
        let before = reg.names().len();
        reg.register(Answer);
        assert!(reg.contains("answer"));
        assert_eq!(reg.names().len(), before + 1);
        assert!(!Registry::new().contains("answer"));
    }

    #[test]
    fn builtins_are_present() {
        let reg = Registry::with_builtins();
        for name in ["print", "int", "sum", "map", "split", "join", "re_split", "from_json"] {
            assert!(reg.contains(name), "missing {name}");
        }
    }
}
