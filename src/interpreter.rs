use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use crate::context::Context;
use crate::errors::Result;
use crate::eval::Machine;
use crate::expression::{parse_program, Program};
use crate::functions::Registry;
use crate::value::Value;

/// Service that runs caller-supplied fragments against a context.
///
/// `execute` runs a fragment for its side effects; `evaluate` also returns
/// the fragment's value (`Value::Null` when it has none).
pub trait Evaluate {
    fn execute(&mut self, source: &str, ctx: &mut Context, out: &mut dyn Write) -> Result<()>;
    fn evaluate(&mut self, source: &str, ctx: &mut Context, out: &mut dyn Write) -> Result<Value>;
}

/// The built-in fragment language. Parsed programs are cached by source
/// text, so a statement is parsed once per run rather than once per record.
pub struct Interpreter {
    registry: Registry,
    cache: HashMap<String, Rc<Program>>,
}

impl Interpreter {
    pub fn new(registry: Registry) -> Self {
        Self { registry, cache: HashMap::new() }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn compile(&mut self, source: &str) -> Result<Rc<Program>> {
        if let Some(program) = self.cache.get(source) {
            return Ok(program.clone());
        }
        let program = Rc::new(parse_program(source)?);
        self.cache.insert(source.to_string(), program.clone());
        Ok(program)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Registry::with_builtins())
    }
}

impl Evaluate for Interpreter {
    fn execute(&mut self, source: &str, ctx: &mut Context, out: &mut dyn Write) -> Result<()> {
        self.evaluate(source, ctx, out).map(drop)
    }

    fn evaluate(&mut self, source: &str, ctx: &mut Context, out: &mut dyn Write) -> Result<Value> {
        let program = self.compile(source)?;
        Machine::new(ctx, &self.registry, out).run(&program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn evaluate_returns_value_and_execute_discards_it() {
        let mut interp = Interpreter::default();
        let mut ctx = Context::new();
        let mut out = Vec::new();
        assert_eq!(interp.evaluate("1 + 1", &mut ctx, &mut out).unwrap(), Value::Int(2));
        interp.execute("n = 3", &mut ctx, &mut out).unwrap();
        assert_eq!(interp.evaluate("n", &mut ctx, &mut out).unwrap(), Value::Int(3));
        assert!(out.is_empty());
    }

    #[test]
    fn failed_parses_are_not_cached() {
        let mut interp = Interpreter::default();
        let mut ctx = Context::new();
        let mut out = Vec::new();
        for _ in 0..2 {
            let err = interp.execute("(", &mut ctx, &mut out).unwrap_err();
            assert_eq!(err.kind(), "SyntaxError");
        }
        assert!(interp.cache.is_empty());
    }
}
