use std::io::Write;

use crate::comparison::{arithmetic, cmp_values};
use crate::context::Context;
use crate::errors::{Error, Result};
use crate::expression::{BinOp, Expr, Program, Stmt, UnaryOp};
use crate::functions::Registry;
use crate::value::{Map, Value};

/// Tree-walking evaluator bound to one context and one output sink.
/// Deepest chain of closure calls before evaluation gives up.
const MAX_CALL_DEPTH: usize = 100;

pub struct Machine<'a> {
    pub(crate) ctx: &'a mut Context,
    pub(crate) registry: &'a Registry,
    pub(crate) out: &'a mut dyn Write,
    calls: usize,
}

impl<'a> Machine<'a> {
    pub fn new(ctx: &'a mut Context, registry: &'a Registry, out: &'a mut dyn Write) -> Self {
        Self { ctx, registry, out, calls: 0 }
    }

    /// Run a program; its value is the value of the last statement when
    /// that statement is an expression, `null` otherwise.
    pub fn run(&mut self, program: &Program) -> Result<Value> {
        self.exec_block(&program.stmts)
    }

    pub fn write_line(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}")?;
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Value> {
        let mut last = Value::Null;
        for stmt in stmts {
            last = self.exec(stmt)?;
        }
        Ok(last)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Value> {
        match stmt {
            Stmt::Expr(expr) => self.eval(expr),
            Stmt::Assign { name, op, value } => {
                let value = self.eval(value)?;
                let value = match op {
                    None => value,
                    Some(op) => {
                        let current = self
                            .ctx
                            .get(name)
                            .ok_or_else(|| Error::Name(name.clone()))?;
                        arithmetic(*op, current, &value)?
                    }
                };
                self.ctx.set(name.clone(), value);
                Ok(Value::Null)
            }
            Stmt::AssignIndex { name, index, value } => {
                let index = self.eval(index)?;
                let value = self.eval(value)?;
                let target = self.ctx.get_mut(name).ok_or_else(|| Error::Name(name.clone()))?;
                assign_index(target, index, value)?;
                Ok(Value::Null)
            }
            Stmt::If { cond, then, otherwise } => {
                if self.eval(cond)?.truthy() {
                    self.exec_block(then)
                } else {
                    self.exec_block(otherwise)
                }
            }
            Stmt::For { var, iter, body } => {
                for item in self.eval(iter)?.into_items()? {
                    self.ctx.set(var.clone(), item?);
                    self.exec_block(body)?;
                }
                Ok(Value::Null)
            }
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => Ok(Value::List(self.eval_all(items)?)),
            Expr::Map(entries) => {
                let mut map = Map::new();
                for (k, v) in entries {
                    let key = match self.eval(k)? {
                        Value::Str(s) => s,
                        other => other.to_string(),
                    };
                    let value = self.eval(v)?;
                    map.insert(key, value);
                }
                Ok(Value::Map(map))
            }
            Expr::Unary(UnaryOp::Not, inner) => Ok(Value::Bool(!self.eval(inner)?.truthy())),
            Expr::Unary(UnaryOp::Neg, inner) => match self.eval(inner)? {
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| Error::Value("integer overflow".into())),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(Error::type_error(format!(
                    "bad operand type for unary -: '{}'",
                    other.type_name()
                ))),
            },
            Expr::And(left, right) => {
                let l = self.eval(left)?;
                if !l.truthy() {
                    return Ok(l);
                }
                self.eval(right)
            }
            Expr::Or(left, right) => {
                let l = self.eval(left)?;
                if l.truthy() {
                    return Ok(l);
                }
                self.eval(right)
            }
            Expr::Binary(op, left, right) => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                match op {
                    BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Lte | BinOp::Gt | BinOp::Gte => {
                        Ok(Value::Bool(cmp_values(*op, &l, &r)?))
                    }
                    _ => arithmetic(*op, &l, &r),
                }
            }
            Expr::Call { callee, args } => {
                let callee = self.eval(callee)?;
                let args = self.eval_all(args)?;
                self.apply(&callee, args)
            }
            Expr::Method { receiver, name, args } => {
                let receiver = self.eval(receiver)?;
                let mut all = Vec::with_capacity(args.len() + 1);
                all.push(receiver);
                all.extend(self.eval_all(args)?);
                let callee = self.resolve_method(name, &all[0])?;
                self.apply(&callee, all)
            }
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                index_value(&target, &index)
            }
            Expr::Slice { target, start, end } => {
                let target = self.eval(target)?;
                let start = self.eval_bound(start.as_deref())?;
                let end = self.eval_bound(end.as_deref())?;
                slice_value(&target, start, end)
            }
            Expr::Field(target, name) => match self.eval(target)? {
                Value::Map(m) => m.get(name).cloned().ok_or_else(|| Error::Key(format!("'{name}'"))),
                other => Err(Error::type_error(format!(
                    "'{}' object has no field '{name}'",
                    other.type_name()
                ))),
            },
            Expr::Closure(c) => Ok(Value::Closure(c.clone())),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn eval_bound(&mut self, expr: Option<&Expr>) -> Result<Option<i64>> {
        match expr {
            None => Ok(None),
            Some(e) => match self.eval(e)? {
                Value::Int(i) => Ok(Some(i)),
                Value::Null => Ok(None),
                other => Err(Error::type_error(format!(
                    "slice indices must be integers, not '{}'",
                    other.type_name()
                ))),
            },
        }
    }

    /// Context bindings first, then builtins.
    fn lookup(&self, name: &str) -> Result<Value> {
        if let Some(v) = self.ctx.get(name) {
            return Ok(v.clone());
        }
        if self.registry.contains(name) {
            return Ok(Value::Func(name.to_string()));
        }
        Err(Error::Name(name.to_string()))
    }

    fn resolve_method(&self, name: &str, receiver: &Value) -> Result<Value> {
        if self.registry.contains(name) {
            return Ok(Value::Func(name.to_string()));
        }
        match self.ctx.get(name) {
            Some(v) if v.is_callable() => Ok(v.clone()),
            _ => Err(Error::type_error(format!(
                "'{}' object has no method '{name}'",
                receiver.type_name()
            ))),
        }
    }

    /// Call a builtin or closure with already evaluated arguments.
    pub fn apply(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value> {
        match callee {
            Value::Func(name) => {
                let f = self.registry.get(name).ok_or_else(|| Error::Name(name.clone()))?;
                let arity = f.arity();
                if !arity.contains(&args.len()) {
                    return Err(Error::type_error(format!(
                        "{}() takes {} argument(s) ({} given)",
                        name,
                        describe_arity(&arity),
                        args.len()
                    )));
                }
                f.call(args, self)
            }
            Value::Closure(c) => {
                if c.params.len() != args.len() {
                    return Err(Error::type_error(format!(
                        "closure takes {} argument(s) ({} given)",
                        c.params.len(),
                        args.len()
                    )));
                }
                let saved: Vec<(String, Option<Value>)> = c
                    .params
                    .iter()
                    .cloned()
                    .zip(args)
                    .map(|(p, v)| {
                        let old = self.ctx.set(p.clone(), v);
                        (p, old)
                    })
                    .collect();
                let result = if self.calls >= MAX_CALL_DEPTH {
                    Err(Error::Value("maximum recursion depth exceeded".into()))
                } else {
                    self.calls += 1;
                    let result = self.eval(&c.body);
                    self.calls -= 1;
                    result
                };
                for (p, old) in saved.into_iter().rev() {
                    match old {
                        Some(v) => {
                            self.ctx.set(p, v);
                        }
                        None => {
                            self.ctx.remove(&p);
                        }
                    }
                }
                result
            }
            other => Err(Error::type_error(format!("'{}' object is not callable", other.type_name()))),
        }
    }
}

fn describe_arity(arity: &std::ops::RangeInclusive<usize>) -> String {
    match (*arity.start(), *arity.end()) {
        (a, b) if a == b => a.to_string(),
        (a, usize::MAX) => format!("at least {a}"),
        (a, b) => format!("{a} to {b}"),
    }
}

/// Resolve a possibly negative position against `len`.
fn position(i: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if i < 0 { i + len } else { i };
    (0..len).contains(&idx).then_some(idx as usize)
}

pub(crate) fn index_value(target: &Value, index: &Value) -> Result<Value> {
    match (target, index) {
        (Value::List(items), Value::Int(i)) => position(*i, items.len())
            .map(|p| items[p].clone())
            .ok_or_else(|| Error::Index("list index out of range".into())),
        (Value::Str(s), Value::Int(i)) => {
            let count = s.chars().count();
            position(*i, count)
                .and_then(|p| s.chars().nth(p))
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| Error::Index("string index out of range".into()))
        }
        (Value::Map(m), Value::Str(k)) => {
            m.get(k).cloned().ok_or_else(|| Error::Key(Value::Str(k.clone()).repr()))
        }
        (Value::Map(_), other) => Err(Error::Key(other.repr())),
        (target, index) => Err(Error::type_error(format!(
            "'{}' object cannot be indexed by '{}'",
            target.type_name(),
            index.type_name()
        ))),
    }
}

fn slice_bounds(start: Option<i64>, end: Option<i64>, len: usize) -> (usize, usize) {
    let clamp = |i: i64| -> usize {
        let len = len as i64;
        let i = if i < 0 { i + len } else { i };
        i.clamp(0, len) as usize
    };
    let s = start.map(clamp).unwrap_or(0);
    let e = end.map(clamp).unwrap_or(len);
    (s, e.max(s))
}

fn slice_value(target: &Value, start: Option<i64>, end: Option<i64>) -> Result<Value> {
    match target {
        Value::List(items) => {
            let (s, e) = slice_bounds(start, end, items.len());
            Ok(Value::List(items[s..e].to_vec()))
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let (s, e) = slice_bounds(start, end, chars.len());
            Ok(Value::Str(chars[s..e].iter().collect()))
        }
        other => Err(Error::type_error(format!("'{}' object is not sliceable", other.type_name()))),
    }
}

fn assign_index(target: &mut Value, index: Value, value: Value) -> Result<()> {
    match (target, index) {
        (Value::Map(m), Value::Str(k)) => {
            m.insert(k, value);
            Ok(())
        }
        (Value::List(items), Value::Int(i)) => {
            let p = position(i, items.len())
                .ok_or_else(|| Error::Index("list assignment index out of range".into()))?;
            items[p] = value;
            Ok(())
        }
        (target, index) => Err(Error::type_error(format!(
            "'{}' object does not support item assignment with '{}'",
            target.type_name(),
            index.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parse_program;
    use pretty_assertions::assert_eq;

    fn run_with(ctx: &mut Context, src: &str) -> (Result<Value>, String) {
        let registry = Registry::with_builtins();
        let mut out = Vec::new();
        let program = parse_program(src).unwrap();
        let result = Machine::new(ctx, &registry, &mut out).run(&program);
        (result, String::from_utf8(out).unwrap())
    }

    fn value_of(src: &str) -> Value {
        run_with(&mut Context::new(), src).0.unwrap()
    }

    #[test]
    fn last_expression_is_the_program_value() {
        assert_eq!(value_of("a = 2; a * 3"), Value::Int(6));
        assert_eq!(value_of("a = 2"), Value::Null);
        assert_eq!(value_of("if 1 > 2 { 'big' } else { 'small' }"), Value::from("small"));
    }

    #[test]
    fn runaway_closure_recursion_is_a_value_error() {
        let (result, _) = run_with(&mut Context::new(), "f = |n| f(n + 1); f(0)");
        assert_eq!(result.unwrap_err().to_string(), "ValueError: maximum recursion depth exceeded");
        let (result, _) = run_with(&mut Context::new(), "g = |n| n * 2; h = |n| g(n) + 1; h(3)");
        assert_eq!(result.unwrap(), Value::Int(7));
    }

    #[test]
    fn assignments_persist_in_context() {
        let mut ctx = Context::new();
        run_with(&mut ctx, "n = 1; n += 4; d = {}; d['k'] = n").0.unwrap();
        assert_eq!(ctx.get("n"), Some(&Value::Int(5)));
        assert_eq!(ctx.get("d").unwrap().to_string(), r#"{"k": 5}"#);
    }

    #[test]
    fn for_loops_and_print() {
        let (res, out) = run_with(&mut Context::new(), "for c in 'ab' { print(c, 1) }");
        res.unwrap();
        assert_eq!(out, "a 1\nb 1\n");
    }

    #[test]
    fn indexing_and_slicing() {
        assert_eq!(value_of("[1, 2, 3][-1]"), Value::Int(3));
        assert_eq!(value_of("'héllo'[1:3]"), Value::from("él"));
        assert_eq!(value_of("[1, 2, 3][5:]"), Value::List(vec![]));
        assert_eq!(value_of("{a: {b: 2}}.a.b"), Value::Int(2));
        let (res, _) = run_with(&mut Context::new(), "[1][3]");
        assert_eq!(res.unwrap_err().kind(), "IndexError");
    }

    #[test]
    fn unknown_names_raise_name_error() {
        let (res, _) = run_with(&mut Context::new(), "print(foo)");
        assert_eq!(res.unwrap_err().to_string(), "NameError: name 'foo' is not defined");
    }

    #[test]
    fn closures_restore_shadowed_bindings() {
        let mut ctx = Context::with_bindings([("v", Value::from("outer"))]);
        let (res, _) = run_with(&mut ctx, "map(|v| v * 2, [1, 2])");
        assert_eq!(res.unwrap(), Value::List(vec![Value::Int(2), Value::Int(4)]));
        assert_eq!(ctx.get("v"), Some(&Value::from("outer")));
    }

    #[test]
    fn short_circuit() {
        assert_eq!(value_of("false && 1 / 0"), Value::Bool(false));
        assert_eq!(value_of("0 || 'x'"), Value::from("x"));
    }

    #[test]
    fn methods_dispatch_to_builtins() {
        assert_eq!(value_of("'a,b'.split(',').join('-')"), Value::from("a-b"));
        let (res, _) = run_with(&mut Context::new(), "1.nope()");
        assert_eq!(res.unwrap_err().kind(), "TypeError");
    }

    #[test]
    fn arity_is_checked() {
        let (res, _) = run_with(&mut Context::new(), "len(1, 2)");
        assert_eq!(res.unwrap_err().to_string(), "TypeError: len() takes 1 argument(s) (2 given)");
    }
}
