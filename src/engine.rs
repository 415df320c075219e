use std::io::{self, BufRead, Read, Write};

use tracing::{debug, trace};

use crate::context::Context;
use crate::decoder::{Charset, Chunk, Decoder, EncodingWriter};
use crate::errors::{Error, Result};
use crate::executor::SnippetExecutor;
use crate::interpreter::{Evaluate, Interpreter};
use crate::options::{Mode, Options};
use crate::value::{Lines, Value};

/// Where a run currently is. The after-hook is entered on every path that
/// reached the before-hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    BeforeHook,
    Streaming,
    AfterHook,
    Done,
}

fn enter(phase: &mut Phase, next: Phase) {
    trace!(from = ?*phase, to = ?next, "phase");
    *phase = next;
}

/// Record evaluation engine: one option set, one statement list, one input
/// stream and one context, run once.
///
/// ```no_run
/// use stream_eval::{Engine, Options};
///
/// let options = Options { autoprint: true, ..Options::default() };
/// let mut engine = Engine::new(options)
///     .statements(["x.upper()"])
///     .input(std::io::stdin().lock());
/// engine.run(&mut std::io::stdout()).unwrap();
/// ```
pub struct Engine<E = Interpreter> {
    options: Options,
    evaluator: E,
    context: Context,
    statements: Vec<Chunk>,
    input: Option<Box<dyn BufRead>>,
    phase: Phase,
}

impl Engine {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            evaluator: Interpreter::default(),
            context: Context::new(),
            statements: Vec::new(),
            input: None,
            phase: Phase::Idle,
        }
    }
}

impl<E: Evaluate> Engine<E> {
    /// Swap the evaluation service.
    pub fn with_evaluator<F: Evaluate>(self, evaluator: F) -> Engine<F> {
        Engine {
            options: self.options,
            evaluator,
            context: self.context,
            statements: self.statements,
            input: self.input,
            phase: self.phase,
        }
    }

    pub fn statements<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Chunk>,
    {
        self.statements.extend(statements.into_iter().map(Into::into));
        self
    }

    /// Attach the input stream. Without one, line mode falls back to direct
    /// mode and the other modes read nothing.
    pub fn input<R: BufRead + 'static>(mut self, reader: R) -> Self {
        self.input = Some(Box::new(reader));
        self
    }

    /// Seed initial bindings. Engine-provided names set later shadow them.
    pub fn bindings<I, K>(mut self, bindings: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.context.seed(bindings);
        self
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn into_context(self) -> Context {
        self.context
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Validate the options, then run before-hook, the selected strategy and
    /// the after-hook. Configuration errors surface before any hook runs.
    pub fn run(&mut self, out: &mut dyn Write) -> Result<()> {
        let mode = self.options.select_mode(self.input.is_some())?;
        let decoder = Decoder::from_options(&self.options)?;
        let charset: Charset = self.options.stdout_charset.parse()?;
        debug!(%mode, stdin = %decoder.charset(), stdout = %charset, "starting");

        let mut out = EncodingWriter::new(out, charset);
        let input = self.input.take().unwrap_or_else(|| Box::new(io::empty()));
        let mut session = Session {
            exec: SnippetExecutor::new(&mut self.evaluator, &decoder, self.options.quiet, self.options.autoprint),
            ctx: &mut self.context,
            out: &mut out,
            statements: &self.statements,
            quiet: self.options.quiet,
        };

        enter(&mut self.phase, Phase::BeforeHook);
        let mut main = session.hook(self.options.before.as_ref());
        if main.is_ok() {
            enter(&mut self.phase, Phase::Streaming);
            main = session.stream(mode, input);
        }
        enter(&mut self.phase, Phase::AfterHook);
        let after = session.hook(self.options.after.as_ref());
        enter(&mut self.phase, Phase::Done);

        let result = match (main, after) {
            (Ok(()), after) => after,
            (Err(e), Ok(())) => Err(e),
            (Err(cause), Err(error)) => Err(Error::AfterHook { error: Box::new(error), cause: Box::new(cause) }),
        };
        let flushed = out.flush().map_err(Error::from);
        result.and(flushed)
    }
}

/// Borrowed pieces of one run.
struct Session<'s, E: Evaluate> {
    exec: SnippetExecutor<'s, E>,
    ctx: &'s mut Context,
    out: &'s mut dyn Write,
    statements: &'s [Chunk],
    quiet: bool,
}

impl<E: Evaluate> Session<'_, E> {
    fn hook(&mut self, hook: Option<&Chunk>) -> Result<()> {
        self.exec.run_hook(hook, self.ctx, self.out)
    }

    fn stream(&mut self, mode: Mode, mut input: Box<dyn BufRead>) -> Result<()> {
        match mode {
            Mode::Direct => self.exec.run_all(self.statements, self.ctx, self.out),
            Mode::LineByLine => self.each_record(&mut *input, |s, _| s.exec.run_all(s.statements, s.ctx, s.out)),
            Mode::Filter => self.each_record(&mut *input, |s, line| {
                if s.exec.run_predicates(s.statements, s.ctx, s.out)? {
                    writeln!(s.out, "{line}")?;
                }
                Ok(())
            }),
            Mode::Iterable => {
                let lines = lazy_records(input, self.exec.decoder().clone(), self.quiet);
                self.ctx.set("l", Value::Lines(lines));
                self.exec.run_all(self.statements, self.ctx, self.out)
            }
            Mode::FullStream => {
                let Some(text) = self.read_all(&mut *input)? else {
                    return Ok(());
                };
                if let Some(fields) = self.exec.decoder().fields(&text) {
                    self.ctx.set("f", fields);
                }
                self.ctx.set("stdin", Value::Str(text));
                self.exec.run_all(self.statements, self.ctx, self.out)
            }
            Mode::Structured => {
                let Some(text) = self.read_all(&mut *input)? else {
                    return Ok(());
                };
                let json: serde_json::Value =
                    serde_json::from_str(&text).map_err(|e| Error::Structure(format!("invalid JSON input: {e}")))?;
                self.ctx.set("j", Value::from(json));
                self.exec.run_all(self.statements, self.ctx, self.out)
            }
        }
    }

    /// Whole input, decoded but not stripped. `None` when a decoding
    /// failure was suppressed.
    fn read_all(&mut self, input: &mut dyn BufRead) -> Result<Option<String>> {
        let mut raw = Vec::new();
        input.read_to_end(&mut raw)?;
        trace!(bytes = raw.len(), "read input");
        let text = self.exec.decoder().charset().decode(&raw);
        self.exec.suppress(text)
    }

    /// Bind `x`, `i` and `f` for each record in turn, then call `visit`.
    /// `i` counts every line read, including undecodable ones that quiet
    /// skipped.
    fn each_record<F>(&mut self, input: &mut dyn BufRead, mut visit: F) -> Result<()>
    where
        F: FnMut(&mut Self, &str) -> Result<()>,
    {
        let mut buf = Vec::new();
        let mut index: i64 = 0;
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                return Ok(());
            }
            index += 1;
            let record = self.exec.decoder().record(&buf);
            let Some(line) = self.exec.suppress(record)? else {
                continue;
            };
            trace!(index, "record");
            self.ctx.set("i", Value::Int(index));
            if let Some(fields) = self.exec.decoder().fields(&line) {
                self.ctx.set("f", fields);
            }
            self.ctx.set("x", Value::Str(line.clone()));
            visit(self, &line)?;
        }
    }
}

/// Single-pass sequence over the remaining records, decoded and stripped
/// as they are pulled.
fn lazy_records(mut input: Box<dyn BufRead>, decoder: Decoder, quiet: bool) -> Lines {
    let mut buf = Vec::new();
    Lines::new(std::iter::from_fn(move || loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(e) => return Some(Err(e.into())),
        }
        match decoder.record(&buf) {
            Ok(line) => return Some(Ok(Value::Str(line))),
            Err(e) if quiet && e.is_suppressible() => debug!(error = %e, "suppressed"),
            Err(e) => return Some(Err(e)),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn run(options: Options, statements: &[&str], input: Option<&'static str>) -> (Result<()>, String) {
        let mut engine = Engine::new(options).statements(statements.iter().copied());
        if let Some(text) = input {
            engine = engine.input(Cursor::new(text.as_bytes()));
        }
        let mut out = Vec::new();
        let result = engine.run(&mut out);
        assert_eq!(engine.phase(), Phase::Done);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn line_mode_binds_x_and_one_based_i() {
        let (result, out) = run(Options::default(), &["print(i, x)"], Some("a\n\nb"));
        result.unwrap();
        assert_eq!(out, "1 a\n2 \n3 b\n");
    }

    #[test]
    fn direct_mode_without_input() {
        let (result, out) = run(Options::default(), &["print(1)"], None);
        result.unwrap();
        assert_eq!(out, "1\n");
    }

    #[test]
    fn filter_echoes_matching_records() {
        let options = Options { filter: true, ..Options::default() };
        let (result, out) = run(options, &["int(x) % 2 == 0"], Some("1\n2\n3\n4\n"));
        result.unwrap();
        assert_eq!(out, "2\n4\n");
    }

    #[test]
    fn iterable_mode_is_lazy_and_single_pass() {
        let options = Options { iterable: true, ..Options::default() };
        let (result, out) = run(options, &["print(sum(map(int, l)))", "print(len(list(l)))"], Some("1\n2\n"));
        result.unwrap();
        assert_eq!(out, "3\n0\n");
    }

    #[test]
    fn full_stream_keeps_terminators() {
        let options = Options { full_stream: true, split: Some("-".into()), ..Options::default() };
        let (result, out) = run(options, &["print(stdin)", "print(f[0])"], Some("1-\n2\n"));
        result.unwrap();
        assert_eq!(out, "1-\n2\n\n1\n");
    }

    #[test]
    fn structured_mode_binds_j() {
        let options = Options { structured: true, ..Options::default() };
        let (result, out) = run(options, &["print(j[0].a)"], Some(r#"[{"a": 1}]"#));
        result.unwrap();
        assert_eq!(out, "1\n");

        let options = Options { structured: true, quiet: true, ..Options::default() };
        let (result, _) = run(options, &["print(j)"], Some("{nope"));
        assert_eq!(result.unwrap_err().kind(), "StructureError");
    }

    #[test]
    fn after_hook_runs_when_streaming_fails() {
        let options = Options { after: Some("print(a)".into()), ..Options::default() };
        let (result, out) = run(options, &["a = 1; 1 / 0"], None);
        assert_eq!(result.unwrap_err().kind(), "ZeroDivisionError");
        assert_eq!(out, "1\n");
    }

    #[test]
    fn failing_after_hook_keeps_the_earlier_failure() {
        let options = Options { after: Some("print(missing)".into()), ..Options::default() };
        let (result, _) = run(options, &["1 / 0"], None);
        match result.unwrap_err() {
            Error::AfterHook { error, cause } => {
                assert_eq!(error.kind(), "NameError");
                assert_eq!(cause.kind(), "ZeroDivisionError");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failing_before_hook_skips_streaming() {
        let options = Options {
            before: Some("1 / 0".into()),
            after: Some("print('after')".into()),
            ..Options::default()
        };
        let (result, out) = run(options, &["print(x)"], Some("a\n"));
        assert_eq!(result.unwrap_err().kind(), "ZeroDivisionError");
        assert_eq!(out, "after\n");
    }

    #[test]
    fn configuration_errors_run_no_hooks() {
        let options = Options {
            iterable: true,
            full_stream: true,
            before: Some("print('before')".into()),
            ..Options::default()
        };
        let mut engine = Engine::new(options).statements(["print(1)"]);
        let mut out = Vec::new();
        let err = engine.run(&mut out).unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
        assert_eq!(engine.phase(), Phase::Idle);
        assert!(out.is_empty());
    }

    #[test]
    fn stdout_charset_reencodes() {
        let options = Options { stdout_charset: "latin-1".into(), ..Options::default() };
        let mut engine = Engine::new(options).statements(["print('é')"]);
        let mut out = Vec::new();
        engine.run(&mut out).unwrap();
        assert_eq!(out, vec![0xE9, b'\n']);
    }

    #[test]
    fn context_survives_the_run() {
        let mut engine = Engine::new(Options::default())
            .statements(["n = n + int(x)"])
            .bindings([("n", Value::Int(10))])
            .input(Cursor::new(&b"1\n2\n"[..]));
        engine.run(&mut io::sink()).unwrap();
        assert_eq!(engine.context().get("n"), Some(&Value::Int(13)));
        assert_eq!(engine.into_context().get("x"), Some(&Value::from("2")));
    }
}
