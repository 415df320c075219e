use std::io::Write;

use tracing::debug;

use crate::context::Context;
use crate::decoder::{Chunk, Decoder};
use crate::errors::Result;
use crate::interpreter::Evaluate;

/// Runs statement lists against the shared context, applying the
/// auto-print and quiet policies to each statement on its own.
pub struct SnippetExecutor<'r, E: Evaluate + ?Sized> {
    evaluator: &'r mut E,
    decoder: &'r Decoder,
    quiet: bool,
    autoprint: bool,
}

impl<'r, E: Evaluate + ?Sized> SnippetExecutor<'r, E> {
    pub fn new(evaluator: &'r mut E, decoder: &'r Decoder, quiet: bool, autoprint: bool) -> Self {
        Self { evaluator, decoder, quiet, autoprint }
    }

    pub fn decoder(&self) -> &Decoder {
        self.decoder
    }

    /// Apply the quiet policy: a suppressible failure becomes `Ok(None)`.
    pub fn suppress<T>(&self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(v) => Ok(Some(v)),
            Err(e) if self.quiet && e.is_suppressible() => {
                debug!(error = %e, "suppressed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Run every statement in order. A suppressed failure skips only the
    /// statement that raised it.
    pub fn run_all(&mut self, statements: &[Chunk], ctx: &mut Context, out: &mut dyn Write) -> Result<()> {
        for statement in statements {
            let result = self.run_one(statement, ctx, out);
            self.suppress(result)?;
        }
        Ok(())
    }

    /// Evaluate statements as predicates. Stops at the first falsy result;
    /// a suppressed failure counts as false.
    pub fn run_predicates(&mut self, statements: &[Chunk], ctx: &mut Context, out: &mut dyn Write) -> Result<bool> {
        for statement in statements {
            let result = self
                .decoder
                .decode(statement)
                .and_then(|source| self.evaluator.evaluate(&source, ctx, out));
            match self.suppress(result)? {
                Some(v) if v.truthy() => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Run a hook for effect. Missing and empty hooks do nothing.
    pub fn run_hook(&mut self, hook: Option<&Chunk>, ctx: &mut Context, out: &mut dyn Write) -> Result<()> {
        let Some(hook) = hook.filter(|h| !h.is_empty()) else {
            return Ok(());
        };
        let result = self
            .decoder
            .decode(hook)
            .and_then(|source| self.evaluator.execute(&source, ctx, out));
        self.suppress(result).map(drop)
    }

    fn run_one(&mut self, statement: &Chunk, ctx: &mut Context, out: &mut dyn Write) -> Result<()> {
        let source = self.decoder.decode(statement)?;
        if !self.autoprint {
            return self.evaluator.execute(&source, ctx, out);
        }
        let value = self.evaluator.evaluate(&source, ctx, out)?;
        if !value.is_null() {
            writeln!(out, "{value}")?;
        }
        Ok(())
    }
}
