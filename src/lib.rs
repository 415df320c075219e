pub mod errors;
pub mod context;
pub mod decoder;
pub mod engine;
pub mod executor;
pub mod functions;  // plugin model
pub mod interpreter;
pub mod options;
pub mod value;
mod comparison;
mod eval;
mod expression;
mod parser;

use std::io::{BufRead, Write};

pub use context::Context;
pub use decoder::{Charset, Chunk, Decoder};
pub use engine::{Engine, Phase};
pub use errors::{Error, Result};
pub use eval::Machine;
pub use executor::SnippetExecutor;
pub use functions::{Function, Registry};
pub use interpreter::{Evaluate, Interpreter};
pub use options::{Mode, Options};
pub use value::Value;

/// Run `statements` over `stream` with the built-in fragment language.
///
/// `stream = None` means no input is attached: line mode then runs the
/// statements once, the other input modes see an empty stream.
pub fn evaluate<I, S, B, K>(
    statements: I,
    stream: Option<Box<dyn BufRead>>,
    initial_bindings: B,
    options: &Options,
    out: &mut dyn Write,
) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: Into<Chunk>,
    B: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let mut engine = Engine::new(options.clone()).statements(statements).bindings(initial_bindings);
    if let Some(stream) = stream {
        engine = engine.input(stream);
    }
    engine.run(out)
}
