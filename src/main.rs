use std::ffi::OsString;
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;

use clap::{Arg, ArgAction, CommandFactory, FromArgMatches, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use stream_eval::{Chunk, Engine, Error, Options, Value};

/// Evaluate short statements against every line of standard input.
///
///     ps aux | sev "x.split()[:3].join('-')" -p
#[derive(Parser, Debug)]
#[command(name = "sev", author, version, about, long_about = None)]
struct Args {
    /// Statements to evaluate, in order
    #[arg(required = true, value_name = "STATEMENT")]
    statements: Vec<OsString>,
    /// Bind `l` to a lazy sequence of all input lines and run once
    #[arg(short = 'i')]
    iterable: bool,
    /// Statement run before reading input
    #[arg(short = 'b', value_name = "EXPR")]
    before: Option<OsString>,
    /// Statement run after reading input, even when something failed
    #[arg(short = 'a', value_name = "EXPR")]
    after: Option<OsString>,
    /// Skip statements and records that raise errors
    #[arg(short = 'q')]
    quiet: bool,
    /// Print only the lines for which every statement is true
    #[arg(short = 'f')]
    filter: bool,
    /// Split each line with this regex and bind the parts to `f`
    #[arg(short = 's', value_name = "PATTERN")]
    split: Option<String>,
    /// Print the value of each statement unless it is null
    #[arg(short = 'p')]
    autoprint: bool,
    /// Bind the whole input to `stdin` and run once
    #[arg(long)]
    full: bool,
    /// Parse the whole input as JSON, bind it to `j` and run once
    #[arg(long)]
    json: bool,
    /// Charset of input and statements (default utf-8)
    #[arg(long, value_name = "NAME", default_value = "")]
    stdin_charset: String,
    /// Charset of output (default utf-8)
    #[arg(long, value_name = "NAME", default_value = "")]
    stdout_charset: String,
    /// Characters stripped from the end of each line (default: newline)
    #[arg(long, value_name = "CHARS")]
    rstrip: Option<String>,
    /// Seed a binding; VALUE is read as JSON, else as a string
    #[arg(long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,
}

impl Args {
    fn options(&self) -> Options {
        Options {
            iterable: self.iterable,
            full_stream: self.full,
            filter: self.filter,
            structured: self.json,
            split: self.split.clone(),
            rstrip: self.rstrip.clone().unwrap_or_else(|| "\n".to_string()),
            stdin_charset: self.stdin_charset.clone(),
            stdout_charset: self.stdout_charset.clone(),
            quiet: self.quiet,
            autoprint: self.autoprint,
            before: self.before.clone().map(chunk),
            after: self.after.clone().map(chunk),
        }
    }

    fn bindings(&self) -> Result<Vec<(String, Value)>, Error> {
        self.set
            .iter()
            .map(|pair| {
                let (name, raw) = pair
                    .split_once('=')
                    .ok_or_else(|| Error::Configuration(format!("expected NAME=VALUE, got {pair:?}")))?;
                let value = serde_json::from_str::<serde_json::Value>(raw)
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::from(raw));
                Ok((name.to_string(), value))
            })
            .collect()
    }
}

/// Arguments reach the engine as raw bytes so `--stdin-charset` applies to
/// them too.
#[cfg(unix)]
fn chunk(arg: OsString) -> Chunk {
    use std::os::unix::ffi::OsStringExt;
    Chunk::Bytes(arg.into_vec())
}

#[cfg(not(unix))]
fn chunk(arg: OsString) -> Chunk {
    Chunk::Text(arg.to_string_lossy().into_owned())
}

fn run(args: Args) -> Result<(), Error> {
    let options = args.options();
    let bindings = args.bindings()?;
    let mut engine = Engine::new(options)
        .statements(args.statements.into_iter().map(chunk))
        .bindings(bindings);

    let stdin = io::stdin();
    if stdin.is_terminal() {
        debug!("stdin is a terminal, running without input");
    } else {
        engine = engine.input(stdin.lock());
    }

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    engine.run(&mut out)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // `-v` rather than clap's `-V`.
    let matches = Args::command()
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('v')
                .long("version")
                .action(ArgAction::Version)
                .help("Print version"),
        )
        .get_matches();
    let args = match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let mut stderr = io::stderr().lock();
            let _ = writeln!(stderr, "{err}");
            if let Error::AfterHook { cause, .. } = &err {
                let _ = writeln!(stderr, "raised while handling: {cause}");
            }
            let _ = stderr.flush();
            ExitCode::FAILURE
        }
    }
}
