use std::fmt;

use crate::decoder::{Charset, Chunk};
use crate::errors::{Error, Result};

/// Input acquisition strategy for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `l` is a lazy sequence of records; statements run once.
    Iterable,
    /// `stdin` holds the whole decoded input; statements run once.
    FullStream,
    /// Statements are predicates; matching records are echoed.
    Filter,
    /// `j` holds the input parsed as JSON; statements run once.
    Structured,
    /// Statements run once per record with `x` and `i` bound.
    LineByLine,
    /// No input attached; statements run once.
    Direct,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Iterable => "iterable",
            Mode::FullStream => "full-stream",
            Mode::Filter => "filter",
            Mode::Structured => "structured",
            Mode::LineByLine => "line-by-line",
            Mode::Direct => "direct",
        })
    }
}

/// Option set for one invocation.
#[derive(Debug, Clone)]
pub struct Options {
    pub iterable: bool,
    pub full_stream: bool,
    pub filter: bool,
    pub structured: bool,
    /// Regex used to fill `f`.
    pub split: Option<String>,
    /// Characters removed from the end of every record.
    pub rstrip: String,
    pub stdin_charset: String,
    pub stdout_charset: String,
    pub quiet: bool,
    pub autoprint: bool,
    pub before: Option<Chunk>,
    pub after: Option<Chunk>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            iterable: false,
            full_stream: false,
            filter: false,
            structured: false,
            split: None,
            rstrip: "\n".to_string(),
            stdin_charset: String::new(),
            stdout_charset: String::new(),
            quiet: false,
            autoprint: false,
            before: None,
            after: None,
        }
    }
}

impl Options {
    /// Reject incompatible combinations. Never touches input.
    pub fn validate(&self) -> Result<()> {
        let exclusive = [
            ("full", self.full_stream),
            ("json", self.structured),
            ("iterable", self.iterable),
        ];
        for (a, b) in [(0, 1), (0, 2), (1, 2)] {
            if exclusive[a].1 && exclusive[b].1 {
                return Err(Error::Configuration(format!(
                    "'{}' and '{}' options are mutually exclusive",
                    exclusive[a].0, exclusive[b].0
                )));
            }
        }
        if self.split.is_some() {
            if self.structured {
                return Err(Error::Configuration(
                    "'split' can't be used together with 'json'".into(),
                ));
            }
            if self.iterable {
                return Err(Error::Configuration(
                    "'split' can't be used together with 'iterable'".into(),
                ));
            }
        }
        self.stdin_charset.parse::<Charset>()?;
        self.stdout_charset.parse::<Charset>()?;
        Ok(())
    }

    /// Validate, then pick the strategy:
    /// iterable > full-stream > filter > structured > line-by-line > direct.
    pub fn select_mode(&self, stream_present: bool) -> Result<Mode> {
        self.validate()?;
        Ok(if self.iterable {
            Mode::Iterable
        } else if self.full_stream {
            Mode::FullStream
        } else if self.filter {
            Mode::Filter
        } else if self.structured {
            Mode::Structured
        } else if stream_present {
            Mode::LineByLine
        } else {
            Mode::Direct
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_is_line_mode_or_direct() {
        let o = Options::default();
        assert_eq!(o.rstrip, "\n");
        assert_eq!(o.select_mode(true).unwrap(), Mode::LineByLine);
        assert_eq!(o.select_mode(false).unwrap(), Mode::Direct);
    }

    #[test]
    fn exclusive_pairs_are_rejected() {
        let pairs: [fn(&mut Options); 3] = [
            |o| o.full_stream = true,
            |o| o.structured = true,
            |o| o.iterable = true,
        ];
        for (a, b) in [(0, 1), (0, 2), (1, 2)] {
            let mut o = Options::default();
            pairs[a](&mut o);
            pairs[b](&mut o);
            let err = o.select_mode(true).unwrap_err();
            assert_eq!(err.kind(), "ConfigurationError");
        }
    }

    #[test]
    fn split_conflicts() {
        let conflicts: [fn(&mut Options); 2] = [|o| o.structured = true, |o| o.iterable = true];
        for set in conflicts {
            let mut o = Options { split: Some("-".into()), ..Options::default() };
            set(&mut o);
            assert!(matches!(o.select_mode(true), Err(Error::Configuration(_))));
        }
        let o = Options { split: Some("-".into()), full_stream: true, ..Options::default() };
        assert_eq!(o.select_mode(true).unwrap(), Mode::FullStream);
    }

    #[test]
    fn selection_order() {
        let o = Options { filter: true, structured: true, ..Options::default() };
        assert_eq!(o.select_mode(true).unwrap(), Mode::Filter);
        let o = Options { filter: true, full_stream: true, ..Options::default() };
        assert_eq!(o.select_mode(false).unwrap(), Mode::FullStream);
        let o = Options { structured: true, ..Options::default() };
        assert_eq!(o.select_mode(false).unwrap(), Mode::Structured);
    }

    #[test]
    fn unknown_charset_is_configuration() {
        let o = Options { stdin_charset: "ebcdic-fr".into(), ..Options::default() };
        assert!(matches!(o.validate(), Err(Error::Configuration(_))));
    }
}
