use std::io;

use thiserror::Error;

/// Every failure the evaluator can surface. The display form is always
/// `"<Kind>: <message>"`, which is what the binary prints on stderr.
#[derive(Debug, Error)]
pub enum Error {
    /// Incompatible or invalid options; raised before any input is read.
    #[error("ConfigurationError: {0}")]
    Configuration(String),

    /// Bytes that cannot be decoded (or text that cannot be encoded) with the charset.
    #[error("DecodingError: {0}")]
    Decoding(String),

    /// The whole input is not a valid JSON document in structured mode.
    #[error("StructureError: {0}")]
    Structure(String),

    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("NameError: name '{0}' is not defined")]
    Name(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ValueError: {0}")]
    Value(String),

    #[error("IndexError: {0}")]
    Index(String),

    #[error("KeyError: {0}")]
    Key(String),

    #[error("ZeroDivisionError: division by zero")]
    ZeroDivision,

    #[error("IoError: {0}")]
    Io(#[source] io::Error),

    /// The after-hook failed while an earlier failure was already propagating.
    #[error("{error}")]
    AfterHook {
        error: Box<Error>,
        #[source]
        cause: Box<Error>,
    },
}

impl Error {
    /// Kind name used as the prefix of the rendered message.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "ConfigurationError",
            Error::Decoding(_) => "DecodingError",
            Error::Structure(_) => "StructureError",
            Error::Syntax(_) => "SyntaxError",
            Error::Name(_) => "NameError",
            Error::Type(_) => "TypeError",
            Error::Value(_) => "ValueError",
            Error::Index(_) => "IndexError",
            Error::Key(_) => "KeyError",
            Error::ZeroDivision => "ZeroDivisionError",
            Error::Io(_) => "IoError",
            Error::AfterHook { error, .. } => error.kind(),
        }
    }

    /// Whether the quiet policy may swallow this error.
    ///
    /// Only decoding failures and failures raised by the caller's fragments
    /// qualify; configuration, structure and I/O errors always propagate.
    pub fn is_suppressible(&self) -> bool {
        matches!(
            self,
            Error::Decoding(_)
                | Error::Syntax(_)
                | Error::Name(_)
                | Error::Type(_)
                | Error::Value(_)
                | Error::Index(_)
                | Error::Key(_)
                | Error::ZeroDivision
        )
    }

    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        Error::Type(msg.into())
    }
}

/// An `Error` carried inside an `io::Error` (as an output charset failure
/// is) comes back out unchanged; anything else is `Error::Io`.
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if !e.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Error::Io(e);
        }
        match e.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            _ => Error::Io(io::ErrorKind::InvalidData.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_kind_prefix() {
        assert_eq!(Error::ZeroDivision.to_string(), "ZeroDivisionError: division by zero");
        assert_eq!(Error::Name("foo".into()).to_string(), "NameError: name 'foo' is not defined");
        assert_eq!(Error::Configuration("bad".into()).kind(), "ConfigurationError");
    }

    #[test]
    fn after_hook_renders_the_later_failure() {
        let err = Error::AfterHook {
            error: Box::new(Error::Name("foo".into())),
            cause: Box::new(Error::ZeroDivision),
        };
        assert_eq!(err.kind(), "NameError");
        assert_eq!(err.to_string(), "NameError: name 'foo' is not defined");
        let cause = std::error::Error::source(&err).map(|c| c.to_string());
        assert_eq!(cause.as_deref(), Some("ZeroDivisionError: division by zero"));
    }

    #[test]
    fn quiet_never_hides_configuration_errors() {
        assert!(!Error::Configuration("x".into()).is_suppressible());
        assert!(!Error::Structure("x".into()).is_suppressible());
        assert!(Error::Decoding("x".into()).is_suppressible());
        assert!(Error::ZeroDivision.is_suppressible());
    }

    #[test]
    fn io_errors_unwrap_carried_errors() {
        let carried = io::Error::new(io::ErrorKind::InvalidData, Error::Decoding("bad".into()));
        assert_eq!(Error::from(carried).to_string(), "DecodingError: bad");
        let plain = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        assert_eq!(Error::from(plain).kind(), "IoError");
    }
}
