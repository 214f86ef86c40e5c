use std::path::PathBuf;

use thiserror::Error;

use super::block::BlockKind;

/// A fatal parse failure tied to the logical line that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {directive}: {kind}")]
pub struct ParseError {
    /// 1-based starting line of the offending logical line.
    pub line: usize,
    /// Keyword of the offending directive as written.
    pub directive: String,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(line: usize, directive: impl Into<String>, kind: ParseErrorKind) -> Self {
        Self {
            line,
            directive: directive.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("{kind} block '{name}' opened on line {start_line} is never closed with END")]
    UnterminatedBlock {
        kind: BlockKind,
        name: String,
        start_line: usize,
    },
    #[error("{0}")]
    UnexpectedDirective(String),
    #[error("unknown directive '{0}'")]
    UnknownDirective(String),
    #[error("missing required argument: {0}")]
    MissingRequiredArgument(String),
    #[error("malformed secret: {0}")]
    MalformedSecret(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// Failure of the file-based entry point.
#[derive(Debug, Error)]
pub enum AgentfileError {
    #[error("failed to read Agentfile {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
}
