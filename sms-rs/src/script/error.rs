//! Error hierarchy for the SMS pipeline.
//!
//! Every stage reports through [`ScriptError`]: the lexer raises
//! [`ScriptError::Lex`], the parser [`ScriptError::Parse`], and the
//! interpreter (plus any native function) [`ScriptError::Runtime`].

use thiserror::Error;

use super::position::Position;

/// Boxed underlying cause attached to a [`ScriptError`].
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the script modules.
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Which pipeline stage produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
    Runtime,
}

#[derive(Debug, Error)]
pub enum ScriptError {
    /// Unexpected character, unterminated string/comment/interpolation.
    #[error("Error at {position}: {message}")]
    Lex {
        message: String,
        position: Position,
        #[source]
        source: Option<Cause>,
    },

    /// Grammar violation; aborts parsing at the first offending token.
    #[error("{}", located(.message, .position))]
    Parse {
        message: String,
        position: Option<Position>,
        #[source]
        source: Option<Cause>,
    },

    /// Failure while executing a program or dispatching an event.
    #[error("{}", located(.message, .position))]
    Runtime {
        message: String,
        position: Option<Position>,
        #[source]
        source: Option<Cause>,
    },
}

fn located(message: &str, position: &Option<Position>) -> String {
    match position {
        Some(pos) => format!("Error at {pos}: {message}"),
        None => message.to_owned(),
    }
}

impl ScriptError {
    pub fn lex(message: impl Into<String>, position: Position) -> Self {
        ScriptError::Lex {
            message: message.into(),
            position,
            source: None,
        }
    }

    pub fn parse(message: impl Into<String>, position: impl Into<Option<Position>>) -> Self {
        ScriptError::Parse {
            message: message.into(),
            position: position.into(),
            source: None,
        }
    }

    pub fn runtime(message: impl Into<String>, position: impl Into<Option<Position>>) -> Self {
        ScriptError::Runtime {
            message: message.into(),
            position: position.into(),
            source: None,
        }
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, cause: impl Into<Cause>) -> Self {
        match &mut self {
            ScriptError::Lex { source, .. }
            | ScriptError::Parse { source, .. }
            | ScriptError::Runtime { source, .. } => *source = Some(cause.into()),
        }
        self
    }

    /// Stamp `pos` onto the error unless it already carries a location.
    pub fn or_position(mut self, pos: Position) -> Self {
        match &mut self {
            ScriptError::Parse { position, .. } | ScriptError::Runtime { position, .. } => {
                if position.is_none() {
                    *position = Some(pos);
                }
            }
            ScriptError::Lex { .. } => {}
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScriptError::Lex { .. } => ErrorKind::Lex,
            ScriptError::Parse { .. } => ErrorKind::Parse,
            ScriptError::Runtime { .. } => ErrorKind::Runtime,
        }
    }

    /// The bare message, without the location prefix.
    pub fn message(&self) -> &str {
        match self {
            ScriptError::Lex { message, .. }
            | ScriptError::Parse { message, .. }
            | ScriptError::Runtime { message, .. } => message,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            ScriptError::Lex { position, .. } => Some(*position),
            ScriptError::Parse { position, .. } | ScriptError::Runtime { position, .. } => {
                *position
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn display_with_position() {
        let e = ScriptError::parse("Expected ')'", Position::new(2, 7));
        assert_eq!(e.to_string(), "Error at line 2, column 7: Expected ')'");
    }

    #[test]
    fn display_without_position() {
        let e = ScriptError::runtime("Division by zero", None);
        assert_eq!(e.to_string(), "Division by zero");
        assert_eq!(e.kind(), ErrorKind::Runtime);
    }

    #[test]
    fn or_position_keeps_existing() {
        let e = ScriptError::runtime("boom", Position::new(1, 1)).or_position(Position::new(9, 9));
        assert_eq!(e.position(), Some(Position::new(1, 1)));
        let e = ScriptError::runtime("boom", None).or_position(Position::new(9, 9));
        assert_eq!(e.position(), Some(Position::new(9, 9)));
    }

    #[test]
    fn source_is_exposed() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e = ScriptError::runtime("read failed", None).with_source(io);
        assert_eq!(e.source().map(|s| s.to_string()), Some("gone".to_owned()));
    }
}
