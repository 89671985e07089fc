//! Source locations attached to tokens, AST nodes and diagnostics.

use std::fmt;

/// A 1-based line/column location in script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::new(1, 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Position::new(3, 14).to_string(), "line 3, column 14");
    }

    #[test]
    fn ordering_is_line_major() {
        assert!(Position::new(1, 40) < Position::new(2, 1));
    }
}
