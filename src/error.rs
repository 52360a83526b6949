//! Shared error utilities used across the compilation pipeline.
//!
//! Every failure is fatal: the first error aborts the run and propagates with
//! `?` up to the driver. Diagnostics point at the offending column of the
//! current source line with a caret.

use std::fmt;

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

/// Where in the source an error was detected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
  /// 1-based line number.
  pub line: usize,
  /// 1-based column of the first character of the offending token.
  pub column: usize,
  /// The text of the line as far as the scanner had read it.
  pub line_text: String,
}

impl Position {
  /// Two-line excerpt: the line text and a caret under the column.
  pub fn caret(&self) -> String {
    let offset = self.column.saturating_sub(1);
    format!("{}\n{}^", self.line_text, " ".repeat(offset))
  }
}

impl fmt::Display for Position {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.line, self.column)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(display("{pos}: unrecognized character '{}'", ch.escape_default()))]
  Scan { ch: char, pos: Position },

  #[snafu(display("{pos}: {expected} expected, found {found}"))]
  Expected {
    expected: String,
    found: String,
    pos: Position,
  },

  #[snafu(display("{pos}: undefined identifier {name}"))]
  UndefinedIdentifier { name: String, pos: Position },

  #[snafu(display("{pos}: duplicate identifier {name}"))]
  DuplicateIdentifier { name: String, pos: Position },

  #[snafu(display("{pos}: {message}"))]
  InvalidUse { message: String, pos: Position },
}

impl CompileError {
  pub fn position(&self) -> &Position {
    match self {
      Self::Scan { pos, .. }
      | Self::Expected { pos, .. }
      | Self::UndefinedIdentifier { pos, .. }
      | Self::DuplicateIdentifier { pos, .. }
      | Self::InvalidUse { pos, .. } => pos,
    }
  }

  /// Message followed by the caret excerpt, ready for stderr.
  pub fn render(&self) -> String {
    format!("error: {self}\n{}", self.position().caret())
  }
}
