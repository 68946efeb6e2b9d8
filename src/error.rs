//! Shared error utilities used across the compilation pipeline.
//!
//! Diagnostics are kept lightweight on purpose – every failure is a single
//! line-numbered message, and the first one aborts the whole compilation.
//! The driver turns the rendered message into an exit code.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

/// The three failure kinds of the pipeline. Each front-end stage produces
/// exactly one of these; code generation never fails on user input.
#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("Lexical error on line {line}: {message}"))]
  Lex { line: usize, message: String },

  #[snafu(display("Parse error on line {line}: {message}"))]
  Parse { line: usize, message: String },

  #[snafu(display("Type error on line {line}: {message}"))]
  Type { line: usize, message: String },
}

impl CompileError {
  /// Construct a lexical error anchored at a source line.
  pub fn lex(line: usize, message: impl Into<String>) -> Self {
    Self::Lex {
      line,
      message: message.into(),
    }
  }

  pub fn parse(line: usize, message: impl Into<String>) -> Self {
    Self::Parse {
      line,
      message: message.into(),
    }
  }

  pub fn type_error(line: usize, message: impl Into<String>) -> Self {
    Self::Type {
      line,
      message: message.into(),
    }
  }

  /// Source line the error is anchored at.
  pub fn line(&self) -> usize {
    match self {
      Self::Lex { line, .. } | Self::Parse { line, .. } | Self::Type { line, .. } => *line,
    }
  }
}
