//! Single-pass recursive-descent translator.
//!
//! There is no syntax tree: each production emits its code as soon as it is
//! recognised. The grammar is split across three files that all extend the
//! same [`Parser`]:
//! - `expr` handles expressions and the type promotion between operands.
//! - `stmt` handles blocks and control flow.
//! - `decl` handles globals, procedures and the main program.

mod decl;
mod expr;
mod stmt;

use crate::codegen::CodeGen;
use crate::config::Options;
use crate::error::{CompileResult, ExpectedSnafu, InvalidUseSnafu, Position};
use crate::output::Emitter;
use crate::source::CharSource;
use crate::symbols::SymbolTable;
use crate::tokenizer::{Keyword, Lexer, Token};
use crate::ty::Ty;

/// One token of lookahead on top of the lexer, with the matching helpers the
/// grammar routines share.
pub(crate) struct Cursor<S> {
  lexer: Lexer<S>,
  token: Token,
}

impl<S: CharSource> Cursor<S> {
  pub(crate) fn new(source: S) -> CompileResult<Self> {
    let mut lexer = Lexer::new(source);
    let token = lexer.next()?;
    Ok(Self { lexer, token })
  }

  pub(crate) fn token(&self) -> &Token {
    &self.token
  }

  /// Position of the current token.
  pub(crate) fn position(&self) -> Position {
    self.lexer.token_position()
  }

  pub(crate) fn advance(&mut self) -> CompileResult<()> {
    self.token = self.lexer.next()?;
    Ok(())
  }

  pub(crate) fn is_op(&self, op: &str) -> bool {
    self.token.is_op(op)
  }

  pub(crate) fn is_keyword(&self, kw: Keyword) -> bool {
    self.token.is_keyword(kw)
  }

  pub(crate) fn expected<T>(&self, what: impl Into<String>) -> CompileResult<T> {
    ExpectedSnafu {
      expected: what,
      found: self.token.to_string(),
      pos: self.position(),
    }
    .fail()
  }

  pub(crate) fn invalid<T>(&self, message: impl Into<String>) -> CompileResult<T> {
    InvalidUseSnafu {
      message,
      pos: self.position(),
    }
    .fail()
  }

  pub(crate) fn match_op(&mut self, op: &str) -> CompileResult<()> {
    if !self.is_op(op) {
      return self.expected(format!("'{op}'"));
    }
    self.advance()
  }

  pub(crate) fn match_keyword(&mut self, kw: Keyword) -> CompileResult<()> {
    if !self.is_keyword(kw) {
      return self.expected(kw.as_str());
    }
    self.advance()
  }

  pub(crate) fn get_name(&mut self) -> CompileResult<String> {
    let Token::Ident(name) = &self.token else {
      return self.expected("identifier");
    };
    let name = name.clone();
    self.advance()?;
    Ok(name)
  }

  /// Consume a numeric literal, negated if a `-` was already taken. The
  /// result always fits a Long.
  pub(crate) fn get_number(&mut self, negative: bool) -> CompileResult<i64> {
    let Token::Number(digits) = &self.token else {
      return self.expected("number");
    };
    let value = digits
      .parse::<i64>()
      .ok()
      .map(|n| if negative { -n } else { n })
      .filter(|&n| Ty::Long.holds(n));
    let Some(value) = value else {
      let sign = if negative { "-" } else { "" };
      return self.invalid(format!("number {sign}{digits} out of range"));
    };
    self.advance()?;
    Ok(value)
  }

  /// Semicolons are optional statement terminators.
  pub(crate) fn skip_semicolon(&mut self) -> CompileResult<()> {
    if self.is_op(";") {
      self.advance()?;
    }
    Ok(())
  }
}

pub struct Parser<S, E> {
  cur: Cursor<S>,
  symbols: SymbolTable,
  code: CodeGen<E>,
  options: Options,
  /// Exit labels of the enclosing loops, innermost last.
  loops: Vec<String>,
}

impl<S: CharSource, E: Emitter> Parser<S, E> {
  pub fn new(source: S, out: E, options: &Options) -> CompileResult<Self> {
    Ok(Self {
      cur: Cursor::new(source)?,
      symbols: SymbolTable::new(),
      code: CodeGen::new(out, &options.codegen.label_prefix),
      options: options.clone(),
      loops: Vec::new(),
    })
  }

  /// Translate a whole program, returning the filled output sink.
  pub fn compile(mut self) -> CompileResult<E> {
    if self.options.codegen.runtime_header {
      self.code.header();
    }
    self.top_level_decls()?;
    self.main_program()?;
    if self.options.listing.dump_symbols {
      self.dump_symbols();
    }
    Ok(self.code.into_output())
  }

  fn dump_symbols(&mut self) {
    let lines: Vec<String> = self
      .symbols
      .entries()
      .map(|(name, entry)| {
        let ty = entry.ty.map_or("-".to_string(), |ty| ty.to_string());
        format!("{name} {} {ty}", entry.kind.as_str())
      })
      .collect();
    for line in lines {
      self.code.comment(&line);
    }
  }
}
