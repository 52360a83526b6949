//! Declarations: globals, procedures and the main program.

use tracing::debug;

use crate::error::{CompileResult, DuplicateIdentifierSnafu, InvalidUseSnafu, Position};
use crate::output::Emitter;
use crate::source::CharSource;
use crate::symbols::SymbolKind;
use crate::tokenizer::{Keyword, Token};
use crate::ty::Ty;

use super::Parser;

impl<S: CharSource, E: Emitter> Parser<S, E> {
  pub(super) fn top_level_decls(&mut self) -> CompileResult<()> {
    loop {
      match self.cur.token() {
        Token::Keyword(Keyword::Var) => self.global_decl()?,
        Token::Keyword(Keyword::Procedure) => self.procedure()?,
        _ => return Ok(()),
      }
    }
  }

  fn global_decl(&mut self) -> CompileResult<()> {
    self.cur.advance()?;
    loop {
      self.var_item()?;
      if !self.cur.is_op(",") {
        break;
      }
      self.cur.advance()?;
    }
    self.cur.skip_semicolon()
  }

  /// name [':' tag] ['=' ['-'] number]
  fn var_item(&mut self) -> CompileResult<()> {
    let pos = self.cur.position();
    let name = self.cur.get_name()?;
    self.check_label_name(&name, &pos)?;

    let mut ty = Ty::Word;
    if self.cur.is_op(":") {
      self.cur.advance()?;
      let tag = match self.cur.token() {
        Token::Ident(tag) => Ty::from_tag(tag),
        _ => None,
      };
      let Some(tag) = tag else {
        return self.cur.expected("type B, W or L");
      };
      ty = tag;
      self.cur.advance()?;
    }

    let mut value = 0;
    if self.cur.is_op("=") {
      self.cur.advance()?;
      let negative = self.cur.is_op("-");
      if negative {
        self.cur.advance()?;
      }
      let value_pos = self.cur.position();
      value = self.cur.get_number(negative)?;
      if !ty.holds(value) {
        return InvalidUseSnafu {
          message: format!("initial value {value} does not fit in a {ty}"),
          pos: value_pos,
        }
        .fail();
      }
    }

    self
      .symbols
      .declare(&name, SymbolKind::Variable, Some(ty))
      .map_err(|err| err.at(pos))?;
    debug!(%name, %ty, value, "global");
    self.code.allocate(&name, ty, value);
    Ok(())
  }

  /// PROCEDURE name '(' formals ')' {VAR locals} BEGIN block END
  fn procedure(&mut self) -> CompileResult<()> {
    self.cur.advance()?;
    let pos = self.cur.position();
    let name = self.cur.get_name()?;
    self.check_label_name(&name, &pos)?;
    self
      .symbols
      .declare(&name, SymbolKind::Procedure, None)
      .map_err(|err| err.at(pos.clone()))?;

    self.symbols.enter_procedure();
    self.cur.match_op("(")?;
    if !self.cur.is_op(")") {
      loop {
        let pos = self.cur.position();
        let param = self.cur.get_name()?;
        self
          .symbols
          .add_parameter(&param)
          .map_err(|err| err.at(pos))?;
        if !self.cur.is_op(",") {
          break;
        }
        self.cur.advance()?;
      }
    }
    self.cur.match_op(")")?;
    self.cur.skip_semicolon()?;

    while self.cur.is_keyword(Keyword::Var) {
      self.cur.advance()?;
      loop {
        let pos = self.cur.position();
        let local = self.cur.get_name()?;
        self.symbols.add_local(&local).map_err(|err| err.at(pos))?;
        if !self.cur.is_op(",") {
          break;
        }
        self.cur.advance()?;
      }
      self.cur.skip_semicolon()?;
    }

    let params = self.symbols.parameter_count();
    let locals = self.symbols.local_count();
    // Set before the body so the procedure can call itself.
    self
      .symbols
      .set_arity(&name, params)
      .map_err(|err| err.at(pos))?;
    debug!(%name, params, locals, "procedure");

    self.cur.match_keyword(Keyword::Begin)?;
    self.code.proc_prolog(&name, locals);
    self.block(&[Keyword::End])?;
    self.cur.match_keyword(Keyword::End)?;
    self.code.proc_epilog();
    self.symbols.clear_parameters();
    self.cur.skip_semicolon()
  }

  /// Globals and procedures are emitted under their own names, so those
  /// names must stay clear of generated labels and runtime symbols.
  fn check_label_name(&self, name: &str, pos: &Position) -> CompileResult<()> {
    if !self.code.is_reserved(name) {
      return Ok(());
    }
    InvalidUseSnafu {
      message: format!("{name} is reserved for generated code"),
      pos: pos.clone(),
    }
    .fail()
  }

  /// PROGRAM name BEGIN block END '.'
  pub(super) fn main_program(&mut self) -> CompileResult<()> {
    self.cur.match_keyword(Keyword::Program)?;
    let pos = self.cur.position();
    let name = self.cur.get_name()?;
    if self.symbols.lookup(&name).is_some() {
      return DuplicateIdentifierSnafu { name, pos }.fail();
    }
    debug!(%name, "main program");
    self.cur.skip_semicolon()?;
    self.cur.match_keyword(Keyword::Begin)?;

    self.code.prolog();
    self.block(&[Keyword::End])?;
    self.cur.match_keyword(Keyword::End)?;
    self.cur.match_op(".")?;
    if *self.cur.token() != Token::Eof {
      return self.cur.expected("end of input");
    }
    if self.options.codegen.runtime_header {
      self.code.epilog();
    }
    Ok(())
  }
}
