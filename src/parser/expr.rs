//! Expressions, loosest level first. Every routine leaves its value in `D0`
//! and returns the type it has there.

use crate::codegen::Relation;
use crate::error::CompileResult;
use crate::output::Emitter;
use crate::source::CharSource;
use crate::symbols::{Entry, SymbolKind};
use crate::tokenizer::Token;
use crate::ty::Ty;

use super::Parser;

impl<S: CharSource, E: Emitter> Parser<S, E> {
  /// expression [relop expression]
  pub(super) fn bool_expr(&mut self) -> CompileResult<Ty> {
    let left = self.expression()?;
    let Some(rel) = self.relation() else {
      return Ok(left);
    };
    self.cur.advance()?;
    self.code.push(left);
    let right = self.expression()?;
    Ok(self.code.pop_compare(left, right, rel))
  }

  fn relation(&self) -> Option<Relation> {
    match self.cur.token() {
      Token::Operator(op) => Relation::from_op(op),
      _ => None,
    }
  }

  /// term {addop term}, where the add operators include `|` and `~`.
  pub(super) fn expression(&mut self) -> CompileResult<Ty> {
    let mut ty = self.term()?;
    loop {
      let op = match self.cur.token() {
        Token::Operator(op) if matches!(op.as_str(), "+" | "-" | "|" | "~") => op.clone(),
        _ => return Ok(ty),
      };
      self.cur.advance()?;
      self.code.push(ty);
      let right = self.term()?;
      ty = match op.as_str() {
        "+" => self.code.pop_add(ty, right),
        "-" => self.code.pop_sub(ty, right),
        "|" => self.code.pop_or(ty, right),
        _ => self.code.pop_xor(ty, right),
      };
    }
  }

  /// not-factor {mulop not-factor}, where the multiply operators include `&`.
  fn term(&mut self) -> CompileResult<Ty> {
    let mut ty = self.not_factor()?;
    loop {
      let op = match self.cur.token() {
        Token::Operator(op) if matches!(op.as_str(), "*" | "/" | "&") => op.clone(),
        _ => return Ok(ty),
      };
      self.cur.advance()?;
      self.code.push(ty);
      let right = self.not_factor()?;
      ty = match op.as_str() {
        "*" => self.code.pop_mul(ty, right),
        "/" => self.code.pop_div(ty, right),
        _ => self.code.pop_and(ty, right),
      };
    }
  }

  fn not_factor(&mut self) -> CompileResult<Ty> {
    if !self.cur.is_op("!") {
      return self.signed_factor();
    }
    self.cur.advance()?;
    let ty = self.not_factor()?;
    self.code.not(ty);
    Ok(ty)
  }

  fn signed_factor(&mut self) -> CompileResult<Ty> {
    if self.cur.is_op("+") {
      self.cur.advance()?;
      return self.factor();
    }
    if !self.cur.is_op("-") {
      return self.factor();
    }
    self.cur.advance()?;
    if matches!(self.cur.token(), Token::Number(_)) {
      let value = self.cur.get_number(true)?;
      return Ok(self.load_constant(value));
    }
    let ty = self.factor()?;
    self.code.negate(ty);
    Ok(ty)
  }

  fn factor(&mut self) -> CompileResult<Ty> {
    match self.cur.token() {
      Token::Operator(op) if op == "(" => {
        self.cur.advance()?;
        let ty = self.bool_expr()?;
        self.cur.match_op(")")?;
        Ok(ty)
      }
      Token::Number(_) => {
        let value = self.cur.get_number(false)?;
        Ok(self.load_constant(value))
      }
      Token::Ident(name) => {
        let name = name.clone();
        let pos = self.cur.position();
        let entry = self.symbols.resolve(&name).map_err(|err| err.at(pos.clone()))?;
        self.cur.advance()?;
        self.check_use(&name, entry, &pos)?;
        if entry.kind == SymbolKind::Procedure {
          self.call(&name, entry.arity, pos)?;
          return Ok(Ty::Word);
        }
        Ok(self.load(&name, entry))
      }
      _ => self.cur.expected("expression"),
    }
  }

  fn load_constant(&mut self, value: i64) -> Ty {
    let ty = Ty::for_constant(value);
    self.code.load_const(value, ty);
    ty
  }

  /// Load a variable or parameter; procedures are handled by the caller.
  pub(super) fn load(&mut self, name: &str, entry: Entry) -> Ty {
    match (entry.offset, entry.ty) {
      (Some(offset), _) => {
        self.code.load_param(offset);
        Ty::Word
      }
      (None, Some(ty)) => {
        self.code.load_var(name, ty);
        ty
      }
      (None, None) => Ty::Word,
    }
  }
}
