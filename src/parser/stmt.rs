//! Statements and control flow.

use tracing::trace;

use crate::codegen::Reg;
use crate::error::{CompileResult, InvalidUseSnafu, Position};
use crate::output::Emitter;
use crate::source::CharSource;
use crate::symbols::{Entry, SymbolKind};
use crate::tokenizer::{Keyword, Token};
use crate::ty::Ty;

use super::Parser;

impl<S: CharSource, E: Emitter> Parser<S, E> {
  /// Statements up to one of `terminators`, which is left as the current
  /// token and returned. Any other block-closing keyword is an error.
  pub(super) fn block(&mut self, terminators: &[Keyword]) -> CompileResult<Keyword> {
    loop {
      match self.cur.token() {
        Token::Keyword(kw) if terminators.contains(kw) => return Ok(*kw),
        Token::Keyword(kw) if kw.is_block_terminator() => {
          return self.cur.expected(describe(terminators));
        }
        Token::Eof => return self.cur.expected(describe(terminators)),
        _ => {}
      }
      self.statement()?;
      self.cur.skip_semicolon()?;
    }
  }

  fn statement(&mut self) -> CompileResult<()> {
    let kw = match self.cur.token() {
      Token::Keyword(kw) => *kw,
      Token::Ident(_) => return self.assignment_or_call(),
      _ => return self.cur.expected("statement"),
    };
    trace!(%kw, "statement");
    match kw {
      Keyword::If => self.do_if(),
      Keyword::While => self.do_while(),
      Keyword::Loop => self.do_loop(),
      Keyword::Repeat => self.do_repeat(),
      Keyword::For => self.do_for(),
      Keyword::Do => self.do_do(),
      Keyword::Break => self.do_break(),
      Keyword::Return => self.do_return(),
      Keyword::Read => self.do_read(),
      Keyword::Write => self.do_write(),
      _ => self.cur.expected("statement"),
    }
  }

  fn assignment_or_call(&mut self) -> CompileResult<()> {
    let pos = self.cur.position();
    let name = self.cur.get_name()?;
    let entry = self.symbols.resolve(&name).map_err(|err| err.at(pos.clone()))?;
    self.check_use(&name, entry, &pos)?;
    if entry.kind == SymbolKind::Procedure {
      return self.call(&name, entry.arity, pos);
    }
    self.cur.match_op("=")?;
    let ty = self.bool_expr()?;
    self.store(&name, entry, ty);
    Ok(())
  }

  /// A procedure name must open an argument list and nothing else may.
  pub(super) fn check_use(&self, name: &str, entry: Entry, pos: &Position) -> CompileResult<()> {
    let is_procedure = entry.kind == SymbolKind::Procedure;
    let message = match (is_procedure, self.cur.is_op("(")) {
      (true, false) => format!("procedure {name} used as a variable"),
      (false, true) => format!("{name} is not a procedure"),
      _ => return Ok(()),
    };
    InvalidUseSnafu {
      message,
      pos: pos.clone(),
    }
    .fail()
  }

  /// Arguments are pushed as Words, left to right. The caller pops them.
  pub(super) fn call(&mut self, name: &str, arity: usize, pos: Position) -> CompileResult<()> {
    self.cur.match_op("(")?;
    let mut count = 0usize;
    if !self.cur.is_op(")") {
      loop {
        let ty = self.bool_expr()?;
        self.code.convert(ty, Ty::Word, Reg::D0);
        self.code.push(Ty::Word);
        count += 1;
        if !self.cur.is_op(",") {
          break;
        }
        self.cur.advance()?;
      }
    }
    self.cur.match_op(")")?;
    if count != arity {
      return InvalidUseSnafu {
        message: format!("{name} takes {arity} argument(s), {count} given"),
        pos,
      }
      .fail();
    }
    self.code.call(name);
    self.code.clean_stack(2 * count as i32);
    Ok(())
  }

  /// Store `D0`, holding a value of type `from`, into a variable or
  /// parameter.
  fn store(&mut self, name: &str, entry: Entry, from: Ty) {
    match (entry.offset, entry.ty) {
      (Some(offset), _) => {
        self.code.convert(from, Ty::Word, Reg::D0);
        self.code.store_param(offset);
      }
      (None, Some(ty)) => {
        self.code.convert(from, ty, Reg::D0);
        self.code.store_var(name, ty);
      }
      (None, None) => {}
    }
  }

  /// Resolve an assignment target, rejecting procedures.
  fn target(&mut self) -> CompileResult<(String, Entry)> {
    let pos = self.cur.position();
    let name = self.cur.get_name()?;
    let entry = self.symbols.resolve(&name).map_err(|err| err.at(pos.clone()))?;
    if entry.kind == SymbolKind::Procedure {
      return InvalidUseSnafu {
        message: format!("procedure {name} used as a variable"),
        pos,
      }
      .fail();
    }
    Ok((name, entry))
  }

  /// Type a variable or parameter holds.
  fn target_type(entry: Entry) -> Ty {
    match entry.offset {
      Some(_) => Ty::Word,
      None => entry.ty.unwrap_or(Ty::Word),
    }
  }

  fn loop_body(&mut self, exit: &str, terminator: Keyword) -> CompileResult<()> {
    self.loops.push(exit.to_string());
    let result = self.block(&[terminator]);
    self.loops.pop();
    result?;
    self.cur.match_keyword(terminator)
  }

  fn do_if(&mut self) -> CompileResult<()> {
    self.cur.advance()?;
    let ty = self.bool_expr()?;
    let l1 = self.code.new_label();
    self.code.branch_false(&l1, ty);
    let end = self.block(&[Keyword::Else, Keyword::EndIf])?;
    let exit = if end == Keyword::Else {
      self.cur.advance()?;
      let l2 = self.code.new_label();
      self.code.branch(&l2);
      self.code.post_label(&l1);
      self.block(&[Keyword::EndIf])?;
      l2
    } else {
      l1
    };
    self.code.post_label(&exit);
    self.cur.match_keyword(Keyword::EndIf)
  }

  fn do_while(&mut self) -> CompileResult<()> {
    self.cur.advance()?;
    let l1 = self.code.new_label();
    let l2 = self.code.new_label();
    self.code.post_label(&l1);
    let ty = self.bool_expr()?;
    self.code.branch_false(&l2, ty);
    self.loop_body(&l2, Keyword::EndWhile)?;
    self.code.branch(&l1);
    self.code.post_label(&l2);
    Ok(())
  }

  fn do_loop(&mut self) -> CompileResult<()> {
    self.cur.advance()?;
    let l1 = self.code.new_label();
    let l2 = self.code.new_label();
    self.code.post_label(&l1);
    self.loop_body(&l2, Keyword::EndLoop)?;
    self.code.branch(&l1);
    self.code.post_label(&l2);
    Ok(())
  }

  fn do_repeat(&mut self) -> CompileResult<()> {
    self.cur.advance()?;
    let l1 = self.code.new_label();
    let l2 = self.code.new_label();
    self.code.post_label(&l1);
    self.loop_body(&l2, Keyword::Until)?;
    let ty = self.bool_expr()?;
    self.code.branch_false(&l1, ty);
    self.code.post_label(&l2);
    Ok(())
  }

  /// The counter starts one below the first value and is bumped before the
  /// limit test; the limit lives on the stack for the whole loop.
  fn do_for(&mut self) -> CompileResult<()> {
    self.cur.advance()?;
    let (name, entry) = self.target()?;
    let ty = Self::target_type(entry);
    self.cur.match_op("=")?;
    let start = self.expression()?;
    self.code.convert(start, ty, Reg::D0);
    self.code.decrement(ty);
    self.store(&name, entry, ty);
    self.cur.match_keyword(Keyword::To)?;
    let limit = self.expression()?;
    self.code.convert(limit, ty, Reg::D0);
    self.code.push(ty);

    let l1 = self.code.new_label();
    let l2 = self.code.new_label();
    self.code.post_label(&l1);
    self.load(&name, entry);
    self.code.increment(ty);
    self.store(&name, entry, ty);
    self.code.branch_above_limit(&l2, ty);
    self.loop_body(&l2, Keyword::EndFor)?;
    self.code.branch(&l1);
    self.code.post_label(&l2);
    self.code.release_stack(ty.stack_slot());
    Ok(())
  }

  /// `DBRA` counts `D0` down to -1, so the body runs `count` times. The
  /// counter is kept on the stack while the body runs.
  fn do_do(&mut self) -> CompileResult<()> {
    self.cur.advance()?;
    let ty = self.expression()?;
    self.code.convert(ty, Ty::Word, Reg::D0);
    let l1 = self.code.new_label();
    let l2 = self.code.new_label();
    self.code.decrement(Ty::Word);
    self.code.post_label(&l1);
    self.code.push(Ty::Word);
    self.loop_body(&l2, Keyword::EndDo)?;
    self.code.pop_counter();
    self.code.decrement_and_branch(&l1);
    self.code.reserve_stack(2);
    self.code.post_label(&l2);
    self.code.release_stack(2);
    Ok(())
  }

  fn do_break(&mut self) -> CompileResult<()> {
    let Some(exit) = self.loops.last().cloned() else {
      return self.cur.invalid("BREAK outside of a loop");
    };
    self.code.branch(&exit);
    self.cur.advance()
  }

  fn do_return(&mut self) -> CompileResult<()> {
    if !self.symbols.in_procedure() {
      return self.cur.invalid("RETURN outside of a procedure");
    }
    self.cur.advance()?;
    if self.starts_expression() {
      let ty = self.bool_expr()?;
      self.code.convert(ty, Ty::Word, Reg::D0);
    }
    self.code.proc_epilog();
    Ok(())
  }

  fn starts_expression(&self) -> bool {
    match self.cur.token() {
      Token::Ident(_) | Token::Number(_) => true,
      Token::Operator(op) => matches!(op.as_str(), "(" | "+" | "-" | "!"),
      Token::Keyword(_) | Token::Eof => false,
    }
  }

  /// READ(a, b, ...): each value arrives as a Long in `D0`.
  fn do_read(&mut self) -> CompileResult<()> {
    self.cur.advance()?;
    self.cur.match_op("(")?;
    loop {
      let (name, entry) = self.target()?;
      self.code.read_it();
      self.store(&name, entry, Ty::Long);
      if !self.cur.is_op(",") {
        break;
      }
      self.cur.advance()?;
    }
    self.cur.match_op(")")
  }

  fn do_write(&mut self) -> CompileResult<()> {
    self.cur.advance()?;
    self.cur.match_op("(")?;
    loop {
      let ty = self.bool_expr()?;
      self.code.convert(ty, Ty::Long, Reg::D0);
      self.code.write_it();
      if !self.cur.is_op(",") {
        break;
      }
      self.cur.advance()?;
    }
    self.cur.match_op(")")
  }
}

fn describe(terminators: &[Keyword]) -> String {
  terminators
    .iter()
    .map(|kw| kw.as_str())
    .collect::<Vec<_>>()
    .join(" or ")
}
