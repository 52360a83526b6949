//! Interpreter variant of the front end.
//!
//! Uses the same scanner and expression grammar as the compiler but computes
//! values on the spot instead of emitting code. Arithmetic is 32-bit and
//! wraps; relations yield -1 or 0 like the generated code does.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::error::{CompileResult, InvalidUseSnafu, UndefinedIdentifierSnafu};
use crate::parser::Cursor;
use crate::source::CharSource;
use crate::tokenizer::{Keyword, Token};

pub struct Interpreter<S> {
  cur: Cursor<S>,
  vars: HashMap<String, i32>,
  input: VecDeque<i32>,
  output: Vec<i32>,
}

impl<S: CharSource> Interpreter<S> {
  pub fn new(source: S, input: impl IntoIterator<Item = i32>) -> CompileResult<Self> {
    Ok(Self {
      cur: Cursor::new(source)?,
      vars: HashMap::new(),
      input: input.into_iter().collect(),
      output: Vec::new(),
    })
  }

  /// Run statements until `.` or end of input and return everything WRITE
  /// produced.
  pub fn run(mut self) -> CompileResult<Vec<i32>> {
    loop {
      match self.cur.token() {
        Token::Eof => break,
        Token::Operator(op) if op == "." => break,
        _ => {}
      }
      self.statement()?;
      self.cur.skip_semicolon()?;
    }
    debug!(values = self.output.len(), "interpreter finished");
    Ok(self.output)
  }

  fn statement(&mut self) -> CompileResult<()> {
    match self.cur.token() {
      Token::Ident(_) => {
        let name = self.cur.get_name()?;
        self.cur.match_op("=")?;
        let value = self.bool_expr()?;
        self.vars.insert(name, value);
        Ok(())
      }
      Token::Keyword(Keyword::Read) => self.read(),
      Token::Keyword(Keyword::Write) => self.write(),
      _ => self.cur.expected("statement"),
    }
  }

  fn read(&mut self) -> CompileResult<()> {
    self.cur.advance()?;
    self.cur.match_op("(")?;
    loop {
      let Some(value) = self.input.front().copied() else {
        return self.cur.invalid("READ past end of input");
      };
      let name = self.cur.get_name()?;
      self.input.pop_front();
      self.vars.insert(name, value);
      if !self.cur.is_op(",") {
        break;
      }
      self.cur.advance()?;
    }
    self.cur.match_op(")")
  }

  fn write(&mut self) -> CompileResult<()> {
    self.cur.advance()?;
    self.cur.match_op("(")?;
    loop {
      let value = self.bool_expr()?;
      self.output.push(value);
      if !self.cur.is_op(",") {
        break;
      }
      self.cur.advance()?;
    }
    self.cur.match_op(")")
  }

  fn bool_expr(&mut self) -> CompileResult<i32> {
    let left = self.expression()?;
    let op = match self.cur.token() {
      Token::Operator(op) if matches!(op.as_str(), "=" | "#" | "<>" | "<" | ">" | "<=" | ">=") => {
        op.clone()
      }
      _ => return Ok(left),
    };
    self.cur.advance()?;
    let right = self.expression()?;
    let holds = match op.as_str() {
      "=" => left == right,
      "#" | "<>" => left != right,
      "<" => left < right,
      ">" => left > right,
      "<=" => left <= right,
      _ => left >= right,
    };
    Ok(if holds { -1 } else { 0 })
  }

  fn expression(&mut self) -> CompileResult<i32> {
    let mut value = self.term()?;
    loop {
      let op = match self.cur.token() {
        Token::Operator(op) if matches!(op.as_str(), "+" | "-" | "|" | "~") => op.clone(),
        _ => return Ok(value),
      };
      self.cur.advance()?;
      let right = self.term()?;
      value = match op.as_str() {
        "+" => value.wrapping_add(right),
        "-" => value.wrapping_sub(right),
        "|" => value | right,
        _ => value ^ right,
      };
    }
  }

  fn term(&mut self) -> CompileResult<i32> {
    let mut value = self.not_factor()?;
    loop {
      let op = match self.cur.token() {
        Token::Operator(op) if matches!(op.as_str(), "*" | "/" | "&") => op.clone(),
        _ => return Ok(value),
      };
      self.cur.advance()?;
      let pos = self.cur.position();
      let right = self.not_factor()?;
      value = match op.as_str() {
        "*" => value.wrapping_mul(right),
        "/" => {
          if right == 0 {
            return InvalidUseSnafu {
              message: "division by zero",
              pos,
            }
            .fail();
          }
          value.wrapping_div(right)
        }
        _ => value & right,
      };
    }
  }

  fn not_factor(&mut self) -> CompileResult<i32> {
    if self.cur.is_op("!") {
      self.cur.advance()?;
      return Ok(!self.not_factor()?);
    }
    self.signed_factor()
  }

  fn signed_factor(&mut self) -> CompileResult<i32> {
    if self.cur.is_op("+") {
      self.cur.advance()?;
      return self.factor();
    }
    if !self.cur.is_op("-") {
      return self.factor();
    }
    self.cur.advance()?;
    if matches!(self.cur.token(), Token::Number(_)) {
      return self.number(true);
    }
    Ok(self.factor()?.wrapping_neg())
  }

  fn factor(&mut self) -> CompileResult<i32> {
    match self.cur.token() {
      Token::Operator(op) if op == "(" => {
        self.cur.advance()?;
        let value = self.bool_expr()?;
        self.cur.match_op(")")?;
        Ok(value)
      }
      Token::Number(_) => self.number(false),
      Token::Ident(_) => {
        let pos = self.cur.position();
        let name = self.cur.get_name()?;
        match self.vars.get(&name) {
          Some(&value) => Ok(value),
          None => UndefinedIdentifierSnafu { name, pos }.fail(),
        }
      }
      _ => self.cur.expected("expression"),
    }
  }

  fn number(&mut self, negative: bool) -> CompileResult<i32> {
    let value = self.cur.get_number(negative)?;
    // get_number only hands out values that fit a Long.
    Ok(value as i32)
  }
}

#[cfg(test)]
mod tests {
  use rstest::rstest;

  use super::*;
  use crate::error::CompileError;

  fn run(src: &str, input: &[i32]) -> CompileResult<Vec<i32>> {
    Interpreter::new(src.chars(), input.iter().copied())?.run()
  }

  #[rstest]
  #[case("WRITE(1 + 2 * 3)", 7)]
  #[case("WRITE((1 + 2) * 3)", 9)]
  #[case("WRITE(7 / 2 - -1)", 4)]
  #[case("WRITE(-7 / 2)", -3)]
  #[case("WRITE(1 < 2)", -1)]
  #[case("WRITE(2 <> 2)", 0)]
  #[case("WRITE((1 < 2) & (3 < 2))", 0)]
  #[case("WRITE(6 | 1 ~ 2)", 5)]
  #[case("WRITE(!0)", -1)]
  #[case("WRITE(2147483647 + 1)", i32::MIN)]
  fn evaluates_expressions(#[case] src: &str, #[case] expected: i32) {
    assert_eq!(run(src, &[]).unwrap(), [expected]);
  }

  #[test]
  fn variables_and_io() {
    let src = "READ(cat, dog)\npets = cat + dog;\nWRITE(cat, dog, pets).";
    assert_eq!(run(src, &[1, 2]).unwrap(), [1, 2, 3]);
  }

  #[test]
  fn program_stops_at_period() {
    assert_eq!(run("WRITE(1). WRITE(2)", &[]).unwrap(), [1]);
  }

  #[test]
  fn runtime_errors() {
    assert!(matches!(
      run("WRITE(x)", &[]),
      Err(CompileError::UndefinedIdentifier { .. })
    ));
    assert!(matches!(
      run("WRITE(1 / 0)", &[]),
      Err(CompileError::InvalidUse { .. })
    ));
    assert!(matches!(
      run("READ(a)", &[]),
      Err(CompileError::InvalidUse { .. })
    ));
    assert!(matches!(
      run("IF 1", &[]),
      Err(CompileError::Expected { .. })
    ));
  }
}
