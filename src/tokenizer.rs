//! Lexical analysis: pulls characters one at a time and hands out tokens on
//! demand.
//!
//! The scanner keeps exactly one character of lookahead. Comments are made
//! transparent at the lowest level: the read primitive recognises the `/*` and
//! `//` digraphs through a private one-character pushback and reports them as
//! sentinel lookahead values, which whitespace skipping then expands into full
//! comment consumption. Everything above `get_char` sees either a real
//! character, a comment sentinel, or end of input.

use std::fmt;

use tracing::trace;

use crate::error::{CompileResult, ExpectedSnafu, Position, ScanSnafu};
use crate::source::CharSource;

/// Reserved words, recognised after a name has been upper-cased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
  If,
  Else,
  EndIf,
  While,
  EndWhile,
  Loop,
  EndLoop,
  Repeat,
  Until,
  For,
  To,
  EndFor,
  Do,
  EndDo,
  Break,
  Return,
  Read,
  Write,
  Var,
  Procedure,
  Program,
  Begin,
  End,
}

const KEYWORDS: [(&str, Keyword); 23] = [
  ("IF", Keyword::If),
  ("ELSE", Keyword::Else),
  ("ENDIF", Keyword::EndIf),
  ("WHILE", Keyword::While),
  ("ENDWHILE", Keyword::EndWhile),
  ("LOOP", Keyword::Loop),
  ("ENDLOOP", Keyword::EndLoop),
  ("REPEAT", Keyword::Repeat),
  ("UNTIL", Keyword::Until),
  ("FOR", Keyword::For),
  ("TO", Keyword::To),
  ("ENDFOR", Keyword::EndFor),
  ("DO", Keyword::Do),
  ("ENDDO", Keyword::EndDo),
  ("BREAK", Keyword::Break),
  ("RETURN", Keyword::Return),
  ("READ", Keyword::Read),
  ("WRITE", Keyword::Write),
  ("VAR", Keyword::Var),
  ("PROCEDURE", Keyword::Procedure),
  ("PROGRAM", Keyword::Program),
  ("BEGIN", Keyword::Begin),
  ("END", Keyword::End),
];

impl Keyword {
  /// Exact match against the keyword list. `name` must already be upper-case.
  pub fn lookup(name: &str) -> Option<Self> {
    KEYWORDS
      .iter()
      .find(|(text, _)| *text == name)
      .map(|(_, kw)| *kw)
  }

  pub fn as_str(self) -> &'static str {
    KEYWORDS
      .iter()
      .find(|(_, kw)| *kw == self)
      .map(|(text, _)| *text)
      .unwrap_or("?")
  }

  /// Keywords that close a block. Seeing one of these where a statement is
  /// expected hands control back to the enclosing construct.
  pub fn is_block_terminator(self) -> bool {
    matches!(
      self,
      Self::Else
        | Self::EndIf
        | Self::EndWhile
        | Self::EndLoop
        | Self::Until
        | Self::EndFor
        | Self::EndDo
        | Self::End
    )
  }
}

impl fmt::Display for Keyword {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Tokens recognised by the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
  Ident(String),
  /// Literal digits; interpretation is left to the consumer.
  Number(String),
  Operator(String),
  Keyword(Keyword),
  Eof,
}

impl Token {
  pub fn is_op(&self, op: &str) -> bool {
    matches!(self, Self::Operator(text) if text == op)
  }

  pub fn is_keyword(&self, kw: Keyword) -> bool {
    matches!(self, Self::Keyword(k) if *k == kw)
  }
}

/// Human-friendly description used in diagnostics.
impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Ident(name) => write!(f, "identifier {name}"),
      Self::Number(text) => write!(f, "number {text}"),
      Self::Operator(op) => write!(f, "'{op}'"),
      Self::Keyword(kw) => write!(f, "{kw}"),
      Self::Eof => f.write_str("end of input"),
    }
  }
}

const OPERATOR_CHARS: &str = "+-*/<>=#&|~!(),;:.";
const MULTI_CHAR_OPERATORS: [&str; 3] = ["<=", ">=", "<>"];

/// One character of lookahead, with comment openers folded into sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Look {
  Char(char),
  BlockComment,
  LineComment,
  End,
}

pub struct Lexer<S> {
  source: S,
  look: Look,
  /// Character read past a `/` that turned out not to open a comment.
  pushback: Option<Option<char>>,
  line: usize,
  column: usize,
  line_text: String,
  after_cr: bool,
  token_pos: Position,
}

impl<S: CharSource> Lexer<S> {
  /// Build a scanner and prime the lookahead character.
  pub fn new(source: S) -> Self {
    let mut lexer = Self {
      source,
      look: Look::End,
      pushback: None,
      line: 1,
      column: 0,
      line_text: String::new(),
      after_cr: false,
      token_pos: Position::default(),
    };
    lexer.get_char();
    lexer
  }

  /// Position of the first character of the most recent token.
  pub fn token_position(&self) -> Position {
    self.token_pos.clone()
  }

  /// Position of the lookahead character.
  pub fn position(&self) -> Position {
    Position {
      line: self.line,
      column: self.column.max(1),
      line_text: self.line_text.clone(),
    }
  }

  /// Scan the next token, skipping whitespace, line breaks and comments.
  pub fn next(&mut self) -> CompileResult<Token> {
    self.skip_white()?;
    self.token_pos = self.position();

    let token = match self.look {
      Look::End => Token::Eof,
      Look::Char(c) if c.is_alphabetic() => self.get_name(),
      Look::Char(c) if c.is_ascii_digit() => self.get_number(),
      Look::Char(c) if OPERATOR_CHARS.contains(c) => self.get_operator(c),
      Look::Char(c) => {
        return ScanSnafu {
          ch: c,
          pos: self.token_pos.clone(),
        }
        .fail();
      }
      // skip_white never stops on a comment sentinel.
      Look::BlockComment | Look::LineComment => unreachable!("comment left in lookahead"),
    };

    trace!(line = self.token_pos.line, %token, "token");
    Ok(token)
  }

  fn get_name(&mut self) -> Token {
    let mut name = String::new();
    while let Look::Char(c) = self.look
      && c.is_alphanumeric()
    {
      name.extend(c.to_uppercase());
      self.get_char();
    }
    match Keyword::lookup(&name) {
      Some(kw) => Token::Keyword(kw),
      None => Token::Ident(name),
    }
  }

  fn get_number(&mut self) -> Token {
    let mut digits = String::new();
    while let Look::Char(c) = self.look
      && c.is_ascii_digit()
    {
      digits.push(c);
      self.get_char();
    }
    Token::Number(digits)
  }

  fn get_operator(&mut self, first: char) -> Token {
    let mut op = first.to_string();
    self.get_char();
    if let Look::Char(c) = self.look {
      let candidate = format!("{first}{c}");
      if MULTI_CHAR_OPERATORS.contains(&candidate.as_str()) {
        op = candidate;
        self.get_char();
      }
    }
    Token::Operator(op)
  }

  fn skip_white(&mut self) -> CompileResult<()> {
    loop {
      match self.look {
        Look::Char(' ' | '\t' | '\r' | '\n') => self.get_char(),
        Look::BlockComment => self.skip_block_comment()?,
        Look::LineComment => self.skip_line_comment(),
        _ => return Ok(()),
      }
    }
  }

  /// Consume a `/* ... */` comment whose opener is already gone. Openers
  /// inside bump the depth, so only the matching closer ends the comment.
  fn skip_block_comment(&mut self) -> CompileResult<()> {
    let mut depth = 1usize;
    let mut prev = None;
    while depth > 0 {
      let Some(c) = self.read_raw() else {
        return ExpectedSnafu {
          expected: "'*/'",
          found: "end of input",
          pos: self.position(),
        }
        .fail();
      };
      match (prev, c) {
        (Some('/'), '*') => {
          depth += 1;
          prev = None;
        }
        (Some('*'), '/') => {
          depth -= 1;
          prev = None;
        }
        _ => prev = Some(c),
      }
    }
    self.get_char();
    Ok(())
  }

  /// Consume a `//` comment up to, not including, the line terminator.
  fn skip_line_comment(&mut self) {
    loop {
      match self.read_raw() {
        None => {
          self.look = Look::End;
          return;
        }
        Some(c @ ('\n' | '\r')) => {
          self.look = Look::Char(c);
          return;
        }
        Some(_) => {}
      }
    }
  }

  /// The lookahead primitive. A `/` is only delivered as a character when the
  /// following character does not turn it into a comment opener.
  /// The character after the `/` is peeked without line or column
  /// bookkeeping, which happens once it is actually consumed.
  fn get_char(&mut self) {
    self.look = match self.read_raw() {
      Some('/') => match self.source.next_char() {
        Some('*') => {
          self.track('*');
          Look::BlockComment
        }
        Some('/') => {
          self.track('/');
          Look::LineComment
        }
        other => {
          self.pushback = Some(other);
          Look::Char('/')
        }
      },
      Some(c) => Look::Char(c),
      None => Look::End,
    };
  }

  fn read_raw(&mut self) -> Option<char> {
    let c = match self.pushback.take() {
      Some(pending) => pending?,
      None => self.source.next_char()?,
    };
    self.track(c);
    Some(c)
  }

  /// Advance the line and column counters past `c`.
  fn track(&mut self, c: char) {
    match c {
      '\n' => {
        if !self.after_cr {
          self.start_line();
        }
        self.after_cr = false;
      }
      '\r' => {
        self.start_line();
        self.after_cr = true;
      }
      _ => {
        self.column += 1;
        self.line_text.push(c);
        self.after_cr = false;
      }
    }
  }

  fn start_line(&mut self) {
    self.line += 1;
    self.column = 0;
    self.line_text.clear();
  }
}
