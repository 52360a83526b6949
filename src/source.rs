//! Character input contract.
//!
//! The scanner pulls one character at a time and never looks back, so any
//! character iterator can feed it. `None` means end of input.

pub trait CharSource {
  fn next_char(&mut self) -> Option<char>;
}

impl<I> CharSource for I
where
  I: Iterator<Item = char>,
{
  fn next_char(&mut self) -> Option<char> {
    self.next()
  }
}
