//! Operand sizes and the promotion rules between them.

use std::fmt;

/// The three data sizes, ordered narrowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Ty {
  Byte,
  Word,
  Long,
}

impl Ty {
  pub fn size(self) -> i32 {
    match self {
      Ty::Byte => 1,
      Ty::Word => 2,
      Ty::Long => 4,
    }
  }

  /// Bytes the value occupies when pushed with `-(SP)`. The stack pointer
  /// stays word aligned, so bytes take a full word.
  pub fn stack_slot(self) -> i32 {
    self.size().max(2)
  }

  /// Assembler size suffix letter.
  pub fn suffix(self) -> char {
    match self {
      Ty::Byte => 'B',
      Ty::Word => 'W',
      Ty::Long => 'L',
    }
  }

  /// Parse a one-letter declaration tag (`B`, `W` or `L`, any case).
  pub fn from_tag(tag: &str) -> Option<Ty> {
    match tag.to_ascii_uppercase().as_str() {
      "B" => Some(Ty::Byte),
      "W" => Some(Ty::Word),
      "L" => Some(Ty::Long),
      _ => None,
    }
  }

  /// Narrowest type whose range covers the magnitude of a constant.
  pub fn for_constant(value: i64) -> Ty {
    match value.unsigned_abs() {
      0..=127 => Ty::Byte,
      128..=32767 => Ty::Word,
      _ => Ty::Long,
    }
  }

  /// Whether `value` is representable as a signed integer of this size.
  pub fn holds(self, value: i64) -> bool {
    match self {
      Ty::Byte => i8::try_from(value).is_ok(),
      Ty::Word => i16::try_from(value).is_ok(),
      Ty::Long => i32::try_from(value).is_ok(),
    }
  }

  /// One size class wider, saturating at Long.
  pub fn widened(self) -> Ty {
    match self {
      Ty::Byte => Ty::Word,
      Ty::Word | Ty::Long => Ty::Long,
    }
  }

  /// Common type two operands are promoted to before they are combined.
  pub fn common(lhs: Ty, rhs: Ty) -> Ty {
    lhs.max(rhs)
  }

  /// Product type: one class wider than the common operand type.
  pub fn product(lhs: Ty, rhs: Ty) -> Ty {
    Ty::common(lhs, rhs).widened()
  }

  /// Quotient type: the dividend's type unless either side is Long.
  pub fn quotient(dividend: Ty, divisor: Ty) -> Ty {
    if dividend == Ty::Long || divisor == Ty::Long {
      Ty::Long
    } else {
      dividend
    }
  }
}

impl fmt::Display for Ty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Ty::Byte => "byte",
      Ty::Word => "word",
      Ty::Long => "long",
    })
  }
}
