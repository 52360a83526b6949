//! Code generation: 68000 assembly, emitted as the parser recognises each
//! production.
//!
//! The emitter uses a single-accumulator stack machine. `D0` is the primary
//! register and holds the value of whatever was parsed last; a binary operator
//! pushes the left operand with `-(SP)`, lets the right operand land in `D0`,
//! pops the left operand into `D7` and combines the two. Values are only ever
//! read at their own size, so the upper bits of a register holding a Byte or
//! Word are don't-care until a conversion extends them.
//!
//! Globals are addressed PC-relative, parameters and locals relative to the
//! frame pointer `A6`.

use std::fmt;

use tracing::trace;

use crate::output::Emitter;
use crate::ty::Ty;

/// Data registers used by the expression machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
  /// Primary register.
  D0,
  /// Secondary register, receives popped operands.
  D7,
}

impl fmt::Display for Reg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Reg::D0 => "D0",
      Reg::D7 => "D7",
    })
  }
}

/// Relational operators, in source order of recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl Relation {
  pub fn from_op(op: &str) -> Option<Self> {
    match op {
      "=" => Some(Self::Eq),
      "#" | "<>" => Some(Self::Ne),
      "<" => Some(Self::Lt),
      "<=" => Some(Self::Le),
      ">" => Some(Self::Gt),
      ">=" => Some(Self::Ge),
      _ => None,
    }
  }

  /// `Scc` mnemonic after `CMP D7,D0`. The compare computes `D0 - D7`, i.e.
  /// right minus left, so the ordering conditions are mirrored.
  fn set_mnemonic(self) -> &'static str {
    match self {
      Self::Eq => "SEQ",
      Self::Ne => "SNE",
      Self::Lt => "SGT",
      Self::Le => "SGE",
      Self::Gt => "SLT",
      Self::Ge => "SLE",
    }
  }
}

/// Branch label allocator. Labels are never reused within a run.
#[derive(Debug)]
pub struct Labels {
  prefix: String,
  next: usize,
}

impl Labels {
  pub fn new(prefix: impl Into<String>) -> Self {
    Self {
      prefix: prefix.into(),
      next: 0,
    }
  }

  pub fn next_label(&mut self) -> String {
    let label = format!("{}{}", self.prefix, self.next);
    self.next += 1;
    trace!(%label, "new label");
    label
  }

  /// Whether `name` has the shape of a label this allocator hands out.
  pub fn claims(&self, name: &str) -> bool {
    name
      .strip_prefix(self.prefix.as_str())
      .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
  }
}

/// Symbols defined or referenced by the program frame and runtime.
const RUNTIME_SYMBOLS: [&str; 6] = ["MAIN", "WARMST", "READ", "WRITE", "MUL32", "DIV32"];

pub struct CodeGen<E> {
  out: E,
  labels: Labels,
}

impl<E: Emitter> CodeGen<E> {
  pub fn new(out: E, label_prefix: &str) -> Self {
    Self {
      out,
      labels: Labels::new(label_prefix),
    }
  }

  pub fn into_output(self) -> E {
    self.out
  }

  pub fn new_label(&mut self) -> String {
    self.labels.next_label()
  }

  /// Whether a user symbol named `name` would clash with a generated label
  /// or a runtime symbol once emitted.
  pub fn is_reserved(&self, name: &str) -> bool {
    RUNTIME_SYMBOLS.contains(&name) || self.labels.claims(name)
  }

  /// Emit one instruction, tab-indented.
  fn emit_ln(&mut self, instr: &str) {
    self.out.emit("\t");
    self.out.emit_line(instr);
  }

  pub fn post_label(&mut self, label: &str) {
    self.out.emit_line(&format!("{label}:"));
  }

  /// Assembler comment line.
  pub fn comment(&mut self, text: &str) {
    self.out.emit_line(&format!("* {text}"));
  }

  pub fn header(&mut self) {
    self.out.emit_line("WARMST\tEQU $A01E");
  }

  pub fn prolog(&mut self) {
    self.post_label("MAIN");
  }

  pub fn epilog(&mut self) {
    self.emit_ln("DC WARMST");
    self.emit_ln("END MAIN");
  }

  /// Static storage for a global, with its initial value.
  pub fn allocate(&mut self, name: &str, ty: Ty, value: i64) {
    self.out.emit(&format!("{name}:\t"));
    self.out.emit_line(&format!("DC.{} {value}", ty.suffix()));
  }

  // Primary register

  pub fn negate(&mut self, ty: Ty) {
    self.emit_ln(&format!("NEG.{} D0", ty.suffix()));
  }

  pub fn not(&mut self, ty: Ty) {
    self.emit_ln(&format!("NOT.{} D0", ty.suffix()));
  }

  pub fn load_const(&mut self, value: i64, ty: Ty) {
    self.emit_ln(&format!("MOVE.{} #{value},D0", ty.suffix()));
  }

  pub fn load_var(&mut self, name: &str, ty: Ty) {
    self.emit_ln(&format!("MOVE.{} {name}(PC),D0", ty.suffix()));
  }

  pub fn store_var(&mut self, name: &str, ty: Ty) {
    self.emit_ln(&format!("LEA {name}(PC),A0"));
    self.emit_ln(&format!("MOVE.{} D0,(A0)", ty.suffix()));
  }

  pub fn load_param(&mut self, offset: i32) {
    self.emit_ln(&format!("MOVE.W {offset}(A6),D0"));
  }

  pub fn store_param(&mut self, offset: i32) {
    self.emit_ln(&format!("MOVE.W D0,{offset}(A6)"));
  }

  pub fn push(&mut self, ty: Ty) {
    self.emit_ln(&format!("MOVE.{} D0,-(SP)", ty.suffix()));
  }

  /// Pop the top of stack into the secondary register.
  pub fn pop(&mut self, ty: Ty) {
    self.emit_ln(&format!("MOVE.{} (SP)+,D7", ty.suffix()));
  }

  // Conversions

  /// Convert a register from one type to another. Widening sign-extends,
  /// narrowing simply uses the low part.
  pub fn convert(&mut self, from: Ty, to: Ty, reg: Reg) {
    if from >= to {
      return;
    }
    if from == Ty::Byte {
      self.emit_ln(&format!("EXT.W {reg}"));
    }
    if to == Ty::Long {
      self.emit_ln(&format!("EXT.L {reg}"));
    }
  }

  /// Widen `reg` from `ty` to `other` if `other` is wider.
  pub fn promote(&mut self, ty: Ty, other: Ty, reg: Reg) -> Ty {
    if ty < other {
      self.convert(ty, other, reg);
      other
    } else {
      ty
    }
  }

  /// Bring the popped left operand (`D7`) and the right operand (`D0`) to a
  /// common type.
  pub fn same_type(&mut self, left: Ty, right: Ty) -> Ty {
    let left = self.promote(left, right, Reg::D7);
    self.promote(right, left, Reg::D0)
  }

  // Binary operators: left operand on the stack, right operand in D0.

  pub fn pop_add(&mut self, left: Ty, right: Ty) -> Ty {
    self.pop_combine("ADD", left, right)
  }

  pub fn pop_sub(&mut self, left: Ty, right: Ty) -> Ty {
    let ty = self.pop_combine("SUB", left, right);
    self.negate(ty);
    ty
  }

  pub fn pop_and(&mut self, left: Ty, right: Ty) -> Ty {
    self.pop_combine("AND", left, right)
  }

  pub fn pop_or(&mut self, left: Ty, right: Ty) -> Ty {
    self.pop_combine("OR", left, right)
  }

  pub fn pop_xor(&mut self, left: Ty, right: Ty) -> Ty {
    self.pop_combine("EOR", left, right)
  }

  fn pop_combine(&mut self, mnemonic: &str, left: Ty, right: Ty) -> Ty {
    self.pop(left);
    let ty = self.same_type(left, right);
    self.emit_ln(&format!("{mnemonic}.{} D7,D0", ty.suffix()));
    ty
  }

  /// `MULS` only takes Word operands, so Byte and Word products go through
  /// it and Long products call the runtime helper.
  pub fn pop_mul(&mut self, left: Ty, right: Ty) -> Ty {
    self.pop(left);
    let ty = self.same_type(left, right);
    self.convert(ty, Ty::Word, Reg::D7);
    self.convert(ty, Ty::Word, Reg::D0);
    if ty == Ty::Long {
      self.emit_ln("JSR MUL32");
    } else {
      self.emit_ln("MULS D7,D0");
    }
    Ty::product(left, right)
  }

  /// The dividend is always widened to Long for `DIVS`. A Long on either
  /// side sends the division to the runtime helper.
  pub fn pop_div(&mut self, left: Ty, right: Ty) -> Ty {
    self.pop(left);
    self.convert(left, Ty::Long, Reg::D7);
    let ty = Ty::quotient(left, right);
    if ty == Ty::Long {
      self.convert(right, Ty::Long, Reg::D0);
      self.emit_ln("JSR DIV32");
    } else {
      self.convert(right, Ty::Word, Reg::D0);
      self.emit_ln("DIVS D0,D7");
      self.emit_ln("MOVE.W D7,D0");
    }
    ty
  }

  /// Compare and leave -1 (true) or 0 (false) in `D0` as a Word.
  pub fn pop_compare(&mut self, left: Ty, right: Ty, rel: Relation) -> Ty {
    self.pop(left);
    let ty = self.same_type(left, right);
    self.emit_ln(&format!("CMP.{} D7,D0", ty.suffix()));
    self.emit_ln(&format!("{} D0", rel.set_mnemonic()));
    self.emit_ln("EXT.W D0");
    Ty::Word
  }

  // Branches

  pub fn branch(&mut self, label: &str) {
    self.emit_ln(&format!("BRA {label}"));
  }

  /// Branch when the primary register is zero (false).
  pub fn branch_false(&mut self, label: &str, ty: Ty) {
    self.emit_ln(&format!("TST.{} D0", ty.suffix()));
    self.emit_ln(&format!("BEQ {label}"));
  }

  // Counted loops

  pub fn decrement(&mut self, ty: Ty) {
    self.emit_ln(&format!("SUBQ.{} #1,D0", ty.suffix()));
  }

  pub fn increment(&mut self, ty: Ty) {
    self.emit_ln(&format!("ADDQ.{} #1,D0", ty.suffix()));
  }

  /// Branch out of a FOR loop once the counter passes the limit on the stack.
  pub fn branch_above_limit(&mut self, label: &str, ty: Ty) {
    self.emit_ln(&format!("CMP.{} (SP),D0", ty.suffix()));
    self.emit_ln(&format!("BGT {label}"));
  }

  pub fn pop_counter(&mut self) {
    self.emit_ln("MOVE.W (SP)+,D0");
  }

  pub fn decrement_and_branch(&mut self, label: &str) {
    self.emit_ln(&format!("DBRA D0,{label}"));
  }

  /// Give back `bytes` of stack space.
  pub fn release_stack(&mut self, bytes: i32) {
    if bytes > 0 {
      self.emit_ln(&format!("ADDQ #{bytes},SP"));
    }
  }

  /// Take `bytes` of stack space without storing into it.
  pub fn reserve_stack(&mut self, bytes: i32) {
    if bytes > 0 {
      self.emit_ln(&format!("SUBQ #{bytes},SP"));
    }
  }

  // Procedures

  pub fn call(&mut self, name: &str) {
    self.emit_ln(&format!("BSR {name}"));
  }

  /// Remove `bytes` of pushed arguments after a call.
  pub fn clean_stack(&mut self, bytes: i32) {
    if bytes > 0 {
      self.emit_ln(&format!("ADD #{bytes},SP"));
    }
  }

  pub fn proc_prolog(&mut self, name: &str, locals: usize) {
    self.post_label(name);
    self.emit_ln(&format!("LINK A6,#{}", -2 * locals as i32));
  }

  pub fn proc_epilog(&mut self) {
    self.emit_ln("UNLK A6");
    self.emit_ln("RTS");
  }

  // Runtime I/O: READ leaves a Long in D0, WRITE prints D0 as a Long.

  pub fn read_it(&mut self) {
    self.call("READ");
  }

  pub fn write_it(&mut self) {
    self.call("WRITE");
  }
}
