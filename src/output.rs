//! Output sink contract.
//!
//! Generated code is written strictly append-only, one instruction or label
//! per line. `emit` writes without a line terminator so a line can be built
//! from pieces; `emit_line` finishes it.

pub trait Emitter {
  fn emit(&mut self, text: &str);
  fn emit_line(&mut self, text: &str);
}

impl Emitter for String {
  fn emit(&mut self, text: &str) {
    self.push_str(text);
  }

  fn emit_line(&mut self, text: &str) {
    self.push_str(text);
    self.push('\n');
  }
}

impl<E: Emitter + ?Sized> Emitter for &mut E {
  fn emit(&mut self, text: &str) {
    (**self).emit(text);
  }

  fn emit_line(&mut self, text: &str) {
    (**self).emit_line(text);
  }
}
