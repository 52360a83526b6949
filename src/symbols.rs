//! Symbol table: globals for the whole run plus one parameter scope for the
//! procedure currently being compiled.
//!
//! Names are case-insensitive and stored upper-cased. Inside a procedure the
//! parameter scope is consulted first, so a formal may reuse the name of a
//! global; two formals (or a formal and a local) may not share a name.

use std::collections::HashMap;

use snafu::Snafu;

use crate::error::{CompileError, Position};
use crate::ty::Ty;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
  Variable,
  Procedure,
  Parameter,
}

impl SymbolKind {
  pub fn as_str(self) -> &'static str {
    match self {
      SymbolKind::Variable => "variable",
      SymbolKind::Procedure => "procedure",
      SymbolKind::Parameter => "parameter",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
  pub kind: SymbolKind,
  /// Data type; procedures have none.
  pub ty: Option<Ty>,
  /// Frame offset from `A6`, parameters and locals only.
  pub offset: Option<i32>,
  /// Number of formal parameters, procedures only.
  pub arity: usize,
}

impl Entry {
  fn global(kind: SymbolKind, ty: Option<Ty>) -> Self {
    Self {
      kind,
      ty,
      offset: None,
      arity: 0,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum SymbolError {
  #[snafu(display("duplicate identifier {name}"))]
  DuplicateIdentifier { name: String },

  #[snafu(display("duplicate parameter {name}"))]
  DuplicateParameter { name: String },

  #[snafu(display("undefined identifier {name}"))]
  UndefinedIdentifier { name: String },
}

impl SymbolError {
  /// Attach a source position, mapping onto the compiler's error taxonomy.
  pub fn at(self, pos: Position) -> CompileError {
    match self {
      SymbolError::DuplicateIdentifier { name } | SymbolError::DuplicateParameter { name } => {
        CompileError::DuplicateIdentifier { name, pos }
      }
      SymbolError::UndefinedIdentifier { name } => CompileError::UndefinedIdentifier { name, pos },
    }
  }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
  /// 1-based position in the formal list.
  Formal(usize),
  /// 1-based position among the locals.
  Local(usize),
}

/// Formals and locals of one procedure. They share one offset space: formals
/// sit above the saved frame pointer and return address, locals below `A6`.
#[derive(Debug, Default)]
struct ParamScope {
  slots: HashMap<String, Slot>,
  formals: usize,
  locals: usize,
}

impl ParamScope {
  fn offset(&self, slot: Slot) -> i32 {
    match slot {
      Slot::Formal(n) => 8 + 2 * (self.formals as i32 - n as i32),
      Slot::Local(i) => -2 * i as i32,
    }
  }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
  globals: Vec<(String, Entry)>,
  index: HashMap<String, usize>,
  params: Option<ParamScope>,
}

fn canonical(name: &str) -> String {
  name.to_uppercase()
}

impl SymbolTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a global. Fails if the name is already declared globally.
  pub fn declare(
    &mut self,
    name: &str,
    kind: SymbolKind,
    ty: Option<Ty>,
  ) -> Result<(), SymbolError> {
    let name = canonical(name);
    if self.index.contains_key(&name) {
      return DuplicateIdentifierSnafu { name }.fail();
    }
    self.index.insert(name.clone(), self.globals.len());
    self.globals.push((name, Entry::global(kind, ty)));
    Ok(())
  }

  /// Record how many formals a declared procedure takes.
  pub fn set_arity(&mut self, name: &str, arity: usize) -> Result<(), SymbolError> {
    let name = canonical(name);
    match self.index.get(&name) {
      Some(&i) => {
        self.globals[i].1.arity = arity;
        Ok(())
      }
      None => UndefinedIdentifierSnafu { name }.fail(),
    }
  }

  pub fn lookup(&self, name: &str) -> Option<Entry> {
    let name = canonical(name);
    if let Some(scope) = &self.params
      && let Some(&slot) = scope.slots.get(&name)
    {
      return Some(Entry {
        kind: SymbolKind::Parameter,
        ty: Some(Ty::Word),
        offset: Some(scope.offset(slot)),
        arity: 0,
      });
    }
    self.index.get(&name).map(|&i| self.globals[i].1)
  }

  pub fn resolve(&self, name: &str) -> Result<Entry, SymbolError> {
    match self.lookup(name) {
      Some(entry) => Ok(entry),
      None => UndefinedIdentifierSnafu {
        name: canonical(name),
      }
      .fail(),
    }
  }

  pub fn type_of(&self, name: &str) -> Option<Ty> {
    self.lookup(name).and_then(|entry| entry.ty)
  }

  pub fn is_variable(&self, name: &str) -> bool {
    self.kind_of(name) == Some(SymbolKind::Variable)
  }

  pub fn is_procedure(&self, name: &str) -> bool {
    self.kind_of(name) == Some(SymbolKind::Procedure)
  }

  pub fn is_parameter(&self, name: &str) -> bool {
    self.kind_of(name) == Some(SymbolKind::Parameter)
  }

  fn kind_of(&self, name: &str) -> Option<SymbolKind> {
    self.lookup(name).map(|entry| entry.kind)
  }

  /// Open a fresh parameter scope for a procedure body.
  pub fn enter_procedure(&mut self) {
    self.params = Some(ParamScope::default());
  }

  pub fn in_procedure(&self) -> bool {
    self.params.is_some()
  }

  /// Add the next formal parameter, returning its 1-based number.
  pub fn add_parameter(&mut self, name: &str) -> Result<usize, SymbolError> {
    let scope = self.params.get_or_insert_with(ParamScope::default);
    let name = canonical(name);
    if scope.slots.contains_key(&name) {
      return DuplicateParameterSnafu { name }.fail();
    }
    scope.formals += 1;
    scope.slots.insert(name, Slot::Formal(scope.formals));
    Ok(scope.formals)
  }

  /// Add the next local, returning its 1-based number. Locals follow the
  /// formals in the same scope.
  pub fn add_local(&mut self, name: &str) -> Result<usize, SymbolError> {
    let scope = self.params.get_or_insert_with(ParamScope::default);
    let name = canonical(name);
    if scope.slots.contains_key(&name) {
      return DuplicateParameterSnafu { name }.fail();
    }
    scope.locals += 1;
    scope.slots.insert(name, Slot::Local(scope.locals));
    Ok(scope.locals)
  }

  pub fn parameter_count(&self) -> usize {
    self.params.as_ref().map_or(0, |scope| scope.formals)
  }

  pub fn local_count(&self) -> usize {
    self.params.as_ref().map_or(0, |scope| scope.locals)
  }

  /// Drop the parameter scope once a procedure is complete, so its offsets
  /// do not leak into the next frame.
  pub fn clear_parameters(&mut self) {
    self.params = None;
  }

  /// Globals in declaration order.
  pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
    self
      .globals
      .iter()
      .map(|(name, entry)| (name.as_str(), entry))
  }
}
