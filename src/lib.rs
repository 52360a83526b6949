//! Crate root: wires together the compilation pipeline.
//!
//! Translation is single pass. The parser pulls tokens from the scanner one at
//! a time and drives the code generator directly, so assembly is produced in
//! step with recognition and no tree is ever built:
//! - `tokenizer` performs lexical analysis over any character source.
//! - `parser` owns all syntactic knowledge and the symbol table.
//! - `codegen` emits 68000 assembly into any output sink.
//! - `interp` evaluates the expression language directly instead.
//! - `error` centralises reporting utilities shared by the other modules.

pub mod config;
pub mod error;
pub mod interp;
pub mod output;
pub mod parser;
pub mod source;
pub mod symbols;
pub mod tokenizer;
pub mod ty;

mod codegen;

pub use config::Options;
pub use error::{CompileError, CompileResult};
pub use interp::Interpreter;
pub use parser::Parser;

/// Compile a program into 68000 assembly with the default options.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  generate_assembly_with(source, &Options::default())
}

pub fn generate_assembly_with(source: &str, options: &Options) -> CompileResult<String> {
  Parser::new(source.chars(), String::new(), options)?.compile()
}

/// Run a program through the interpreter, feeding READ from `input`.
pub fn interpret(source: &str, input: &[i32]) -> CompileResult<Vec<i32>> {
  Interpreter::new(source.chars(), input.iter().copied())?.run()
}
