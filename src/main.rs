use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::Parser as ClapParser;
use kissc::config::Loader;
use kissc::{Options, generate_assembly_with, interpret};
use tracing_subscriber::EnvFilter;

/// Compile a KISS program to 68000 assembly.
#[derive(Debug, ClapParser)]
#[command(name = "kissc", version, about)]
struct Cli {
  /// Source file; standard input when omitted.
  file: Option<PathBuf>,

  /// TOML file layered over the built-in defaults.
  #[arg(long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// List the global symbol table after the program.
  #[arg(long)]
  dump_symbols: bool,

  /// Prefix for generated branch labels.
  #[arg(long, value_name = "PREFIX")]
  label_prefix: Option<String>,

  /// Evaluate the program instead of compiling it.
  #[arg(long)]
  interpret: bool,

  /// Comma separated values consumed by READ in interpreter mode.
  #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
  input: Vec<i32>,
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let source = match read_source(cli.file.as_ref()) {
    Ok(source) => source,
    Err(err) => {
      eprintln!("kissc: {err}");
      process::exit(1);
    }
  };

  if cli.interpret {
    match interpret(&source, &cli.input) {
      Ok(values) => {
        for value in values {
          println!("{value}");
        }
      }
      Err(err) => fail(&err),
    }
    return;
  }

  let options = match load_options(&cli) {
    Ok(options) => options,
    Err(err) => {
      eprintln!("kissc: {err}");
      process::exit(1);
    }
  };

  match generate_assembly_with(&source, &options) {
    Ok(asm) => print!("{asm}"),
    Err(err) => fail(&err),
  }
}

fn fail(err: &kissc::CompileError) -> ! {
  eprintln!("{}", err.render());
  process::exit(1);
}

fn read_source(file: Option<&PathBuf>) -> io::Result<String> {
  match file {
    Some(path) => fs::read_to_string(path),
    None => {
      let mut source = String::new();
      io::stdin().read_to_string(&mut source)?;
      Ok(source)
    }
  }
}

fn load_options(cli: &Cli) -> Result<Options, config::ConfigError> {
  let mut loader = Loader::new();
  if let Some(path) = &cli.config {
    loader = loader.with_file(path);
  }
  if cli.dump_symbols {
    loader = loader.set_override("listing.dump_symbols", true)?;
  }
  if let Some(prefix) = &cli.label_prefix {
    loader = loader.set_override("codegen.label_prefix", prefix.as_str())?;
  }
  loader.build()
}
