//! Run options.
//!
//! `defaults/kissc.default.toml` is embedded into the crate so the documented
//! defaults and the runtime behavior stay in sync. The binary layers a user
//! file and command-line flags on top through [`Loader`].

use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;

const DEFAULT_TOML: &str = include_str!("../defaults/kissc.default.toml");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Options {
  pub codegen: CodegenOptions,
  pub listing: ListingOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CodegenOptions {
  /// Prefix for generated branch labels.
  pub label_prefix: String,
  /// Emit the `WARMST` header and the `DC WARMST` / `END MAIN` trailer.
  pub runtime_header: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListingOptions {
  /// Append the global symbol table as comments after the program.
  pub dump_symbols: bool,
}

/// Same values as the embedded defaults, for library callers that never touch
/// a config file.
impl Default for Options {
  fn default() -> Self {
    Self {
      codegen: CodegenOptions {
        label_prefix: "L".to_string(),
        runtime_header: true,
      },
      listing: ListingOptions {
        dump_symbols: false,
      },
    }
  }
}

/// Layers user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
  builder: ConfigBuilder<DefaultState>,
}

impl Loader {
  pub fn new() -> Self {
    let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
    Self { builder }
  }

  /// Layer a configuration file that must exist.
  pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
    let source = File::from(path.as_ref())
      .format(FileFormat::Toml)
      .required(true);
    self.builder = self.builder.add_source(source);
    self
  }

  pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
  where
    I: Into<ValueKind>,
  {
    self.builder = self.builder.set_override(key, value)?;
    Ok(self)
  }

  pub fn build(self) -> Result<Options, ConfigError> {
    self.builder.build()?.try_deserialize()
  }
}

impl Default for Loader {
  fn default() -> Self {
    Self::new()
  }
}
