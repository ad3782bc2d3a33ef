//! # expat-shim Library
//!
//! Runtime-loaded bindings to the expat XML parser. Nothing links against
//! libexpat at build time: the shared library is opened on first use and each
//! entry point is resolved by name. When the library, or one of its symbols,
//! is missing, the corresponding entry point returns a well-defined failure
//! value (a null parser, `XML_FALSE`, `XML_STATUS_ERROR`, ...) instead of
//! crashing.
//!
//! Built with the default `export-symbols` feature, the crate also exports
//! the expat C entry points themselves, so C code can link against it in
//! place of libexpat.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod loader;
pub mod output;
pub mod parser;
pub mod registry;
pub mod types;

pub use cli::{Cli, OutputFormat};
pub use config::{ConfigError, EnvProvider, ShimConfig, SystemEnvProvider};
pub use error::{BindingError, LoadError, ShimError};
pub use loader::{
    Binding, DynamicLibraryOpener, FailureHook, LibraryOpener, LoadState, NativeLibrary,
    configure, global, set_load_failure_hook,
};
pub use output::{FileOutcome, FileReport, ProbeReport, SymbolReport};
pub use parser::{ParseFailure, ParseStats, Parser, expat_version};
pub use registry::{FunctionDescriptor, SYMBOLS, SymbolTable, descriptor};
