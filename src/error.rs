use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Crate-level error type for the parts of the API that report failures
///
/// The dispatch shims never produce one of these: they absorb every failure
/// into their sentinel return value. These errors come from configuration,
/// introspection and the safe [`Parser`](crate::Parser) wrapper.
#[derive(Error, Debug)]
pub enum ShimError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("Library load error: {0}")]
    Load(#[from] LoadError),
}

/// Why the loader ended up `Unavailable`
///
/// Recorded once in the binding and handed to the failure hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Native library unavailable: {path} - {reason}")]
    LibraryUnavailable { path: PathBuf, reason: String },

    #[error("Native library loading disabled by configuration: {path}")]
    Disabled { path: PathBuf },
}

/// Errors reported by the introspection and wrapper API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("Native library unavailable: {path} - {reason}")]
    LibraryUnavailable { path: PathBuf, reason: String },

    #[error("Symbol not exported by the loaded library: {name}")]
    SymbolUnresolved { name: String },

    #[error("Not a registered entry point: {name}")]
    UnknownSymbol { name: String },

    #[error("Parser creation failed: null parser returned")]
    ParserCreationFailed,

    #[error("Parser reset refused by the library")]
    ResetRefused,

    #[error("String contains an interior NUL byte: {value:?}")]
    InvalidString { value: String },

    #[error("Binding already initialized: {details}")]
    AlreadyInitialized { details: String },
}

impl From<LoadError> for BindingError {
    fn from(err: LoadError) -> Self {
        let path = match &err {
            LoadError::LibraryUnavailable { path, .. } | LoadError::Disabled { path } => {
                path.clone()
            }
        };
        BindingError::LibraryUnavailable {
            path,
            reason: err.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ShimError>;

/// Binding result type alias
pub type BindingResult<T> = std::result::Result<T, BindingError>;
