//! Native library loader
//!
//! A [`Binding`] opens the expat shared library the first time any entry point
//! is used and resolves every registry entry by name. The outcome, a fully
//! populated [`SymbolTable`] or the reason loading failed, is published through
//! a [`OnceLock`], so:
//!
//! - concurrent first callers block on a single open attempt,
//! - nobody ever observes a half-resolved table,
//! - after initialization every lookup is a plain atomic load.
//!
//! The outcome is final. A missing library or a missing symbol stays missing
//! for the lifetime of the binding, and the process-wide binding returned by
//! [`global`] is never dropped, so its library handle lives until exit.

use std::ffi::c_void;
use std::fmt;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::OnceLock;

use log::{debug, warn};

use crate::config::ShimConfig;
use crate::error::{BindingError, BindingResult, LoadError};
use crate::registry::{SYMBOLS, SymbolTable, descriptor};

/// A loaded shared object that can be queried for symbols
pub trait NativeLibrary: Send + Sync {
    /// Address of the exported symbol `name`, if present.
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>>;
}

/// Strategy for opening the native library
pub trait LibraryOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn NativeLibrary>, LoadError>;
}

/// Production opener backed by the platform dynamic loader
///
/// On Unix this is `dlopen(path, RTLD_LAZY | RTLD_LOCAL)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicLibraryOpener;

struct DynamicLibrary {
    library: libloading::Library,
}

impl NativeLibrary for DynamicLibrary {
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        // Safety: the symbol is only read as an address here; the registry
        // decides the type it is later called through.
        let symbol = unsafe { self.library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        NonNull::new(*symbol)
    }
}

impl LibraryOpener for DynamicLibraryOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn NativeLibrary>, LoadError> {
        // Safety: loading runs the library's initializers. libexpat has none
        // with observable side effects.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
            LoadError::LibraryUnavailable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        Ok(Box::new(DynamicLibrary { library }))
    }
}

/// Observable state of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// No entry point has been used yet
    Unloaded,
    /// The library opened; individual symbols may still be missing
    Loaded,
    /// The library could not be opened, or loading is disabled
    Unavailable,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadState::Unloaded => "unloaded",
            LoadState::Loaded => "loaded",
            LoadState::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Callback invoked once when the library cannot be loaded
pub type FailureHook = Box<dyn Fn(&LoadError) + Send + Sync>;

enum Resolution {
    // `symbols` must be dropped before `_library`
    Loaded {
        symbols: SymbolTable,
        _library: Box<dyn NativeLibrary>,
    },
    Unavailable(LoadError),
}

/// Lazily-loaded binding to one copy of the native library
pub struct Binding {
    config: ShimConfig,
    opener: Box<dyn LibraryOpener>,
    failure_hook: Option<FailureHook>,
    resolution: OnceLock<Resolution>,
}

impl Binding {
    /// Binding that loads `config.library_path` with the platform loader
    pub fn new(config: ShimConfig) -> Self {
        Self::with_opener(config, DynamicLibraryOpener)
    }

    /// Binding with a custom opener, typically a test double
    pub fn with_opener(config: ShimConfig, opener: impl LibraryOpener + 'static) -> Self {
        Self {
            config,
            opener: Box::new(opener),
            failure_hook: None,
            resolution: OnceLock::new(),
        }
    }

    /// Install a hook that observes the load failure, if one happens
    pub fn with_failure_hook(mut self, hook: impl Fn(&LoadError) + Send + Sync + 'static) -> Self {
        self.failure_hook = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &ShimConfig {
        &self.config
    }

    pub fn library_path(&self) -> &Path {
        &self.config.library_path
    }

    /// Current state; never triggers loading
    pub fn state(&self) -> LoadState {
        match self.resolution.get() {
            None => LoadState::Unloaded,
            Some(Resolution::Loaded { .. }) => LoadState::Loaded,
            Some(Resolution::Unavailable(_)) => LoadState::Unavailable,
        }
    }

    /// Load the library if nobody has tried yet, and report the outcome
    pub fn ensure_loaded(&self) -> LoadState {
        self.resolve();
        self.state()
    }

    /// The resolved symbol table, loading on first use
    ///
    /// `None` when the library is unavailable.
    pub fn symbols(&self) -> Option<&SymbolTable> {
        match self.resolve() {
            Resolution::Loaded { symbols, .. } => Some(symbols),
            Resolution::Unavailable(_) => None,
        }
    }

    /// Why loading failed; `None` while unloaded or once loaded
    pub fn load_error(&self) -> Option<&LoadError> {
        match self.resolution.get() {
            Some(Resolution::Unavailable(err)) => Some(err),
            _ => None,
        }
    }

    /// Whether `name` resolved, loading on first use
    pub fn is_resolved(&self, name: &str) -> bool {
        self.symbols()
            .and_then(|symbols| symbols.is_resolved(name))
            .unwrap_or(false)
    }

    /// Names that resolved, in registry order; empty when unavailable
    pub fn resolved_symbols(&self) -> Vec<&'static str> {
        self.symbols()
            .map(SymbolTable::resolved_names)
            .unwrap_or_default()
    }

    /// Check that `name` can be forwarded, explaining why not otherwise
    pub fn require(&self, name: &str) -> BindingResult<()> {
        if descriptor(name).is_none() {
            return Err(BindingError::UnknownSymbol {
                name: name.to_string(),
            });
        }

        match self.resolve() {
            Resolution::Unavailable(err) => Err(err.clone().into()),
            Resolution::Loaded { symbols, .. } => {
                if symbols.is_resolved(name) == Some(true) {
                    Ok(())
                } else {
                    Err(BindingError::SymbolUnresolved {
                        name: name.to_string(),
                    })
                }
            }
        }
    }

    fn resolve(&self) -> &Resolution {
        let mut initialized_here = false;
        let resolution = self.resolution.get_or_init(|| {
            initialized_here = true;
            self.load()
        });

        // The hook runs after publication so it may call back into this binding
        if initialized_here {
            if let (Resolution::Unavailable(err), Some(hook)) = (resolution, &self.failure_hook) {
                hook(err);
            }
        }
        resolution
    }

    fn load(&self) -> Resolution {
        let path = self.library_path();

        let opened = if self.config.disabled {
            Err(LoadError::Disabled {
                path: path.to_path_buf(),
            })
        } else {
            self.opener.open(path)
        };

        match opened {
            Ok(library) => {
                let symbols = SymbolTable::resolve(library.as_ref());
                for d in SYMBOLS {
                    if symbols.is_resolved(d.name) != Some(true) {
                        debug!("{} does not export {}", path.display(), d.name);
                    }
                }
                debug!(
                    "loaded {} ({}/{} symbols resolved)",
                    path.display(),
                    symbols.resolved_count(),
                    SYMBOLS.len()
                );
                Resolution::Loaded {
                    symbols,
                    _library: library,
                }
            }
            Err(err) => {
                warn!("{}", err);
                Resolution::Unavailable(err)
            }
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("library_path", &self.config.library_path)
            .field("state", &self.state())
            .finish()
    }
}

static GLOBAL_CONFIG: OnceLock<ShimConfig> = OnceLock::new();
static GLOBAL_FAILURE_HOOK: OnceLock<FailureHook> = OnceLock::new();
static GLOBAL: OnceLock<Binding> = OnceLock::new();

fn create_global() -> Binding {
    let config = GLOBAL_CONFIG.get_or_init(|| {
        ShimConfig::load().unwrap_or_else(|e| {
            warn!("falling back to default expat-shim configuration: {}", e);
            ShimConfig::default()
        })
    });

    // Claiming the slot here makes a later set_load_failure_hook fail
    let hook = GLOBAL_FAILURE_HOOK.get_or_init(|| Box::new(|_: &LoadError| {}));
    Binding::new(config.clone()).with_failure_hook(hook)
}

/// The process-wide binding used by the exported C entry points
pub fn global() -> &'static Binding {
    GLOBAL.get_or_init(create_global)
}

/// Set the configuration of the process-wide binding
///
/// Must run before any entry point is used. Once the configuration is fixed,
/// explicitly or by first use, this fails with `AlreadyInitialized`.
pub fn configure(config: ShimConfig) -> BindingResult<()> {
    GLOBAL_CONFIG
        .set(config)
        .map_err(|_| BindingError::AlreadyInitialized {
            details: "global binding configuration is already fixed".to_string(),
        })
}

/// Install the load-failure hook of the process-wide binding
///
/// Must run before the global binding is first touched. `Ok` means the hook
/// is installed; once the binding exists, or another hook was set, this fails
/// with `AlreadyInitialized`.
pub fn set_load_failure_hook(
    hook: impl Fn(&LoadError) + Send + Sync + 'static,
) -> BindingResult<()> {
    GLOBAL_FAILURE_HOOK
        .set(Box::new(hook))
        .map_err(|_| BindingError::AlreadyInitialized {
            details: "load failure hook already installed or global binding already created"
                .to_string(),
        })
}
