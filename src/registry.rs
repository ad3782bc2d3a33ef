//! Symbol registry
//!
//! The catalog of expat entry points this crate knows how to reach. It is
//! written once, in [`for_each_expat_function!`], and every other piece that
//! needs the list (the descriptor table, the resolved symbol table, the typed
//! dispatch methods and the exported C entry points) is generated from it by
//! handing the macro a callback. An entry point missing here cannot be shimmed.
//!
//! Each entry reads `fn NAME(args) -> RET = FAILURE;` where `FAILURE` is the
//! value a shim hands back when the entry cannot be forwarded.

use std::fmt;

use crate::loader::NativeLibrary;
use crate::types::*;

macro_rules! for_each_expat_function {
    ($callback:ident) => {
        $callback! {
            /// Creates a parser, optionally forcing the document encoding.
            fn XML_ParserCreate(encoding: *const XmlChar) -> XmlParser = null_mut();

            /// Creates a child parser for an external parsed entity.
            fn XML_ExternalEntityParserCreate(
                parser: XmlParser,
                context: *const XmlChar,
                encoding: *const XmlChar
            ) -> XmlParser = null_mut();

            /// Restores a parser to the state it had right after creation.
            fn XML_ParserReset(parser: XmlParser, encoding: *const XmlChar) -> XmlBool = XML_FALSE;

            fn XML_SetUserData(parser: XmlParser, user_data: *mut c_void) -> () = ();

            fn XML_SetUnknownEncodingHandler(
                parser: XmlParser,
                handler: XmlUnknownEncodingHandler,
                data: *mut c_void
            ) -> () = ();

            fn XML_SetCharacterDataHandler(
                parser: XmlParser,
                handler: XmlCharacterDataHandler
            ) -> () = ();

            /// Treats the document as if it had an external DTD subset.
            fn XML_UseForeignDTD(parser: XmlParser, use_dtd: XmlBool) -> XmlError =
                XmlError::UNEXPECTED_STATE;

            fn XML_SetEncoding(parser: XmlParser, encoding: *const XmlChar) -> XmlStatus =
                XmlStatus::ERROR;

            fn XML_SetStartElementHandler(
                parser: XmlParser,
                handler: XmlStartElementHandler
            ) -> () = ();

            fn XML_SetEndElementHandler(
                parser: XmlParser,
                handler: XmlEndElementHandler
            ) -> () = ();

            fn XML_ParserFree(parser: XmlParser) -> () = ();

            /// Feeds the next chunk of the document.
            fn XML_Parse(
                parser: XmlParser,
                s: *const c_char,
                len: c_int,
                is_final: c_int
            ) -> XmlStatus = XmlStatus::ERROR;

            fn XML_GetErrorCode(parser: XmlParser) -> XmlError = XmlError::UNEXPECTED_STATE;

            /// Static, library-owned message for an error code.
            fn XML_ErrorString(code: XmlError) -> *const XmlLChar = null();

            fn XML_GetCurrentLineNumber(parser: XmlParser) -> XmlSize = 0;

            /// Library version, e.g. `expat_2.5.0`.
            fn XML_ExpatVersion() -> *const XmlLChar = null();
        }
    };
}

pub(crate) use for_each_expat_function;

/// Compile-time description of one entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionDescriptor {
    /// Exact exported symbol name
    pub name: &'static str,
    /// C signature, for diagnostics only; the typed signature lives in the shim
    pub signature: &'static str,
    /// Value returned when the entry point cannot be forwarded
    pub failure: &'static str,
}

macro_rules! declare_registry {
    ($(
        $(#[$meta:meta])*
        fn $name:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty = $fail:expr;
    )*) => {
        /// Every entry point, in registry order
        pub static SYMBOLS: &[FunctionDescriptor] = &[
            $(
                FunctionDescriptor {
                    name: stringify!($name),
                    signature: stringify!(fn($($ty),*) -> $ret),
                    failure: stringify!($fail),
                },
            )*
        ];

        /// Resolved addresses, one slot per registry entry
        ///
        /// A `None` slot means the loaded library does not export that symbol.
        #[allow(non_snake_case)]
        #[derive(Clone, Copy, Default)]
        pub struct SymbolTable {
            $(
                $(#[$meta])*
                pub $name: Option<unsafe extern "C" fn($($ty),*) -> $ret>,
            )*
        }

        impl SymbolTable {
            /// Look up every registry entry in `library` by exact name.
            pub fn resolve(library: &dyn NativeLibrary) -> Self {
                Self {
                    $(
                        $name: library.symbol(stringify!($name)).map(|address| {
                            // Safety: the address was exported under this
                            // name, and the registry declares its C signature.
                            unsafe {
                                std::mem::transmute::<
                                    *mut c_void,
                                    unsafe extern "C" fn($($ty),*) -> $ret,
                                >(address.as_ptr())
                            }
                        }),
                    )*
                }
            }

            /// `Some(resolved)` for a registry entry, `None` for an unknown name.
            pub fn is_resolved(&self, name: &str) -> Option<bool> {
                match name {
                    $(stringify!($name) => Some(self.$name.is_some()),)*
                    _ => None,
                }
            }
        }
    };
}

for_each_expat_function!(declare_registry);

impl SymbolTable {
    /// Names of the entries that resolved, in registry order.
    pub fn resolved_names(&self) -> Vec<&'static str> {
        SYMBOLS
            .iter()
            .filter(|d| self.is_resolved(d.name) == Some(true))
            .map(|d| d.name)
            .collect()
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved_names().len()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable")
            .field("resolved", &self.resolved_names())
            .finish()
    }
}

/// Look up a descriptor by exported name.
pub fn descriptor(name: &str) -> Option<&'static FunctionDescriptor> {
    SYMBOLS.iter().find(|d| d.name == name)
}
