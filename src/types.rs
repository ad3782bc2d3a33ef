//! C-side declarations of the expat API surface
//!
//! These are the types shared by the dispatch shims and by Rust consumers of
//! the binding. They mirror `expat.h` for a build where `XML_Char` is `char`
//! (the UTF-8 configuration every distribution ships), so a signature written
//! against these aliases has the same ABI as the real library.
//!
//! Enumerations that cross the boundary as return values are modelled as
//! transparent newtypes over `c_int` rather than Rust enums: the library may
//! return a discriminant this crate does not know about, and that must not be
//! undefined behavior.

pub use libc::{c_char, c_int, c_uchar, c_ulong, c_void};

/// Opaque parser state owned by the library
#[repr(C)]
pub struct XmlParserStruct {
    _private: [u8; 0],
}

/// `XML_Parser`
pub type XmlParser = *mut XmlParserStruct;

/// `XML_Char` (UTF-8 build)
pub type XmlChar = c_char;

/// `XML_LChar`, used for version and error strings
pub type XmlLChar = c_char;

/// `XML_Size`, used for line and column numbers
pub type XmlSize = c_ulong;

/// `XML_Bool`
pub type XmlBool = c_uchar;

pub const XML_TRUE: XmlBool = 1;
pub const XML_FALSE: XmlBool = 0;

/// `enum XML_Status`
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XmlStatus(pub c_int);

impl XmlStatus {
    pub const ERROR: XmlStatus = XmlStatus(0);
    pub const OK: XmlStatus = XmlStatus(1);
    pub const SUSPENDED: XmlStatus = XmlStatus(2);

    pub fn is_ok(self) -> bool {
        self == XmlStatus::OK
    }
}

/// `enum XML_Error`
///
/// Only the codes this crate produces or inspects get a name; anything else
/// round-trips through the raw value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XmlError(pub c_int);

impl XmlError {
    pub const NONE: XmlError = XmlError(0);
    pub const NO_MEMORY: XmlError = XmlError(1);
    pub const SYNTAX: XmlError = XmlError(2);
    pub const NO_ELEMENTS: XmlError = XmlError(3);
    pub const INVALID_TOKEN: XmlError = XmlError(4);
    pub const UNCLOSED_TOKEN: XmlError = XmlError(5);
    pub const TAG_MISMATCH: XmlError = XmlError(7);
    pub const UNKNOWN_ENCODING: XmlError = XmlError(18);
    pub const UNEXPECTED_STATE: XmlError = XmlError(23);
    pub const FEATURE_REQUIRES_XML_DTD: XmlError = XmlError(25);
    pub const CANT_CHANGE_FEATURE_ONCE_PARSING: XmlError = XmlError(26);
}

/// `XML_Encoding`, filled in by an unknown-encoding handler
#[repr(C)]
pub struct XmlEncoding {
    pub map: [c_int; 256],
    pub data: *mut c_void,
    pub convert: Option<unsafe extern "C" fn(data: *mut c_void, s: *const c_char) -> c_int>,
    pub release: Option<unsafe extern "C" fn(data: *mut c_void)>,
}

pub type XmlStartElementHandler = Option<
    unsafe extern "C" fn(user_data: *mut c_void, name: *const XmlChar, atts: *mut *const XmlChar),
>;

pub type XmlEndElementHandler =
    Option<unsafe extern "C" fn(user_data: *mut c_void, name: *const XmlChar)>;

pub type XmlCharacterDataHandler =
    Option<unsafe extern "C" fn(user_data: *mut c_void, s: *const XmlChar, len: c_int)>;

pub type XmlUnknownEncodingHandler = Option<
    unsafe extern "C" fn(
        encoding_handler_data: *mut c_void,
        name: *const XmlChar,
        info: *mut XmlEncoding,
    ) -> c_int,
>;
