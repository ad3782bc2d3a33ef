//! Safe parser handle over a [`Binding`]
//!
//! This is a thin RAII layer for Rust callers: it owns one `XML_Parser`,
//! frees it on drop, and turns the sentinel-style results of the shims into
//! `Result`s. It does not interpret documents beyond the optional element and
//! character-data counters used by `expat-probe`.

use std::ffi::{CStr, CString};
use std::ptr::{null, null_mut};

use serde::Serialize;

use crate::error::{BindingError, BindingResult};
use crate::loader::Binding;
use crate::types::*;

/// Counters accumulated by [`Parser::counting`]
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ParseStats {
    pub elements: u64,
    pub max_depth: u32,
    pub character_bytes: u64,
    // Current nesting while parsing; not part of the reported counters
    #[serde(skip)]
    depth: u32,
}

impl PartialEq for ParseStats {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
            && self.max_depth == other.max_depth
            && self.character_bytes == other.character_bytes
    }
}

impl Eq for ParseStats {}

unsafe extern "C" fn start_element(
    user_data: *mut c_void,
    _name: *const XmlChar,
    _atts: *mut *const XmlChar,
) {
    if user_data.is_null() {
        return;
    }
    let stats = unsafe { &mut *(user_data as *mut ParseStats) };
    stats.elements += 1;
    stats.depth += 1;
    stats.max_depth = stats.max_depth.max(stats.depth);
}

unsafe extern "C" fn end_element(user_data: *mut c_void, _name: *const XmlChar) {
    if user_data.is_null() {
        return;
    }
    let stats = unsafe { &mut *(user_data as *mut ParseStats) };
    stats.depth = stats.depth.saturating_sub(1);
}

unsafe extern "C" fn character_data(user_data: *mut c_void, _s: *const XmlChar, len: c_int) {
    if user_data.is_null() {
        return;
    }
    let stats = unsafe { &mut *(user_data as *mut ParseStats) };
    stats.character_bytes += u64::try_from(len).unwrap_or(0);
}

/// Parse failure reported by the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    pub code: i32,
    pub line: u64,
    pub message: String,
}

/// Owned `XML_Parser` created through a [`Binding`]
pub struct Parser<'b> {
    binding: &'b Binding,
    raw: XmlParser,
    // Boxed so the address handed to the library as user data stays stable
    stats: Option<Box<ParseStats>>,
}

impl<'b> Parser<'b> {
    /// Create a parser, optionally forcing the document encoding
    ///
    /// # Errors
    ///
    /// Returns `LibraryUnavailable` or `SymbolUnresolved` when the constructor
    /// cannot be reached, `ParserCreationFailed` when it returns null.
    pub fn new(binding: &'b Binding, encoding: Option<&str>) -> BindingResult<Self> {
        binding.require("XML_ParserCreate")?;

        let encoding = encoding.map(to_cstring).transpose()?;
        let raw = unsafe { binding.XML_ParserCreate(as_ptr(&encoding)) };
        if raw.is_null() {
            return Err(BindingError::ParserCreationFailed);
        }

        Ok(Parser {
            binding,
            raw,
            stats: None,
        })
    }

    /// Create a parser that counts elements, nesting depth and text bytes
    pub fn counting(binding: &'b Binding, encoding: Option<&str>) -> BindingResult<Self> {
        let mut parser = Self::new(binding, encoding)?;
        parser.stats = Some(Box::default());
        parser.install_handlers();
        Ok(parser)
    }

    fn install_handlers(&mut self) {
        let Some(stats) = self.stats.as_mut() else {
            return;
        };
        let user_data = stats.as_mut() as *mut ParseStats as *mut c_void;

        unsafe {
            self.binding.XML_SetUserData(self.raw, user_data);
            self.binding
                .XML_SetStartElementHandler(self.raw, Some(start_element));
            self.binding.XML_SetEndElementHandler(self.raw, Some(end_element));
            self.binding
                .XML_SetCharacterDataHandler(self.raw, Some(character_data));
        }
    }

    /// The raw handle, still owned by this wrapper
    pub fn as_ptr(&self) -> XmlParser {
        self.raw
    }

    pub fn stats(&self) -> Option<ParseStats> {
        self.stats.as_deref().copied()
    }

    /// Feed the next chunk of the document
    pub fn feed(&mut self, data: &[u8], is_final: bool) -> Result<(), ParseFailure> {
        // XML_Parse takes an int length; split larger inputs
        let chunk_size = c_int::MAX as usize;
        if data.is_empty() {
            return self.parse_chunk(data, is_final);
        }
        let count = data.len().div_ceil(chunk_size);
        for (i, chunk) in data.chunks(chunk_size).enumerate() {
            self.parse_chunk(chunk, is_final && i + 1 == count)?;
        }
        Ok(())
    }

    /// Parse a complete document in one call
    pub fn finish(&mut self, data: &[u8]) -> Result<(), ParseFailure> {
        self.feed(data, true)
    }

    fn parse_chunk(&mut self, chunk: &[u8], is_final: bool) -> Result<(), ParseFailure> {
        let status = unsafe {
            self.binding.XML_Parse(
                self.raw,
                chunk.as_ptr() as *const c_char,
                chunk.len() as c_int,
                c_int::from(is_final),
            )
        };

        if status == XmlStatus::ERROR {
            Err(self.failure())
        } else {
            Ok(())
        }
    }

    /// Current error as reported by the library
    pub fn failure(&self) -> ParseFailure {
        let code = self.error_code();
        ParseFailure {
            code: code.0,
            line: self.current_line(),
            message: self
                .error_string(code)
                .unwrap_or_else(|| format!("expat error {}", code.0)),
        }
    }

    pub fn error_code(&self) -> XmlError {
        unsafe { self.binding.XML_GetErrorCode(self.raw) }
    }

    pub fn error_string(&self, code: XmlError) -> Option<String> {
        let message = unsafe { self.binding.XML_ErrorString(code) };
        if message.is_null() {
            return None;
        }
        // Safety: expat returns a static NUL-terminated string
        let message = unsafe { CStr::from_ptr(message) };
        Some(message.to_string_lossy().into_owned())
    }

    pub fn current_line(&self) -> u64 {
        u64::from(unsafe { self.binding.XML_GetCurrentLineNumber(self.raw) })
    }

    /// Reset the parser for a new document; counters start over
    pub fn reset(&mut self, encoding: Option<&str>) -> BindingResult<()> {
        let encoding = encoding.map(to_cstring).transpose()?;
        let reset = unsafe { self.binding.XML_ParserReset(self.raw, as_ptr(&encoding)) };
        if reset == XML_FALSE {
            self.binding.require("XML_ParserReset")?;
            return Err(BindingError::ResetRefused);
        }

        // Reset drops handlers and user data
        if let Some(stats) = self.stats.as_mut() {
            **stats = ParseStats::default();
        }
        self.install_handlers();
        Ok(())
    }

    /// Force the document encoding; only valid before parsing starts
    pub fn set_encoding(&mut self, encoding: &str) -> XmlStatus {
        let Ok(encoding) = CString::new(encoding) else {
            return XmlStatus::ERROR;
        };
        unsafe { self.binding.XML_SetEncoding(self.raw, encoding.as_ptr()) }
    }

    pub fn use_foreign_dtd(&mut self, use_dtd: bool) -> XmlError {
        let flag = if use_dtd { XML_TRUE } else { XML_FALSE };
        unsafe { self.binding.XML_UseForeignDTD(self.raw, flag) }
    }
}

impl Drop for Parser<'_> {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            unsafe { self.binding.XML_ParserFree(self.raw) };
            self.raw = null_mut();
        }
    }
}

/// Library version string, e.g. `expat_2.5.0`
pub fn expat_version(binding: &Binding) -> Option<String> {
    let version = unsafe { binding.XML_ExpatVersion() };
    if version.is_null() {
        return None;
    }
    let version = unsafe { CStr::from_ptr(version) };
    Some(version.to_string_lossy().into_owned())
}

fn to_cstring(s: &str) -> BindingResult<CString> {
    CString::new(s).map_err(|_| BindingError::InvalidString {
        value: s.to_string(),
    })
}

fn as_ptr(s: &Option<CString>) -> *const XmlChar {
    s.as_ref().map_or(null(), |s| s.as_ptr())
}
