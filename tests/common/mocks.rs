use std::collections::HashMap;
use std::path::Path;
use std::ptr::{NonNull, null};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use expat_shim::types::*;
use expat_shim::{LibraryOpener, LoadError, NativeLibrary};

/// One forwarded call, as seen by the fake library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    Create {
        encoding: usize,
        parser: usize,
    },
    ExternalEntityCreate {
        parent: usize,
        context: usize,
        encoding: usize,
        parser: usize,
    },
    Reset {
        parser: usize,
        encoding: usize,
    },
    SetUserData {
        parser: usize,
        user_data: usize,
    },
    SetUnknownEncodingHandler {
        parser: usize,
        handler: bool,
        data: usize,
    },
    SetCharacterDataHandler {
        parser: usize,
        handler: bool,
    },
    UseForeignDtd {
        parser: usize,
        use_dtd: XmlBool,
    },
    SetEncoding {
        parser: usize,
        encoding: String,
    },
    SetStartElementHandler {
        parser: usize,
        handler: bool,
    },
    SetEndElementHandler {
        parser: usize,
        handler: bool,
    },
    Free {
        parser: usize,
    },
    Parse {
        parser: usize,
        buffer: usize,
        data: Vec<u8>,
        len: c_int,
        is_final: c_int,
    },
}

impl FakeCall {
    pub fn parser(&self) -> usize {
        match self {
            FakeCall::Create { parser, .. }
            | FakeCall::ExternalEntityCreate { parser, .. }
            | FakeCall::Reset { parser, .. }
            | FakeCall::SetUserData { parser, .. }
            | FakeCall::SetUnknownEncodingHandler { parser, .. }
            | FakeCall::SetCharacterDataHandler { parser, .. }
            | FakeCall::UseForeignDtd { parser, .. }
            | FakeCall::SetEncoding { parser, .. }
            | FakeCall::SetStartElementHandler { parser, .. }
            | FakeCall::SetEndElementHandler { parser, .. }
            | FakeCall::Free { parser }
            | FakeCall::Parse { parser, .. } => *parser,
        }
    }
}

#[derive(Default, Clone, Copy)]
struct FakeParser {
    user_data: usize,
    start: XmlStartElementHandler,
    end: XmlEndElementHandler,
    characters: XmlCharacterDataHandler,
    error: c_int,
    line: XmlSize,
}

static CALLS: Mutex<Vec<FakeCall>> = Mutex::new(Vec::new());
static PARSERS: LazyLock<Mutex<HashMap<usize, FakeParser>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));
static NEXT_PARSER: AtomicUsize = AtomicUsize::new(0x1000);

pub const FAKE_VERSION: &str = "expat_fake_2.6.0";
pub const FAKE_SYNTAX_MESSAGE: &str = "syntax error";

fn record(call: FakeCall) {
    CALLS.lock().unwrap().push(call);
}

/// Calls recorded for one parser handle, in call order
///
/// Tests in the same binary run concurrently; each one only looks at the
/// parsers it created.
pub fn calls_for(parser: XmlParser) -> Vec<FakeCall> {
    let parser = parser as usize;
    CALLS
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.parser() == parser)
        .cloned()
        .collect()
}

fn new_parser() -> usize {
    let parser = NEXT_PARSER.fetch_add(0x10, Ordering::SeqCst);
    PARSERS
        .lock()
        .unwrap()
        .insert(parser, FakeParser::default());
    parser
}

fn with_parser<R>(parser: XmlParser, f: impl FnOnce(&mut FakeParser) -> R) -> Option<R> {
    PARSERS.lock().unwrap().get_mut(&(parser as usize)).map(f)
}

unsafe extern "C" fn fake_parser_create(encoding: *const XmlChar) -> XmlParser {
    let parser = new_parser();
    record(FakeCall::Create {
        encoding: encoding as usize,
        parser,
    });
    parser as XmlParser
}

unsafe extern "C" fn fake_external_entity_parser_create(
    parent: XmlParser,
    context: *const XmlChar,
    encoding: *const XmlChar,
) -> XmlParser {
    let parser = new_parser();
    record(FakeCall::ExternalEntityCreate {
        parent: parent as usize,
        context: context as usize,
        encoding: encoding as usize,
        parser,
    });
    parser as XmlParser
}

unsafe extern "C" fn fake_parser_reset(parser: XmlParser, encoding: *const XmlChar) -> XmlBool {
    record(FakeCall::Reset {
        parser: parser as usize,
        encoding: encoding as usize,
    });
    match with_parser(parser, |state| *state = FakeParser::default()) {
        Some(()) => XML_TRUE,
        None => XML_FALSE,
    }
}

unsafe extern "C" fn fake_set_user_data(parser: XmlParser, user_data: *mut c_void) {
    record(FakeCall::SetUserData {
        parser: parser as usize,
        user_data: user_data as usize,
    });
    with_parser(parser, |state| state.user_data = user_data as usize);
}

unsafe extern "C" fn fake_set_unknown_encoding_handler(
    parser: XmlParser,
    handler: XmlUnknownEncodingHandler,
    data: *mut c_void,
) {
    record(FakeCall::SetUnknownEncodingHandler {
        parser: parser as usize,
        handler: handler.is_some(),
        data: data as usize,
    });
}

unsafe extern "C" fn fake_set_character_data_handler(
    parser: XmlParser,
    handler: XmlCharacterDataHandler,
) {
    record(FakeCall::SetCharacterDataHandler {
        parser: parser as usize,
        handler: handler.is_some(),
    });
    with_parser(parser, |state| state.characters = handler);
}

unsafe extern "C" fn fake_use_foreign_dtd(parser: XmlParser, use_dtd: XmlBool) -> XmlError {
    record(FakeCall::UseForeignDtd {
        parser: parser as usize,
        use_dtd,
    });
    XmlError::NONE
}

unsafe extern "C" fn fake_set_encoding(parser: XmlParser, encoding: *const XmlChar) -> XmlStatus {
    let name = if encoding.is_null() {
        String::new()
    } else {
        unsafe { std::ffi::CStr::from_ptr(encoding) }
            .to_string_lossy()
            .into_owned()
    };
    record(FakeCall::SetEncoding {
        parser: parser as usize,
        encoding: name,
    });
    XmlStatus::OK
}

unsafe extern "C" fn fake_set_start_element_handler(
    parser: XmlParser,
    handler: XmlStartElementHandler,
) {
    record(FakeCall::SetStartElementHandler {
        parser: parser as usize,
        handler: handler.is_some(),
    });
    with_parser(parser, |state| state.start = handler);
}

unsafe extern "C" fn fake_set_end_element_handler(
    parser: XmlParser,
    handler: XmlEndElementHandler,
) {
    record(FakeCall::SetEndElementHandler {
        parser: parser as usize,
        handler: handler.is_some(),
    });
    with_parser(parser, |state| state.end = handler);
}

unsafe extern "C" fn fake_parser_free(parser: XmlParser) {
    record(FakeCall::Free {
        parser: parser as usize,
    });
    PARSERS.lock().unwrap().remove(&(parser as usize));
}

/// Scans `<tag>`, `</tag>`, `<tag/>` and text; anything starting with `<!`
/// is reported as a syntax error.
unsafe extern "C" fn fake_parse(
    parser: XmlParser,
    s: *const c_char,
    len: c_int,
    is_final: c_int,
) -> XmlStatus {
    let data = if s.is_null() || len <= 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(s as *const u8, len as usize) }.to_vec()
    };
    record(FakeCall::Parse {
        parser: parser as usize,
        buffer: s as usize,
        data: data.clone(),
        len,
        is_final,
    });

    let Some(state) = with_parser(parser, |state| *state) else {
        return XmlStatus::ERROR;
    };
    let user_data = state.user_data as *mut c_void;

    let mut i = 0;
    while i < data.len() {
        if data[i] == b'<' {
            let close = data[i..].iter().position(|&b| b == b'>').map(|p| i + p);
            let Some(close) = close else { break };
            let tag = &data[i + 1..close];
            if tag.first() == Some(&b'!') {
                with_parser(parser, |state| {
                    state.error = XmlError::SYNTAX.0;
                    state.line = 1;
                });
                return XmlStatus::ERROR;
            }
            unsafe {
                if tag.first() == Some(&b'/') {
                    if let Some(end) = state.end {
                        end(user_data, null());
                    }
                } else {
                    if let Some(start) = state.start {
                        start(user_data, null(), std::ptr::null_mut());
                    }
                    if tag.last() == Some(&b'/') {
                        if let Some(end) = state.end {
                            end(user_data, null());
                        }
                    }
                }
            }
            i = close + 1;
        } else {
            let next = data[i..]
                .iter()
                .position(|&b| b == b'<')
                .map_or(data.len(), |p| i + p);
            if let Some(characters) = state.characters {
                let text = data[i..].as_ptr() as *const c_char;
                unsafe { characters(user_data, text, (next - i) as c_int) };
            }
            i = next;
        }
    }

    XmlStatus::OK
}

unsafe extern "C" fn fake_get_error_code(parser: XmlParser) -> XmlError {
    XmlError(with_parser(parser, |state| state.error).unwrap_or(0))
}

unsafe extern "C" fn fake_error_string(code: XmlError) -> *const XmlLChar {
    if code == XmlError::SYNTAX {
        c"syntax error".as_ptr()
    } else {
        null()
    }
}

unsafe extern "C" fn fake_get_current_line_number(parser: XmlParser) -> XmlSize {
    with_parser(parser, |state| state.line).unwrap_or(0)
}

unsafe extern "C" fn fake_expat_version() -> *const XmlLChar {
    c"expat_fake_2.6.0".as_ptr()
}

/// In-process stand-in for libexpat
///
/// Exports every registry entry except the names listed in `missing`.
#[derive(Debug, Default, Clone)]
pub struct FakeExpat {
    pub missing: Vec<&'static str>,
}

impl NativeLibrary for FakeExpat {
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        if self.missing.contains(&name) {
            return None;
        }

        let address = match name {
            "XML_ParserCreate" => fake_parser_create as *mut c_void,
            "XML_ExternalEntityParserCreate" => fake_external_entity_parser_create as *mut c_void,
            "XML_ParserReset" => fake_parser_reset as *mut c_void,
            "XML_SetUserData" => fake_set_user_data as *mut c_void,
            "XML_SetUnknownEncodingHandler" => fake_set_unknown_encoding_handler as *mut c_void,
            "XML_SetCharacterDataHandler" => fake_set_character_data_handler as *mut c_void,
            "XML_UseForeignDTD" => fake_use_foreign_dtd as *mut c_void,
            "XML_SetEncoding" => fake_set_encoding as *mut c_void,
            "XML_SetStartElementHandler" => fake_set_start_element_handler as *mut c_void,
            "XML_SetEndElementHandler" => fake_set_end_element_handler as *mut c_void,
            "XML_ParserFree" => fake_parser_free as *mut c_void,
            "XML_Parse" => fake_parse as *mut c_void,
            "XML_GetErrorCode" => fake_get_error_code as *mut c_void,
            "XML_ErrorString" => fake_error_string as *mut c_void,
            "XML_GetCurrentLineNumber" => fake_get_current_line_number as *mut c_void,
            "XML_ExpatVersion" => fake_expat_version as *mut c_void,
            _ => return None,
        };

        NonNull::new(address)
    }
}

/// Opener that counts attempts and hands out a [`FakeExpat`], or fails
pub struct MockOpener {
    attempts: Arc<AtomicUsize>,
    library: Option<FakeExpat>,
}

impl MockOpener {
    /// Library present with every symbol
    pub fn present() -> Self {
        Self::with_library(FakeExpat::default())
    }

    /// Library present but lacking `missing`
    pub fn missing(missing: &[&'static str]) -> Self {
        Self::with_library(FakeExpat {
            missing: missing.to_vec(),
        })
    }

    /// Library cannot be opened
    pub fn absent() -> Self {
        Self {
            attempts: Arc::new(AtomicUsize::new(0)),
            library: None,
        }
    }

    fn with_library(library: FakeExpat) -> Self {
        Self {
            attempts: Arc::new(AtomicUsize::new(0)),
            library: Some(library),
        }
    }

    /// Shared open-attempt counter; stays valid after the opener moves
    pub fn attempts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }
}

impl LibraryOpener for MockOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn NativeLibrary>, LoadError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match &self.library {
            Some(library) => Ok(Box::new(library.clone())),
            None => Err(LoadError::LibraryUnavailable {
                path: path.to_path_buf(),
                reason: "mock library not installed".to_string(),
            }),
        }
    }
}
