//! Probe reports
//!
//! Collects what `expat-probe` knows about a [`Binding`] and renders it as
//! text or JSON.

use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;
use crate::loader::{Binding, LoadState};
use crate::parser::{ParseFailure, ParseStats, Parser, expat_version};
use crate::registry::SYMBOLS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolReport {
    pub name: &'static str,
    pub resolved: bool,
    pub signature: &'static str,
    pub failure: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileOutcome {
    Parsed { stats: ParseStats },
    Failed { failure: ParseFailure },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

impl FileReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FileOutcome::Parsed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub library_path: PathBuf,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub symbols: Vec<SymbolReport>,
    pub files: Vec<FileReport>,
}

impl ProbeReport {
    /// Load `binding` (if needed) and parse each file through it
    pub fn collect(binding: &Binding, files: &[PathBuf], encoding: Option<&str>) -> Self {
        let state = binding.ensure_loaded();

        let symbols = SYMBOLS
            .iter()
            .map(|d| SymbolReport {
                name: d.name,
                resolved: binding.is_resolved(d.name),
                signature: d.signature,
                failure: d.failure,
            })
            .collect();

        let files = files
            .iter()
            .map(|path| FileReport {
                path: path.clone(),
                outcome: parse_file(binding, path, encoding),
            })
            .collect();

        ProbeReport {
            library_path: binding.library_path().to_path_buf(),
            state: state.to_string(),
            error: binding.load_error().map(ToString::to_string),
            version: expat_version(binding),
            symbols,
            files,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded.to_string()
    }

    /// 0 when loaded and every file parsed, 1 when a file failed, 2 when the
    /// library is unavailable
    pub fn exit_code(&self) -> i32 {
        if !self.is_loaded() {
            2
        } else if self.files.iter().all(FileReport::is_success) {
            0
        } else {
            1
        }
    }

    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Human => self.format_human(),
            OutputFormat::Json => serde_json::to_string_pretty(self)
                .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
        }
    }

    fn format_human(&self) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "Library: {}", self.library_path.display());
        let _ = writeln!(output, "State:   {}", self.state);
        if let Some(error) = &self.error {
            let _ = writeln!(output, "Error:   {}", error);
        }
        if let Some(version) = &self.version {
            let _ = writeln!(output, "Version: {}", version);
        }

        let resolved = self.symbols.iter().filter(|s| s.resolved).count();
        let _ = writeln!(output, "Symbols: {}/{} resolved", resolved, self.symbols.len());
        for symbol in &self.symbols {
            let mark = if symbol.resolved { "ok     " } else { "missing" };
            let _ = writeln!(output, "  {} {}", mark, symbol.name);
        }

        for file in &self.files {
            let path = file.path.display();
            let _ = match &file.outcome {
                FileOutcome::Parsed { stats } => writeln!(
                    output,
                    "{}: {} elements, depth {}, {} text bytes",
                    path, stats.elements, stats.max_depth, stats.character_bytes
                ),
                FileOutcome::Failed { failure } => writeln!(
                    output,
                    "{}: line {}: {} (code {})",
                    path, failure.line, failure.message, failure.code
                ),
                FileOutcome::Skipped { reason } => {
                    writeln!(output, "{}: skipped: {}", path, reason)
                }
            };
        }

        output
    }
}

fn parse_file(binding: &Binding, path: &Path, encoding: Option<&str>) -> FileOutcome {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            return FileOutcome::Skipped {
                reason: e.to_string(),
            };
        }
    };

    let mut parser = match Parser::counting(binding, encoding) {
        Ok(parser) => parser,
        Err(e) => {
            return FileOutcome::Skipped {
                reason: e.to_string(),
            };
        }
    };

    match parser.finish(&data) {
        Ok(()) => FileOutcome::Parsed {
            stats: parser.stats().unwrap_or_default(),
        },
        Err(failure) => FileOutcome::Failed { failure },
    }
}
