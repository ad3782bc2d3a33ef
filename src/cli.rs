use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Report format for `expat-probe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Human,
    /// JSON document
    Json,
}

/// Inspect the runtime expat binding
#[derive(Parser, Debug, Clone)]
#[command(name = "expat-probe")]
#[command(
    about = "Check whether libexpat can be loaded at runtime and which entry points resolve"
)]
#[command(version)]
pub struct Cli {
    /// XML files to parse through the binding
    #[arg(help = "XML files to parse through the resolved entry points")]
    pub files: Vec<PathBuf>,

    /// Library to load instead of the configured one
    #[arg(short = 'l', long = "library", help = "Path or name of the expat shared library")]
    pub library: Option<PathBuf>,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(short = 'f', long = "format", value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Force the document encoding passed to XML_ParserCreate
    #[arg(short = 'e', long = "encoding")]
    pub encoding: Option<String>,

    /// Enable verbose output (debug logging from the loader)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}
