//! Error types for team slide generation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a team slide.
///
/// Only [`Error::InvalidRequest`], [`Error::TemplateMissing`] and
/// [`Error::TemplateCorrupt`] abort a whole request. Everything else is
/// recovered per consultant by the engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request itself is malformed (wrong name count, blank names).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No source document matches the requested name.
    #[error("No source document found for '{0}'")]
    SourceNotFound(String),

    /// The output template does not exist.
    #[error("Template not found: {}", .0.display())]
    TemplateMissing(PathBuf),

    /// The output template exists but cannot be used.
    #[error("Template is corrupt: {0}")]
    TemplateCorrupt(String),

    /// Failed to parse the PPTX package structure.
    #[error("PPTX parsing error: {0}")]
    PptxParse(String),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    Zip(String),

    /// XML parsing or writing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Photo bytes are not a decodable image.
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    /// Failed to encode a fitted image.
    #[error("Image encode error: {0}")]
    ImageEncode(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}
