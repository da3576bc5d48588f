//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use team_core::{Error, Result, SlotTable};
use team_pptx::{SlotStyles, DEFAULT_DPI};

/// Where the engine finds its inputs and how it writes the slide.
///
/// Every field has a default, so a JSON file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory of per-consultant CV documents.
    pub source_dir: PathBuf,

    /// The team slide template.
    pub template_path: PathBuf,

    /// File in `source_dir` that is never matched (the reference CV).
    pub reserved_filename: String,

    /// Extension of source documents, without the dot.
    pub source_extension: String,

    /// Quadrant to template slot bindings.
    pub slots: SlotTable,

    /// Resolution for fitting photos into image slots.
    pub dpi: u32,

    pub styles: SlotStyles,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("cvs"),
            template_path: PathBuf::from("templates/Team_Slide_Template.pptx"),
            reserved_filename: "CV_Placeholder.pptx".to_string(),
            source_extension: "pptx".to_string(),
            slots: SlotTable::default(),
            dpi: DEFAULT_DPI,
            styles: SlotStyles::default(),
        }
    }
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = dir.into();
        self
    }

    pub fn with_template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = path.into();
        self
    }

    pub fn with_reserved_filename(mut self, name: impl Into<String>) -> Self {
        self.reserved_filename = name.into();
        self
    }

    pub fn with_source_extension(mut self, extension: impl Into<String>) -> Self {
        self.source_extension = extension.into();
        self
    }

    pub fn with_slots(mut self, slots: SlotTable) -> Self {
        self.slots = slots;
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_styles(mut self, styles: SlotStyles) -> Self {
        self.styles = styles;
        self
    }
}
