//! PPTX (Office Open XML) backend for team slide generation.
//!
//! Reads consultant CVs (.pptx files are ZIP archives of XML parts),
//! extracts their fields, and writes those fields into the slots of the
//! team slide template.

pub mod extract;
pub mod package;
pub mod shapes;
pub mod template;
pub mod xml;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use extract::{SlideElement, SlideFieldExtractor};
pub use package::Package;
pub use template::{inspect_template, RunStyle, SlotStyles, TemplateLayout, TemplatePopulator, DEFAULT_DPI};
