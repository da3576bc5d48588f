//! Core domain types, name matching, and slide element classification
//! for team slide generation.

pub mod classify;
pub mod error;
pub mod matcher;
pub mod types;

pub use classify::{ElementKind, SlideContext};
pub use error::{Error, Result};
pub use matcher::SourceIndex;
pub use types::{
    ConsultantRecord, Frame, Paragraph, PlaceholderSlot, QuadrantSlots, SlotKind, SlotTable,
    TextBlock, BULLET_COUNT, QUADRANT_COUNT,
};
