//! Team slide generation.
//!
//! Turns four consultant names into one populated team slide: each name is
//! matched to a CV in the source directory, its fields are extracted, and
//! the records are written into the template's quadrants. Names that cannot
//! be matched or read get a fallback record, so the slide always has four
//! quadrants.

pub mod config;
pub mod engine;

pub use config::EngineConfig;
pub use engine::{GeneratedSlide, SlotOutcome, TeamSlideEngine};
pub use team_core::{ConsultantRecord, Error, Result};
