//! Domain types shared by the extractor, the populator and the engine.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Number of experience bullets every record carries.
pub const BULLET_COUNT: usize = 3;

/// Number of quadrants (consultants) on a team slide.
pub const QUADRANT_COUNT: usize = 4;

/// English Metric Units per inch, as used by DrawingML geometry.
const EMU_PER_INCH: f64 = 914_400.0;

/// Largest frame side, in pixels, a photo is fitted into.
pub const MAX_FRAME_SIDE: u32 = 10_000;

/// Biographical data for one consultant, ready to be written into a quadrant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultantRecord {
    /// Name as shown on the slide.
    pub display_name: String,

    /// One line combining role and location.
    pub role_line: String,

    /// Exactly three experience bullets, possibly empty.
    pub bullets: [String; BULLET_COUNT],

    /// Raw headshot bytes in whatever format the source document embedded.
    #[serde(skip)]
    pub photo: Option<Vec<u8>>,
}

impl ConsultantRecord {
    /// Create a record, padding or truncating `bullets` to exactly three.
    pub fn new<I, S>(display_name: impl Into<String>, role_line: impl Into<String>, bullets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            display_name: display_name.into(),
            role_line: role_line.into(),
            bullets: bullets_from(bullets),
            photo: None,
        }
    }

    /// Record used when a name cannot be resolved or its document is unreadable.
    pub fn fallback(name: &str) -> Self {
        Self::new(name.trim(), "", std::iter::empty::<String>())
    }

    /// Attach headshot bytes.
    pub fn with_photo(mut self, photo: Vec<u8>) -> Self {
        self.photo = Some(photo);
        self
    }

    /// Whether any bullet has content.
    pub fn has_bullets(&self) -> bool {
        self.bullets.iter().any(|b| !b.is_empty())
    }
}

/// Take the first three items in order, padding with empty strings.
fn bullets_from<I, S>(items: I) -> [String; BULLET_COUNT]
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut bullets: [String; BULLET_COUNT] = Default::default();
    for (slot, item) in bullets.iter_mut().zip(items) {
        *slot = item.into();
    }
    bullets
}

/// One paragraph of a text shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Concatenated run text.
    pub text: String,

    /// Whether the paragraph carries explicit bullet formatting.
    pub bulleted: bool,
}

impl Paragraph {
    /// Create a plain paragraph.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bulleted: false,
        }
    }

    /// Create a paragraph with bullet formatting.
    pub fn bulleted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bulleted: true,
        }
    }
}

/// A text shape found on a slide, with its offset in EMU.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Paragraphs in document order.
    pub paragraphs: Vec<Paragraph>,

    /// Horizontal offset.
    pub x: i64,

    /// Vertical offset.
    pub y: i64,
}

impl TextBlock {
    /// Create a block at the given offset.
    pub fn new(paragraphs: Vec<Paragraph>, x: i64, y: i64) -> Self {
        Self { paragraphs, x, y }
    }

    /// Trimmed, non-empty paragraph texts.
    pub fn lines(&self) -> Vec<&str> {
        self.paragraphs
            .iter()
            .map(|p| p.text.trim())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// All paragraph text joined with newlines.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether the block has no visible text.
    pub fn is_blank(&self) -> bool {
        self.lines().is_empty()
    }
}

/// Kind of writable region in the output template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Text,
    Image,
}

/// A writable region of the template, identified by its position among
/// shapes of the same kind in slide document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaceholderSlot {
    pub kind: SlotKind,
    pub index: usize,
}

impl PlaceholderSlot {
    pub fn text(index: usize) -> Self {
        Self {
            kind: SlotKind::Text,
            index,
        }
    }

    pub fn image(index: usize) -> Self {
        Self {
            kind: SlotKind::Image,
            index,
        }
    }
}

/// Text and image slot indices for one quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadrantSlots {
    pub text: usize,
    pub image: usize,
}

impl QuadrantSlots {
    pub fn text_slot(&self) -> PlaceholderSlot {
        PlaceholderSlot::text(self.text)
    }

    pub fn image_slot(&self) -> PlaceholderSlot {
        PlaceholderSlot::image(self.image)
    }
}

/// Binding of quadrants (top-left, top-right, bottom-left, bottom-right)
/// to template slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotTable {
    quadrants: [QuadrantSlots; QUADRANT_COUNT],
}

impl Default for SlotTable {
    fn default() -> Self {
        let mut quadrants = [QuadrantSlots { text: 0, image: 0 }; QUADRANT_COUNT];
        for (idx, quadrant) in quadrants.iter_mut().enumerate() {
            *quadrant = QuadrantSlots {
                text: idx,
                image: idx,
            };
        }
        Self { quadrants }
    }
}

impl SlotTable {
    /// Create a table from explicit quadrant bindings.
    pub fn new(quadrants: [QuadrantSlots; QUADRANT_COUNT]) -> Self {
        Self { quadrants }
    }

    /// Slots bound to the given quadrant.
    pub fn quadrant(&self, quadrant: usize) -> Option<QuadrantSlots> {
        self.quadrants.get(quadrant).copied()
    }

    /// All quadrant bindings in order.
    pub fn quadrants(&self) -> &[QuadrantSlots; QUADRANT_COUNT] {
        &self.quadrants
    }

    /// Check the table against the slots a template actually provides.
    ///
    /// Every index must exist and no slot may be bound to two quadrants.
    pub fn validate(&self, text_slots: usize, image_slots: usize) -> Result<()> {
        for (idx, quadrant) in self.quadrants.iter().enumerate() {
            if quadrant.text >= text_slots {
                return Err(Error::TemplateCorrupt(format!(
                    "quadrant {} needs text slot {}, template has {}",
                    idx + 1,
                    quadrant.text,
                    text_slots
                )));
            }
            if quadrant.image >= image_slots {
                return Err(Error::TemplateCorrupt(format!(
                    "quadrant {} needs image slot {}, template has {}",
                    idx + 1,
                    quadrant.image,
                    image_slots
                )));
            }
            let duplicate = self.quadrants[..idx]
                .iter()
                .any(|q| q.text == quadrant.text || q.image == quadrant.image);
            if duplicate {
                return Err(Error::TemplateCorrupt(format!(
                    "quadrant {} shares a slot with an earlier quadrant",
                    idx + 1
                )));
            }
        }
        Ok(())
    }
}

/// Pixel size of an image slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Create a frame; zero dimensions are raised to one pixel.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Convert a DrawingML extent (EMU) to pixels at the given resolution.
    pub fn from_emu(cx: i64, cy: i64, dpi: u32) -> Self {
        let to_px = |emu: i64| (emu.max(0) as f64 / EMU_PER_INCH * f64::from(dpi)).round() as u32;
        Self::new(to_px(cx), to_px(cy))
    }

    /// Like [`Frame::from_emu`], but rejects frames with a side above
    /// [`MAX_FRAME_SIDE`] pixels as a corrupt template.
    pub fn checked_from_emu(cx: i64, cy: i64, dpi: u32) -> Result<Self> {
        let frame = Self::from_emu(cx, cy, dpi);
        if frame.width > MAX_FRAME_SIDE || frame.height > MAX_FRAME_SIDE {
            return Err(Error::TemplateCorrupt(format!(
                "Image frame of {}x{} pixels exceeds {} pixels per side",
                frame.width, frame.height, MAX_FRAME_SIDE
            )));
        }
        Ok(frame)
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_pads_bullets() {
        let record = ConsultantRecord::new("Ada", "Partner", ["one"]);
        assert_eq!(record.bullets, ["one".to_string(), String::new(), String::new()]);
    }

    #[test]
    fn test_record_truncates_bullets_in_order() {
        let record = ConsultantRecord::new("Ada", "", ["a", "b", "c", "d", "e"]);
        assert_eq!(record.bullets, ["a", "b", "c"].map(String::from));
    }

    #[test]
    fn test_fallback_record() {
        let record = ConsultantRecord::fallback("  Jane Doe ");
        assert_eq!(record.display_name, "Jane Doe");
        assert!(record.role_line.is_empty());
        assert!(!record.has_bullets());
        assert!(record.photo.is_none());
    }

    #[test]
    fn test_text_block_lines() {
        let block = TextBlock::new(
            vec![Paragraph::new(" First "), Paragraph::new(""), Paragraph::new("Second")],
            0,
            0,
        );
        assert_eq!(block.lines(), vec!["First", "Second"]);
        assert!(!block.is_blank());
        assert!(TextBlock::default().is_blank());
    }

    #[test]
    fn test_default_slot_table_is_identity() {
        let table = SlotTable::default();
        for idx in 0..QUADRANT_COUNT {
            let quadrant = table.quadrant(idx).unwrap();
            assert_eq!(quadrant.text_slot(), PlaceholderSlot::text(idx));
            assert_eq!(quadrant.image_slot(), PlaceholderSlot::image(idx));
        }
        assert!(table.quadrant(QUADRANT_COUNT).is_none());
    }

    #[test]
    fn test_slot_table_validation() {
        let table = SlotTable::default();
        assert!(table.validate(4, 4).is_ok());
        assert!(table.validate(5, 4).is_ok());
        assert!(matches!(table.validate(3, 4), Err(Error::TemplateCorrupt(_))));
        assert!(matches!(table.validate(4, 2), Err(Error::TemplateCorrupt(_))));

        let shared = SlotTable::new([
            QuadrantSlots { text: 0, image: 0 },
            QuadrantSlots { text: 0, image: 1 },
            QuadrantSlots { text: 2, image: 2 },
            QuadrantSlots { text: 3, image: 3 },
        ]);
        assert!(matches!(shared.validate(4, 4), Err(Error::TemplateCorrupt(_))));
    }

    #[test]
    fn test_frame_from_emu() {
        // 2 x 2.5 inches at 96 dpi
        let frame = Frame::from_emu(1_828_800, 2_286_000, 96);
        assert_eq!(frame, Frame::new(192, 240));
        assert!((frame.aspect_ratio() - 0.8).abs() < 1e-9);
        assert_eq!(Frame::from_emu(0, -5, 96), Frame::new(1, 1));
    }

    #[test]
    fn test_frame_size_limit() {
        assert_eq!(
            Frame::checked_from_emu(1_828_800, 2_286_000, 96).unwrap(),
            Frame::new(192, 240)
        );
        // 10_000 px at 96 dpi is 95_250_000 EMU
        assert!(Frame::checked_from_emu(95_250_000, 95_250_000, 96).is_ok());
        assert!(matches!(
            Frame::checked_from_emu(95_250_000 * 1_000, 2_286_000, 96),
            Err(Error::TemplateCorrupt(_))
        ));
        assert!(matches!(
            Frame::checked_from_emu(1_828_800, 2_286_000, u32::MAX),
            Err(Error::TemplateCorrupt(_))
        ));
    }
}
