//! Field extraction from single-consultant CV slides.

use crate::package::{resolve_target, Package};
use crate::shapes::{read_shapes, ShapeKind};
use std::path::Path;
use team_core::classify::{self, ElementKind, SlideContext};
use team_core::{ConsultantRecord, Result, TextBlock};

/// A visual building block of a slide, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideElement {
    /// Raw bytes of a picture's media part.
    Image(Vec<u8>),
    /// A text shape.
    Text(TextBlock),
}

impl SlideElement {
    /// What this element represents on a CV slide.
    pub fn classify(&self, ctx: &SlideContext) -> ElementKind {
        match self {
            SlideElement::Image(_) => ElementKind::Image,
            SlideElement::Text(block) => classify::classify_text(block, ctx),
        }
    }
}

/// Extracts a [`ConsultantRecord`] from the first slide of a CV document.
#[derive(Debug, Clone, Default)]
pub struct SlideFieldExtractor;

impl SlideFieldExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the record from a `.pptx` file.
    ///
    /// Only opening the package can fail. `name_hint` is the name that was
    /// asked for; it helps to find name blocks without a comma line.
    pub fn extract(&self, path: impl AsRef<Path>, name_hint: Option<&str>) -> Result<ConsultantRecord> {
        let path = path.as_ref();
        log::debug!("Extracting fields from {}", path.display());

        let package = Package::open(path)?;
        Ok(self.extract_package(&package, name_hint))
    }

    /// Extract the record from an opened package.
    ///
    /// Missing or unreadable fields fall back to their defaults.
    pub fn extract_package(&self, package: &Package, name_hint: Option<&str>) -> ConsultantRecord {
        let elements = match self.slide_elements(package) {
            Ok(elements) => elements,
            Err(e) => {
                log::warn!("First slide could not be read ({}), using empty fields", e);
                Vec::new()
            }
        };

        let blocks: Vec<TextBlock> = elements
            .iter()
            .filter_map(|element| match element {
                SlideElement::Text(block) => Some(block.clone()),
                SlideElement::Image(_) => None,
            })
            .collect();
        let slide_height = package.slide_size().map(|(_, cy)| cy);
        let ctx = SlideContext::new(&blocks, slide_height, name_hint);

        let mut photo = None;
        let mut name_block = None;
        let mut bullet_block = None;
        let mut other_blocks = Vec::new();
        for element in &elements {
            match (element.classify(&ctx), element) {
                (ElementKind::Image, SlideElement::Image(bytes)) if photo.is_none() => {
                    photo = Some(bytes.clone());
                }
                (ElementKind::NameBlock, SlideElement::Text(block)) if name_block.is_none() => {
                    name_block = Some(block);
                }
                (ElementKind::BulletBlock, SlideElement::Text(block)) if bullet_block.is_none() => {
                    bullet_block = Some(block);
                }
                (ElementKind::Unknown, SlideElement::Text(block)) => other_blocks.push(block),
                _ => {}
            }
        }

        let (display_name, mut role_line) = match name_block {
            Some(block) => classify::parse_name_block(block),
            None => {
                log::warn!("No name block found");
                (String::new(), String::new())
            }
        };
        if role_line.is_empty() {
            // Role and location may sit in their own text boxes
            role_line = classify::role_and_location(other_blocks);
            if !role_line.is_empty() {
                log::debug!("Role line from separate text boxes: {}", role_line);
            }
        }

        let bullets = match bullet_block {
            Some(block) => classify::bullet_lines(block),
            None => {
                log::warn!("No experience bullets found");
                Vec::new()
            }
        };
        if !bullets.is_empty() && bullets.len() < team_core::BULLET_COUNT {
            log::debug!("Only {} experience bullets, padding", bullets.len());
        }

        let record = ConsultantRecord::new(display_name, role_line, bullets);
        match photo {
            Some(photo) => record.with_photo(photo),
            None => {
                log::warn!("No headshot found");
                record
            }
        }
    }

    /// Pictures and non-blank text shapes of the first slide.
    ///
    /// Pictures whose media cannot be resolved are skipped.
    pub fn slide_elements(&self, package: &Package) -> Result<Vec<SlideElement>> {
        let slide = package.first_slide()?;
        let shapes = read_shapes(package.part_str(&slide)?)?;
        let rels = package.relationships(&slide)?;

        let mut elements = Vec::new();
        for shape in shapes {
            match shape.kind {
                ShapeKind::Picture => {
                    let media = shape
                        .embed
                        .as_deref()
                        .and_then(|id| rels.get(id))
                        .filter(|rel| !rel.external)
                        .and_then(|rel| package.part(&resolve_target(&slide, &rel.target)));
                    match media {
                        Some(bytes) => elements.push(SlideElement::Image(bytes.to_vec())),
                        None => log::debug!("Skipping picture {} without media", shape.ordinal),
                    }
                }
                ShapeKind::Shape => {
                    if let Some(text) = shape.text.filter(|t| !t.is_blank()) {
                        elements.push(SlideElement::Text(text));
                    }
                }
            }
        }

        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{cv, png, PptxFixture, SlideFixture};
    use team_core::Error;

    fn extract(bytes: &[u8], hint: Option<&str>) -> ConsultantRecord {
        let package = Package::from_bytes(bytes).unwrap();
        SlideFieldExtractor::new().extract_package(&package, hint)
    }

    #[test]
    fn test_extract_full_cv() {
        let photo = png(40, 30, [10, 20, 30]);
        let bytes = cv(
            "Gregor Ledebur, Partner, Vienna",
            &["Led a merger", "Built a team", "Cut costs", "Fourth item"],
            Some(photo.clone()),
        );

        let record = extract(&bytes, Some("Gregor Ledebur"));
        assert_eq!(record.display_name, "Gregor Ledebur");
        assert_eq!(record.role_line, "Partner, Vienna");
        assert_eq!(record.bullets, ["Led a merger", "Built a team", "Cut costs"].map(String::from));
        assert_eq!(record.photo, Some(photo));
    }

    #[test]
    fn test_few_bullets_are_padded() {
        let bytes = cv("Ada Byron, Manager", &["Only one"], None);
        let record = extract(&bytes, None);
        assert_eq!(record.bullets, ["Only one".to_string(), String::new(), String::new()]);
        assert!(record.photo.is_none());

        let none = extract(&cv("Ada Byron, Manager", &[], None), None);
        assert!(!none.has_bullets());
    }

    #[test]
    fn test_name_block_found_by_hint() {
        let bytes = cv("Jane Roe", &["One", "Two", "Three"], None);

        let record = extract(&bytes, Some("Jane Roe"));
        assert_eq!(record.display_name, "Jane Roe");
        assert!(record.role_line.is_empty());

        // Without the hint a single line is not recognizable as a name
        assert!(extract(&bytes, None).display_name.is_empty());
    }

    #[test]
    fn test_comma_first_bullet_below_name() {
        let bytes = PptxFixture::new()
            .slide(
                SlideFixture::new()
                    .text(2_400_000, 300_000, &[("Gregor Ledebur, Partner, Vienna", false)])
                    .text(
                        2_400_000,
                        2_500_000,
                        &[
                            ("Integration lead, Deutsche Bank", false),
                            ("Carve-out of a retail unit", false),
                            ("Pricing model for a telco", false),
                        ],
                    ),
            )
            .build();

        let record = extract(&bytes, Some("Gregor Ledebur"));
        assert_eq!(record.display_name, "Gregor Ledebur");
        assert_eq!(record.role_line, "Partner, Vienna");
        assert_eq!(
            record.bullets,
            [
                "Integration lead, Deutsche Bank",
                "Carve-out of a retail unit",
                "Pricing model for a telco",
            ]
            .map(String::from)
        );
    }

    #[test]
    fn test_unmarked_list_heading_is_not_a_bullet() {
        let bytes = PptxFixture::new()
            .slide(
                SlideFixture::new()
                    .text(2_400_000, 300_000, &[("Ada Byron, Manager", false)])
                    .text(
                        2_400_000,
                        2_500_000,
                        &[
                            ("Selected experience", false),
                            ("Led a merger", false),
                            ("Built a team", false),
                            ("Cut costs", false),
                        ],
                    ),
            )
            .build();

        let record = extract(&bytes, None);
        assert_eq!(record.bullets, ["Led a merger", "Built a team", "Cut costs"].map(String::from));
    }

    #[test]
    fn test_list_style_bullets_are_marked_items() {
        let bytes = PptxFixture::new()
            .slide(
                SlideFixture::new()
                    .text(2_400_000, 300_000, &[("Ada Byron, Manager", false)])
                    .list_text(
                        2_400_000,
                        2_500_000,
                        "Selected experience",
                        &["Led a merger", "Built a team", "Cut costs"],
                    ),
            )
            .build();

        let record = extract(&bytes, None);
        assert_eq!(record.bullets, ["Led a merger", "Built a team", "Cut costs"].map(String::from));
    }

    #[test]
    fn test_role_and_location_in_separate_boxes() {
        let bytes = PptxFixture::new()
            .slide(
                SlideFixture::new()
                    .text(2_400_000, 300_000, &[("Gregor Ledebur", false)])
                    .text(2_400_000, 700_000, &[("Senior Consultant", false)])
                    .text(2_400_000, 1_000_000, &[("Vienna", false)])
                    .text(
                        2_400_000,
                        2_500_000,
                        &[("Led a merger", true), ("Built a team", true), ("Cut costs", true)],
                    ),
            )
            .build();

        let record = extract(&bytes, Some("Gregor Ledebur"));
        assert_eq!(record.display_name, "Gregor Ledebur");
        assert_eq!(record.role_line, "Senior Consultant, Vienna");
        assert_eq!(record.bullets[2], "Cut costs");
    }

    #[test]
    fn test_instructional_placeholders_are_ignored() {
        let bytes = cv("Click to add text", &["Click to add text", "Lorem ipsum"], None);
        let record = extract(&bytes, Some("Jane Roe"));
        assert!(record.display_name.is_empty());
        assert!(!record.has_bullets());
    }

    #[test]
    fn test_uses_first_slide_in_presentation_order() {
        let bytes = PptxFixture::new()
            .slide(SlideFixture::new().text(0, 0, &[("Wrong Person, Analyst", false)]))
            .slide(SlideFixture::new().text(0, 0, &[("Right Person, Partner", false)]))
            .reverse_slide_order()
            .build();
        assert_eq!(extract(&bytes, None).display_name, "Right Person");
    }

    #[test]
    fn test_picture_without_media_is_skipped() {
        let bytes = PptxFixture::new()
            .slide(
                SlideFixture::new()
                    .picture(0, 0, 100, 100, "missing.png")
                    .picture(0, 0, 100, 100, "present.png"),
            )
            .media("present.png", vec![1, 2, 3])
            .build();
        let package = Package::from_bytes(&bytes).unwrap();

        let elements = SlideFieldExtractor::new().slide_elements(&package).unwrap();
        assert_eq!(elements, vec![SlideElement::Image(vec![1, 2, 3])]);
        assert_eq!(
            elements[0].classify(&SlideContext::default()),
            ElementKind::Image
        );
    }

    #[test]
    fn test_document_without_slides_degrades() {
        let record = extract(&PptxFixture::new().build(), Some("Jane Roe"));
        assert_eq!(record, ConsultantRecord::default());
    }

    #[test]
    fn test_extract_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Ada_Byron.pptx");
        std::fs::write(&path, cv("Ada Byron, Manager, Graz", &["One"], None)).unwrap();

        let extractor = SlideFieldExtractor::new();
        assert_eq!(extractor.extract(&path, None).unwrap().role_line, "Manager, Graz");
        assert!(matches!(
            extractor.extract(dir.path().join("missing.pptx"), None),
            Err(Error::Io(_))
        ));

        let broken = dir.path().join("broken.pptx");
        std::fs::write(&broken, b"not a zip").unwrap();
        assert!(matches!(extractor.extract(&broken, None), Err(Error::Zip(_))));
    }
}
