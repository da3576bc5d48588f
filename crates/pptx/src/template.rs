//! Team slide template: slot discovery and population.
//!
//! A template slot is addressed by its position among shapes of the same
//! kind on the first slide. Text slots are `p:sp` shapes with a text body,
//! image slots are `p:pic` shapes with an embedded picture. Population
//! streams the slide XML through unchanged except for the shapes bound to a
//! record, which are rebuilt in place.

use crate::package::{relative_target, resolve_target, Package, IMAGE_REL_TYPE};
use crate::shapes::{read_shapes, shape_kind, ShapeKind};
use crate::xml::{local_name, qualify, read_subtree, xml_err, Element};
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;
use team_core::{ConsultantRecord, Error, Frame, Result, SlotTable, QUADRANT_COUNT};
use team_imaging::ImageFitter;

/// Resolution used to turn frame extents into pixels.
pub const DEFAULT_DPI: u32 = 150;

const MEDIA_STEM: &str = "ppt/media/team_slot";

/// Bullet indentation (0.1875 in) used when the template paragraph has none.
const BULLET_INDENT_EMU: i64 = 171_450;

/// Character-level formatting forced onto one kind of run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStyle {
    /// RGB hex colour without `#`.
    pub color: String,

    /// Font size in hundredths of a point, used when the template run sets none.
    pub size: u32,

    #[serde(default)]
    pub bold: bool,

    #[serde(default)]
    pub italic: bool,
}

impl RunStyle {
    pub fn new(color: impl Into<String>, size: u32) -> Self {
        Self {
            color: color.into(),
            size,
            bold: false,
            italic: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }
}

/// Styles for the three kinds of text written into a text slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotStyles {
    pub name: RunStyle,
    pub role: RunStyle,
    pub bullet: RunStyle,
    pub bullet_char: String,
}

impl Default for SlotStyles {
    fn default() -> Self {
        Self {
            name: RunStyle::new("000000", 1400).bold(),
            role: RunStyle::new("404040", 1000).italic(),
            bullet: RunStyle::new("202020", 900),
            bullet_char: "•".to_string(),
        }
    }
}

/// A text slot of the template.
#[derive(Debug, Clone, Serialize)]
pub struct TextSlotInfo {
    pub index: usize,
    #[serde(skip)]
    pub ordinal: usize,
    pub x: i64,
    pub y: i64,
    /// Current paragraph texts.
    pub paragraphs: Vec<String>,
}

/// An image slot of the template.
#[derive(Debug, Clone, Serialize)]
pub struct ImageSlotInfo {
    pub index: usize,
    #[serde(skip)]
    pub ordinal: usize,
    pub rel_id: String,
    /// Media part the slot currently shows.
    pub media: Option<String>,
    pub x: i64,
    pub y: i64,
    /// Frame size in EMU.
    pub extent: Option<(i64, i64)>,
}

/// The slots found on a template's first slide.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateLayout {
    pub slide: String,
    pub text_slots: Vec<TextSlotInfo>,
    pub image_slots: Vec<ImageSlotInfo>,
}

impl TemplateLayout {
    /// Discover the slots of a package's first slide.
    pub fn discover(package: &Package) -> Result<Self> {
        let slide = package.first_slide()?;
        let shapes = read_shapes(package.part_str(&slide)?)?;
        let rels = package.relationships(&slide)?;

        let mut text_slots = Vec::new();
        let mut image_slots = Vec::new();
        for shape in shapes {
            match (shape.kind, shape.text, shape.embed) {
                (ShapeKind::Shape, Some(text), _) => text_slots.push(TextSlotInfo {
                    index: text_slots.len(),
                    ordinal: shape.ordinal,
                    x: shape.x,
                    y: shape.y,
                    paragraphs: text.paragraphs.into_iter().map(|p| p.text).collect(),
                }),
                (ShapeKind::Picture, _, Some(rel_id)) => {
                    let media = rels
                        .get(&rel_id)
                        .filter(|rel| !rel.external)
                        .map(|rel| resolve_target(&slide, &rel.target));
                    image_slots.push(ImageSlotInfo {
                        index: image_slots.len(),
                        ordinal: shape.ordinal,
                        rel_id,
                        media,
                        x: shape.x,
                        y: shape.y,
                        extent: shape.extent,
                    });
                }
                _ => {}
            }
        }

        log::debug!(
            "Template slide {} has {} text and {} image slots",
            slide,
            text_slots.len(),
            image_slots.len()
        );

        Ok(Self {
            slide,
            text_slots,
            image_slots,
        })
    }
}

/// Read the slot layout of template bytes.
pub fn inspect_template(bytes: &[u8]) -> Result<TemplateLayout> {
    let package = open_template(bytes)?;
    TemplateLayout::discover(&package).map_err(corrupt)
}

fn open_template(bytes: &[u8]) -> Result<Package> {
    Package::from_bytes(bytes).map_err(corrupt)
}

fn corrupt(e: Error) -> Error {
    match e {
        Error::Zip(msg) | Error::Xml(msg) | Error::PptxParse(msg) => Error::TemplateCorrupt(msg),
        other => other,
    }
}

/// Change applied to one shape of the slide.
enum SlotEdit<'a> {
    Text(&'a ConsultantRecord),
    Image { rel_id: String },
}

/// Writes consultant records into the slots of a team slide template.
#[derive(Debug, Clone)]
pub struct TemplatePopulator {
    slots: SlotTable,
    styles: SlotStyles,
    fitter: ImageFitter,
    dpi: u32,
}

impl Default for TemplatePopulator {
    fn default() -> Self {
        Self {
            slots: SlotTable::default(),
            styles: SlotStyles::default(),
            fitter: ImageFitter::new(),
            dpi: DEFAULT_DPI,
        }
    }
}

impl TemplatePopulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slots(mut self, slots: SlotTable) -> Self {
        self.slots = slots;
        self
    }

    pub fn with_styles(mut self, styles: SlotStyles) -> Self {
        self.styles = styles;
        self
    }

    pub fn with_fitter(mut self, fitter: ImageFitter) -> Self {
        self.fitter = fitter;
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi.max(1);
        self
    }

    /// Fill the first `records.len()` quadrants of the template and return
    /// the new document. Remaining quadrants keep the template content.
    pub fn populate(&self, template: &[u8], records: &[ConsultantRecord]) -> Result<Vec<u8>> {
        if records.len() > QUADRANT_COUNT {
            return Err(Error::InvalidRequest(format!(
                "at most {} records fit on a team slide, got {}",
                QUADRANT_COUNT,
                records.len()
            )));
        }

        let mut package = open_template(template)?;
        let layout = TemplateLayout::discover(&package).map_err(corrupt)?;
        self.slots
            .validate(layout.text_slots.len(), layout.image_slots.len())?;

        let slide = layout.slide.as_str();
        let mut rels = package.relationships(slide).map_err(corrupt)?;
        let mut edits: BTreeMap<usize, SlotEdit> = BTreeMap::new();

        for (quadrant, (slots, record)) in self.slots.quadrants().iter().zip(records).enumerate() {
            let text_slot = &layout.text_slots[slots.text];
            edits.insert(text_slot.ordinal, SlotEdit::Text(record));

            let image_slot = &layout.image_slots[slots.image];
            let (cx, cy) = image_slot.extent.ok_or_else(|| {
                Error::TemplateCorrupt(format!("image slot {} has no size", image_slot.index))
            })?;
            let frame = Frame::checked_from_emu(cx, cy, self.dpi)?;
            let png = self.fitter.fit_or_placeholder(record.photo.as_deref(), frame)?;

            // New part per slot, the template may share one picture across slots
            let media = package.unused_part_name(MEDIA_STEM, "png");
            package.set_part(&media, png);
            let rel_id = rels.add(IMAGE_REL_TYPE, &relative_target(slide, &media));
            edits.insert(image_slot.ordinal, SlotEdit::Image { rel_id });

            log::debug!(
                "Quadrant {}: '{}' into text slot {}, {}x{} photo into image slot {}",
                quadrant + 1,
                record.display_name,
                slots.text,
                frame.width,
                frame.height,
                slots.image
            );
        }

        if !records.is_empty() {
            package.set_relationships(slide, &rels)?;
            package.ensure_default_content_type("png", "image/png").map_err(corrupt)?;
        }

        let xml = rewrite_slide(package.part_str(slide)?, &edits, &self.styles).map_err(corrupt)?;
        package.set_part(slide, xml);

        log::info!("Populated {} of {} quadrants", records.len(), QUADRANT_COUNT);
        package.to_bytes()
    }
}

/// Stream a slide, rebuilding the shapes that have an edit.
fn rewrite_slide(xml: &str, edits: &BTreeMap<usize, SlotEdit>, styles: &SlotStyles) -> Result<Vec<u8>> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut ordinal = 0;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) if shape_kind(local_name(e.name().as_ref())).is_some() => {
                let edit = edits.get(&ordinal);
                ordinal += 1;
                match edit {
                    Some(edit) => {
                        let mut shape = read_subtree(&mut reader, e)?;
                        match edit {
                            SlotEdit::Text(record) => fill_text_body(&mut shape, record, styles)?,
                            SlotEdit::Image { rel_id } => repoint_picture(&mut shape, rel_id)?,
                        }
                        shape.write_to(&mut writer)?;
                    }
                    None => writer.write_event(Event::Start(e)).map_err(xml_err)?,
                }
            }
            Event::Eof => break,
            event => writer.write_event(event).map_err(xml_err)?,
        }
    }

    Ok(writer.into_inner().into_inner())
}

/// Replace the paragraphs of a shape's text body with a record's fields.
///
/// `a:bodyPr` and `a:lstStyle` stay as they are. Template paragraphs 0, 1
/// and 2 provide the formatting of name, role and bullets.
fn fill_text_body(shape: &mut Element, record: &ConsultantRecord, styles: &SlotStyles) -> Result<()> {
    let body = shape
        .child_mut(b"txBody")
        .ok_or_else(|| Error::TemplateCorrupt("text slot without text body".to_string()))?;

    let mut templates: Vec<Element> = body.children_named(b"p").cloned().collect();
    if templates.is_empty() {
        templates.push(Element::named("a:p"));
    }
    let template = |idx: usize| &templates[idx.min(templates.len() - 1)];

    let mut paragraphs = vec![
        styled_paragraph(template(0), &record.display_name, &styles.name, None),
        styled_paragraph(template(1), &record.role_line, &styles.role, None),
    ];
    for bullet in &record.bullets {
        paragraphs.push(styled_paragraph(
            template(2),
            bullet,
            &styles.bullet,
            Some(&styles.bullet_char),
        ));
    }

    body.remove_children(&[b"p"]);
    for paragraph in paragraphs {
        body.push(paragraph);
    }
    Ok(())
}

/// A paragraph with the template paragraph's properties and one styled run.
fn styled_paragraph(template: &Element, text: &str, style: &RunStyle, bullet: Option<&str>) -> Element {
    let prefix = template.prefix();
    let q = |local: &str| qualify(prefix.as_deref(), local);

    let mut paragraph = Element::new(template.start.clone());

    let mut ppr = template.child(b"pPr").cloned();
    if let Some(bullet) = bullet {
        let ppr = ppr.get_or_insert_with(|| Element::named(q("pPr")));
        set_bullet(ppr, bullet, prefix.as_deref());
    }
    if let Some(ppr) = ppr {
        paragraph.push(ppr);
    }

    let mut rpr = template
        .children_named(b"r")
        .find_map(|run| run.child(b"rPr"))
        .cloned()
        .or_else(|| template.child(b"endParaRPr").map(|end| end.renamed(q("rPr"))))
        .unwrap_or_else(|| Element::named(q("rPr")));
    apply_run_style(&mut rpr, style, prefix.as_deref());

    if !text.is_empty() {
        let mut t = Element::named(q("t"));
        t.push_text(text);
        let mut run = Element::named(q("r"));
        run.push(rpr.clone());
        run.push(t);
        paragraph.push(run);
    }
    paragraph.push(rpr.renamed(q("endParaRPr")));

    paragraph
}

/// Force colour, weight and slant onto run properties.
fn apply_run_style(rpr: &mut Element, style: &RunStyle, prefix: Option<&str>) {
    if style.bold {
        rpr.set_attr("b", "1");
    }
    if style.italic {
        rpr.set_attr("i", "1");
    }
    if !rpr.has_attr("sz") {
        rpr.set_attr("sz", &style.size.to_string());
    }

    rpr.remove_children(&[
        b"noFill",
        b"solidFill",
        b"gradFill",
        b"blipFill",
        b"pattFill",
        b"grpFill",
    ]);
    let mut color = Element::named(qualify(prefix, "srgbClr"));
    color.set_attr("val", &style.color);
    let mut fill = Element::named(qualify(prefix, "solidFill"));
    fill.push(color);

    // The fill follows the outline and precedes everything else
    let at = rpr.position_of(&[b"ln"]).map_or(0, |idx| idx + 1);
    rpr.insert(at, fill);
}

/// Give paragraph properties a character bullet.
fn set_bullet(ppr: &mut Element, bullet: &str, prefix: Option<&str>) {
    ppr.remove_children(&[b"buNone", b"buAutoNum", b"buChar", b"buBlip"]);

    let mut bu_char = Element::named(qualify(prefix, "buChar"));
    bu_char.set_attr("char", bullet);
    let at = ppr
        .position_of(&[b"tabLst", b"defRPr", b"extLst"])
        .unwrap_or(ppr.children.len());
    ppr.insert(at, bu_char);

    if !ppr.has_attr("marL") {
        ppr.set_attr("marL", &BULLET_INDENT_EMU.to_string());
    }
    if !ppr.has_attr("indent") {
        ppr.set_attr("indent", &(-BULLET_INDENT_EMU).to_string());
    }
}

/// Point a picture at another image relationship and drop its crop.
fn repoint_picture(shape: &mut Element, rel_id: &str) -> Result<()> {
    let blip = shape
        .descendant_mut(b"blip")
        .ok_or_else(|| Error::TemplateCorrupt("image slot without picture".to_string()))?;
    let key = blip.attr_key(b"embed").unwrap_or_else(|| "r:embed".to_string());
    blip.set_attr(&key, rel_id);

    if let Some(fill) = shape.descendant_mut(b"blipFill") {
        fill.remove_children(&[b"srcRect"]);
    }
    Ok(())
}
