//! Shape-level reading of slide XML.

use crate::package::attr_i64;
use crate::xml::local_name;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use team_core::{Error, Paragraph, Result, TextBlock};

/// Whether a shape element is a plain shape (`p:sp`) or a picture (`p:pic`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Shape,
    Picture,
}

/// A shape on a slide.
#[derive(Debug, Clone)]
pub struct Shape {
    /// Position among all `p:sp`/`p:pic` elements of the slide, in document order.
    pub ordinal: usize,

    pub kind: ShapeKind,

    /// Offset in EMU (0 when the shape inherits it from its layout).
    pub x: i64,
    pub y: i64,

    /// Size in EMU, if the shape declares one.
    pub extent: Option<(i64, i64)>,

    /// Text body, for shapes that have one.
    pub text: Option<TextBlock>,

    /// Relationship id of the shape's picture or picture fill.
    pub embed: Option<String>,
}

impl Shape {
    fn new(ordinal: usize, kind: ShapeKind) -> Self {
        Self {
            ordinal,
            kind,
            x: 0,
            y: 0,
            extent: None,
            text: None,
            embed: None,
        }
    }
}

/// Whether a local name opens a shape element counted by [`Shape::ordinal`].
pub(crate) fn shape_kind(local: &[u8]) -> Option<ShapeKind> {
    match local {
        b"sp" => Some(ShapeKind::Shape),
        b"pic" => Some(ShapeKind::Picture),
        _ => None,
    }
}

/// Text body state while reading a shape.
#[derive(Debug, Default)]
struct TextState {
    in_body: bool,
    in_text: bool,
    /// Inside the list style's first level (`a:lstStyle/a:lvl1pPr`).
    in_list_level1: bool,
    /// Bullet setting paragraphs inherit from the list style.
    list_bullet: bool,
    paragraph: Option<Paragraph>,
}

impl TextState {
    fn start_paragraph(&self) -> Paragraph {
        Paragraph {
            text: String::new(),
            bulleted: self.list_bullet,
        }
    }

    fn set_bullet(&mut self, on: bool) {
        if let Some(p) = self.paragraph.as_mut() {
            p.bulleted = on;
        } else if self.in_list_level1 {
            self.list_bullet = on;
        }
    }
}

/// Read every shape of a slide in document order.
pub fn read_shapes(xml: &str) -> Result<Vec<Shape>> {
    let mut reader = Reader::from_str(xml);
    let mut shapes = Vec::new();

    let mut ordinal = 0;
    let mut current: Option<Shape> = None;
    let mut offset_seen = false;
    let mut state = TextState::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                if let Some(kind) = shape_kind(local) {
                    if current.is_none() {
                        current = Some(Shape::new(ordinal, kind));
                        offset_seen = false;
                        state = TextState::default();
                    }
                    ordinal += 1;
                    continue;
                }

                let Some(shape) = current.as_mut() else {
                    continue;
                };
                match local {
                    b"txBody" => {
                        state.in_body = true;
                        shape.text.get_or_insert_with(TextBlock::default);
                    }
                    b"lvl1pPr" if state.in_body && state.paragraph.is_none() => {
                        state.in_list_level1 = true;
                    }
                    b"p" if state.in_body => state.paragraph = Some(state.start_paragraph()),
                    b"t" if state.paragraph.is_some() => state.in_text = true,
                    _ => read_shape_attributes(shape, e, local, &mut offset_seen, &mut state),
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                let Some(shape) = current.as_mut() else {
                    continue;
                };

                match local {
                    b"p" if state.in_body => {
                        let empty = state.start_paragraph();
                        if let Some(text) = shape.text.as_mut() {
                            text.paragraphs.push(empty);
                        }
                    }
                    b"br" => {
                        // A soft line break reads as its own line
                        if let (Some(done), Some(text)) = (state.paragraph.take(), shape.text.as_mut()) {
                            state.paragraph = Some(Paragraph {
                                text: String::new(),
                                bulleted: done.bulleted,
                            });
                            text.paragraphs.push(done);
                        }
                    }
                    _ => read_shape_attributes(shape, e, local, &mut offset_seen, &mut state),
                }
            }
            Ok(Event::Text(ref e)) => {
                if state.in_text {
                    if let Some(p) = state.paragraph.as_mut() {
                        p.text.push_str(&e.unescape().unwrap_or_default());
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                match local {
                    b"t" => state.in_text = false,
                    b"lvl1pPr" => state.in_list_level1 = false,
                    b"p" => {
                        if let (Some(done), Some(shape)) = (state.paragraph.take(), current.as_mut()) {
                            if let Some(text) = shape.text.as_mut() {
                                text.paragraphs.push(done);
                            }
                        }
                    }
                    b"txBody" => state = TextState::default(),
                    _ if shape_kind(local).is_some() => {
                        if let Some(mut shape) = current.take() {
                            if let Some(text) = shape.text.as_mut() {
                                text.x = shape.x;
                                text.y = shape.y;
                            }
                            shapes.push(shape);
                        }
                        state = TextState::default();
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!("Error parsing slide: {}", e)));
            }
            _ => {}
        }
    }

    Ok(shapes)
}

/// Geometry, bullet and picture attributes of elements inside a shape.
///
/// Bullets set in the list style's first level apply to every paragraph
/// that does not override them.
fn read_shape_attributes(
    shape: &mut Shape,
    e: &BytesStart,
    local: &[u8],
    offset_seen: &mut bool,
    state: &mut TextState,
) {
    match local {
        b"off" if !*offset_seen => {
            shape.x = attr_i64(e, b"x").unwrap_or(0);
            shape.y = attr_i64(e, b"y").unwrap_or(0);
            *offset_seen = true;
        }
        // `a:ext` is also used for extension lists, which carry no cx
        b"ext" if shape.extent.is_none() => {
            if let (Some(cx), Some(cy)) = (attr_i64(e, b"cx"), attr_i64(e, b"cy")) {
                shape.extent = Some((cx, cy));
            }
        }
        b"buChar" | b"buAutoNum" | b"buBlip" => state.set_bullet(true),
        b"buNone" => state.set_bullet(false),
        b"blip" if shape.embed.is_none() => {
            shape.embed = e
                .attributes()
                .flatten()
                .find(|a| local_name(a.key.as_ref()) == b"embed")
                .map(|a| String::from_utf8_lossy(&a.value).to_string());
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <p:cSld><p:spTree>
    <p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>
    <p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/></a:xfrm></p:grpSpPr>
    <p:pic>
      <p:nvPicPr><p:cNvPr id="2" name="Photo"><a:extLst><a:ext uri="{ABC}"/></a:extLst></p:cNvPr><p:cNvPicPr/><p:nvPr/></p:nvPicPr>
      <p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>
      <p:spPr><a:xfrm><a:off x="100" y="200"/><a:ext cx="1828800" cy="2286000"/></a:xfrm></p:spPr>
    </p:pic>
    <p:sp>
      <p:nvSpPr><p:cNvPr id="3" name="Name"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>
      <p:spPr><a:xfrm><a:off x="2000000" y="300"/><a:ext cx="10" cy="10"/></a:xfrm></p:spPr>
      <p:txBody><a:bodyPr/><a:lstStyle><a:lvl2pPr><a:buChar char="x"/></a:lvl2pPr></a:lstStyle>
        <a:p><a:r><a:rPr lang="en-US"/><a:t>Gregor </a:t></a:r><a:r><a:t>Ledebur, Partner</a:t></a:r></a:p>
        <a:p><a:r><a:t>Vienna</a:t></a:r><a:br/><a:r><a:t>Austria</a:t></a:r></a:p>
      </p:txBody>
    </p:sp>
    <p:sp>
      <p:nvSpPr><p:cNvPr id="4" name="Bullets"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>
      <p:spPr/>
      <p:txBody><a:bodyPr/>
        <a:p><a:pPr><a:buChar char="&#8226;"/></a:pPr><a:r><a:t>Led &amp; delivered</a:t></a:r></a:p>
        <a:p><a:pPr><a:buNone/></a:pPr><a:r><a:t>Plain</a:t></a:r></a:p>
        <a:p/>
      </p:txBody>
    </p:sp>
    <p:sp><p:nvSpPr><p:cNvPr id="5" name="Box"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/></p:sp>
    <p:sp>
      <p:nvSpPr><p:cNvPr id="6" name="Styled list"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>
      <p:spPr/>
      <p:txBody><a:bodyPr/><a:lstStyle><a:lvl1pPr marL="171450"><a:buChar char="&#8226;"/></a:lvl1pPr></a:lstStyle>
        <a:p><a:pPr><a:buNone/></a:pPr><a:r><a:t>Selected experience</a:t></a:r></a:p>
        <a:p><a:r><a:t>Led a merger</a:t></a:r></a:p>
        <a:p><a:r><a:t>Built a team</a:t></a:r><a:br/><a:r><a:t>in Vienna</a:t></a:r></a:p>
      </p:txBody>
    </p:sp>
  </p:spTree></p:cSld>
</p:sld>"#;

    #[test]
    fn test_read_shapes_order_and_kinds() {
        let shapes = read_shapes(SLIDE).unwrap();
        assert_eq!(shapes.len(), 5);
        assert_eq!(
            shapes.iter().map(|s| (s.ordinal, s.kind)).collect::<Vec<_>>(),
            vec![
                (0, ShapeKind::Picture),
                (1, ShapeKind::Shape),
                (2, ShapeKind::Shape),
                (3, ShapeKind::Shape),
                (4, ShapeKind::Shape),
            ]
        );
        assert!(shapes[3].text.is_none());
    }

    #[test]
    fn test_picture_geometry_and_embed() {
        let shapes = read_shapes(SLIDE).unwrap();
        let pic = &shapes[0];
        assert_eq!(pic.embed.as_deref(), Some("rId2"));
        assert_eq!((pic.x, pic.y), (100, 200));
        assert_eq!(pic.extent, Some((1_828_800, 2_286_000)));
    }

    #[test]
    fn test_text_runs_and_line_breaks() {
        let shapes = read_shapes(SLIDE).unwrap();
        let text = shapes[1].text.as_ref().unwrap();
        assert_eq!(text.lines(), vec!["Gregor Ledebur, Partner", "Vienna", "Austria"]);
        assert_eq!((text.x, text.y), (2_000_000, 300));
        // Only the first list level bullets top-level paragraphs
        assert!(text.paragraphs.iter().all(|p| !p.bulleted));
    }

    #[test]
    fn test_list_style_bullets() {
        let shapes = read_shapes(SLIDE).unwrap();
        let text = shapes[4].text.as_ref().unwrap();
        assert_eq!(
            text.paragraphs,
            vec![
                Paragraph::new("Selected experience"),
                Paragraph::bulleted("Led a merger"),
                Paragraph::bulleted("Built a team"),
                Paragraph::bulleted("in Vienna"),
            ]
        );

        // The list style of one shape does not leak into the next
        let bullets = shapes[2].text.as_ref().unwrap();
        assert!(!bullets.paragraphs[1].bulleted);
    }

    #[test]
    fn test_bullet_flags() {
        let shapes = read_shapes(SLIDE).unwrap();
        let text = shapes[2].text.as_ref().unwrap();
        assert_eq!(
            text.paragraphs,
            vec![
                Paragraph::bulleted("Led & delivered"),
                Paragraph::new("Plain"),
                Paragraph::new(""),
            ]
        );
        assert_eq!(shapes[2].extent, None);
    }

    #[test]
    fn test_malformed_xml() {
        assert!(read_shapes("<p:sld><p:sp></p:pic></p:sld>").is_err());
    }
}
