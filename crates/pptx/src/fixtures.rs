//! In-memory `.pptx` builders for tests.
//!
//! The packages are minimal (no masters or layouts) but structurally what
//! the reader and populator expect: content types, presentation part with a
//! slide id list, slides with relationships, and media parts.

use quick_xml::escape::escape;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

/// One slide under construction.
#[derive(Debug, Clone, Default)]
pub struct SlideFixture {
    shapes: Vec<String>,
    images: Vec<(String, String)>,
}

impl SlideFixture {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> usize {
        self.shapes.len() + 2
    }

    /// Text shape with `(text, bulleted)` paragraphs.
    pub fn text(self, x: i64, y: i64, paragraphs: &[(&str, bool)]) -> Self {
        let body: String = paragraphs
            .iter()
            .map(|(text, bulleted)| paragraph(text, *bulleted))
            .collect();
        self.raw_text(x, y, &body)
    }

    /// Text shape with a hand-written paragraph body.
    pub fn raw_text(self, x: i64, y: i64, paragraphs_xml: &str) -> Self {
        self.text_shape(x, y, "<a:lstStyle/>", paragraphs_xml)
    }

    /// Text shape whose list style bullets every paragraph, with a heading
    /// paragraph that turns the bullet off.
    pub fn list_text(self, x: i64, y: i64, heading: &str, items: &[&str]) -> Self {
        let list_style = r#"<a:lstStyle><a:lvl1pPr marL="171450" indent="-171450"><a:buFont typeface="Arial"/><a:buChar char="&#8226;"/></a:lvl1pPr></a:lstStyle>"#;
        let mut body = format!(
            r#"<a:p><a:pPr marL="0" indent="0"><a:buNone/></a:pPr><a:r><a:rPr lang="en-US"/><a:t>{}</a:t></a:r></a:p>"#,
            escape(heading)
        );
        for item in items {
            body.push_str(&paragraph(item, false));
        }
        self.text_shape(x, y, list_style, &body)
    }

    fn text_shape(mut self, x: i64, y: i64, list_style: &str, paragraphs_xml: &str) -> Self {
        let id = self.next_id();
        self.shapes.push(format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Text {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="4000000" cy="1000000"/></a:xfrm></p:spPr><p:txBody><a:bodyPr wrap="square"/>{list_style}{paragraphs_xml}</p:txBody></p:sp>"#
        ));
        self
    }

    /// Picture shape showing `media` (a part name under `ppt/media/`).
    pub fn picture(mut self, x: i64, y: i64, cx: i64, cy: i64, media: &str) -> Self {
        let id = self.next_id();
        let rid = format!("rId{}", self.images.len() + 2);
        self.shapes.push(format!(
            r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{rid}"/><a:srcRect l="10000" r="10000"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#
        ));
        self.images.push((rid, media.to_string()));
        self
    }

    /// Shape without text, e.g. a decorative rectangle.
    pub fn decoration(mut self) -> Self {
        let id = self.next_id();
        self.shapes.push(format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Rect {id}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:sp>"#
        ));
        self
    }

    fn xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld></p:sld>"#,
            self.shapes.concat()
        )
    }

    fn rels(&self) -> String {
        let mut rels = String::from(
            r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>"#,
        );
        for (rid, media) in &self.images {
            rels.push_str(&format!(
                r#"<Relationship Id="{rid}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/{media}"/>"#
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
        )
    }
}

/// A plain or bulleted paragraph.
pub fn paragraph(text: &str, bulleted: bool) -> String {
    let ppr = if bulleted {
        r#"<a:pPr marL="171450" indent="-171450"><a:buFont typeface="Arial"/><a:buChar char="&#8226;"/></a:pPr>"#
    } else {
        ""
    };
    if text.is_empty() {
        return format!(r#"<a:p>{ppr}<a:endParaRPr lang="en-US"/></a:p>"#);
    }
    format!(
        r#"<a:p>{ppr}<a:r><a:rPr lang="en-US" dirty="0"/><a:t>{}</a:t></a:r></a:p>"#,
        escape(text)
    )
}

/// A whole presentation under construction.
#[derive(Debug, Clone, Default)]
pub struct PptxFixture {
    slides: Vec<SlideFixture>,
    media: Vec<(String, Vec<u8>)>,
    reversed: bool,
}

impl PptxFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slide(mut self, slide: SlideFixture) -> Self {
        self.slides.push(slide);
        self
    }

    /// Add a media part under `ppt/media/`.
    pub fn media(mut self, name: &str, bytes: Vec<u8>) -> Self {
        self.media.push((name.to_string(), bytes));
        self
    }

    /// List slides in `sldIdLst` in reverse part order.
    pub fn reverse_slide_order(mut self) -> Self {
        self.reversed = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        let mut add = |name: &str, content: &[u8]| {
            writer.start_file(name, options).unwrap();
            writer.write_all(content).unwrap();
        };

        let overrides: String = (1..=self.slides.len())
            .map(|n| format!(r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#))
            .collect();
        add(
            "[Content_Types].xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>{overrides}</Types>"#
            )
            .as_bytes(),
        );
        add(
            "_rels/.rels",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#,
        );

        let mut order: Vec<usize> = (1..=self.slides.len()).collect();
        if self.reversed {
            order.reverse();
        }
        let ids: String = order
            .iter()
            .enumerate()
            .map(|(idx, n)| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + idx, n + 1))
            .collect();
        add(
            "ppt/presentation.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation {NS}><p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="12192000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
            )
            .as_bytes(),
        );

        let slide_rels: String = (1..=self.slides.len())
            .map(|n| format!(r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{n}.xml"/>"#, n + 1))
            .collect();
        add(
            "ppt/_rels/presentation.xml.rels",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{slide_rels}</Relationships>"#
            )
            .as_bytes(),
        );

        for (idx, slide) in self.slides.iter().enumerate() {
            let n = idx + 1;
            add(&format!("ppt/slides/slide{n}.xml"), slide.xml().as_bytes());
            add(&format!("ppt/slides/_rels/slide{n}.xml.rels"), slide.rels().as_bytes());
        }
        for (name, bytes) in &self.media {
            add(&format!("ppt/media/{name}"), bytes);
        }

        writer.finish().unwrap().into_inner()
    }
}

/// Solid-colour PNG of the given size.
pub fn png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    team_imaging::fit::solid_png(width, height, rgb).unwrap()
}

/// A single-slide CV: photo top-left, "name line" block, experience list.
pub fn cv(name_line: &str, bullets: &[&str], photo: Option<Vec<u8>>) -> Vec<u8> {
    let bullet_paragraphs: Vec<(&str, bool)> = std::iter::once(("Selected experience", false))
        .chain(bullets.iter().map(|b| (*b, true)))
        .collect();

    let mut slide = SlideFixture::new();
    let mut fixture = PptxFixture::new();
    if let Some(photo) = photo {
        slide = slide.picture(300_000, 300_000, 1_800_000, 2_400_000, "image1.png");
        fixture = fixture.media("image1.png", photo);
    }
    slide = slide
        .text(2_400_000, 300_000, &[(name_line, false)])
        .text(2_400_000, 2_500_000, &bullet_paragraphs)
        .text(300_000, 6_300_000, &[("Confidential", false)]);

    fixture.slide(slide).build()
}

/// Template text slot: styled name, role and bullet placeholder paragraphs.
pub const TEMPLATE_SLOT_BODY: &str = concat!(
    r#"<a:p><a:pPr algn="l"/><a:r><a:rPr lang="en-US" sz="1400" b="0"><a:solidFill><a:schemeClr val="accent1"/></a:solidFill><a:latin typeface="Georgia"/></a:rPr><a:t>Consultant Name</a:t></a:r></a:p>"#,
    r#"<a:p><a:r><a:rPr lang="en-US" sz="1000"><a:latin typeface="Georgia"/></a:rPr><a:t>Role, Location</a:t></a:r></a:p>"#,
    r#"<a:p><a:pPr marL="171450" indent="-171450"><a:buFont typeface="Arial"/><a:buChar char="-"/><a:defRPr/></a:pPr><a:r><a:rPr lang="en-US"><a:latin typeface="Calibri"/></a:rPr><a:t>Experience bullet</a:t></a:r></a:p>"#,
);

/// Placeholder photo size of the team template (2 x 2.5 inches).
pub const TEMPLATE_FRAME_EMU: (i64, i64) = (1_828_800, 2_286_000);

/// The 2x2 team template: four picture/text pairs followed by a footer.
///
/// All four pictures share `ppt/media/image1.png`.
pub fn team_template() -> Vec<u8> {
    let (cx, cy) = TEMPLATE_FRAME_EMU;
    let positions = [
        (457_200, 457_200),
        (6_324_600, 457_200),
        (457_200, 3_657_600),
        (6_324_600, 3_657_600),
    ];

    let mut slide = SlideFixture::new();
    for (x, y) in positions {
        slide = slide
            .picture(x, y, cx, cy, "image1.png")
            .raw_text(x + cx + 182_880, y, TEMPLATE_SLOT_BODY);
    }
    slide = slide.decoration().text(457_200, 6_400_000, &[("Team overview", false)]);

    PptxFixture::new()
        .slide(slide)
        .media("image1.png", png(8, 10, [0x80, 0x80, 0x80]))
        .build()
}
