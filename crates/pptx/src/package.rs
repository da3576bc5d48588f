//! In-memory PPTX package: the ZIP parts, their relationships, and slide order.

use crate::xml::{local_name, xml_err};
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use team_core::{Error, Result};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";
const PRESENTATION_PATH: &str = "ppt/presentation.xml";
const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Relationship type of embedded pictures.
pub const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// A PPTX package held in memory, parts in archive order.
///
/// Every request works on its own `Package`, so the file it came from is
/// never modified.
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    /// Read a package from a file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read a package from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    /// Read every part of the archive.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| Error::Zip(format!("Failed to open ZIP: {}", e)))?;

        let mut parts = Vec::with_capacity(archive.len());
        for idx in 0..archive.len() {
            let mut file = archive
                .by_index(idx)
                .map_err(|e| Error::Zip(format!("Failed to read entry {}: {}", idx, e)))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut content = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut content)
                .map_err(|e| Error::Zip(format!("Failed to read '{}': {}", name, e)))?;
            parts.push((name, content));
        }

        Ok(Self { parts })
    }

    /// Serialize the package back into a ZIP archive.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, content) in &self.parts {
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| Error::Zip(format!("Failed to add '{}': {}", name, e)))?;
            writer.write_all(content)?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| Error::Zip(format!("Failed to finish ZIP: {}", e)))?;
        Ok(cursor.into_inner())
    }

    /// Raw bytes of a part.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, content)| content.as_slice())
    }

    /// A part decoded as UTF-8 text.
    pub fn part_str(&self, name: &str) -> Result<&str> {
        let content = self
            .part(name)
            .ok_or_else(|| Error::PptxParse(format!("Part not found in archive: '{}'", name)))?;
        std::str::from_utf8(content)
            .map_err(|e| Error::PptxParse(format!("Part '{}' is not UTF-8: {}", name, e)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.part(name).is_some()
    }

    /// Replace a part, or append it if it does not exist yet.
    pub fn set_part(&mut self, name: &str, content: Vec<u8>) {
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = content,
            None => self.parts.push((name.to_string(), content)),
        }
    }

    /// Part names in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(n, _)| n.as_str())
    }

    /// A part name of the form `{stem}{n}.{ext}` not yet used in the package.
    pub fn unused_part_name(&self, stem: &str, ext: &str) -> String {
        (1..)
            .map(|n| format!("{}{}.{}", stem, n, ext))
            .find(|name| !self.contains(name))
            .unwrap_or_else(|| format!("{}.{}", stem, ext))
    }

    /// Slide part paths in presentation order.
    ///
    /// Uses the `sldIdLst` of `presentation.xml`; when that is unusable,
    /// falls back to the numbering of the slide relationships.
    pub fn slide_paths(&self) -> Result<Vec<String>> {
        let rels = self.relationships(PRESENTATION_PATH)?;

        if let Ok(xml) = self.part_str(PRESENTATION_PATH) {
            let ids = slide_id_list(xml)?;
            let ordered: Vec<String> = ids
                .iter()
                .filter_map(|id| rels.get(id))
                .map(|rel| resolve_target(PRESENTATION_PATH, &rel.target))
                .collect();
            if !ordered.is_empty() {
                return Ok(ordered);
            }
        }

        let mut slides: Vec<(String, Option<usize>)> = rels
            .iter()
            .filter(|rel| is_slide_rel_type(&rel.rel_type))
            .map(|rel| {
                let order = extract_slide_number(&rel.id).or_else(|| extract_slide_number(&rel.target));
                (resolve_target(PRESENTATION_PATH, &rel.target), order)
            })
            .collect();

        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });

        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }

    /// Path of the first slide.
    pub fn first_slide(&self) -> Result<String> {
        self.slide_paths()?
            .into_iter()
            .next()
            .ok_or_else(|| Error::PptxParse("Presentation has no slides".to_string()))
    }

    /// Slide width and height in EMU, if declared.
    pub fn slide_size(&self) -> Option<(i64, i64)> {
        let xml = self.part_str(PRESENTATION_PATH).ok()?;
        let mut reader = Reader::from_str(xml);

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if local_name(e.name().as_ref()) == b"sldSz" =>
                {
                    return Some((attr_i64(e, b"cx")?, attr_i64(e, b"cy")?));
                }
                Ok(Event::Eof) | Err(_) => return None,
                _ => {}
            }
        }
    }

    /// Relationships of a part. A part without a `.rels` file has none.
    pub fn relationships(&self, part: &str) -> Result<Relationships> {
        match self.part(&rels_path_for(part)) {
            Some(_) => Relationships::parse(self.part_str(&rels_path_for(part))?),
            None => Ok(Relationships::default()),
        }
    }

    /// Store the relationships of a part.
    pub fn set_relationships(&mut self, part: &str, rels: &Relationships) -> Result<()> {
        let xml = rels.to_xml()?;
        self.set_part(&rels_path_for(part), xml.into_bytes());
        Ok(())
    }

    /// Register a default content type for an extension if missing.
    pub fn ensure_default_content_type(&mut self, extension: &str, content_type: &str) -> Result<()> {
        let xml = self.part_str(CONTENT_TYPES_PATH)?;

        let mut reader = Reader::from_str(xml);
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        let mut present = false;
        let mut events = Vec::new();

        loop {
            match reader.read_event().map_err(xml_err)? {
                Event::Eof => break,
                event => {
                    if let Event::Empty(ref e) | Event::Start(ref e) = event {
                        if local_name(e.name().as_ref()) == b"Default"
                            && attr_string(e, b"Extension")
                                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
                        {
                            present = true;
                        }
                    }
                    events.push(event);
                }
            }
        }

        if present {
            return Ok(());
        }

        for event in events {
            let is_types = matches!(&event, Event::Start(e) if local_name(e.name().as_ref()) == b"Types");
            writer.write_event(event).map_err(xml_err)?;
            if is_types {
                let mut default = BytesStart::new("Default");
                default.push_attribute(("Extension", extension));
                default.push_attribute(("ContentType", content_type));
                writer.write_event(Event::Empty(default)).map_err(xml_err)?;
            }
        }

        self.set_part(CONTENT_TYPES_PATH, writer.into_inner().into_inner());
        Ok(())
    }
}

/// One entry of a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// The relationships of one part, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    /// Parse a `.rels` document.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut items = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if local_name(e.name().as_ref()) == b"Relationship" =>
                {
                    items.push(Relationship {
                        id: attr_string(e, b"Id").unwrap_or_default(),
                        rel_type: attr_string(e, b"Type").unwrap_or_default(),
                        target: attr_string(e, b"Target").unwrap_or_default(),
                        external: attr_string(e, b"TargetMode").is_some_and(|m| m == "External"),
                    });
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!("Error parsing relationships: {}", e)));
                }
                _ => {}
            }
        }

        Ok(Self { items })
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    /// Add a relationship under a fresh `rIdN` and return that id.
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let next = self
            .items
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<usize>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = format!("rId{}", next);
        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            external: false,
        });
        id
    }

    /// Serialize as a `.rels` document.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(xml_err)?;

        let mut root = BytesStart::new("Relationships");
        root.push_attribute(("xmlns", RELATIONSHIPS_NS));
        writer.write_event(Event::Start(root.clone())).map_err(xml_err)?;

        for rel in &self.items {
            let mut elem = BytesStart::new("Relationship");
            elem.push_attribute(("Id", rel.id.as_str()));
            elem.push_attribute(("Type", rel.rel_type.as_str()));
            elem.push_attribute(("Target", rel.target.as_str()));
            if rel.external {
                elem.push_attribute(("TargetMode", "External"));
            }
            writer.write_event(Event::Empty(elem)).map_err(xml_err)?;
        }

        writer.write_event(Event::End(root.to_end())).map_err(xml_err)?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| Error::Xml(format!("Relationships are not UTF-8: {}", e)))
    }
}

/// Relationship ids of `p:sldIdLst`, in presentation order.
fn slide_id_list(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                let rid = e
                    .attributes()
                    .flatten()
                    .find(|a| local_name(a.key.as_ref()) == b"id" && a.key.as_ref() != b"id")
                    .map(|a| String::from_utf8_lossy(&a.value).to_string());
                if let Some(rid) = rid {
                    ids.push(rid);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!("Error parsing presentation: {}", e)));
            }
            _ => {}
        }
    }

    Ok(ids)
}

fn is_slide_rel_type(rel_type: &str) -> bool {
    rel_type.ends_with("/slide")
}

/// Path of the `.rels` part that belongs to `part`.
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the part that owns it.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = source_part.split('/').collect();
    segments.pop();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Relationship target pointing from `source_part` to `target_part`.
pub fn relative_target(source_part: &str, target_part: &str) -> String {
    let base: Vec<&str> = source_part.split('/').collect();
    let base = &base[..base.len().saturating_sub(1)];
    let target: Vec<&str> = target_part.split('/').collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<&str> = std::iter::repeat("..").take(base.len() - common).collect();
    segments.extend(&target[common..]);
    segments.join("/")
}

pub(crate) fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

pub(crate) fn attr_i64(e: &BytesStart, key: &[u8]) -> Option<i64> {
    attr_string(e, key)?.trim().parse().ok()
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    // Remove common extensions first
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    // Try to find digits at the end
    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{PptxFixture, SlideFixture};

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("rId1"), Some(1));
        assert_eq!(extract_slide_number("rId12"), Some(12));
        assert_eq!(extract_slide_number("slide1.xml"), Some(1));
        assert_eq!(extract_slide_number("slide123.xml"), Some(123));
        assert_eq!(extract_slide_number("nodigits"), None);
    }

    #[test]
    fn test_rels_path_for() {
        assert_eq!(rels_path_for("ppt/slides/slide1.xml"), "ppt/slides/_rels/slide1.xml.rels");
        assert_eq!(rels_path_for("ppt/presentation.xml"), "ppt/_rels/presentation.xml.rels");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../media/image1.png"),
            "ppt/media/image1.png"
        );
        assert_eq!(resolve_target("ppt/presentation.xml", "slides/slide2.xml"), "ppt/slides/slide2.xml");
        assert_eq!(resolve_target("ppt/slides/slide1.xml", "/ppt/media/x.png"), "ppt/media/x.png");
    }

    #[test]
    fn test_relative_target() {
        assert_eq!(
            relative_target("ppt/slides/slide1.xml", "ppt/media/team_slot1.png"),
            "../media/team_slot1.png"
        );
        assert_eq!(relative_target("ppt/presentation.xml", "ppt/slides/slide1.xml"), "slides/slide1.xml");
    }

    #[test]
    fn test_relationships_roundtrip_and_add() {
        let xml = r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="t/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>
  <Relationship Id="rId3" Type="t/hyperlink" Target="https://example.com" TargetMode="External"/>
</Relationships>"#;
        let mut rels = Relationships::parse(xml).unwrap();
        assert!(rels.get("rId3").unwrap().external);

        let id = rels.add(IMAGE_REL_TYPE, "../media/team_slot1.png");
        assert_eq!(id, "rId4");

        let reparsed = Relationships::parse(&rels.to_xml().unwrap()).unwrap();
        assert_eq!(reparsed, rels);
    }

    #[test]
    fn test_slide_order_follows_slide_id_list() {
        let bytes = PptxFixture::new()
            .slide(SlideFixture::new().text(0, 0, &[("first", false)]))
            .slide(SlideFixture::new().text(0, 0, &[("second", false)]))
            .reverse_slide_order()
            .build();
        let package = Package::from_bytes(&bytes).unwrap();

        assert_eq!(
            package.slide_paths().unwrap(),
            vec!["ppt/slides/slide2.xml", "ppt/slides/slide1.xml"]
        );
        assert_eq!(package.first_slide().unwrap(), "ppt/slides/slide2.xml");
        assert_eq!(package.slide_size(), Some((12_192_000, 6_858_000)));
    }

    #[test]
    fn test_package_roundtrip_preserves_parts() {
        let bytes = PptxFixture::new()
            .slide(SlideFixture::new().text(0, 0, &[("hello", false)]))
            .build();
        let mut package = Package::from_bytes(&bytes).unwrap();
        package.set_part("ppt/media/extra.bin", vec![1, 2, 3]);

        let reread = Package::from_bytes(&package.to_bytes().unwrap()).unwrap();
        assert_eq!(reread.part("ppt/media/extra.bin"), Some(&[1u8, 2, 3][..]));
        assert_eq!(
            reread.part_names().collect::<Vec<_>>(),
            package.part_names().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_unused_part_name() {
        let mut package = Package::default();
        assert_eq!(package.unused_part_name("ppt/media/team_slot", "png"), "ppt/media/team_slot1.png");
        package.set_part("ppt/media/team_slot1.png", Vec::new());
        assert_eq!(package.unused_part_name("ppt/media/team_slot", "png"), "ppt/media/team_slot2.png");
    }

    #[test]
    fn test_ensure_default_content_type() {
        let bytes = PptxFixture::new()
            .slide(SlideFixture::new().text(0, 0, &[("x", false)]))
            .build();
        let mut package = Package::from_bytes(&bytes).unwrap();

        package.ensure_default_content_type("png", "image/png").unwrap();
        let once = package.part_str(CONTENT_TYPES_PATH).unwrap().to_string();
        assert_eq!(once.matches(r#"Extension="png""#).count(), 1);

        package.ensure_default_content_type("PNG", "image/png").unwrap();
        assert_eq!(package.part_str(CONTENT_TYPES_PATH).unwrap(), once);
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(Package::from_bytes(b"plain text"), Err(Error::Zip(_))));
    }
}
