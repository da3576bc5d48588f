//! Request orchestration.

use crate::config::EngineConfig;
use std::io::Write;
use std::path::{Path, PathBuf};
use team_core::{ConsultantRecord, Error, Result, SourceIndex, QUADRANT_COUNT};
use team_pptx::{inspect_template, SlideFieldExtractor, TemplateLayout, TemplatePopulator};
use tempfile::NamedTempFile;

/// How one quadrant's record was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    /// Fields were extracted from this source document.
    Extracted { path: PathBuf },
    /// A fallback record was used.
    Fallback { reason: String },
}

impl SlotOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, SlotOutcome::Fallback { .. })
    }
}

/// A finished team slide.
#[derive(Debug, Clone)]
pub struct GeneratedSlide {
    /// The `.pptx` document.
    pub bytes: Vec<u8>,

    /// One outcome per quadrant, in input order.
    pub outcomes: Vec<SlotOutcome>,
}

impl GeneratedSlide {
    pub fn fallback_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_fallback()).count()
    }
}

/// Builds team slides from consultant names.
///
/// Holds configuration only; every call scans the source directory and
/// reads the template afresh.
#[derive(Debug, Clone, Default)]
pub struct TeamSlideEngine {
    config: EngineConfig,
    extractor: SlideFieldExtractor,
}

impl TeamSlideEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            extractor: SlideFieldExtractor::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the slide for exactly four names, in quadrant order.
    pub fn generate<S: AsRef<str>>(&self, names: &[S]) -> Result<GeneratedSlide> {
        let names = validate_names(names)?;
        let template = self.load_template()?;

        let index = match self.source_index() {
            Ok(index) => Some(index),
            Err(e) => {
                log::warn!(
                    "Cannot list source directory {}: {}",
                    self.config.source_dir.display(),
                    e
                );
                None
            }
        };

        let mut records = Vec::with_capacity(QUADRANT_COUNT);
        let mut outcomes = Vec::with_capacity(QUADRANT_COUNT);
        for name in &names {
            let (record, outcome) = match self.record_for(index.as_ref(), name) {
                Ok((record, path)) => (record, SlotOutcome::Extracted { path }),
                Err(e) => {
                    log::warn!("Using fallback for '{}': {}", name, e);
                    (
                        ConsultantRecord::fallback(name),
                        SlotOutcome::Fallback {
                            reason: e.to_string(),
                        },
                    )
                }
            };
            records.push(record);
            outcomes.push(outcome);
        }

        if outcomes.iter().all(SlotOutcome::is_fallback) {
            log::warn!("No source document could be used, the slide only has fallback quadrants");
        }

        let bytes = self.populator().populate(&template, &records)?;
        Ok(GeneratedSlide { bytes, outcomes })
    }

    /// Build the slide and write it to `path`, creating parent directories.
    ///
    /// The file is written next to `path` under a temporary name and renamed
    /// into place, so `path` never holds a partial document.
    pub fn generate_to_path<S: AsRef<str>>(&self, names: &[S], path: impl AsRef<Path>) -> Result<GeneratedSlide> {
        let path = path.as_ref();
        let slide = self.generate(names)?;

        let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(parent)?;
        file.write_all(&slide.bytes)?;
        file.persist(path).map_err(|e| Error::Io(e.error))?;

        log::info!("Written to: {}", path.display());
        Ok(slide)
    }

    /// Resolve and extract a single consultant.
    pub fn extract(&self, name: &str) -> Result<(ConsultantRecord, PathBuf)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidRequest("name is blank".to_string()));
        }
        let index = self.source_index()?;
        self.record_for(Some(&index), name)
    }

    /// Scan the configured source directory.
    pub fn source_index(&self) -> Result<SourceIndex> {
        SourceIndex::scan(
            &self.config.source_dir,
            &self.config.reserved_filename,
            &self.config.source_extension,
        )
    }

    /// Slots of the configured template.
    pub fn inspect_template(&self) -> Result<TemplateLayout> {
        inspect_template(&self.load_template()?)
    }

    fn record_for(&self, index: Option<&SourceIndex>, name: &str) -> Result<(ConsultantRecord, PathBuf)> {
        let index = index.ok_or_else(|| Error::SourceNotFound(name.to_string()))?;
        let path = index.resolve(name)?;
        let mut record = self.extractor.extract(&path, Some(name))?;

        if record.display_name.is_empty() {
            log::debug!("No name in {}, using '{}'", path.display(), name);
            record.display_name = name.to_string();
        }
        log::info!("'{}' matched {}", name, path.display());
        Ok((record, path))
    }

    fn load_template(&self) -> Result<Vec<u8>> {
        let path = &self.config.template_path;
        if !path.is_file() {
            return Err(Error::TemplateMissing(path.clone()));
        }
        Ok(std::fs::read(path)?)
    }

    fn populator(&self) -> TemplatePopulator {
        TemplatePopulator::new()
            .with_slots(self.config.slots)
            .with_styles(self.config.styles.clone())
            .with_dpi(self.config.dpi)
    }
}

/// Exactly four non-blank names, trimmed.
fn validate_names<S: AsRef<str>>(names: &[S]) -> Result<Vec<String>> {
    if names.len() != QUADRANT_COUNT {
        return Err(Error::InvalidRequest(format!(
            "expected {} names, got {}",
            QUADRANT_COUNT,
            names.len()
        )));
    }

    let names: Vec<String> = names.iter().map(|n| n.as_ref().trim().to_string()).collect();
    if let Some(pos) = names.iter().position(|n| n.is_empty()) {
        return Err(Error::InvalidRequest(format!("name {} is blank", pos + 1)));
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use team_pptx::fixtures::{cv, png, team_template};
    use tempfile::TempDir;

    /// Source directory with three CVs and the reserved reference CV.
    fn workspace() -> (TempDir, EngineConfig) {
        let dir = tempfile::tempdir().unwrap();
        let sources = dir.path().join("cvs");
        std::fs::create_dir_all(&sources).unwrap();

        let photo = png(60, 80, [90, 120, 150]);
        std::fs::write(
            sources.join("Ada_Byron.pptx"),
            cv("Ada Byron, Partner, London", &["One", "Two", "Three", "Four"], Some(photo)),
        )
        .unwrap();
        std::fs::write(
            sources.join("Grace_Hopper.pptx"),
            cv("Grace Hopper, Admiral", &["Compilers"], None),
        )
        .unwrap();
        std::fs::write(
            sources.join("Gregor_Ledebur-Wicheln.pptx"),
            cv("Click to add text", &["Vienna office"], None),
        )
        .unwrap();
        std::fs::write(
            sources.join("CV_Placeholder.pptx"),
            cv("CV Placeholder, Role", &[], None),
        )
        .unwrap();

        let template = dir.path().join("templates").join("Team.pptx");
        std::fs::create_dir_all(template.parent().unwrap()).unwrap();
        std::fs::write(&template, team_template()).unwrap();

        let config = EngineConfig::new()
            .with_source_dir(sources)
            .with_template_path(template);
        (dir, config)
    }

    fn names_in(bytes: &[u8]) -> Vec<Vec<String>> {
        inspect_template(bytes)
            .unwrap()
            .text_slots
            .into_iter()
            .take(QUADRANT_COUNT)
            .map(|slot| slot.paragraphs)
            .collect()
    }

    #[test]
    fn test_generate_with_one_unknown_name() {
        let (_dir, config) = workspace();
        let engine = TeamSlideEngine::new(config);

        let slide = engine
            .generate(&["Ada Byron", "Grace Hopper", "Gregor Ledebur", "Unknown Person"])
            .unwrap();

        assert_eq!(slide.fallback_count(), 1);
        assert!(matches!(&slide.outcomes[0], SlotOutcome::Extracted { path } if path.ends_with("Ada_Byron.pptx")));
        assert!(matches!(&slide.outcomes[2], SlotOutcome::Extracted { path } if path.ends_with("Gregor_Ledebur-Wicheln.pptx")));
        assert!(slide.outcomes[3].is_fallback());

        let slots = names_in(&slide.bytes);
        assert_eq!(slots[0], ["Ada Byron", "Partner, London", "One", "Two", "Three"]);
        assert_eq!(slots[1], ["Grace Hopper", "Admiral", "Compilers", "", ""]);
        // The CV has no usable name, so the requested one is shown
        assert_eq!(slots[2], ["Gregor Ledebur", "", "Vienna office", "", ""]);
        assert_eq!(slots[3], ["Unknown Person", "", "", "", ""]);
    }

    #[test]
    fn test_wrong_name_count_touches_nothing() {
        // Neither the source directory nor the template exists
        let engine = TeamSlideEngine::new(
            EngineConfig::new()
                .with_source_dir("/nonexistent/cvs")
                .with_template_path("/nonexistent/template.pptx"),
        );

        for names in [vec!["a", "b", "c"], vec!["a", "b", "c", "d", "e"], vec![]] {
            assert!(matches!(engine.generate(&names), Err(Error::InvalidRequest(_))));
        }
        assert!(matches!(
            engine.generate(&["a", "b", "  ", "d"]),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_all_names_fail_still_produces_slide() {
        let (_dir, config) = workspace();
        let engine = TeamSlideEngine::new(config);

        // The reserved reference CV is never matched
        let names = ["Nobody One", "Nobody Two", "CV Placeholder", "Nobody Four"];
        let slide = engine.generate(&names).unwrap();

        assert_eq!(slide.fallback_count(), 4);
        for (slot, name) in names_in(&slide.bytes).iter().zip(names) {
            assert_eq!(slot[0], name);
        }
    }

    #[test]
    fn test_unlistable_source_dir_falls_back() {
        let (dir, config) = workspace();
        let engine = TeamSlideEngine::new(config.with_source_dir(dir.path().join("missing")));

        let slide = engine.generate(&["Ada Byron", "B", "C", "D"]).unwrap();
        assert_eq!(slide.fallback_count(), 4);
    }

    #[test]
    fn test_template_errors() {
        let (dir, config) = workspace();
        let names = ["Ada Byron", "Grace Hopper", "C", "D"];

        let missing = TeamSlideEngine::new(config.clone().with_template_path(dir.path().join("none.pptx")));
        assert!(matches!(missing.generate(&names), Err(Error::TemplateMissing(_))));

        let corrupt_path = dir.path().join("corrupt.pptx");
        std::fs::write(&corrupt_path, b"not a pptx").unwrap();
        let corrupt = TeamSlideEngine::new(config.with_template_path(corrupt_path));
        assert!(matches!(corrupt.generate(&names), Err(Error::TemplateCorrupt(_))));
    }

    #[test]
    fn test_generate_to_path() {
        let (dir, config) = workspace();
        let template = std::fs::read(&config.template_path).unwrap();
        let engine = TeamSlideEngine::new(config.clone());

        let out = dir.path().join("out").join("nested").join("team.pptx");
        let slide = engine
            .generate_to_path(&["Ada Byron", "Grace Hopper", "C", "D"], &out)
            .unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), slide.bytes);
        // The template on disk is left alone
        assert_eq!(std::fs::read(&config.template_path).unwrap(), template);
        assert_eq!(entries(out.parent().unwrap()), ["team.pptx"]);
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_generate_to_path_failed_write_leaves_nothing() {
        let (dir, config) = workspace();
        let engine = TeamSlideEngine::new(config);
        let names = ["Ada Byron", "Grace Hopper", "C", "D"];

        // The target is a directory, so the rename fails
        let out_dir = dir.path().join("out");
        let out = out_dir.join("team.pptx");
        std::fs::create_dir_all(out.join("keep")).unwrap();
        assert!(matches!(engine.generate_to_path(&names, &out), Err(Error::Io(_))));
        assert_eq!(entries(&out_dir), ["team.pptx"]);
        assert_eq!(entries(&out), ["keep"]);

        // An existing document is replaced whole
        let previous = out_dir.join("previous.pptx");
        std::fs::write(&previous, b"old").unwrap();
        let slide = engine.generate_to_path(&names, &previous).unwrap();
        assert_eq!(std::fs::read(&previous).unwrap(), slide.bytes);
        assert_eq!(entries(&out_dir), ["previous.pptx", "team.pptx"]);
    }

    #[test]
    fn test_extract_single() {
        let (_dir, config) = workspace();
        let engine = TeamSlideEngine::new(config);

        let (record, path) = engine.extract("grace hopper").unwrap();
        assert!(path.ends_with("Grace_Hopper.pptx"));
        assert_eq!(record.display_name, "Grace Hopper");
        assert!(record.photo.is_none());

        let (ada, _) = engine.extract("Ada Byron").unwrap();
        assert!(ada.photo.is_some());

        assert!(matches!(engine.extract("Unknown Person"), Err(Error::SourceNotFound(_))));
        assert!(matches!(engine.extract(" "), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TeamSlideEngine>();
    }
}
