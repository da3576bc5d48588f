//! Resolution of free-text consultant names to source documents.
//!
//! Source files follow a `First_Last[-Extra].pptx` convention, but people
//! type names with different spacing, hyphenation and sometimes only part of
//! a double surname. Matching tries an exact filename first and then accepts
//! the first file whose name parts contain every part of the query.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold a name fragment for comparison: strip accents, lowercase.
pub fn fold_key(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split a name or filename stem into folded parts.
fn name_parts(text: &str) -> Vec<String> {
    text.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(fold_key)
        .collect()
}

/// A source document that may be matched.
#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    stem: String,
    parts: Vec<String>,
}

/// Snapshot of the source directory, rebuilt for every request.
#[derive(Debug, Clone)]
pub struct SourceIndex {
    dir: PathBuf,
    candidates: Vec<Candidate>,
}

impl SourceIndex {
    /// List `dir` and index every file with the given extension, except the
    /// reserved reference document.
    pub fn scan(dir: impl AsRef<Path>, reserved: &str, extension: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let mut filenames = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => filenames.push(name),
                Err(name) => log::debug!("Skipping non UTF-8 filename {:?}", name),
            }
        }

        Ok(Self::from_filenames(dir, filenames, reserved, extension))
    }

    /// Build an index from filenames in listing order.
    pub fn from_filenames<I, S>(dir: impl AsRef<Path>, filenames: I, reserved: &str, extension: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let dir = dir.as_ref().to_path_buf();
        let mut candidates = Vec::new();

        for filename in filenames {
            let filename = filename.as_ref();
            if filename.eq_ignore_ascii_case(reserved) {
                continue;
            }
            let Some((stem, ext)) = filename.rsplit_once('.') else {
                continue;
            };
            if !ext.eq_ignore_ascii_case(extension) || stem.is_empty() {
                continue;
            }
            candidates.push(Candidate {
                path: dir.join(filename),
                stem: stem.to_string(),
                parts: name_parts(stem),
            });
        }

        Self { dir, candidates }
    }

    /// Directory this index was built from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Candidate documents in listing order.
    pub fn candidates(&self) -> impl Iterator<Item = &Path> {
        self.candidates.iter().map(|c| c.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Find the source document for `name`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let words: Vec<&str> = name.split_whitespace().collect();
        if words.is_empty() {
            return Err(Error::SourceNotFound(name.to_string()));
        }

        // Exact match with the naming rule, with and without hyphens
        let exact = words.join("_");
        let unhyphenated = exact.replace('-', "");
        if let Some(candidate) = self
            .candidates
            .iter()
            .find(|c| c.stem == exact || c.stem == unhyphenated)
        {
            log::info!("Found exact match for {}: {}", name, candidate.path.display());
            return Ok(candidate.path.clone());
        }

        let query = name_parts(name);
        if let Some(candidate) = self
            .candidates
            .iter()
            .find(|c| query.iter().all(|part| c.parts.contains(part)))
        {
            log::info!("Found fuzzy match for {}: {}", name, candidate.path.display());
            return Ok(candidate.path.clone());
        }

        log::warn!(
            "No source document for {}. Available: {:?}",
            name,
            self.candidates.iter().map(|c| c.stem.as_str()).collect::<Vec<_>>()
        );
        Err(Error::SourceNotFound(name.to_string()))
    }
}
