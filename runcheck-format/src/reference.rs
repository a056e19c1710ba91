//! Reference data the submissions are checked against.
//!
//! Reference files are organizer-provided, so failing to load one is a
//! configuration problem of the checker deployment, never a finding about
//! the submission.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use anyhow::Context;
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

/// Failure locating or loading a reference file.
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// The file was not found under any of the search roots.
    #[error("{} not found", path.display())]
    NotFound {
        /// The path as it was given.
        path: PathBuf,
    },
    /// The file exists but cannot be read.
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        /// The resolved path.
        path: PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },
}

/// Resolve `path` against the ordered search roots, first hit wins.
///
/// Checkers are invoked from the submission's working directory, so a bare
/// reference file name usually lives next to the checker binary instead; the
/// driver passes that directory as a fallback root.
pub fn resolve_reference(
    path: &Path,
    search_roots: &[PathBuf],
) -> Result<PathBuf, ReferenceError> {
    if path.exists() {
        return Ok(path.to_owned());
    }
    for root in search_roots {
        let candidate = root.join(path);
        if candidate.exists() {
            debug!(
                "Reference file {} resolved to {}",
                path.display(),
                candidate.display()
            );
            return Ok(candidate);
        }
    }
    Err(ReferenceError::NotFound {
        path: path.to_owned(),
    })
}

/// Registry of the reference ids, with a tally of how many times the
/// submission referenced each, plus the documents already seen per id for
/// retrieval-style duplicate detection.
#[derive(Debug, Clone, Default)]
pub struct TopicRegistry {
    topics: IndexMap<String, usize>,
    seen_docs: HashMap<String, HashSet<String>>,
}

impl TopicRegistry {
    /// Load the registry from a file with one id per line.
    pub fn from_file(path: &Path, search_roots: &[PathBuf]) -> Result<Self, ReferenceError> {
        let path = resolve_reference(path, search_roots)?;
        let text = fs::read_to_string(&path).map_err(|source| ReferenceError::Unreadable {
            path: path.clone(),
            source,
        })?;
        let mut registry = Self::default();
        for line in text.trim_start_matches('\u{feff}').lines() {
            let id = line.trim();
            if !id.is_empty() {
                registry.topics.insert(id.to_owned(), 0);
            }
        }
        info!(
            "Loaded {} reference ids from {}",
            registry.topics.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Seed the registry with a numeric id range.
    pub fn from_range(range: RangeInclusive<u32>) -> Self {
        let mut registry = Self::default();
        for id in range {
            registry.topics.insert(id.to_string(), 0);
        }
        registry
    }

    /// Admit an id discovered in the submission itself, for tasks that gate
    /// topics with a pattern instead of a reference file.
    pub fn admit(&mut self, id: &str) {
        self.topics.entry(id.to_owned()).or_insert(0);
    }

    /// Whether `id` is a known reference id.
    pub fn contains(&self, id: &str) -> bool {
        self.topics.contains_key(id)
    }

    /// Count one reference to `id`. Unknown ids are not counted.
    pub fn tally(&mut self, id: &str) {
        if let Some(count) = self.topics.get_mut(id) {
            *count += 1;
        }
    }

    /// How many times `id` was referenced.
    pub fn count(&self, id: &str) -> usize {
        self.topics.get(id).copied().unwrap_or(0)
    }

    /// Record a document retrieved for `id`, returning `false` when the same
    /// document was already seen for it.
    pub fn record_doc(&mut self, id: &str, doc: &str) -> bool {
        self.seen_docs
            .entry(id.to_owned())
            .or_default()
            .insert(doc.to_owned())
    }

    /// Ids with their tallies, in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.topics.iter().map(|(id, count)| (id.as_str(), *count))
    }

    /// Number of ids in the registry.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Whether the registry has no ids.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Load the JSON testfile describing the expected submission structure.
pub fn load_structure(path: &Path, search_roots: &[PathBuf]) -> anyhow::Result<Value> {
    let path = resolve_reference(path, search_roots)?;
    let file = fs::File::open(&path)
        .with_context(|| format!("cannot open test file {}", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("test file {} is not valid JSON", path.display()))
}
