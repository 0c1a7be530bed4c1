//! Document corpus: the read-only input to graph derivation.
//!
//! A [`Corpus`] is an ordered index of [`Document`]s keyed by normalized path,
//! plus an optional explicit [`Relationship`] list. Anything that can produce
//! one implements [`CorpusSource`]; [`markdown::MarkdownDir`] is the bundled
//! filesystem adapter.

pub mod front_matter;
pub mod markdown;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CorpusError;

pub use front_matter::FrontMatter;
pub use markdown::MarkdownDir;

/// Result type for corpus operations.
pub type CorpusResult<T> = std::result::Result<T, CorpusError>;

/// Anything that can produce a corpus snapshot.
pub trait CorpusSource {
    fn load(&self) -> CorpusResult<Corpus>;
}

/// A single source document with parsed front-matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Normalized path, relative to the corpus root. Doubles as the node id.
    pub path: String,
    #[serde(default)]
    pub front_matter: FrontMatter,
    #[serde(default)]
    pub content: String,
    /// Last modification time, when the provider knows it.
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(path: &str, front_matter: FrontMatter, content: impl Into<String>) -> Self {
        Self {
            path: normalize_path(path),
            front_matter,
            content: content.into(),
            modified: None,
        }
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    /// File name without directory or extension.
    pub fn stem(&self) -> &str {
        file_stem(&self.path)
    }
}

/// An explicit relationship supplied alongside the documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Document path or file stem of the source.
    pub source: String,
    /// Document path or file stem of the target.
    pub target: String,
    #[serde(default)]
    pub predicate: Option<String>,
    /// Edge weight in [0, 1].
    #[serde(default)]
    pub strength: Option<f32>,
}

impl Relationship {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            predicate: None,
            strength: None,
        }
    }

    pub fn with_predicate(mut self, predicate: &str) -> Self {
        self.predicate = Some(predicate.to_string());
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = Some(strength);
        self
    }
}

/// Indexed, read-only document collection.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: BTreeMap<String, Document>,
    relationships: Option<Vec<Relationship>>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document, replacing any previous document at the same path.
    pub fn insert(&mut self, document: Document) {
        self.documents.insert(document.path.clone(), document);
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.insert(document);
        self
    }

    pub fn with_relationships(mut self, relationships: Vec<Relationship>) -> Self {
        self.relationships = Some(relationships);
        self
    }

    pub fn set_relationships(&mut self, relationships: Option<Vec<Relationship>>) {
        self.relationships = relationships;
    }

    pub fn get(&self, path: &str) -> Option<&Document> {
        self.documents.get(path)
    }

    /// Documents in path order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn relationships(&self) -> Option<&[Relationship]> {
        self.relationships.as_deref()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl FromIterator<Document> for Corpus {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        let mut corpus = Corpus::new();
        for doc in iter {
            corpus.insert(doc);
        }
        corpus
    }
}

/// Normalize a document path: forward slashes, no leading `./` or `/`.
pub fn normalize_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    parts.join("/")
}

/// File name of `path` without directory or extension.
pub fn file_stem(path: &str) -> &str {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
}
