//! Filesystem corpus adapter: a directory tree of markdown documents.
//!
//! Every `*.md` file becomes a [`Document`]. A leading `---` block is parsed
//! as YAML front-matter; a block that fails to parse is logged and treated as
//! empty. A document that cannot be read at all is logged and skipped. An
//! optional `relationships.json` at the root supplies the explicit
//! relationship list; an unreadable or malformed list is logged and ignored.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::CorpusError;

use super::{Corpus, CorpusResult, CorpusSource, Document, FrontMatter, Relationship};

/// Name of the optional explicit relationship list at the corpus root.
pub const RELATIONSHIPS_FILE: &str = "relationships.json";

/// Markdown directory corpus.
#[derive(Debug, Clone)]
pub struct MarkdownDir {
    root: PathBuf,
}

impl MarkdownDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collect_files(&self, dir: &Path, out: &mut Vec<PathBuf>) -> CorpusResult<()> {
        let entries = std::fs::read_dir(dir).map_err(|e| CorpusError::Read {
            path: dir.display().to_string(),
            source: e,
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| CorpusError::Read {
                path: dir.display().to_string(),
                source: e,
            })?;
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden {
                continue;
            }
            if path.is_dir() {
                if let Err(e) = self.collect_files(&path, out) {
                    tracing::warn!(error = %e, "skipping unreadable directory");
                }
            } else if path.extension().is_some_and(|ext| ext == "md") {
                out.push(path);
            }
        }
        Ok(())
    }

    fn load_document(&self, path: &Path) -> CorpusResult<Document> {
        let raw = std::fs::read_to_string(path).map_err(|e| CorpusError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let rel = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();

        let (yaml, body) = split_front_matter(&raw);
        let front_matter = match yaml.map(FrontMatter::from_yaml) {
            Some(Ok(fm)) => fm,
            Some(Err(message)) => {
                tracing::warn!(path = %rel, %message, "malformed front-matter, ignoring");
                FrontMatter::default()
            }
            None => FrontMatter::default(),
        };

        let mut doc = Document::new(&rel, front_matter, body);
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        if let Some(modified) = modified {
            doc = doc.with_modified(DateTime::<Utc>::from(modified));
        }
        Ok(doc)
    }

    fn read_relationships(&self, path: &Path) -> CorpusResult<Vec<Relationship>> {
        let raw = std::fs::read_to_string(path).map_err(|e| CorpusError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&raw).map_err(|e| CorpusError::Relationships {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn load_relationships(&self) -> Option<Vec<Relationship>> {
        let path = self.root.join(RELATIONSHIPS_FILE);
        if !path.is_file() {
            return None;
        }
        match self.read_relationships(&path) {
            Ok(list) => Some(list),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring relationship list");
                None
            }
        }
    }
}

impl CorpusSource for MarkdownDir {
    fn load(&self) -> CorpusResult<Corpus> {
        if !self.root.is_dir() {
            return Err(CorpusError::RootNotFound {
                path: self.root.display().to_string(),
            });
        }
        let mut files = Vec::new();
        self.collect_files(&self.root, &mut files)?;

        let mut corpus = Corpus::new();
        let mut skipped = 0usize;
        for file in &files {
            match self.load_document(file) {
                Ok(doc) => corpus.insert(doc),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable document");
                    skipped += 1;
                }
            }
        }
        corpus.set_relationships(self.load_relationships());

        tracing::debug!(
            root = %self.root.display(),
            documents = corpus.len(),
            skipped,
            relationships = corpus.relationships().map_or(0, <[Relationship]>::len),
            "loaded markdown corpus"
        );
        Ok(corpus)
    }
}

/// Split a leading `---` YAML block from the body.
///
/// Returns `(None, raw)` when the document has no front-matter or the block
/// is never closed.
pub fn split_front_matter(raw: &str) -> (Option<&str>, &str) {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let Some(rest) = raw
        .strip_prefix("---\n")
        .or_else(|| raw.strip_prefix("---\r\n"))
    else {
        return (None, raw);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn split_basic_block() {
        let (yaml, body) = split_front_matter("---\nkind: entity\n---\nBody [[X]]\n");
        assert_eq!(yaml, Some("kind: entity\n"));
        assert_eq!(body, "Body [[X]]\n");
    }

    #[test]
    fn split_without_block() {
        let (yaml, body) = split_front_matter("# Title\n---\n");
        assert_eq!(yaml, None);
        assert_eq!(body, "# Title\n---\n");
    }

    #[test]
    fn unterminated_block_is_body() {
        let (yaml, body) = split_front_matter("---\nkind: entity\n");
        assert_eq!(yaml, None);
        assert_eq!(body, "---\nkind: entity\n");
    }

    #[test]
    fn loads_directory_tree() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("entities")).unwrap();
        std::fs::create_dir_all(dir.path().join(".obsidian")).unwrap();
        std::fs::write(
            dir.path().join("A.md"),
            "---\nkind: report\nconfidence: 0.85\n---\nSee [[B]].\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("entities/B.md"), "---\nkind: [unclosed\n---\nbody").unwrap();
        std::fs::write(dir.path().join(".obsidian/ignored.md"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not markdown").unwrap();
        std::fs::write(
            dir.path().join(RELATIONSHIPS_FILE),
            r#"[{"source": "A", "target": "B", "predicate": "located_in"}]"#,
        )
        .unwrap();

        let corpus = MarkdownDir::new(dir.path()).load().unwrap();
        assert_eq!(corpus.len(), 2);

        let a = corpus.get("A.md").unwrap();
        assert_eq!(a.front_matter.number("confidence"), Some(0.85));
        assert!(a.content.contains("[[B]]"));
        assert!(a.modified.is_some());

        let b = corpus.get("entities/B.md").unwrap();
        assert!(b.front_matter.is_empty());

        let rels = corpus.relationships().unwrap();
        assert_eq!(rels[0].predicate.as_deref(), Some("located_in"));
    }

    #[test]
    fn unreadable_document_is_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("A.md"), "---\nkind: entity\n---\nSee [[B]].\n").unwrap();
        std::fs::write(dir.path().join("B.md"), b"\xFF\xFE\x00").unwrap();

        let corpus = MarkdownDir::new(dir.path()).load().unwrap();
        assert_eq!(corpus.len(), 1);
        assert!(corpus.get("A.md").is_some());
        assert!(corpus.get("B.md").is_none());
    }

    #[test]
    fn malformed_relationship_list_is_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("A.md"), "body").unwrap();
        std::fs::write(dir.path().join(RELATIONSHIPS_FILE), r#"{"source": "A""#).unwrap();

        let corpus = MarkdownDir::new(dir.path()).load().unwrap();
        assert_eq!(corpus.len(), 1);
        assert!(corpus.relationships().is_none());
    }

    #[test]
    fn missing_root_is_an_error() {
        let err = MarkdownDir::new("/definitely/not/here").load().unwrap_err();
        assert!(matches!(err, CorpusError::RootNotFound { .. }));
    }
}
