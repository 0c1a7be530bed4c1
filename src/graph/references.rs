//! Cross-reference extraction from document content.
//!
//! Two reference styles are recognized:
//! - `[[Name]]`, `[[Name|alias]]`, `[[Name#heading]]`, `![[Name]]`: resolved by file stem
//! - `[label](path)`: resolved by direct path lookup
//!
//! Extraction is purely syntactic; resolution against the corpus happens in
//! the builder.

use std::sync::LazyLock;

use regex::Regex;

static RE_PATH_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[([^\[\]]*)\]\(\s*([^()\s]+)(?:\s+"[^"]*")?\s*\)"#).unwrap()
});

/// A syntactic reference found in document content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `[[target]]`: the target without alias or heading.
    WikiLink(String),
    /// `[label](path)`: the path without fragment or query, percent-spaces decoded.
    PathLink(String),
}

/// Extract every reference in `content`, wiki-links first, each in order of appearance.
pub fn extract_references(content: &str) -> Vec<Reference> {
    let mut out: Vec<Reference> = extract_wikilinks(content)
        .into_iter()
        .map(Reference::WikiLink)
        .collect();
    out.extend(
        RE_PATH_LINK
            .captures_iter(content)
            .filter_map(|caps| clean_link_path(caps.get(2)?.as_str()))
            .map(Reference::PathLink),
    );
    out
}

/// Extract wiki-link targets line by line.
pub fn extract_wikilinks(content: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in content.lines() {
        let mut rest = line;
        while let Some(start) = rest.find("[[") {
            let after = &rest[start + 2..];
            let Some(end) = after.find("]]") else {
                break;
            };
            if let Some(target) = wikilink_target(&after[..end]) {
                out.push(target);
            }
            rest = &after[end + 2..];
        }
    }
    out
}

fn wikilink_target(inner: &str) -> Option<String> {
    let left = inner.split('|').next()?;
    let target = left.split('#').next()?.trim();
    if target.is_empty() {
        None
    } else {
        Some(target.to_string())
    }
}

fn clean_link_path(raw: &str) -> Option<String> {
    if raw.contains("://") || raw.starts_with("mailto:") || raw.starts_with('#') {
        return None;
    }
    let path = raw.split(['#', '?']).next()?.replace("%20", " ");
    if path.trim().is_empty() {
        None
    } else {
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wikilink_variants() {
        let links = extract_wikilinks(
            "Seen with [[Target One]] and [[Two|alias]].\n![[Embed]] near [[Three#Heading]] [[ ]]",
        );
        assert_eq!(links, vec!["Target One", "Two", "Embed", "Three"]);
    }

    #[test]
    fn unterminated_wikilink_is_ignored() {
        assert!(extract_wikilinks("broken [[link").is_empty());
    }

    #[test]
    fn path_links_skip_urls_and_anchors() {
        let refs = extract_references(
            "[a](reports/a.md) [web](https://example.com) [top](#top) [b](b%20c.md#sec \"T\")",
        );
        assert_eq!(
            refs,
            vec![
                Reference::PathLink("reports/a.md".into()),
                Reference::PathLink("b c.md".into()),
            ]
        );
    }

    #[test]
    fn mixed_styles() {
        let refs = extract_references("[[B]] then [C](C.md)");
        assert_eq!(
            refs,
            vec![
                Reference::WikiLink("B".into()),
                Reference::PathLink("C.md".into())
            ]
        );
    }
}
