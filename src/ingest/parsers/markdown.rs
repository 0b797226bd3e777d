use super::{DocumentUnit, Parser};
use crate::error::Result;
use pulldown_cmark::{Event, Parser as CmarkParser, Tag, TagEnd};
use std::path::Path;

/// Markdown loader
///
/// Splits the file at every heading and emits one unit per section. Units
/// hold the raw source slice (markup included), so joining them in order
/// gives back the file.
pub struct MarkdownParser;

impl Parser for MarkdownParser {
    fn can_parse(&self, extension: &str) -> bool {
        extension == "md"
    }

    fn parse(&self, path: &Path) -> Result<Vec<DocumentUnit>> {
        let bytes = std::fs::read(path)?;
        let content = String::from_utf8_lossy(&bytes);
        Ok(split_sections(&content, path))
    }
}

/// Split markdown source at heading starts. Text before the first heading
/// becomes an untitled section.
pub fn split_sections(content: &str, path: &Path) -> Vec<DocumentUnit> {
    let mut headings: Vec<(usize, String)> = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (event, range) in CmarkParser::new(content).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                current = Some((range.start, String::new()));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, ref mut title)) = current {
                    title.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((start, title)) = current.take() {
                    headings.push((start, title.trim().to_string()));
                }
            }
            _ => {}
        }
    }

    let mut units = Vec::new();
    let first_heading = headings.first().map(|(start, _)| *start).unwrap_or(content.len());

    if let Some(preface) = content.get(..first_heading) {
        if !preface.trim().is_empty() {
            units.push(DocumentUnit::new(preface, path));
        }
    }

    for (idx, (start, title)) in headings.iter().enumerate() {
        let end = headings
            .get(idx + 1)
            .map(|(next, _)| *next)
            .unwrap_or(content.len());

        if let Some(section) = content.get(*start..end) {
            if !section.trim().is_empty() {
                units.push(DocumentUnit::new(section, path).with_meta("section", title.clone()));
            }
        }
    }

    units
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_parser_can_parse() {
        let parser = MarkdownParser;
        assert!(parser.can_parse("md"));
        assert!(!parser.can_parse("txt"));
    }

    #[test]
    fn test_markdown_sections() {
        let content = "Intro line.\n\n# Title\n\nThis is content.\n\n## Subsection\n\nMore `code` content.\n";
        let units = split_sections(content, Path::new("guide.md"));

        assert_eq!(units.len(), 3);
        assert!(units[0].metadata.get("section").is_none());
        assert_eq!(units[1].metadata.get("section").map(String::as_str), Some("Title"));
        assert!(units[1].text.contains("This is content."));
        assert_eq!(units[2].metadata.get("section").map(String::as_str), Some("Subsection"));
    }

    #[test]
    fn test_markdown_sections_reconstruct_source() {
        let content = "# A\n\nalpha\n\n# B\n\nbeta\n";
        let units = split_sections(content, Path::new("x.md"));

        let joined: String = units.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(joined, content);
    }

    #[test]
    fn test_markdown_without_headings() {
        let content = "Just a paragraph of notes.";
        let units = split_sections(content, Path::new("notes.md"));

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, content);
    }
}
