use super::{DocumentUnit, Parser};
use crate::error::Result;
use std::path::Path;

/// Plain text loader
///
/// The whole file becomes a single unit. Invalid UTF-8 is replaced rather
/// than rejected so one stray byte doesn't drop the document.
pub struct PlainTextParser;

impl Parser for PlainTextParser {
    fn can_parse(&self, extension: &str) -> bool {
        extension == "txt"
    }

    fn parse(&self, path: &Path) -> Result<Vec<DocumentUnit>> {
        let bytes = std::fs::read(path)?;
        let content = String::from_utf8_lossy(&bytes);

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![DocumentUnit::new(content, path)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_plaintext_single_unit() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("facts.txt");
        fs::write(&path, "The population of Bangladesh is 170 million.").unwrap();

        let units = PlainTextParser.parse(&path).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "The population of Bangladesh is 170 million.");
        assert!(units[0].source().ends_with("facts.txt"));
    }

    #[test]
    fn test_plaintext_blank_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blank.txt");
        fs::write(&path, "  \n\n ").unwrap();

        assert!(PlainTextParser.parse(&path).unwrap().is_empty());
    }

    #[test]
    fn test_plaintext_missing_file() {
        let result = PlainTextParser.parse(Path::new("/nonexistent/accord/file.txt"));
        assert!(result.is_err());
    }
}
