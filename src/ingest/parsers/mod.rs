pub mod doc;
pub mod docx;
pub mod markdown;
pub mod pdf;
pub mod plaintext;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One loaded, pre-chunk text record (a page, a section, or a whole file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentUnit {
    pub text: String,
    /// Always carries `source`; loaders add `page` or `section` where they apply.
    pub metadata: BTreeMap<String, String>,
}

impl DocumentUnit {
    pub fn new(text: impl Into<String>, source: &Path) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), source.to_string_lossy().to_string());
        Self {
            text: text.into(),
            metadata,
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn source(&self) -> &str {
        self.metadata.get("source").map(String::as_str).unwrap_or("")
    }
}

/// Trait for document loaders
pub trait Parser: Send + Sync {
    /// Check if this parser can handle the given (lowercase, dotless) file extension
    fn can_parse(&self, extension: &str) -> bool;

    /// Load the file into text units, in document order
    fn parse(&self, path: &Path) -> Result<Vec<DocumentUnit>>;
}

/// Parser registry that selects the loader by file extension
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    /// Create a registry with the built-in loaders; `doc_converter` is the
    /// external command used to turn `.doc` files into PDF.
    pub fn new(doc_converter: &str) -> Self {
        let mut registry = Self {
            parsers: Vec::new(),
        };

        registry.register(Box::new(plaintext::PlainTextParser));
        registry.register(Box::new(markdown::MarkdownParser));
        registry.register(Box::new(pdf::PdfParser));
        registry.register(Box::new(docx::DocxParser));
        registry.register(Box::new(doc::DocParser::new(doc_converter)));

        registry
    }

    /// Register a parser
    pub fn register(&mut self, parser: Box<dyn Parser>) {
        self.parsers.push(parser);
    }

    /// Find a parser that can handle the given extension
    pub fn find_parser(&self, extension: &str) -> Option<&dyn Parser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(extension))
            .map(|p| p.as_ref())
    }

    /// Load one file. Unsupported extensions yield an empty sequence.
    pub fn load_file(&self, path: &Path) -> Result<Vec<DocumentUnit>> {
        let extension = file_extension(path);

        match self.find_parser(&extension) {
            Some(parser) => parser.parse(path),
            None => {
                log::debug!("Ignoring unsupported file type: {}", path.display());
                Ok(Vec::new())
            }
        }
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new("soffice")
    }
}

/// Lowercase extension without the dot (`""` when absent)
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}
