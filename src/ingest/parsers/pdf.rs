use super::{DocumentUnit, Parser};
use crate::error::{AccordError, Result};
use std::path::Path;

/// PDF loader: one unit per non-empty page, `page` is zero-based
pub struct PdfParser;

impl Parser for PdfParser {
    fn can_parse(&self, extension: &str) -> bool {
        extension == "pdf"
    }

    fn parse(&self, path: &Path) -> Result<Vec<DocumentUnit>> {
        // pdf-extract panics on some malformed fonts
        let extracted = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdf_extract::extract_text_by_pages(path)
        }));

        let pages = match extracted {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => {
                return Err(AccordError::Extract(format!("{}: {}", path.display(), e)));
            }
            Err(_) => {
                return Err(AccordError::Extract(format!(
                    "{}: PDF extractor panicked",
                    path.display()
                )));
            }
        };

        Ok(pages_to_units(pages, path))
    }
}

pub(crate) fn pages_to_units(pages: Vec<String>, path: &Path) -> Vec<DocumentUnit> {
    pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(page, text)| DocumentUnit::new(text, path).with_meta("page", page.to_string()))
        .collect()
}
