use super::{DocumentUnit, Parser};
use crate::error::{AccordError, Result};
use quick_xml::events::Event;
use std::io::Read;
use std::path::Path;

/// Maximum decompressed bytes read from `word/document.xml` (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// DOCX loader: the document body as one unit, one line per paragraph
pub struct DocxParser;

impl Parser for DocxParser {
    fn can_parse(&self, extension: &str) -> bool {
        extension == "docx"
    }

    fn parse(&self, path: &Path) -> Result<Vec<DocumentUnit>> {
        let bytes = std::fs::read(path)?;
        let text = extract_docx_text(&bytes)
            .map_err(|e| AccordError::Extract(format!("{}: {}", path.display(), e)))?;

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![DocumentUnit::new(text, path)])
    }
}

/// Pull paragraph text out of an OOXML word-processing package
pub fn extract_docx_text(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;

    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| "word/document.xml not found".to_string())?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| e.to_string())?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err("word/document.xml exceeds size limit".to_string());
    }

    paragraphs_from_xml(&xml)
}

fn paragraphs_from_xml(xml: &[u8]) -> std::result::Result<String, String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::Text(te)) => {
                if in_text {
                    let text = te.unescape().map_err(|e| e.to_string())?;
                    out.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn make_docx(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );

        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_docx_paragraphs() {
        let bytes = make_docx(&["Dhaka is the capital.", "Rivers &amp; deltas."]);
        let text = extract_docx_text(&bytes).unwrap();

        assert_eq!(text, "Dhaka is the capital.\nRivers & deltas.");
    }

    #[test]
    fn test_docx_parser_unit() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("brief.docx");
        fs::write(&path, make_docx(&["One paragraph."])).unwrap();

        let units = DocxParser.parse(&path).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "One paragraph.");
    }

    #[test]
    fn test_docx_not_a_zip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fake.docx");
        fs::write(&path, b"plain bytes").unwrap();

        assert!(matches!(DocxParser.parse(&path), Err(AccordError::Extract(_))));
    }
}
