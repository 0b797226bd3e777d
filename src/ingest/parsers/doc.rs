use super::pdf::PdfParser;
use super::{DocumentUnit, Parser};
use crate::error::{AccordError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Legacy Word loader
///
/// Converts `name.doc` to `name.pdf` next to the source with an external
/// converter, then loads the PDF. An existing `name.pdf` is reused as-is and
/// never cleaned up.
pub struct DocParser {
    converter: String,
}

impl DocParser {
    pub fn new(converter: &str) -> Self {
        Self {
            converter: converter.to_string(),
        }
    }

    fn convert(&self, path: &Path, pdf_path: &Path) -> Result<()> {
        let out_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        log::info!("Converting {} to PDF with {}", path.display(), self.converter);

        let output = Command::new(&self.converter)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(path)
            .output()
            .map_err(|e| AccordError::Extract(format!(
                "failed to run {} for {}: {}",
                self.converter,
                path.display(),
                e
            )))?;

        if !output.status.success() {
            return Err(AccordError::Extract(format!(
                "{} exited with {} for {}: {}",
                self.converter,
                output.status,
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        if !pdf_path.exists() {
            return Err(AccordError::Extract(format!(
                "{} produced no PDF at {}",
                self.converter,
                pdf_path.display()
            )));
        }

        Ok(())
    }
}

/// Where the converted PDF for a `.doc` lives
pub fn converted_pdf_path(path: &Path) -> PathBuf {
    path.with_extension("pdf")
}

impl Parser for DocParser {
    fn can_parse(&self, extension: &str) -> bool {
        extension == "doc"
    }

    fn parse(&self, path: &Path) -> Result<Vec<DocumentUnit>> {
        let pdf_path = converted_pdf_path(path);

        if pdf_path.exists() {
            log::debug!("Reusing converted PDF {}", pdf_path.display());
        } else {
            self.convert(path, &pdf_path)?;
        }

        let units = PdfParser
            .parse(&pdf_path)?
            .into_iter()
            .map(|unit| {
                let converted = unit.source().to_string();
                unit.with_meta("source", path.to_string_lossy())
                    .with_meta("converted", converted)
            })
            .collect();

        Ok(units)
    }
}
