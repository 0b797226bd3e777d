use walkdir::WalkDir;
use std::path::{Path, PathBuf};
use crate::error::{AccordError, Result};
use super::parsers::{doc::converted_pdf_path, file_extension, DocumentUnit, ParserRegistry};

/// Load every content file of one source directory, in sorted path order.
///
/// The directory must contain the manifest file (`info.md` by default). When
/// it is missing the error is logged and an empty sequence is returned so the
/// caller can move on to the next directory. The manifest itself is never
/// indexed. Only the directory's own files are read, not sub-directories.
pub fn load_directory(
    dir: &Path,
    manifest_name: &str,
    registry: &ParserRegistry,
) -> Result<Vec<DocumentUnit>> {
    let files = match content_files(dir, manifest_name) {
        Ok(files) => files,
        Err(e @ AccordError::ManifestMissing(_)) => {
            log::error!("{} (skipping {})", e, dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut units = Vec::new();
    for path in &files {
        let loaded = registry.load_file(path)?;
        log::debug!("Loaded {} unit(s) from {}", loaded.len(), path.display());
        units.extend(loaded);
    }

    log::info!(
        "Loaded {} unit(s) from {} file(s) in {}",
        units.len(),
        files.len(),
        dir.display()
    );
    Ok(units)
}

/// Sorted content files of a source directory, manifest excluded.
///
/// PDFs that are the conversion cache of a sibling `.doc` are left out; the
/// `.doc` already loads them, and the cache appearing between runs must not
/// change the chunk sequence.
pub fn content_files(dir: &Path, manifest_name: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    let manifest_pos = files
        .iter()
        .position(|p| p.file_name().map(|n| n == manifest_name).unwrap_or(false))
        .ok_or_else(|| AccordError::ManifestMissing(dir.join(manifest_name)))?;
    files.remove(manifest_pos);

    let doc_sources: Vec<PathBuf> = files
        .iter()
        .filter(|p| file_extension(p) == "doc")
        .map(|p| converted_pdf_path(p))
        .collect();
    files.retain(|p| !doc_sources.contains(p));

    files.sort();
    Ok(files)
}

/// Read a collection's manifest text. `None` when missing, unreadable or blank.
pub fn read_manifest(dir: &Path, manifest_name: &str) -> Option<String> {
    let path = dir.join(manifest_name);
    match std::fs::read_to_string(&path) {
        Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            log::debug!("No manifest at {}: {}", path.display(), e);
            None
        }
    }
}

/// Source directories under `data_root` whose name matches `pattern`, sorted.
pub fn discover_source_dirs(data_root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = globset::Glob::new(pattern)
        .map_err(|e| AccordError::Config(format!("Invalid data_dir_re glob {}: {}", pattern, e)))?
        .compile_matcher();

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(data_root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter(|p| {
            p.file_name()
                .map(|name| matcher.is_match(Path::new(name)))
                .unwrap_or(false)
        })
        .collect();

    dirs.sort();
    log::info!("Discovered {} source director(ies) in {}", dirs.len(), data_root.display());
    Ok(dirs)
}
