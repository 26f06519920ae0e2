//! PDF discovery and page extraction.
//!
//! Walks a directory tree (or takes a single file), parses every `.pdf` it
//! finds, and returns one [`Document`] per page. A file that fails to parse
//! is logged and recorded in [`LoadReport::failures`]; it never aborts the
//! rest of the load. Finding no PDFs at all is the normal "empty" state.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::models::Document;

/// A PDF that could not be read or parsed.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of scanning a path for PDFs.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    /// Number of PDF files discovered, including ones that failed.
    pub pdf_files: usize,
    pub failures: Vec<LoadFailure>,
}

/// Load every PDF under `root`, one [`Document`] per page.
pub fn load_documents(root: &Path) -> LoadReport {
    let pdf_paths = discover_pdfs(root);
    let mut report = LoadReport {
        pdf_files: pdf_paths.len(),
        ..LoadReport::default()
    };

    if pdf_paths.is_empty() {
        info!(root = %root.display(), "no PDF files found");
        return report;
    }

    for path in pdf_paths {
        match load_pdf(&path) {
            Ok(pages) => report.documents.extend(pages),
            Err(reason) => {
                warn!(file = %path.display(), error = %reason, "skipping PDF that failed to load");
                report.failures.push(LoadFailure { path, reason });
            }
        }
    }

    info!(
        documents = report.documents.len(),
        pdf_files = report.pdf_files,
        failed = report.failures.len(),
        "loaded PDF pages"
    );
    report
}

/// Returns true when `path` has a `.pdf` extension, ignoring case.
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn discover_pdfs(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_pdf(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    // Sort for deterministic ordering
    paths.sort();
    paths
}

fn load_pdf(path: &Path) -> Result<Vec<Document>, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("read failed: {}", e))?;
    let pages = extract_pages(&bytes)?;
    let source = path.to_string_lossy().to_string();

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(page, text)| Document {
            text,
            source: source.clone(),
            page: page as u32,
        })
        .collect())
}

/// Extract the text of each page. The PDF parser can panic on malformed
/// input, so a panic is reported as an ordinary failure.
fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, String> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));

    match result {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(format!("PDF extraction failed: {}", e)),
        Err(_) => Err("PDF extraction failed: parser panicked".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_root_is_empty() {
        let report = load_documents(Path::new("/definitely/not/here"));
        assert!(report.documents.is_empty());
        assert_eq!(report.pdf_files, 0);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn non_pdf_files_ignored() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.txt"), "plain text").unwrap();
        fs::write(tmp.path().join("readme.md"), "# readme").unwrap();
        let report = load_documents(tmp.path());
        assert_eq!(report.pdf_files, 0);
        assert!(report.documents.is_empty());
    }

    #[test]
    fn corrupt_pdf_recorded_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("bad.PDF"), b"not a valid pdf").unwrap();

        let report = load_documents(tmp.path());
        assert_eq!(report.pdf_files, 1);
        assert!(report.documents.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("bad.PDF"));
    }

    #[test]
    fn extension_check_ignores_case() {
        assert!(is_pdf(Path::new("a/b/Report.Pdf")));
        assert!(!is_pdf(Path::new("a/b/report.pdf.txt")));
        assert!(!is_pdf(Path::new("pdf")));
    }
}
