//! Reads documents from local files and directories.
//!
//! Explicit file paths are loaded as given, whatever their extension, so
//! unsupported formats are reported by the parser. Directories are walked
//! recursively and contribute their `*.pdf` files in sorted path order.
//!
//! A document's name is its file name. Within one load, a name that was
//! already seen is skipped with a warning, since names identify documents
//! within a session.

use anyhow::{bail, Context, Result};
use docent_core::models::{Document, DocumentFormat};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn load_documents(paths: &[PathBuf]) -> Result<Vec<Document>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(pdf_files_under(path)?);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            bail!("Path does not exist: {}", path.display());
        }
    }

    let mut seen = HashSet::new();
    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow::anyhow!("Not a file: {}", file.display()))?;
        if !seen.insert(name.clone()) {
            tracing::warn!(path = %file.display(), "skipping duplicate document name {}", name);
            continue;
        }
        let bytes =
            std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
        documents.push(Document::new(name, bytes));
    }

    Ok(documents)
}

fn pdf_files_under(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if DocumentFormat::from_name(&name) == DocumentFormat::Pdf {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_yield_sorted_pdfs_and_skip_duplicates() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::write(root.join("b.pdf"), b"b").unwrap();
        std::fs::write(root.join("a.PDF"), b"a").unwrap();
        std::fs::write(root.join("notes.txt"), b"skip me").unwrap();
        std::fs::write(root.join("nested").join("b.pdf"), b"dup").unwrap();
        std::fs::write(root.join("nested").join("c.pdf"), b"c").unwrap();

        let docs = load_documents(&[root.to_path_buf()]).unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf", "c.pdf"]);
        assert_eq!(docs[1].content(), b"b");
    }

    #[test]
    fn explicit_files_keep_their_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("notes.txt");
        std::fs::write(&file, b"plain").unwrap();

        let docs = load_documents(&[file]).unwrap();
        assert_eq!(docs[0].format(), DocumentFormat::Txt);
    }

    #[test]
    fn missing_path_is_an_error() {
        let err = load_documents(&[PathBuf::from("/nonexistent/docs")]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
