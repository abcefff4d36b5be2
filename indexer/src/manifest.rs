use anyhow::{bail, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const MANIFEST_FILE: &str = "corpus.dat";

/// Every file under `root`, relative to it and sorted. The manifest itself is skipped.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("'{}' is not a directory", root.display());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root)?.to_path_buf();
        if rel == Path::new(MANIFEST_FILE) {
            continue;
        }
        files.push(rel);
    }
    files.sort();
    Ok(files)
}

/// Write `corpus.dat` into `root` listing every corpus file, and return its path.
pub fn generate_manifest(root: &Path) -> Result<PathBuf> {
    let files = list_files(root)?;
    if files.is_empty() {
        bail!("the corpus '{}' is empty", root.display());
    }
    let path = root.join(MANIFEST_FILE);
    let mut w = BufWriter::new(File::create(&path)?);
    writeln!(w, "{}", files.len())?;
    for file in &files {
        writeln!(w, "./{}", file.display())?;
    }
    w.flush()?;
    tracing::info!(files = files.len(), path = %path.display(), "corpus manifest generated");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use tierdex_core::builder::Manifest;

    #[test]
    fn manifest_lists_nested_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/c")).unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::write(dir.path().join("b/c/d.txt"), "").unwrap();

        let path = generate_manifest(dir.path()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "2\n./a.txt\n./b/c/d.txt\n");

        // Regenerating does not list the manifest itself.
        generate_manifest(dir.path()).unwrap();
        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.len(), 2);
        assert!(manifest.paths().all(|p| p.exists()));
    }

    #[test]
    fn empty_corpus_is_rejected() {
        let dir = tempdir().unwrap();
        assert!(generate_manifest(dir.path()).is_err());
        assert!(list_files(&dir.path().join("nope")).is_err());
    }
}
