use walkdir::{DirEntry, WalkDir};
use std::path::{Path, PathBuf};
use crate::error::{Result, CodescribeError};

/// Metadata for a discovered file
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub extension: String,
}

/// Discover all files under `root` whose name ends with one of `suffixes`.
///
/// Matching is case-insensitive; suffixes are given with their leading dot
/// (e.g. `.py`). The `.git` directory is never descended into. Results are
/// sorted by relative path so repeated runs over the same tree agree.
pub fn discover_files(root: &Path, suffixes: &[String]) -> Result<Vec<FileMetadata>> {
    if !root.is_dir() {
        return Err(CodescribeError::Load(format!(
            "Not a directory: {}",
            root.display()
        )));
    }

    let suffixes: Vec<String> = suffixes.iter().map(|s| s.to_lowercase()).collect();
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_git_dir(e))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().to_lowercase();
        if !suffixes.iter().any(|suffix| file_name.ends_with(suffix.as_str())) {
            continue;
        }

        let relative_path = path
            .strip_prefix(root)
            .map_err(|_| CodescribeError::Load(
                format!("Failed to compute relative path for: {}", path.display())
            ))?
            .to_string_lossy()
            .replace('\\', "/");

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        files.push(FileMetadata {
            relative_path,
            absolute_path: path.to_path_buf(),
            extension,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    log::info!("Discovered {} files in {}", files.len(), root.display());
    Ok(files)
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == ".git"
}
