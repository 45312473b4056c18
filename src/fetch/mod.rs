//! Repository fetching: per-call clone workspaces and libgit2 clones.

pub mod cleanup;

pub use cleanup::remove_dir_all_force;

use crate::error::{CodescribeError, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A unique, ephemeral directory a repository is cloned into.
///
/// The directory is removed when the workspace is dropped unless
/// [`CloneWorkspace::remove`] already removed it.
#[derive(Debug)]
pub struct CloneWorkspace {
    path: PathBuf,
    removed: bool,
}

impl CloneWorkspace {
    /// Allocate `{prefix}_{uuid}`, clearing anything left at that path.
    pub fn create(prefix: &Path) -> Result<Self> {
        let path = unique_path(prefix);

        if path.exists() {
            remove_dir_all_force(&path).map_err(|e| {
                CodescribeError::Fetch(format!(
                    "Failed to clear workspace {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CodescribeError::Fetch(format!(
                        "Failed to create workspace parent {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the workspace directory now.
    pub fn remove(&mut self) -> std::io::Result<()> {
        if self.removed {
            return Ok(());
        }
        remove_dir_all_force(&self.path)?;
        self.removed = true;
        Ok(())
    }
}

impl Drop for CloneWorkspace {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            log::warn!("Failed to remove workspace {}: {}", self.path.display(), e);
        }
    }
}

fn unique_path(prefix: &Path) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!("_{}", Uuid::new_v4()));
    PathBuf::from(name)
}

/// Clone `url` into `dest`. A positive `depth` requests a shallow fetch,
/// 0 clones the full history. Local paths and `file://` URLs are always
/// cloned in full since libgit2's local transport cannot fetch shallowly.
pub fn shallow_clone(url: &str, dest: &Path, depth: i32) -> Result<()> {
    let depth = if depth > 0 && is_local_url(url) {
        log::debug!("{} is a local repository, cloning full history", url);
        0
    } else {
        depth
    };
    log::info!("Cloning {} into {} (depth {})", url, dest.display(), depth);

    let mut fetch_options = git2::FetchOptions::new();
    if depth > 0 {
        fetch_options.depth(depth);
    }

    let mut builder = git2::build::RepoBuilder::new();
    builder.fetch_options(fetch_options);
    builder.clone(url, dest).map_err(|e| {
        CodescribeError::Fetch(format!("Failed to clone {}: {}", url, e.message()))
    })?;

    log::info!("Clone complete: {}", dest.display());
    Ok(())
}

/// True for `file://` URLs and for paths to an existing directory.
fn is_local_url(url: &str) -> bool {
    if url.starts_with("file://") {
        return true;
    }
    !url.contains("://") && Path::new(url).is_dir()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::fs;
    use std::path::Path;

    /// Initialise a git repository at `dir` holding `files` in one commit.
    pub fn init_repo_with(dir: &Path, files: &[(&str, &str)]) {
        let repo = git2::Repository::init(dir).unwrap();
        for (name, content) in files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
    }
}
