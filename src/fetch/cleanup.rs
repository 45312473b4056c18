use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Recursively delete `path`, tolerating read-only entries.
///
/// On a permission error every entry under `path` is made writable and the
/// delete is retried once. A missing path is not an error.
pub fn remove_dir_all_force(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }

    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            log::debug!(
                "Permission denied removing {} ({}), clearing read-only flags and retrying",
                path.display(),
                e
            );
            make_tree_writable(path)?;
            fs::remove_dir_all(path)
        }
        Err(e) => Err(e),
    }
}

fn make_tree_writable(root: &Path) -> io::Result<()> {
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if entry.path_is_symlink() {
            continue;
        }
        let metadata = entry.metadata().map_err(io::Error::other)?;
        let mut permissions = metadata.permissions();
        if permissions.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            fs::set_permissions(entry.path(), permissions)?;
        }
    }
    Ok(())
}
