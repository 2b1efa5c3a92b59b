use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

pub fn create_dir_all<P: AsRef<Path>>(dest_path: P) -> Result<()> {
    let dest_path = dest_path.as_ref();
    std::fs::create_dir_all(dest_path).map_err(Error::IoError)
}

/// Writes `content` to `dest_path` without ever leaving a partial file there.
///
/// The content goes to a temporary file in the destination directory, which
/// is then renamed over the destination. An existing destination keeps its
/// permissions.
///
/// # Arguments
/// * `content` - Text to write
/// * `dest_path` - Final location of the file
///
/// # Returns
/// * `Result<()>` - [`Error::DestinationWrite`] if any step fails
pub fn write_file_atomic<P: AsRef<Path>>(content: &str, dest_path: P) -> Result<()> {
    let dest_path = dest_path.as_ref();
    let failed = |e: &dyn std::fmt::Display| Error::DestinationWrite {
        path: dest_path.to_path_buf(),
        description: e.to_string(),
    };

    let parent = match dest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    create_dir_all(parent).map_err(|e| failed(&e))?;

    let mut file = NamedTempFile::new_in(parent).map_err(|e| failed(&e))?;
    file.write_all(content.as_bytes()).map_err(|e| failed(&e))?;
    file.as_file().sync_all().map_err(|e| failed(&e))?;

    let permissions = match fs::metadata(dest_path) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => default_permissions(),
    };
    if let Some(permissions) = permissions {
        fs::set_permissions(file.path(), permissions).map_err(|e| failed(&e))?;
    }

    file.persist(dest_path).map_err(|e| failed(&e.error))?;
    Ok(())
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// SHA-256 of a file's content, hex encoded.
pub fn file_digest<P: AsRef<Path>>(path: P) -> Result<String> {
    let content = fs::read(path.as_ref())?;
    Ok(hex::encode(Sha256::digest(&content)))
}

/// Stable identity of a path that may not exist yet.
///
/// Existing paths are canonicalized. For a missing file the parent directory
/// is canonicalized instead, so the key matches the path a watcher reports
/// once the file is created.
pub fn source_key<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (parent.canonicalize(), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}
