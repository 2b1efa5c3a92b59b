use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Extension trait for Path to provide conversions used by definition loading
pub trait PathExt {
    /// Converts a path to a string slice, returning an error if the path contains invalid Unicode characters.
    ///
    /// # Returns
    /// * `Ok(&str)` - A string slice representing the path
    /// * `Err(Error)` - If the path contains invalid Unicode characters
    ///
    /// # Examples
    /// ```
    /// use templer::ext::PathExt;
    /// use std::path::Path;
    ///
    /// let path = Path::new("test");
    /// assert_eq!(path.to_str_checked().unwrap(), "test");
    /// ```
    fn to_str_checked(&self) -> Result<&str>;

    /// Joins a relative path onto `base`; absolute paths are returned unchanged.
    ///
    /// # Examples
    /// ```
    /// use templer::ext::PathExt;
    /// use std::path::{Path, PathBuf};
    ///
    /// assert_eq!(Path::new("a.yml").resolve_from("defs"), PathBuf::from("defs/a.yml"));
    /// assert_eq!(Path::new("/etc/a.yml").resolve_from("defs"), PathBuf::from("/etc/a.yml"));
    /// ```
    fn resolve_from<B: AsRef<Path>>(&self, base: B) -> PathBuf;

    /// Directory that relative paths declared inside this file are resolved against.
    fn base_dir(&self) -> PathBuf;
}

impl PathExt for Path {
    fn to_str_checked(&self) -> Result<&str> {
        self.to_str().ok_or_else(|| {
            Error::Other(anyhow::anyhow!(
                "Path '{}' contains invalid Unicode characters",
                self.display()
            ))
        })
    }

    fn resolve_from<B: AsRef<Path>>(&self, base: B) -> PathBuf {
        if self.is_absolute() {
            self.to_path_buf()
        } else {
            base.as_ref().join(self)
        }
    }

    fn base_dir(&self) -> PathBuf {
        self.parent().map(Path::to_path_buf).unwrap_or_default()
    }
}
