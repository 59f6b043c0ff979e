//! Path expansion helpers.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Expand a leading `~` to the user's home directory.
///
/// # Errors
///
/// Returns [`Error::Path`] if the path starts with `~` and no home directory
/// can be determined.
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };
    let home = dirs::home_dir().ok_or_else(|| Error::path(path, "cannot expand ~"))?;
    Ok(home.join(rest))
}

/// Expand `path` and require it to name an existing regular file.
///
/// # Errors
///
/// Returns [`Error::Path`] if the file is missing or is a directory.
pub fn existing_file(path: &Path) -> Result<PathBuf> {
    let expanded = expand_home(path)?;
    match std::fs::metadata(&expanded) {
        Ok(meta) if meta.is_dir() => Err(Error::path(&expanded, "is a directory")),
        Ok(_) => Ok(expanded),
        Err(e) => Err(Error::path(&expanded, e)),
    }
}

/// Expand `path` and require that nothing exists there yet.
///
/// # Errors
///
/// Returns [`Error::Path`] if the path already exists.
pub fn vacant(path: &Path) -> Result<PathBuf> {
    let expanded = expand_home(path)?;
    if expanded.exists() {
        return Err(Error::path(&expanded, "already exists"));
    }
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_plain_paths_untouched() {
        let p = Path::new("relative/key.pub");
        assert_eq!(expand_home(p).unwrap(), p);
    }

    #[test]
    fn test_tilde_expands() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/k.key")).unwrap(), home.join("k.key"));
        }
    }

    #[test]
    fn test_existing_file_rejects_directories() {
        let dir = tempdir().unwrap();
        assert!(matches!(existing_file(dir.path()), Err(Error::Path { .. })));
        assert!(existing_file(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_vacant() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a");
        assert!(vacant(&file).is_ok());
        std::fs::write(&file, "x").unwrap();
        assert!(vacant(&file).is_err());
    }
}
