//! Atomic executable replacement.
//!
//! The new binary is written to a temp file in the target's directory, made
//! executable, synced and renamed over the target in one step. Until the
//! rename the target is untouched; a dropped [`StagedBinary`] deletes its
//! temp file.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use crate::{Error, Result};

/// A replacement binary being written next to its target.
#[derive(Debug)]
pub struct StagedBinary {
    file: NamedTempFile,
}

impl StagedBinary {
    /// Stage in the directory containing `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Install`] if the directory is not writable.
    pub fn for_target(target: &Path) -> Result<Self> {
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let file = tempfile::Builder::new()
            .prefix(".shipkey-upgrade-")
            .tempfile_in(dir)
            .map_err(|e| Error::install("creating staging file", e))?;
        Ok(Self { file })
    }

    /// Temp file path.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Temp file handle, for writing or verification.
    pub fn file_mut(&mut self) -> &mut File {
        self.file.as_file_mut()
    }

    /// Make executable, sync and rename over `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Install`]; the target is left as it was.
    pub fn commit(self, target: &Path) -> Result<()> {
        set_executable(self.file.as_file(), target)?;
        self.file
            .as_file()
            .sync_all()
            .map_err(|e| Error::install("syncing staging file", e))?;
        self.file
            .persist(target)
            .map_err(|e| Error::install("replacing executable", e.error))?;
        info!(target = %target.display(), "executable replaced");
        Ok(())
    }
}

#[cfg(unix)]
fn set_executable(file: &File, target: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let current = std::fs::metadata(target)
        .map(|m| m.permissions().mode() & 0o7777)
        .unwrap_or(0);
    file.set_permissions(std::fs::Permissions::from_mode(current | 0o755))
        .map_err(|e| Error::install("setting permissions", e))
}

#[cfg(not(unix))]
fn set_executable(_file: &File, _target: &Path) -> Result<()> {
    Ok(())
}

/// Copy `reader` into a staged file and commit it over `target`.
///
/// # Errors
///
/// Returns [`Error::Install`] if writing or committing fails.
pub fn install_from_reader<R: Read>(reader: &mut R, target: &Path) -> Result<u64> {
    let mut staged = StagedBinary::for_target(target)?;
    let written = io::copy(reader, staged.file_mut())
        .map_err(|e| Error::install("writing staging file", e))?;
    staged.commit(target)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::tests::FlakyReader;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[cfg(unix)]
    fn mode(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_replaces_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("tool");
        std::fs::write(&target, b"old").unwrap();

        let written =
            install_from_reader(&mut Cursor::new(b"new binary".to_vec()), &target).unwrap();
        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&target).unwrap(), b"new binary");
        assert_eq!(entries(dir.path()), vec!["tool"]);
        #[cfg(unix)]
        assert_eq!(mode(&target) & 0o755, 0o755);
    }

    #[test]
    fn test_failed_write_keeps_original() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("tool");
        std::fs::write(&target, b"original").unwrap();
        #[cfg(unix)]
        make_executable(&target);

        let mut reader = FlakyReader {
            inner: Cursor::new(vec![7u8; 256 * 1024]),
            fail_after: 100 * 1024,
        };
        let err = install_from_reader(&mut reader, &target).unwrap_err();

        assert!(matches!(err, Error::Install { .. }));
        assert_eq!(std::fs::read(&target).unwrap(), b"original");
        assert_eq!(entries(dir.path()), vec!["tool"]);
        #[cfg(unix)]
        assert_eq!(mode(&target), 0o755);
    }

    #[test]
    fn test_missing_directory_is_install_error() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nope/tool");
        let err = StagedBinary::for_target(&target).unwrap_err();
        assert_eq!(err.stage(), crate::Stage::Install);
    }
}
