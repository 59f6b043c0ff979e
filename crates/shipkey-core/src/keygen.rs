//! Key pair generation and key file writing.
//!
//! Both destinations are checked before either file is written, key files
//! are created exclusively (an existing secret is never overwritten), and
//! the signing key is readable by its owner only.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::RngCore;
use tracing::{debug, warn};

use crate::{Error, Result, SigningKey, VerifyKey, paths};

/// Default signing key file name.
pub const DEFAULT_SIGNING_KEY_FILE: &str = "shipkey.key";

/// Default verify key file name.
pub const DEFAULT_VERIFY_KEY_FILE: &str = "shipkey.pub";

/// A freshly generated key pair.
#[derive(Debug, Clone)]
pub struct Keypair {
    /// Secret half, 64-byte layout
    pub signing: SigningKey,
    /// Public half
    pub verify: VerifyKey,
}

/// Generate a key pair from the OS-seeded CSPRNG.
pub fn generate() -> Keypair {
    let mut seed = [0u8; 32];
    rand::rng().fill_bytes(&mut seed);
    let signing = SigningKey::from_seed(seed);
    let verify = signing.verify_key();
    Keypair { signing, verify }
}

/// Write both halves of `pair`, returning the expanded paths.
///
/// If writing the verify key fails, the signing key file just written is
/// removed again.
///
/// # Errors
///
/// Returns [`Error::Path`] if either path exists, cannot be expanded, both
/// name the same file, or a write fails.
pub fn write_keypair(
    signing_path: &Path,
    verify_path: &Path,
    pair: &Keypair,
) -> Result<(PathBuf, PathBuf)> {
    let signing_path = paths::vacant(signing_path)?;
    let verify_path = paths::vacant(verify_path)?;
    if signing_path == verify_path {
        return Err(Error::path(
            &verify_path,
            "signing and verify keys need different paths",
        ));
    }

    write_signing_key(&signing_path, &pair.signing)?;
    if let Err(e) = write_verify_key(&verify_path, &pair.verify) {
        if let Err(cleanup) = std::fs::remove_file(&signing_path) {
            warn!(path = %signing_path.display(), "failed to roll back signing key: {cleanup}");
        }
        return Err(e);
    }

    debug!(
        signing = %signing_path.display(),
        verify = %verify_path.display(),
        "wrote key pair"
    );
    Ok((signing_path, verify_path))
}

/// Create `path` exclusively with mode 0600 and write the signing key hex.
///
/// # Errors
///
/// Returns [`Error::Path`] if the file exists or cannot be written.
pub fn write_signing_key(path: &Path, key: &SigningKey) -> Result<()> {
    write_exclusive(path, key.to_hex().as_bytes(), 0o600)
}

/// Create `path` exclusively with mode 0644 and write the verify key hex.
///
/// # Errors
///
/// Returns [`Error::Path`] if the file exists or cannot be written.
pub fn write_verify_key(path: &Path, key: &VerifyKey) -> Result<()> {
    write_exclusive(path, key.to_hex().as_bytes(), 0o644)
}

#[cfg_attr(not(unix), allow(unused_variables))]
fn write_exclusive(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options.open(path).map_err(|e| Error::path(path, e))?;
    let written = file.write_all(contents).and_then(|()| file.sync_all());
    if let Err(e) = written {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(Error::path(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{load_signing_key, load_verify_key};
    use tempfile::tempdir;

    #[test]
    fn test_generate_is_consistent() {
        let pair = generate();
        assert_eq!(pair.signing.verify_key(), pair.verify);
        assert_eq!(pair.signing.to_bytes().len(), 64);
        assert_ne!(generate().verify, pair.verify);
    }

    #[test]
    fn test_write_and_reload() {
        let dir = tempdir().unwrap();
        let sk = dir.path().join("a.key");
        let pk = dir.path().join("a.pub");
        let pair = generate();

        write_keypair(&sk, &pk, &pair).unwrap();

        assert_eq!(load_signing_key(Some(&sk), None).unwrap().unwrap(), pair.signing);
        assert_eq!(load_verify_key(&pk).unwrap(), pair.verify);
        assert_eq!(std::fs::read_to_string(&pk).unwrap().len(), 64);
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let sk = dir.path().join("a.key");
        let pk = dir.path().join("a.pub");
        write_keypair(&sk, &pk, &generate()).unwrap();

        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&sk), 0o600);
        // umask may strip group/other bits but never adds any
        assert_eq!(mode(&pk) & !0o644, 0);
        assert_ne!(mode(&pk) & 0o400, 0);
    }

    #[test]
    fn test_existing_verify_path_blocks_both_writes() {
        let dir = tempdir().unwrap();
        let sk = dir.path().join("a.key");
        let pk = dir.path().join("a.pub");
        std::fs::write(&pk, "keep me").unwrap();

        let err = write_keypair(&sk, &pk, &generate()).unwrap_err();
        assert!(matches!(err, Error::Path { .. }));
        assert!(!sk.exists());
        assert_eq!(std::fs::read_to_string(&pk).unwrap(), "keep me");
    }

    #[test]
    fn test_existing_signing_key_not_overwritten() {
        let dir = tempdir().unwrap();
        let sk = dir.path().join("a.key");
        std::fs::write(&sk, "secret").unwrap();
        assert!(write_signing_key(&sk, &generate().signing).is_err());
        assert_eq!(std::fs::read_to_string(&sk).unwrap(), "secret");
    }

    #[test]
    fn test_second_write_failure_rolls_back_first() {
        let dir = tempdir().unwrap();
        let sk = dir.path().join("a.key");
        // parent directory does not exist, so the verify write fails
        let pk = dir.path().join("missing").join("a.pub");

        assert!(write_keypair(&sk, &pk, &generate()).is_err());
        assert!(!sk.exists());
    }

    #[test]
    fn test_same_path_rejected() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("k");
        assert!(write_keypair(&p, &p, &generate()).is_err());
        assert!(!p.exists());
    }
}
