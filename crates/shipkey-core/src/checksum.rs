//! Streaming checksums.
//!
//! Content is hashed in bounded chunks from offset 0, and the stream is
//! left at offset 0 afterwards (also on failure) so the same handle can be
//! passed on to signing and upload.

use std::io::{self, Read, Seek, SeekFrom};

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use shipkey_schema::{ChecksumAlgorithm, Encoding};

use crate::progress::{NullProgress, Progress, ProgressStage};
use crate::{Error, Result, Stage};

/// Read buffer size for all streaming hashes.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Encoded checksum of the whole stream.
///
/// # Errors
///
/// Returns [`Error::Read`] if the stream cannot be read or rewound.
pub fn compute<R: Read + Seek>(
    reader: &mut R,
    algorithm: ChecksumAlgorithm,
    encoding: Encoding,
) -> Result<String> {
    compute_with_progress(reader, algorithm, encoding, &NullProgress)
}

/// [`compute`], reporting bytes hashed to `progress`.
///
/// # Errors
///
/// Returns [`Error::Read`] if the stream cannot be read or rewound.
pub fn compute_with_progress<R: Read + Seek>(
    reader: &mut R,
    algorithm: ChecksumAlgorithm,
    encoding: Encoding,
    progress: &dyn Progress,
) -> Result<String> {
    let digest = digest_with_progress(reader, algorithm, progress)?;
    Ok(encoding.encode(digest))
}

/// Raw digest bytes of the whole stream.
///
/// # Errors
///
/// Returns [`Error::Read`] if the stream cannot be read or rewound.
pub fn digest<R: Read + Seek>(reader: &mut R, algorithm: ChecksumAlgorithm) -> Result<Vec<u8>> {
    digest_with_progress(reader, algorithm, &NullProgress)
}

fn digest_with_progress<R: Read + Seek>(
    reader: &mut R,
    algorithm: ChecksumAlgorithm,
    progress: &dyn Progress,
) -> Result<Vec<u8>> {
    let result = match algorithm {
        ChecksumAlgorithm::Sha512 => hash_stream::<Sha512, _>(reader, progress),
        ChecksumAlgorithm::Sha256 => hash_stream::<Sha256, _>(reader, progress),
        ChecksumAlgorithm::Sha1 => hash_stream::<Sha1, _>(reader, progress),
    };
    finish_rewound(reader, Stage::Checksum, result)
}

/// Compare the stream's checksum with `expected` text.
///
/// # Errors
///
/// Returns [`Error::Read`] if the stream cannot be read, or
/// [`Error::Invalid`] if `expected` is not valid text for `encoding`.
pub fn verify<R: Read + Seek>(
    reader: &mut R,
    algorithm: ChecksumAlgorithm,
    encoding: Encoding,
    expected: &str,
) -> Result<bool> {
    let expected = encoding.decode(expected)?;
    Ok(digest(reader, algorithm)? == expected)
}

fn hash_stream<D: Digest, R: Read + Seek>(
    reader: &mut R,
    progress: &dyn Progress,
) -> io::Result<Vec<u8>> {
    let mut hasher = D::new();
    feed(reader, &mut hasher, ProgressStage::Checksum, progress)?;
    Ok(hasher.finalize().to_vec())
}

/// Feed the whole stream (from offset 0) into `hasher` in [`CHUNK_SIZE`]
/// reads. Returns the number of bytes hashed.
pub(crate) fn feed<D: Digest, R: Read + Seek>(
    reader: &mut R,
    hasher: &mut D,
    stage: ProgressStage,
    progress: &dyn Progress,
) -> io::Result<u64> {
    let total = reader.seek(SeekFrom::End(0))?;
    reader.rewind()?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut done = 0u64;
    progress.on_progress(stage, 0, Some(total));
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
        done += n as u64;
        progress.on_progress(stage, done, Some(total));
    }
    Ok(done)
}

/// Rewind `reader` regardless of `result`, then surface the first failure.
pub(crate) fn finish_rewound<R: Seek, T>(
    reader: &mut R,
    stage: Stage,
    result: io::Result<T>,
) -> Result<T> {
    let rewind = reader.rewind();
    let value = result.map_err(|e| Error::read(stage, e))?;
    rewind.map_err(|e| Error::read(stage, e))?;
    Ok(value)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::progress::testing::RecordingProgress;
    use std::io::Cursor;

    /// Cursor that fails once `fail_after` bytes have been read.
    pub(crate) struct FlakyReader {
        pub(crate) inner: Cursor<Vec<u8>>,
        pub(crate) fail_after: u64,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.inner.position() >= self.fail_after {
                return Err(io::Error::other("disk went away"));
            }
            self.inner.read(buf)
        }
    }

    impl Seek for FlakyReader {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_known_vectors() {
        let mut abc = Cursor::new(b"abc".to_vec());
        assert_eq!(
            compute(&mut abc, ChecksumAlgorithm::Sha256, Encoding::Hex).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            compute(&mut abc, ChecksumAlgorithm::Sha1, Encoding::Hex).unwrap(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            compute(&mut abc, ChecksumAlgorithm::Sha512, Encoding::Hex).unwrap(),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn test_deterministic_and_rewound() {
        let data: Vec<u8> = (0..(3 * CHUNK_SIZE + 17)).map(|i| (i % 251) as u8).collect();
        let mut file = Cursor::new(data);
        let first = compute(&mut file, ChecksumAlgorithm::Sha512, Encoding::Base64Raw).unwrap();
        assert_eq!(file.position(), 0);
        let second = compute(&mut file, ChecksumAlgorithm::Sha512, Encoding::Base64Raw).unwrap();
        assert_eq!(file.position(), 0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_hashes_from_start_regardless_of_position() {
        let mut file = Cursor::new(b"hello world".to_vec());
        let expected = compute(&mut file, ChecksumAlgorithm::Sha256, Encoding::Hex).unwrap();
        file.set_position(5);
        let got = compute(&mut file, ChecksumAlgorithm::Sha256, Encoding::Hex).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_every_algorithm_and_encoding_round_trips() {
        let mut file = Cursor::new(b"release artifact".to_vec());
        for algorithm in [
            ChecksumAlgorithm::Sha512,
            ChecksumAlgorithm::Sha256,
            ChecksumAlgorithm::Sha1,
        ] {
            let raw = digest(&mut file, algorithm).unwrap();
            assert_eq!(raw.len(), algorithm.digest_len());
            for encoding in Encoding::ALL {
                let text = compute(&mut file, algorithm, encoding).unwrap();
                assert_eq!(encoding.decode(&text).unwrap(), raw, "{algorithm}/{encoding}");
                assert!(verify(&mut file, algorithm, encoding, &text).unwrap());
            }
        }
    }

    #[test]
    fn test_verify_detects_mismatch() {
        let mut file = Cursor::new(b"one".to_vec());
        let text = compute(&mut file, ChecksumAlgorithm::Sha256, Encoding::Hex).unwrap();
        let mut other = Cursor::new(b"two".to_vec());
        assert!(!verify(&mut other, ChecksumAlgorithm::Sha256, Encoding::Hex, &text).unwrap());
    }

    #[test]
    fn test_read_failure_still_rewinds() {
        let mut reader = FlakyReader {
            inner: Cursor::new(vec![1u8; 2 * CHUNK_SIZE]),
            fail_after: CHUNK_SIZE as u64,
        };
        let err = compute(&mut reader, ChecksumAlgorithm::Sha256, Encoding::Hex).unwrap_err();
        assert!(matches!(
            err,
            Error::Read {
                stage: Stage::Checksum,
                ..
            }
        ));
        assert_eq!(reader.inner.position(), 0);
    }

    #[test]
    fn test_reports_progress() {
        let progress = RecordingProgress::default();
        let mut file = Cursor::new(vec![0u8; CHUNK_SIZE + 1]);
        compute_with_progress(
            &mut file,
            ChecksumAlgorithm::Sha256,
            Encoding::Hex,
            &progress,
        )
        .unwrap();
        let events = progress.events.lock().unwrap();
        assert_eq!(events.first(), Some(&(ProgressStage::Checksum, 0, Some(65537))));
        assert_eq!(events.last(), Some(&(ProgressStage::Checksum, 65537, Some(65537))));
    }
}
