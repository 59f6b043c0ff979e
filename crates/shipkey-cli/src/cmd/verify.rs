//! `shipkey verify`

use std::fs::File;

use anyhow::Result;
use shipkey_core::signature::{self, SignatureParams};
use shipkey_core::{Error, Stage, checksum, keys, paths};
use shipkey_schema::{ChecksumAlgorithm, Encoding, SigningAlgorithm};

use super::selector;
use crate::ui::{Output, TerminalProgress};
use crate::{Globals, VerifyArgs};

/// Check a file's signature (and optionally its checksum) locally.
pub fn verify(args: &VerifyArgs, globals: &Globals, output: &Output) -> Result<()> {
    let algorithm: SigningAlgorithm = selector(&args.signing_algorithm)?;
    let encoding: Encoding = selector(&args.signature_encoding)?;
    let checksum_algorithm: ChecksumAlgorithm = selector(&args.checksum_algorithm)?;
    let checksum_encoding: Encoding = selector(&args.checksum_encoding)?;

    let key = keys::load_verify_key(&args.verify_key)?;
    let path = paths::existing_file(&args.path).map_err(|e| e.in_stage(Stage::Verification))?;
    let mut file = File::open(&path).map_err(|e| Error::path_in(Stage::Verification, &path, e))?;

    if let Some(expected) = &args.checksum {
        if !checksum::verify(&mut file, checksum_algorithm, checksum_encoding, expected)? {
            return Err(Error::VerificationFailed(format!(
                "checksum of {} does not match",
                path.display()
            ))
            .into());
        }
        output.success(&format!("checksum matches ({checksum_algorithm})"));
    }

    let params = SignatureParams {
        algorithm,
        context: args
            .signing_context
            .as_deref()
            .or(globals.product.as_deref()),
        encoding,
    };
    let progress = TerminalProgress::new();
    let valid =
        signature::verify_with_progress(&mut file, &key, &args.signature, params, &progress)?;
    progress.finish();

    if !valid {
        return Err(Error::VerificationFailed(format!(
            "{} was not signed by {key}",
            path.display()
        ))
        .into());
    }
    output.success(&format!("signature is valid ({algorithm})"));
    Ok(())
}
