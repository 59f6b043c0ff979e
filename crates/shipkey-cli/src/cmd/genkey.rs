//! `shipkey genkey`

use std::path::Path;

use anyhow::Result;
use shipkey_core::keygen;

use crate::ui::Output;

/// Generate a key pair and write it to `out` / `pubout`.
pub fn genkey(out: &Path, pubout: &Path, output: &Output) -> Result<()> {
    let pair = keygen::generate();
    let (signing, verify) = keygen::write_keypair(out, pubout, &pair)?;

    output.success(&format!("signing key written to {}", signing.display()));
    output.success(&format!("verify key written to {}", verify.display()));
    output.warning("keep the signing key secret, never commit it");
    output.result(&pair.verify.to_hex());
    Ok(())
}
