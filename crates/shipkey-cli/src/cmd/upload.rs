//! `shipkey upload`
//!
//! Checksum and signature are computed over the same open file, which the
//! engines rewind between passes, and that handle is then streamed to the
//! upload URL. A checksum or signature given on the command line is sent as
//! is and not recomputed.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use shipkey_core::api::{HttpReleaseApi, ReleasePublisher, ReleaseRef, Resource};
use shipkey_core::signature::{self, SignatureParams};
use shipkey_core::{Error, Progress, Stage, checksum, keys, paths};
use shipkey_schema::{
    ArtifactDescriptor, ChecksumAlgorithm, Encoding, SigningAlgorithm, parse_metadata,
};
use tracing::debug;

use super::selector;
use crate::ui::{Output, TerminalProgress};
use crate::{Globals, UploadArgs};

/// Checksum, sign and upload one artifact.
pub async fn upload(args: &UploadArgs, globals: &Globals, output: &Output) -> Result<()> {
    let path = paths::existing_file(&args.path).map_err(|e| e.in_stage(Stage::Checksum))?;
    let config = globals.client_config()?;

    let mut file = File::open(&path).map_err(|e| Error::path_in(Stage::Checksum, &path, e))?;
    let filesize = file
        .metadata()
        .map_err(|e| Error::path_in(Stage::Checksum, &path, e))?
        .len();

    let progress = Arc::new(TerminalProgress::new());
    let artifact = describe_artifact(
        args,
        &path,
        &mut file,
        filesize,
        &config.product,
        progress.as_ref(),
    )?;
    progress.finish();
    if artifact.signature.is_none() {
        output.warning("no signing key given, uploading an unsigned artifact");
    }

    let api = HttpReleaseApi::new(config).map_err(Error::Remote)?;
    let release = ReleaseRef::new(&args.release.release).in_package(args.release.package.clone());
    let record = release.get(&api).await.map_err(Error::Remote)?;
    let target = api
        .create_artifact(&artifact, &record.id)
        .await
        .map_err(Error::Remote)?;
    debug!(artifact = ?target.artifact_id, content_type = %target.content_type, "uploading");

    api.upload_artifact(&target, file, filesize, progress.clone())
        .await
        .map_err(Error::Remote)?;
    progress.finish();

    output.success(&format!(
        "uploaded {} to release {}",
        artifact.filename, args.release.release
    ));
    if let Some(checksum) = &artifact.checksum {
        output.info(&format!("checksum: {checksum}"));
    }
    if let Some(signature) = &artifact.signature {
        output.info(&format!("signature: {signature}"));
    }
    Ok(())
}

/// Build the artifact attributes for `file`, computing whatever was not
/// given on the command line. `file` is left at position 0.
fn describe_artifact(
    args: &UploadArgs,
    path: &Path,
    file: &mut File,
    filesize: u64,
    product: &str,
    progress: &dyn Progress,
) -> Result<ArtifactDescriptor, Error> {
    let checksum_algorithm: ChecksumAlgorithm = selector(&args.checksum_algorithm)?;
    let checksum_encoding: Encoding = selector(&args.checksum_encoding)?;
    let signing_algorithm: SigningAlgorithm = selector(&args.signing.signing_algorithm)?;
    let signature_encoding: Encoding = selector(&args.signing.signature_encoding)?;
    let metadata = args
        .metadata
        .as_deref()
        .map(parse_metadata)
        .transpose()?
        .flatten();

    let mut artifact = ArtifactDescriptor::new(artifact_filename(args, path), filesize);
    if let Some(filetype) = &args.filetype {
        artifact.filetype = Some(filetype.clone());
    }
    artifact.platform.clone_from(&args.platform);
    artifact.arch.clone_from(&args.arch);
    artifact.metadata = metadata;

    artifact.checksum = match &args.checksum {
        Some(given) => Some(given.clone()),
        None => Some(checksum::compute_with_progress(
            file,
            checksum_algorithm,
            checksum_encoding,
            progress,
        )?),
    };

    artifact.signature = match &args.signature {
        Some(given) => Some(given.clone()),
        None => {
            let key = keys::load_signing_key(
                args.signing_key.as_deref(),
                args.signing_key_hex.as_deref(),
            )?;
            match key {
                Some(key) => {
                    let context = args.signing.signing_context.as_deref().unwrap_or(product);
                    let params = SignatureParams {
                        algorithm: signing_algorithm,
                        context: Some(context),
                        encoding: signature_encoding,
                    };
                    Some(signature::sign_with_progress(file, &key, params, progress)?)
                }
                None => None,
            }
        }
    };
    Ok(artifact)
}

fn artifact_filename(args: &UploadArgs, path: &Path) -> String {
    args.filename.clone().unwrap_or_else(|| {
        path.file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
    })
}
