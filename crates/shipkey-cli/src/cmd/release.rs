//! Release management: `new`, `publish`, `yank`, `tag`, `untag`, `del`.

use anyhow::Result;
use shipkey_core::Error;
use shipkey_core::api::{ArtifactRef, ReleasePublisher, ReleaseRef, Resource};
use shipkey_schema::{Channel, ReleaseDescriptor};

use super::{client, selector};
use crate::ui::Output;
use crate::{Globals, NewArgs, ReleaseArgs};

fn release_ref(args: &ReleaseArgs) -> ReleaseRef {
    ReleaseRef::new(&args.release).in_package(args.package.clone())
}

/// Draft a release. Everything local is validated before the request.
pub async fn new(args: &NewArgs, globals: &Globals, output: &Output) -> Result<()> {
    let channel: Channel = selector(&args.channel)?;
    let mut release = ReleaseDescriptor::new(&args.version, channel)
        .map_err(Error::from)?
        .with_constraints(args.constraints.iter().map(String::as_str));
    if let Some(tag) = &args.tag {
        release = release.with_tag(tag.as_str());
    }
    if let Some(name) = &args.name {
        release = release.with_name(name.as_str());
    }
    if let Some(description) = &args.description {
        release = release.with_description(description.as_str());
    }
    if let Some(package) = &args.package {
        release = release.with_package(package.as_str());
    }
    if let Some(metadata) = &args.metadata {
        release = release.with_metadata_json(metadata).map_err(Error::from)?;
    }

    let api = client(globals)?;
    let record = api.create_release(&release).await.map_err(Error::Remote)?;
    output.success(&format!(
        "created {} release {}",
        release.channel.as_str(),
        release.version
    ));
    output.result(&record.id);
    Ok(())
}

/// Publish a draft.
pub async fn publish(args: &ReleaseArgs, globals: &Globals, output: &Output) -> Result<()> {
    let api = client(globals)?;
    api.publish_release(&release_ref(args))
        .await
        .map_err(Error::Remote)?;
    output.success(&format!("published release {}", args.release));
    Ok(())
}

/// Yank a published release.
pub async fn yank(args: &ReleaseArgs, globals: &Globals, output: &Output) -> Result<()> {
    let api = client(globals)?;
    api.yank_release(&release_ref(args))
        .await
        .map_err(Error::Remote)?;
    output.success(&format!("yanked release {}", args.release));
    Ok(())
}

/// Set (`Some`) or clear (`None`) the release tag.
pub async fn tag(
    args: &ReleaseArgs,
    tag: Option<&str>,
    globals: &Globals,
    output: &Output,
) -> Result<()> {
    let api = client(globals)?;
    api.tag_release(&release_ref(args), tag)
        .await
        .map_err(Error::Remote)?;
    match tag {
        Some(tag) => output.success(&format!("tagged release {} as {tag}", args.release)),
        None => output.success(&format!("removed tag from release {}", args.release)),
    }
    Ok(())
}

/// Delete the release, or only `artifact` within it.
pub async fn del(
    args: &ReleaseArgs,
    artifact: Option<&str>,
    globals: &Globals,
    output: &Output,
) -> Result<()> {
    let resource: Box<dyn Resource> = match artifact {
        Some(artifact) => Box::new(ArtifactRef::new(artifact, Some(args.release.clone()))),
        None => Box::new(release_ref(args)),
    };
    let (kind, id) = resource.identify();
    let label = format!("{kind} {id}");

    let api = client(globals)?;
    resource.delete(&api).await.map_err(Error::Remote)?;
    output.success(&format!("deleted {label}"));
    Ok(())
}
