use serde_json::{json, Value};

use crate::error::{PublishError, PublishResult};
use crate::poll::{self, PollOptions};
use crate::resource::kind::ResourceKind;
use crate::resource::model::{Invocation, Resource};
use crate::upload::pipeline::{upload_bytes, UploadOptions};
use crate::upload::source::ByteSource;

use super::revision;

pub const CSV: &str = "text/csv";
pub const TSV: &str = "text/tab-separated-values";
pub const XLS: &str = "application/vnd.ms-excel";
pub const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const SHAPEFILE: &str = "application/zip";
pub const KML: &str = "application/vnd.google-earth.kml+xml";
pub const GEOJSON: &str = "application/vnd.geo+json";
pub const BLOB: &str = "application/octet-stream";

/// Uploads bytes into a source.
///
/// Prefer one of the shorthands ([`csv`], [`xlsx`], ...) which set the
/// content type for you. The upload runs in parallel chunks as negotiated
/// with the server; see [`upload_bytes`] for the retry behaviour.
///
/// # Arguments
///
/// * `source` - An upload source, e.g. from [`revision::create_upload`].
/// * `input` - A string, bytes, a file ([`ByteSource::from_path`]) or a stream of fragments.
/// * `content_type` - The content type the server parses the data as.
/// * `options` - Retry policy, progress bar and callbacks.
///
/// # Returns
///
/// The source, refreshed after the upload was committed.
pub async fn upload<'s>(
    source: &'s mut Resource,
    input: impl Into<ByteSource>,
    content_type: &str,
    options: &UploadOptions,
) -> PublishResult<&'s mut Resource> {
    upload_bytes(source, input, content_type, options).await
}

/// Uploads a CSV file
pub async fn csv<'s>(
    source: &'s mut Resource,
    input: impl Into<ByteSource>,
    options: &UploadOptions,
) -> PublishResult<&'s mut Resource> {
    upload(source, input, CSV, options).await
}

/// Uploads a TSV file
pub async fn tsv<'s>(
    source: &'s mut Resource,
    input: impl Into<ByteSource>,
    options: &UploadOptions,
) -> PublishResult<&'s mut Resource> {
    upload(source, input, TSV, options).await
}

/// Uploads an XLS workbook
pub async fn xls<'s>(
    source: &'s mut Resource,
    input: impl Into<ByteSource>,
    options: &UploadOptions,
) -> PublishResult<&'s mut Resource> {
    upload(source, input, XLS, options).await
}

/// Uploads an XLSX workbook
pub async fn xlsx<'s>(
    source: &'s mut Resource,
    input: impl Into<ByteSource>,
    options: &UploadOptions,
) -> PublishResult<&'s mut Resource> {
    upload(source, input, XLSX, options).await
}

/// Uploads a zipped shapefile archive
pub async fn shapefile<'s>(
    source: &'s mut Resource,
    input: impl Into<ByteSource>,
    options: &UploadOptions,
) -> PublishResult<&'s mut Resource> {
    upload(source, input, SHAPEFILE, options).await
}

pub async fn kml<'s>(
    source: &'s mut Resource,
    input: impl Into<ByteSource>,
    options: &UploadOptions,
) -> PublishResult<&'s mut Resource> {
    upload(source, input, KML, options).await
}

pub async fn geojson<'s>(
    source: &'s mut Resource,
    input: impl Into<ByteSource>,
    options: &UploadOptions,
) -> PublishResult<&'s mut Resource> {
    upload(source, input, GEOJSON, options).await
}

/// Uploads a file that should not be parsed, e.g. an image.
///
/// Parsing is switched off first when the source still has it on, which
/// produces a new source; the bytes go into that one.
pub async fn blob(
    source: &Resource,
    input: impl Into<ByteSource>,
    options: &UploadOptions,
) -> PublishResult<Resource> {
    let parses = source
        .attribute("parse_options")
        .and_then(|parse| parse.get("parse_source"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut target = if parses {
        update(source, &json!({"parse_options": {"parse_source": false}})).await?
    } else {
        source.clone()
    };

    upload(&mut target, input, BLOB, options).await?;
    Ok(target)
}

/// Posts changes to the source, returning the new version
pub async fn update(source: &Resource, body: &Value) -> PublishResult<Resource> {
    source
        .derive("update", Invocation::post().json(body)?)
        .await
}

/// Asks the connection agent behind the source to push only what changed
/// since its last push. Returns the new version of the source.
pub async fn give_incremental(source: &Resource) -> PublishResult<Resource> {
    source.derive("give_incremental", Invocation::post()).await
}

/// Asks the connection agent behind the source to push all of its data.
/// Returns the new version of the source.
pub async fn give_full(source: &Resource) -> PublishResult<Resource> {
    source.derive("give_full", Invocation::post()).await
}

/// Attaches a source to a revision, returning the new version
pub async fn add_to_revision(source: &Resource, revision: &Resource) -> PublishResult<Resource> {
    let revision_seq = revision
        .attribute("revision_seq")
        .cloned()
        .ok_or_else(|| PublishError::malformed("revision has no revision_seq"))?;

    let body = json!({
        "revision": {
            "fourfour": revision::view_id(revision)?,
            "revision_seq": revision_seq
        }
    });

    source
        .derive("add_to_revision", Invocation::patch().json(&body)?)
        .await
}

/// Forces a view source to load its data
pub async fn load(source: &mut Resource) -> PublishResult<&mut Resource> {
    let invocation = Invocation::put().json(&json!({}))?;

    if source.has_operation("load") {
        return source.mutate("load", invocation).await;
    }

    let path = format!("{}/load", source.uri("show")?);
    source.mutate_path(&path, invocation).await
}

/// Waits until the source has at least one input schema
pub async fn wait_for_schema<'s, P>(
    source: &'s mut Resource,
    progress: P,
    options: &PollOptions,
) -> PublishResult<&'s mut Resource>
where
    P: FnMut(&Resource),
{
    poll::wait_for_finish(
        source,
        |s| !s.children("input_schemas").is_empty(),
        |s| s.is_set("failed_at"),
        progress,
        options,
    )
    .await
}

/// Waits until the source has finished transforming and validating
pub async fn wait_for_finish<'s, P>(
    source: &'s mut Resource,
    progress: P,
    options: &PollOptions,
) -> PublishResult<&'s mut Resource>
where
    P: FnMut(&Resource),
{
    poll::wait_for_finish(
        source,
        |s| s.is_set("finished_at"),
        |s| s.is_set("failed_at"),
        progress,
        options,
    )
    .await
}

/// The newest input schema, waiting for the first one if needed
pub async fn latest_input_schema(
    source: &mut Resource,
    options: &PollOptions,
) -> PublishResult<Resource> {
    wait_for_schema(source, poll::noop, options).await?;

    newest(source.children("input_schemas"))
        .cloned()
        .ok_or_else(|| PublishError::malformed("source has no input schemas"))
}

/// Fetches one input schema of the source by id
pub async fn show_input_schema(source: &Resource, input_schema_id: u64) -> PublishResult<Resource> {
    source
        .subresource(
            "show_input_schema",
            Invocation::get().param("input_schema_id", input_schema_id),
            ResourceKind::InputSchema,
        )
        .await
}

/// The preview page of the source in the web UI. Only sources that
/// belong to a revision have one.
pub fn ui_url(source: &Resource, base_url: &str) -> PublishResult<String> {
    let revision = source
        .parent()
        .ok_or_else(|| PublishError::not_implemented("ui_url"))?;
    let id = source
        .attribute("id")
        .ok_or_else(|| PublishError::malformed("source has no id"))?;

    Ok(format!(
        "{}/sources/{id}/preview",
        revision::ui_url(revision, base_url)?
    ))
}

/// The resource with the largest numeric `id`
pub(crate) fn newest(resources: &[Resource]) -> Option<&Resource> {
    resources
        .iter()
        .max_by_key(|r| r.attribute("id").and_then(Value::as_u64).unwrap_or(0))
}
