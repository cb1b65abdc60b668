use serde_json::{json, Map, Value};

use crate::error::{PublishError, PublishResult};
use crate::poll::{self, PollOptions};
use crate::resource::kind::ResourceKind;
use crate::resource::model::{Invocation, Resource};

use super::output_schema;

/// Creates a source inside a revision.
///
/// # Arguments
///
/// * `revision` - The revision the source belongs to.
/// * `source_type` - The source description, e.g. `{"type": "url", "url": "..."}`.
/// * `parse_options` - Parse options for the source; `{}` keeps the server defaults.
///
/// # Returns
///
/// The new source, parented to the revision.
pub async fn create_source(
    revision: &Resource,
    source_type: Value,
    parse_options: Value,
) -> PublishResult<Resource> {
    let body = json!({
        "source_type": source_type,
        "parse_options": parse_options
    });

    revision
        .subresource(
            "create_source",
            Invocation::post().json(&body)?,
            ResourceKind::Source,
        )
        .await
}

/// Creates an upload source for `filename`. Upload the bytes with
/// [`source::upload`](super::source::upload) or one of its shorthands.
/// `parse_options` of `None` keeps the server defaults.
pub async fn create_upload(
    revision: &Resource,
    filename: &str,
    parse_options: Option<&Value>,
) -> PublishResult<Resource> {
    create_source(
        revision,
        json!({"type": "upload", "filename": filename}),
        parse_options_or_default(parse_options),
    )
    .await
}

/// Creates an upload source whose bytes are kept as they are, without
/// parsing them into rows
pub async fn source_as_blob(
    revision: &Resource,
    filename: &str,
    parse_options: Option<&Value>,
) -> PublishResult<Resource> {
    let mut options = match parse_options {
        Some(Value::Object(fields)) => fields.clone(),
        _ => Map::new(),
    };
    options.insert("parse_source".to_string(), Value::Bool(false));

    create_upload(revision, filename, Some(&Value::Object(options))).await
}

/// Creates a source that pulls its data from `url`
pub async fn source_from_url(
    revision: &Resource,
    url: &str,
    parse_options: Option<&Value>,
) -> PublishResult<Resource> {
    create_source(
        revision,
        json!({"type": "url", "url": url}),
        parse_options_or_default(parse_options),
    )
    .await
}

/// Creates a source from the data already in the revision's view
pub async fn source_from_dataset(
    revision: &Resource,
    parse_options: Option<&Value>,
) -> PublishResult<Resource> {
    let fourfour = view_id(revision)?.to_string();
    create_source(
        revision,
        json!({"type": "view", "fourfour": fourfour}),
        parse_options_or_default(parse_options),
    )
    .await
}

/// Creates a source fed by a connection agent.
///
/// # Arguments
///
/// * `revision` - The revision the source belongs to.
/// * `agent_uid` - The agent holding the data.
/// * `namespace` - The agent namespace the data lives in.
/// * `path` - Path of the data within the namespace.
/// * `parse_options` - Parse options for the source; `None` keeps the server defaults.
pub async fn source_from_agent(
    revision: &Resource,
    agent_uid: &str,
    namespace: &str,
    path: &str,
    parse_options: Option<&Value>,
) -> PublishResult<Resource> {
    create_source(
        revision,
        json!({
            "type": "connection_agent",
            "agent_uid": agent_uid,
            "namespace": namespace,
            "path": path
        }),
        parse_options_or_default(parse_options),
    )
    .await
}

fn parse_options_or_default(parse_options: Option<&Value>) -> Value {
    parse_options.cloned().unwrap_or_else(|| json!({}))
}

/// Lists the sources of a revision
pub async fn list_sources(revision: &Resource) -> PublishResult<Vec<Resource>> {
    revision
        .subresources("list_sources", Invocation::get(), ResourceKind::Source)
        .await
}

/// The output schema the revision will apply, if one has been set.
///
/// Refreshes the revision first, then searches the output schemas embedded
/// in its sources.
pub async fn get_output_schema(revision: &mut Resource) -> PublishResult<Option<Resource>> {
    revision.show().await?;

    let Some(output_schema_id) = revision.attribute("output_schema_id").and_then(Value::as_u64)
    else {
        return Ok(None);
    };

    let sources = list_sources(revision).await?;

    Ok(sources
        .iter()
        .flat_map(|source| source.children("input_schemas"))
        .flat_map(|input_schema| input_schema.children("output_schemas"))
        .find(|output_schema| {
            output_schema.attribute("id").and_then(Value::as_u64) == Some(output_schema_id)
        })
        .cloned())
}

/// Updates the revision in place.
///
/// # Arguments
///
/// * `revision` - The revision to update.
/// * `body` - The changes, e.g. `{"metadata": {"name": "new name"}}`.
pub async fn update<'r>(revision: &'r mut Resource, body: &Value) -> PublishResult<&'r mut Resource> {
    revision.mutate("update", Invocation::put().json(body)?).await
}

/// Sets the output schema that applying the revision will use
pub async fn set_output_schema(
    revision: &mut Resource,
    output_schema_id: u64,
) -> PublishResult<&mut Resource> {
    update(revision, &json!({"output_schema_id": output_schema_id})).await
}

/// Discards an open revision. Returns the server's response.
pub async fn discard(revision: &Resource) -> PublishResult<Value> {
    revision.invoke("discard", Invocation::delete()).await
}

/// The list of operations applying this revision would perform
pub async fn plan(revision: &Resource) -> PublishResult<Value> {
    let response = revision.invoke("plan", Invocation::get()).await?;

    match response {
        Value::Object(mut body) => body
            .remove("resource")
            .ok_or_else(|| PublishError::malformed("plan response has no `resource`")),
        other => Err(PublishError::malformed(format!(
            "expected a plan envelope, got {other}"
        ))),
    }
}

/// Applies the revision to its view.
///
/// When an output schema is given and has not completed yet, this waits
/// for it first, unless its source is a view source that has not been
/// loaded. The revision is refreshed afterwards so the new job shows up in
/// its attributes.
///
/// # Arguments
///
/// * `revision` - The revision to apply.
/// * `output_schema` - The output schema to apply; `None` for metadata-only revisions.
/// * `options` - Timing policy for waiting on the output schema.
///
/// # Returns
///
/// The job running the apply.
pub async fn apply(
    revision: &mut Resource,
    output_schema: Option<&mut Resource>,
    options: &PollOptions,
) -> PublishResult<Resource> {
    let mut body = json!({});

    if let Some(schema) = output_schema {
        if !schema.is_set("completed_at") && needs_wait(schema).await? {
            output_schema::wait_for_finish(schema, poll::noop, options).await?;
        }

        let id = schema
            .attribute("id")
            .cloned()
            .ok_or_else(|| PublishError::malformed("output schema has no id"))?;
        body["output_schema_id"] = id;
    }

    let job = revision
        .subresource("apply", Invocation::put().json(&body)?, ResourceKind::Job)
        .await?;

    tracing::info!(revision = %revision, "Applied revision");
    revision.show().await?;

    Ok(job)
}

// An unloaded view source never produces a completed output schema
async fn needs_wait(output_schema: &Resource) -> PublishResult<bool> {
    let Some(source) = output_schema.parent().and_then(Resource::parent) else {
        return Ok(true);
    };

    let source = source.refresh().await?;
    let is_unloaded_view = source
        .attribute("source_type")
        .map(|source_type| {
            source_type["type"] == json!("view") && source_type["loaded"] != json!(true)
        })
        .unwrap_or(false);

    Ok(!is_unloaded_view)
}

/// The id of the view the revision belongs to
pub fn view_id(revision: &Resource) -> PublishResult<&str> {
    revision
        .attribute("fourfour")
        .and_then(Value::as_str)
        .ok_or_else(|| PublishError::malformed("revision has no fourfour"))
}

/// The landing page of the revision in the web UI.
///
/// # Arguments
///
/// * `revision` - The revision.
/// * `base_url` - The web address of the site, e.g. `https://data.example.org`.
pub fn ui_url(revision: &Resource, base_url: &str) -> PublishResult<String> {
    let seq = revision
        .attribute("revision_seq")
        .and_then(Value::as_u64)
        .ok_or_else(|| PublishError::malformed("revision has no revision_seq"))?;

    Ok(format!(
        "{}/d/{}/revisions/{seq}",
        base_url.trim_end_matches('/'),
        view_id(revision)?
    ))
}
