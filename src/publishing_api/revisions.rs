//! Entry points into the publishing workflow.
//!
//! Everything else is reached through the links of the resources these
//! functions return; only these paths are fixed.

use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::PublishResult;
use crate::request::RequestType;
use crate::resource::kind::ResourceKind;
use crate::resource::model::Resource;
use crate::transport::Transport;

use super::import_config;

const PUBLISHING_ROOT: &str = "/api/publishing/v1";

/// What applying a revision does to the existing data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionAction {
    /// Replace all rows
    Replace,
    /// Upsert rows by row id, or append
    Update,
    /// Delete rows by row id
    Delete,
}

/// Visibility of the dataset once the revision is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    Public,
    Private,
}

impl fmt::Display for RevisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionAction::Replace => write!(f, "replace"),
            RevisionAction::Update => write!(f, "update"),
            RevisionAction::Delete => write!(f, "delete"),
        }
    }
}

fn revisions_path(fourfour: &str) -> String {
    format!("{PUBLISHING_ROOT}/revision/{fourfour}")
}

async fn fetch(
    transport: &Arc<dyn Transport>,
    method: Method,
    path: &str,
    context: RequestType,
) -> PublishResult<Value> {
    transport.send(method, path, None, context).await
}

/// Opens a revision on an existing view.
///
/// # Arguments
///
/// * `transport` - The transport used for this and every later request.
/// * `fourfour` - The id of the view the revision is opened on.
/// * `action` - Whether applying the revision replaces, updates or deletes data.
/// * `metadata` - Metadata changes to apply together with the revision.
/// * `permission` - Visibility after the revision is applied.
///
/// # Returns
///
/// The new revision.
pub async fn create_revision(
    transport: &Arc<dyn Transport>,
    fourfour: &str,
    action: RevisionAction,
    metadata: &Value,
    permission: Permission,
) -> PublishResult<Resource> {
    let body = json!({
        "metadata": metadata,
        "action": {
            "type": action,
            "permission": permission
        }
    });

    tracing::info!(fourfour, %action, "Opening revision");

    let response = fetch(
        transport,
        Method::POST,
        &revisions_path(fourfour),
        RequestType::json(&body)?,
    )
    .await?;

    Resource::from_response(ResourceKind::Revision, transport.clone(), response, None)
}

/// Opens a revision which, when applied, replaces the data of the view.
pub async fn create_replace_revision(
    transport: &Arc<dyn Transport>,
    fourfour: &str,
    metadata: &Value,
    permission: Permission,
) -> PublishResult<Resource> {
    create_revision(transport, fourfour, RevisionAction::Replace, metadata, permission).await
}

/// Opens a revision which, when applied, upserts or appends rows.
pub async fn create_update_revision(
    transport: &Arc<dyn Transport>,
    fourfour: &str,
    metadata: &Value,
    permission: Permission,
) -> PublishResult<Resource> {
    create_revision(transport, fourfour, RevisionAction::Update, metadata, permission).await
}

/// Opens a revision which, when applied, deletes rows by row id.
pub async fn create_delete_revision(
    transport: &Arc<dyn Transport>,
    fourfour: &str,
    metadata: &Value,
    permission: Permission,
) -> PublishResult<Resource> {
    create_revision(transport, fourfour, RevisionAction::Delete, metadata, permission).await
}

/// Opens a revision that creates a brand new dataset.
///
/// # Arguments
///
/// * `transport` - The transport used for this and every later request.
/// * `metadata` - Metadata of the new dataset, e.g. `{"name": "..."}`.
pub async fn new_dataset_revision(
    transport: &Arc<dyn Transport>,
    metadata: &Value,
) -> PublishResult<Resource> {
    let body = json!({
        "action": {"type": RevisionAction::Update},
        "metadata": metadata
    });

    let response = fetch(
        transport,
        Method::POST,
        &format!("{PUBLISHING_ROOT}/revision"),
        RequestType::json(&body)?,
    )
    .await?;

    Resource::from_response(ResourceKind::Revision, transport.clone(), response, None)
}

/// Opens a revision on a view that takes its action, parse options and
/// column transforms from an import config.
pub async fn create_using_config(
    transport: &Arc<dyn Transport>,
    fourfour: &str,
    config: &Resource,
) -> PublishResult<Resource> {
    let body = json!({"config": import_config::name(config)?});

    let response = fetch(
        transport,
        Method::POST,
        &revisions_path(fourfour),
        RequestType::json(&body)?,
    )
    .await?;

    Resource::from_response(ResourceKind::Revision, transport.clone(), response, None)
}

/// Looks up a revision of a view by its sequence number.
pub async fn lookup_revision(
    transport: &Arc<dyn Transport>,
    fourfour: &str,
    revision_seq: u64,
) -> PublishResult<Resource> {
    let path = format!("{}/{revision_seq}", revisions_path(fourfour));
    Resource::from_uri(ResourceKind::Revision, transport.clone(), &path).await
}

/// Lists every revision of a view.
pub async fn list_revisions(
    transport: &Arc<dyn Transport>,
    fourfour: &str,
) -> PublishResult<Vec<Resource>> {
    let response = fetch(
        transport,
        Method::GET,
        &revisions_path(fourfour),
        RequestType::Plain,
    )
    .await?;

    Resource::many(ResourceKind::Revision, transport.clone(), response, None)
}

/// Looks up a source by id.
pub async fn lookup_source(
    transport: &Arc<dyn Transport>,
    source_id: u64,
) -> PublishResult<Resource> {
    let path = format!("{PUBLISHING_ROOT}/source/{source_id}");
    Resource::from_uri(ResourceKind::Source, transport.clone(), &path).await
}

/// Creates an upload source that belongs to no revision yet.
///
/// Attach it later with
/// [`add_to_revision`](crate::publishing_api::source::add_to_revision).
pub async fn create_upload_source(
    transport: &Arc<dyn Transport>,
    filename: &str,
) -> PublishResult<Resource> {
    let body = json!({
        "source_type": {
            "type": "upload",
            "filename": filename
        }
    });

    let response = fetch(
        transport,
        Method::POST,
        &format!("{PUBLISHING_ROOT}/source"),
        RequestType::json(&body)?,
    )
    .await?;

    Resource::from_response(ResourceKind::Source, transport.clone(), response, None)
}
