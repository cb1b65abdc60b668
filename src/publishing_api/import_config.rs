//! Import configs: named defaults for the revisions opened with them.
//!
//! A config fixes the action a revision performs along with the parse
//! options and column transforms its uploads get. Changing a config
//! changes every revision opened against it afterwards.

use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};

use crate::error::{PublishError, PublishResult};
use crate::request::RequestType;
use crate::resource::kind::ResourceKind;
use crate::resource::model::{Invocation, Resource};
use crate::transport::Transport;

use super::revisions::RevisionAction;

const CONFIG_ROOT: &str = "/api/publishing/v1/config";

/// Creates an import config.
///
/// # Arguments
///
/// * `transport` - The transport used for this and every later request.
/// * `name` - Unique name of the config on the site.
/// * `data_action` - What revisions opened with this config do to the data.
/// * `parse_options` - Parse options for uploads; `None` keeps the server defaults.
/// * `columns` - Column transforms for uploads; `None` keeps the server defaults.
pub async fn create(
    transport: &Arc<dyn Transport>,
    name: &str,
    data_action: RevisionAction,
    parse_options: Option<&Value>,
    columns: Option<&Value>,
) -> PublishResult<Resource> {
    let body = json!({
        "name": name,
        "data_action": data_action,
        "parse_options": parse_options,
        "columns": columns
    });

    tracing::info!(name, %data_action, "Creating import config");

    let response = transport
        .send(Method::POST, CONFIG_ROOT, None, RequestType::json(&body)?)
        .await?;

    Resource::from_response(ResourceKind::ImportConfig, transport.clone(), response, None)
}

/// Looks up an import config by name
pub async fn lookup(transport: &Arc<dyn Transport>, name: &str) -> PublishResult<Resource> {
    let path = format!("{CONFIG_ROOT}/{name}");
    Resource::from_uri(ResourceKind::ImportConfig, transport.clone(), &path).await
}

/// Lists every import config of the site
pub async fn list(transport: &Arc<dyn Transport>) -> PublishResult<Vec<Resource>> {
    let response = transport
        .send(Method::GET, CONFIG_ROOT, None, RequestType::Plain)
        .await?;

    Resource::many(ResourceKind::ImportConfig, transport.clone(), response, None)
}

/// Changes the config in place. Fields left as `None` keep their current value.
pub async fn update<'c>(
    config: &'c mut Resource,
    data_action: Option<RevisionAction>,
    parse_options: Option<&Value>,
    columns: Option<&Value>,
) -> PublishResult<&'c mut Resource> {
    let current = |name: &str| config.attribute(name).cloned().unwrap_or(Value::Null);

    let body = json!({
        "data_action": data_action.map_or_else(|| current("data_action"), |action| json!(action)),
        "parse_options": parse_options.cloned().unwrap_or_else(|| current("parse_options")),
        "columns": columns.cloned().unwrap_or_else(|| current("columns"))
    });

    config.mutate("update", Invocation::patch().json(&body)?).await
}

/// Deletes the config. This cannot be undone.
pub async fn delete(config: &Resource) -> PublishResult<Value> {
    config.invoke("delete", Invocation::delete()).await
}

/// Opens a revision on `fourfour` that takes its defaults from this config
pub async fn create_revision(config: &Resource, fourfour: &str) -> PublishResult<Resource> {
    let response = config
        .invoke("create_revision", Invocation::post().param("fourfour", fourfour))
        .await?;

    Resource::from_response(ResourceKind::Revision, config.transport(), response, None)
}

/// The name revisions refer to this config by
pub fn name(config: &Resource) -> PublishResult<&str> {
    config
        .attribute("name")
        .and_then(Value::as_str)
        .ok_or_else(|| PublishError::malformed("import config has no name"))
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use reqwest::Method;

    use super::*;
    use crate::client::BaseClient;
    use crate::test_utils::{envelope, RecordedBody, ScriptedTransport};

    const CONFIG: &str = "/api/publishing/v1/config/parks";

    fn config_body(data_action: &str, columns: Value) -> Value {
        envelope(
            json!({
                "name": "parks",
                "data_action": data_action,
                "parse_options": {"header_count": 1},
                "columns": columns
            }),
            json!({
                "show": CONFIG,
                "update": CONFIG,
                "delete": CONFIG,
                "create_revision": "/api/publishing/v1/config/parks/revision/{fourfour}"
            }),
        )
    }

    fn transport(server: &MockServer) -> Arc<dyn Transport> {
        Arc::new(BaseClient::new(&server.base_url(), None).unwrap())
    }

    #[tokio::test]
    async fn test_create_config() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(CONFIG_ROOT).json_body(json!({
                    "name": "parks",
                    "data_action": "replace",
                    "parse_options": {"header_count": 1},
                    "columns": null
                }));
                then.status(201).json_body(config_body("replace", Value::Null));
            })
            .await;

        let config = create(
            &transport(&server),
            "parks",
            RevisionAction::Replace,
            Some(&json!({"header_count": 1})),
            None,
        )
        .await
        .expect("Failed to create config");

        mock.assert_async().await;
        assert_eq!(config.kind(), ResourceKind::ImportConfig);
        assert_eq!(name(&config).unwrap(), "parks");
        assert!(config.has_operation("create_revision"));
    }

    #[tokio::test]
    async fn test_lookup_and_list_configs() {
        let server = MockServer::start_async().await;
        let lookup_mock = server
            .mock_async(|when, then| {
                when.method(GET).path(CONFIG);
                then.status(200).json_body(config_body("update", Value::Null));
            })
            .await;
        let list_mock = server
            .mock_async(|when, then| {
                when.method(GET).path(CONFIG_ROOT);
                then.status(200).json_body(json!([
                    config_body("update", Value::Null),
                    config_body("replace", Value::Null)
                ]));
            })
            .await;
        let transport = transport(&server);

        let config = lookup(&transport, "parks").await.unwrap();
        let configs = list(&transport).await.unwrap();

        lookup_mock.assert_async().await;
        list_mock.assert_async().await;
        assert_eq!(config.attribute("data_action"), Some(&json!("update")));
        assert_eq!(configs.len(), 2);
    }

    #[tokio::test]
    async fn test_update_keeps_unchanged_fields() {
        let transport = ScriptedTransport::new(|request| {
            assert_eq!(request.method, Method::PATCH);
            assert_eq!(
                request.body,
                RecordedBody::Json(json!({
                    "data_action": "update",
                    "parse_options": {"header_count": 1},
                    "columns": [{"field_name": "id"}]
                }))
            );
            Ok(config_body("update", json!([{"field_name": "id"}])))
        });
        let mut config = Resource::from_response(
            ResourceKind::ImportConfig,
            transport,
            config_body("replace", json!([{"field_name": "id"}])),
            None,
        )
        .unwrap();

        update(&mut config, Some(RevisionAction::Update), None, None)
            .await
            .unwrap();

        assert_eq!(config.attribute("data_action"), Some(&json!("update")));
    }

    #[tokio::test]
    async fn test_create_revision_fills_in_view() {
        let transport = ScriptedTransport::new(|request| {
            assert_eq!(request.method, Method::POST);
            assert_eq!(request.path, "/api/publishing/v1/config/parks/revision/ab12-cd34");
            Ok(envelope(
                json!({"fourfour": "ab12-cd34", "revision_seq": 4}),
                json!({"show": "/api/publishing/v1/revision/ab12-cd34/4"}),
            ))
        });
        let config = Resource::from_response(
            ResourceKind::ImportConfig,
            transport,
            config_body("replace", Value::Null),
            None,
        )
        .unwrap();

        let revision = create_revision(&config, "ab12-cd34").await.unwrap();

        assert_eq!(revision.kind(), ResourceKind::Revision);
        assert_eq!(revision.attribute("revision_seq"), Some(&json!(4)));
        assert!(revision.parent().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let transport = ScriptedTransport::new(|request| {
            assert_eq!(request.method, Method::DELETE);
            assert_eq!(request.path, CONFIG);
            Ok(Value::Null)
        });
        let config = Resource::from_response(
            ResourceKind::ImportConfig,
            transport.clone(),
            config_body("replace", Value::Null),
            None,
        )
        .unwrap();

        delete(&config).await.unwrap();

        assert_eq!(transport.count(Method::DELETE, CONFIG), 1);
    }
}
