//! The `{ "resource": ..., "links": ... }` envelope every response carries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use variantly::Variantly;

use crate::error::{PublishError, PublishResult};

/// A single entry of a response's `links` map.
///
/// A string is an operation this resource can perform right now. A nested
/// map is a namespace of URI templates for an embedded child collection;
/// it is never callable on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Variantly)]
#[serde(untagged)]
pub enum LinkEntry {
    Direct(String),
    Namespace(BTreeMap<String, LinkEntry>),
}

pub type Links = BTreeMap<String, LinkEntry>;

/// A decoded response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub resource: Map<String, Value>,
    pub links: Links,
}

impl Envelope {
    /// Decode an envelope, refusing anything without an object `resource`
    /// and an object `links`. Link values that are neither strings nor
    /// nested maps are not operations and are skipped.
    pub fn from_value(value: Value) -> PublishResult<Self> {
        let Value::Object(mut body) = value else {
            return Err(PublishError::malformed(format!(
                "expected a resource envelope, got {value}"
            )));
        };

        let resource = match body.remove("resource") {
            Some(Value::Object(resource)) => resource,
            Some(other) => {
                return Err(PublishError::malformed(format!(
                    "`resource` must be an object, got {other}"
                )))
            }
            None => return Err(PublishError::malformed("response has no `resource`")),
        };

        let links = match body.remove("links") {
            Some(Value::Object(links)) => links_from_map(links),
            Some(other) => {
                return Err(PublishError::malformed(format!(
                    "`links` must be an object, got {other}"
                )))
            }
            None => return Err(PublishError::malformed("response has no `links`")),
        };

        Ok(Envelope { resource, links })
    }
}

fn links_from_map(links: Map<String, Value>) -> Links {
    links
        .into_iter()
        .filter_map(|(name, value)| match value {
            Value::String(uri) => Some((name, LinkEntry::Direct(uri))),
            Value::Object(nested) => Some((name, LinkEntry::Namespace(links_from_map(nested)))),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_envelope() {
        let envelope = Envelope::from_value(json!({
            "resource": {"id": 1, "filename": "foo.csv"},
            "links": {
                "show": "/api/publishing/v1/source/1",
                "input_schema_links": {
                    "show": "/api/publishing/v1/source/1/schema/{input_schema_id}"
                }
            }
        }))
        .expect("Failed to decode envelope");

        assert_eq!(envelope.resource["filename"], json!("foo.csv"));
        assert!(envelope.links["show"].is_direct());
        assert!(envelope.links["input_schema_links"].is_namespace());
        assert_eq!(
            envelope.links["show"].direct_ref().map(String::as_str),
            Some("/api/publishing/v1/source/1")
        );
    }

    #[test]
    fn test_missing_links_is_rejected() {
        let result = Envelope::from_value(json!({"resource": {"id": 1}}));
        assert!(matches!(result, Err(PublishError::MalformedResponse { .. })));
    }

    #[test]
    fn test_missing_resource_is_rejected() {
        let result = Envelope::from_value(json!({"links": {}}));
        assert!(matches!(result, Err(PublishError::MalformedResponse { .. })));
    }

    #[test]
    fn test_non_object_resource_is_rejected() {
        let result = Envelope::from_value(json!({"resource": [1, 2], "links": {}}));
        assert!(matches!(result, Err(PublishError::MalformedResponse { .. })));
    }

    #[test]
    fn test_non_uri_links_are_skipped() {
        let envelope = Envelope::from_value(json!({
            "resource": {},
            "links": {
                "show": "/api/publishing/v1/source/1",
                "apply": null,
                "count": 42,
                "input_schema_links": {"show": "/s/{input_schema_id}", "flags": [1]}
            }
        }))
        .expect("Failed to decode envelope");

        assert_eq!(
            envelope.links.keys().collect::<Vec<_>>(),
            vec!["input_schema_links", "show"]
        );
        assert_eq!(
            envelope.links["input_schema_links"]
                .namespace_ref()
                .map(|nested| nested.len()),
            Some(1)
        );
    }

    #[test]
    fn test_non_object_links_is_rejected() {
        let result = Envelope::from_value(json!({"resource": {}, "links": ["show"]}));
        assert!(matches!(result, Err(PublishError::MalformedResponse { .. })));
    }

    #[test]
    fn test_non_object_response_is_rejected() {
        let result = Envelope::from_value(json!("Internal error"));
        assert!(matches!(result, Err(PublishError::MalformedResponse { .. })));
    }
}
