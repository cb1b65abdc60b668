//! Expansion of embedded child collections into full resources.
//!
//! Some responses inline whole lists of children (a source carries its
//! input schemas, an input schema its output schemas). Each embedded
//! record is paired with the parent's link templates, instantiated for
//! that child's id, and constructed exactly like a directly fetched
//! resource.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{PublishError, PublishResult};
use crate::utils::expand_template;

use super::envelope::{Envelope, LinkEntry, Links};
use super::kind::ChildSpec;
use super::model::Resource;

/// Substitutes `{id_name}` with `id_val` throughout a (possibly nested)
/// set of link templates.
pub fn parameterize_links(links: &Links, id_name: &str, id_val: &str) -> Links {
    links
        .iter()
        .map(|(name, entry)| {
            let entry = match entry {
                LinkEntry::Direct(uri) => {
                    LinkEntry::Direct(expand_template(uri, &[(id_name, id_val)]))
                }
                LinkEntry::Namespace(nested) => {
                    LinkEntry::Namespace(parameterize_links(nested, id_name, id_val))
                }
            };
            (name.clone(), entry)
        })
        .collect()
}

/// Builds the children declared by `spec` from `parent`'s current snapshot.
///
/// A payload without the declared field has no children. A payload that
/// embeds children but offers no template namespace for them is rejected,
/// as is a child record without an `id`.
pub(crate) fn build_children(spec: &ChildSpec, parent: &Arc<Resource>) -> PublishResult<Vec<Resource>> {
    let records = match parent.attribute(spec.response_field) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(records)) => records,
        Some(other) => {
            return Err(PublishError::malformed(format!(
                "`{}` must be a list, got {other}",
                spec.response_field
            )))
        }
    };

    if records.is_empty() {
        return Ok(Vec::new());
    }

    let templates = parent.snapshot().namespace(spec.links_namespace).cloned().ok_or_else(|| {
        PublishError::malformed(format!(
            "{} embeds `{}` but has no `{}` links",
            parent.kind(),
            spec.response_field,
            spec.links_namespace
        ))
    })?;

    records
        .iter()
        .map(|record| {
            let Value::Object(child) = record else {
                return Err(PublishError::malformed(format!(
                    "embedded `{}` entry is not an object: {record}",
                    spec.response_field
                )));
            };

            let id = match child.get("id") {
                Some(Value::String(id)) => id.clone(),
                Some(Value::Number(id)) => id.to_string(),
                _ => {
                    return Err(PublishError::malformed(format!(
                        "embedded `{}` entry has no id",
                        spec.response_field
                    )))
                }
            };

            let envelope = Envelope {
                resource: child.clone(),
                links: parameterize_links(&templates, spec.link_id_attr, &id),
            };

            Resource::embedded(spec.child_kind, parent.transport(), envelope, parent.clone())
        })
        .collect()
}
