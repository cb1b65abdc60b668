use serde_json::Value;

use crate::error::PublishResult;
use crate::resource::kind::ResourceKind;
use crate::resource::model::{Invocation, Resource};

use super::source::newest;

/// Transforms an input schema into a new output schema.
///
/// # Arguments
///
/// * `input_schema` - The input schema to transform.
/// * `body` - The desired output, e.g. `{"output_columns": [...]}`.
///
/// # Returns
///
/// The new output schema, parented to the input schema. It is usually
/// still being computed; wait on it with
/// [`output_schema::wait_for_finish`](super::output_schema::wait_for_finish).
pub async fn transform(input_schema: &Resource, body: &Value) -> PublishResult<Resource> {
    input_schema
        .subresource(
            "transform",
            Invocation::post().json(body)?,
            ResourceKind::OutputSchema,
        )
        .await
}

/// The newest output schema embedded in the input schema, if any
pub fn latest_output_schema(input_schema: &Resource) -> Option<&Resource> {
    newest(input_schema.children("output_schemas"))
}
