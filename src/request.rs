use bytes::Bytes;
use reqwest::RequestBuilder;
use serde::Serialize;

use crate::error::PublishResult;

#[derive(Debug, Clone)]
pub enum RequestType {
    /// A plain request with no body.
    Plain,

    /// A JSON request with a JSON body and the content type set to application/json.
    JSON { body: String },

    /// A raw binary body with the content type set to application/octet-stream.
    Bytes { payload: Bytes },
}

impl RequestType {
    /// Serialize a value into a JSON request context.
    ///
    /// # Arguments
    /// * `body` - Any serializable value.
    ///
    /// # Returns
    /// A `Result` containing the JSON request type or a serialization error.
    pub fn json<T: Serialize + ?Sized>(body: &T) -> PublishResult<Self> {
        Ok(RequestType::JSON {
            body: serde_json::to_string(body)?,
        })
    }

    /// Convert the request type to a request builder.
    ///
    /// # Arguments
    /// * `self` - The request type.
    /// * `request` - The request builder.
    ///
    /// # Returns
    /// The modified request builder.
    pub fn to_request(self, request: RequestBuilder) -> RequestBuilder {
        match self {
            RequestType::Plain => request,
            RequestType::JSON { body } => Self::build_json_request(body, request),
            RequestType::Bytes { payload } => Self::build_bytes_request(payload, request),
        }
    }

    /// Build a JSON request.
    ///
    /// # Arguments
    /// * `body` - The JSON body as a string.
    /// * `request` - The request builder.
    fn build_json_request(body: String, request: RequestBuilder) -> RequestBuilder {
        request.header("Content-Type", "application/json").body(body)
    }

    /// Build a request carrying raw chunk bytes.
    fn build_bytes_request(payload: Bytes, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Content-Type", "application/octet-stream")
            .body(payload)
    }
}
