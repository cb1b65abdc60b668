use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::error::PublishResult;
use crate::request::RequestType;

/// Performs a single request against the publishing service.
///
/// Implementations resolve `path` against their target server, send the
/// request described by `context`, and classify the outcome: 2xx responses
/// decode into a JSON value, everything else becomes
/// [`PublishError::UnexpectedResponse`](crate::error::PublishError::UnexpectedResponse)
/// and connection failures become
/// [`PublishError::Transport`](crate::error::PublishError::Transport).
#[async_trait]
pub trait Transport: Debug + Send + Sync {
    async fn send(
        &self,
        method: Method,
        path: &str,
        parameters: Option<HashMap<String, String>>,
        context: RequestType,
    ) -> PublishResult<Value>;
}
