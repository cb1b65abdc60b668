use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use serde_json::{json, Value};

use crate::error::{PublishError, PublishResult};
use crate::request::RequestType;
use crate::transport::Transport;

/// A request as seen by [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<HashMap<String, String>>,
    pub body: RecordedBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedBody {
    None,
    Json(Value),
    Bytes(Bytes),
}

type Handler = Box<dyn FnMut(&RecordedRequest) -> PublishResult<Value> + Send>;
type Delay = Box<dyn Fn(&RecordedRequest) -> Option<Duration> + Send + Sync>;

/// An in-memory transport answering every request through a closure.
///
/// Requests are recorded in arrival order. An optional delay function
/// holds individual requests back before they are answered, which lets
/// tests force a particular completion order.
pub struct ScriptedTransport {
    handler: Mutex<Handler>,
    delay: Option<Delay>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("requests", &self.requests().len())
            .finish()
    }
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: FnMut(&RecordedRequest) -> PublishResult<Value> + Send + 'static,
    {
        Arc::new(Self {
            handler: Mutex::new(Box::new(handler)),
            delay: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn with_delay<F, D>(handler: F, delay: D) -> Arc<Self>
    where
        F: FnMut(&RecordedRequest) -> PublishResult<Value> + Send + 'static,
        D: Fn(&RecordedRequest) -> Option<Duration> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Mutex::new(Box::new(handler)),
            delay: Some(Box::new(delay)),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A transport that fails the test if anything is sent
    pub fn unreachable() -> Arc<Self> {
        Self::new(|request| panic!("Unexpected request: {request:?}"))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests recorded for a method and path
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        parameters: Option<HashMap<String, String>>,
        context: RequestType,
    ) -> PublishResult<Value> {
        let body = match context {
            RequestType::Plain => RecordedBody::None,
            RequestType::JSON { body } => RecordedBody::Json(serde_json::from_str(&body)?),
            RequestType::Bytes { payload } => RecordedBody::Bytes(payload),
        };

        let request = RecordedRequest {
            method,
            path: path.to_string(),
            query: parameters,
            body,
        };

        self.requests.lock().unwrap().push(request.clone());

        if let Some(pause) = self.delay.as_ref().and_then(|delay| delay(&request)) {
            tokio::time::sleep(pause).await;
        }

        let mut handler = self.handler.lock().unwrap();
        handler(&request)
    }
}

/// Wraps attributes and links into a response envelope
pub fn envelope(resource: Value, links: Value) -> Value {
    json!({"resource": resource, "links": links})
}

/// The error a server answering with `status` produces
pub fn server_error(status: u16) -> PublishError {
    PublishError::UnexpectedResponse {
        status,
        body: json!({"message": "scripted failure"}),
    }
}
