use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Url};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{PublishError, PublishResult};
use crate::request::RequestType;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct BaseClient {
    base_url: Url,
    client: Client,
}

// This is the base client that will be used to make requests to the API.
// It acts as a wrapper around reqwest::Client, resolves hypermedia paths
// against the base URL and classifies responses for the rest of the crate.
impl BaseClient {
    pub fn new(base_url: &str, api_token: Option<&String>) -> PublishResult<Self> {
        let mut config = ClientConfig::new(base_url);
        config.api_token = api_token.cloned();
        Self::from_config(&config)
    }

    /// Build a client from a [`ClientConfig`]
    pub fn from_config(config: &ClientConfig) -> PublishResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| PublishError::Config(format!("Invalid base URL: {e}")))?;
        let default_headers = Self::default_headers(config.api_token.as_deref())?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .default_headers(default_headers)
            .build()?;

        Ok(BaseClient { base_url, client })
    }

    fn default_headers(api_token: Option<&str>) -> PublishResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        if let Some(api_token) = api_token {
            let value = HeaderValue::from_str(&format!("Bearer {api_token}"))
                .map_err(|_| PublishError::Config("Failed to parse API token".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert(
            "User-Agent",
            HeaderValue::from_static(concat!("datapub/", env!("CARGO_PKG_VERSION"))),
        );

        Ok(headers)
    }

    /// Get the base URL of the client
    ///
    /// # Returns
    ///
    /// A reference to the base URL of the client
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn perform_request(
        &self,
        method: Method,
        path: &str,
        parameters: Option<HashMap<String, String>>,
        context: RequestType,
    ) -> PublishResult<reqwest::Response> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| PublishError::malformed(format!("Invalid link {path}: {e}")))?;

        tracing::debug!(%method, %url, "Calling");

        let request = context.to_request(self.client.request(method, url));
        let request = match parameters {
            Some(parameters) => request.query(&parameters),
            None => request,
        };

        Ok(request.send().await?)
    }
}

#[async_trait]
impl Transport for BaseClient {
    async fn send(
        &self,
        method: Method,
        path: &str,
        parameters: Option<HashMap<String, String>>,
        context: RequestType,
    ) -> PublishResult<Value> {
        let response = self.perform_request(method, path, parameters, context).await?;
        evaluate_response(response).await
    }
}

// Helper function to evaluate a response
//
// 2xx bodies decode to JSON (empty -> null, non-JSON -> string). Anything
// else is returned as `UnexpectedResponse` carrying the decoded body.
pub async fn evaluate_response(response: reqwest::Response) -> PublishResult<Value> {
    let status = response.status();
    let url = response.url().clone();
    let raw_content = response.text().await?;
    let body = decode_body(raw_content);

    if status.is_success() {
        Ok(body)
    } else {
        tracing::warn!(status = status.as_u16(), %url, "Request failed");
        Err(PublishError::UnexpectedResponse {
            status: status.as_u16(),
            body,
        })
    }
}

fn decode_body(raw_content: String) -> Value {
    if raw_content.trim().is_empty() {
        return Value::Null;
    }

    serde_json::from_str(&raw_content).unwrap_or(Value::String(raw_content))
}
