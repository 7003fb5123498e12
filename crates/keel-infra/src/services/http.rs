use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use keel_core::ServiceResult;

use crate::error::{AdapterError, AdapterResult, IntoServiceResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Outgoing request; `url` may be relative to the client's base URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON
    pub fn json(&self) -> AdapterResult<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Outbound HTTP capability
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> ServiceResult<HttpResponse>;

    async fn get(&self, url: &str) -> ServiceResult<HttpResponse> {
        self.send(HttpRequest::new(HttpMethod::Get, url)).await
    }

    async fn post_json(&self, url: &str, body: Value) -> ServiceResult<HttpResponse> {
        self.send(HttpRequest::new(HttpMethod::Post, url).with_json(body)).await
    }
}

/// `reqwest`-backed client
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    base_url: Option<Url>,
}

impl ReqwestHttpClient {
    /// Build a client; relative request URLs are joined onto `base_url`
    pub fn new(base_url: Option<&str>, timeout: Option<Duration>) -> AdapterResult<Self> {
        let base_url = base_url.map(Url::parse).transpose()?;
        let client = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Absolute URL for a request target
    pub fn resolve_url(&self, target: &str) -> AdapterResult<Url> {
        match Url::parse(target) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => Ok(base.join(target)?),
                None => Err(AdapterError::InvalidInput(format!(
                    "relative URL '{}' requires a configured base URL",
                    target
                ))),
            },
            Err(err) => Err(err.into()),
        }
    }

    async fn execute(&self, request: HttpRequest) -> AdapterResult<HttpResponse> {
        let url = self.resolve_url(&request.url)?;
        tracing::debug!(method = ?request.method, url = %url, "Sending HTTP request");

        let mut builder = self.client.request(request.method.as_reqwest(), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse { status, headers, body })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> ServiceResult<HttpResponse> {
        self.execute(request).await.into_service_result()
    }
}

/// Records requests and answers with a canned response
#[derive(Debug)]
pub struct NoopHttpClient {
    response: HttpResponse,
    requests: Mutex<Vec<HttpRequest>>,
}

impl NoopHttpClient {
    pub fn new() -> Self {
        Self::with_response(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: String::new(),
        })
    }

    pub fn with_response(response: HttpResponse) -> Self {
        Self {
            response,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

impl Default for NoopHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for NoopHttpClient {
    async fn send(&self, request: HttpRequest) -> ServiceResult<HttpResponse> {
        self.requests.lock().push(request);
        ServiceResult::ok_with(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_relative_urls() {
        let client = ReqwestHttpClient::new(Some("https://api.example.com/v1/"), None).unwrap();
        assert_eq!(
            client.resolve_url("users/42").unwrap().as_str(),
            "https://api.example.com/v1/users/42"
        );
        assert_eq!(
            client.resolve_url("https://other.example.com/ping").unwrap().as_str(),
            "https://other.example.com/ping"
        );

        let bare = ReqwestHttpClient::new(None, Some(Duration::from_secs(1))).unwrap();
        assert!(matches!(bare.resolve_url("users"), Err(AdapterError::InvalidInput(_))));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(ReqwestHttpClient::new(Some("not a url"), None), Err(AdapterError::Url(_))));
    }

    #[tokio::test]
    async fn test_noop_client_records_requests() {
        let client = NoopHttpClient::with_response(HttpResponse {
            status: 201,
            headers: HashMap::new(),
            body: r#"{"id": 9}"#.to_string(),
        });

        let response = client
            .post_json("/orders", json!({"sku": "A-1"}))
            .await
            .into_result()
            .unwrap()
            .unwrap();

        assert!(response.is_success());
        assert_eq!(response.json().unwrap()["id"], 9);
        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].body, Some(json!({"sku": "A-1"})));
    }
}
