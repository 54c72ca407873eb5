use async_trait::async_trait;
use permitwalk_core::{Config, Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::Client;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::request::{Method, ProtocolRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Case-insensitive substring search over the body.
    pub fn contains_ignore_case(&self, needle: &str) -> bool {
        self.body.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// The one operation the navigator needs from the outside world.
///
/// Implementations own headers, timeouts and connection handling. Any
/// failure to produce a response is returned as `Error::Transport`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ProtocolRequest) -> Result<Response>;
}

/// reqwest-backed transport. No cookie store: every bit of session state
/// travels in the request bodies.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(&config.transport.user_agent)?);
        headers.insert(ACCEPT, header_value(&config.transport.accept)?);
        headers.insert(ACCEPT_LANGUAGE, header_value(&config.transport.accept_language)?);
        headers.insert(REFERER, header_value(&config.referer())?);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.transport.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::Config(format!("Invalid header value '{}': {}", value, e)))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ProtocolRequest) -> Result<Response> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url).form(&request.form),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("{} returned status {}", url, status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response from {}: {}", url, e)))?;

        debug!(url = %url, status = status.as_u16(), bytes = body.len(), "Response received");
        Ok(Response {
            status: status.as_u16(),
            body,
        })
    }
}

/// Plays back a recorded sequence of responses, one per request, and keeps
/// the requests it was sent. Running out of responses is a transport error.
#[derive(Default)]
pub struct ReplayTransport {
    responses: Mutex<VecDeque<Response>>,
    sent: Mutex<Vec<ProtocolRequest>>,
}

impl ReplayTransport {
    pub fn new(responses: impl IntoIterator<Item = Response>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProtocolRequest> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Transport for ReplayTransport {
    async fn send(&self, request: &ProtocolRequest) -> Result<Response> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| Error::Transport("replay trace exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestBuilder;

    #[tokio::test]
    async fn test_replay_plays_in_order_then_fails() {
        let transport = ReplayTransport::new([Response::ok("one"), Response::ok("two")]);
        let request = RequestBuilder::bootstrap();
        assert_eq!(transport.send(&request).await.unwrap().body, "one");
        assert_eq!(transport.send(&request).await.unwrap().body, "two");
        assert!(matches!(
            transport.send(&request).await,
            Err(Error::Transport(_))
        ));
        assert_eq!(transport.requests().len(), 3);
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn test_contains_ignore_case() {
        let response = Response::ok("<div>No Matching PERMIT found</div>");
        assert!(response.contains_ignore_case("no matching permit"));
        assert!(!response.contains_ignore_case("no matching record"));
    }

    #[test]
    fn test_http_transport_builds_from_defaults() {
        let transport = HttpTransport::new(&Config::default()).unwrap();
        assert_eq!(
            transport.url("/S1/$/callback"),
            format!("{}/S1/$/callback", Config::default().base_url())
        );
    }
}
