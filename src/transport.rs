//! Outbound chat requests.
//!
//! One request per submitted message: `POST {endpoint}` with a JSON body
//! `{"message": "..."}`. No retries, no backoff and no timeout happen here;
//! a hung request stays pending until the connection itself resolves.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

/// Reason shown when an error response carries no usable `error` field.
pub const NOT_OK_REASON: &str = "Network response was not ok";

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// Successful reply from the chat endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    /// `None` when the body had no non-empty `response` string.
    pub response: Option<String>,
}

impl ChatReply {
    pub fn from_body(body: &Value) -> Self {
        let response = body
            .get("response")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Self { response }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Non-success status; `reason` comes from the body or defaults.
    #[error("{reason}")]
    Server { status: StatusCode, reason: String },

    /// The request could not complete.
    #[error("{0}")]
    Network(#[from] reqwest::Error),

    /// Success status but the body was not JSON.
    #[error("invalid response body: {0}")]
    InvalidBody(String),

    /// Failure reported by a non-HTTP transport.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// The string shown to the user in the error template.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, text: &str) -> Result<ChatReply, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> Result<Self> {
        // Session cookies live for the process only, as in a browser tab
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, text: &str) -> Result<ChatReply, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChatRequest { message: text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| {
                    body.get("error")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| NOT_OK_REASON.to_string());
            return Err(TransportError::Server { status, reason });
        }

        let bytes = response.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::InvalidBody(e.to_string()))?;

        Ok(ChatReply::from_body(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{header, HeaderMap},
        routing::post,
        Json, Router,
    };
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    /// Serve `body` with `status` on `/chat`, recording each request's
    /// cookie header and JSON payload.
    async fn spawn_stub(status: u16, body: &'static str) -> (String, Seen) {
        let status = axum::http::StatusCode::from_u16(status).unwrap();
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);

        let app = Router::new().route(
            "/chat",
            post(move |headers: HeaderMap, Json(payload): Json<Value>| {
                let recorder = Arc::clone(&recorder);
                async move {
                    let cookie = headers
                        .get(header::COOKIE)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    recorder.lock().unwrap().push((cookie, payload));
                    (
                        status,
                        [(header::SET_COOKIE, "session=abc123; Path=/")],
                        body,
                    )
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/chat"), seen)
    }

    #[test]
    fn test_reply_from_body() {
        let reply = ChatReply::from_body(&serde_json::json!({"response": "Hi there"}));
        assert_eq!(reply.response.as_deref(), Some("Hi there"));

        assert_eq!(ChatReply::from_body(&serde_json::json!({})).response, None);
        assert_eq!(
            ChatReply::from_body(&serde_json::json!({"response": ""})).response,
            None
        );
        assert_eq!(
            ChatReply::from_body(&serde_json::json!({"response": null})).response,
            None
        );
    }

    #[tokio::test]
    async fn test_success_sends_json_message() {
        let (url, seen) = spawn_stub(200, r#"{"response": "Hi there"}"#).await;
        let transport = HttpTransport::new(&url).unwrap();

        let reply = transport.send("hello").await.unwrap();
        assert_eq!(reply.response.as_deref(), Some("Hi there"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, serde_json::json!({"message": "hello"}));
    }

    #[tokio::test]
    async fn test_success_without_response_field() {
        let (url, _seen) = spawn_stub(200, "{}").await;
        let transport = HttpTransport::new(&url).unwrap();

        let reply = transport.send("hello").await.unwrap();
        assert_eq!(reply, ChatReply::default());
    }

    #[tokio::test]
    async fn test_error_field_becomes_reason() {
        let (url, _seen) = spawn_stub(429, r#"{"error": "rate limited"}"#).await;
        let transport = HttpTransport::new(&url).unwrap();

        let err = transport.send("hello").await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Server { status, .. } if status == StatusCode::TOO_MANY_REQUESTS
        ));
        assert_eq!(err.reason(), "rate limited");
    }

    #[tokio::test]
    async fn test_error_without_field_uses_default_reason() {
        let (url, _seen) = spawn_stub(500, "oops").await;
        let transport = HttpTransport::new(&url).unwrap();

        let err = transport.send("hello").await.unwrap_err();
        assert_eq!(err.reason(), NOT_OK_REASON);
    }

    #[tokio::test]
    async fn test_unparseable_success_body() {
        let (url, _seen) = spawn_stub(200, "<html>").await;
        let transport = HttpTransport::new(&url).unwrap();

        let err = transport.send("hello").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidBody(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(&format!("http://{addr}/chat")).unwrap();
        let err = transport.send("hello").await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
        assert!(!err.reason().is_empty());
    }

    #[tokio::test]
    async fn test_session_cookie_is_sent_back() {
        let (url, seen) = spawn_stub(200, r#"{"response": "ok"}"#).await;
        let transport = HttpTransport::new(&url).unwrap();

        transport.send("first").await.unwrap();
        transport.send("second").await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, None);
        assert_eq!(seen[1].0.as_deref(), Some("session=abc123"));
    }
}
