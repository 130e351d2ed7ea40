//! Authenticated HTTP access to the pharmacy platform.
//!
//! `PharmacyTransport` is the seam the orchestrators depend on; tests swap
//! in `MockTransport`. The transport never retries: `RetryPolicy` is
//! applied by the caller.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, REFERER};
use serde_json::Value;

use super::error::PharmacyError;
use crate::config::PharmacyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// One request/response exchange with the pharmacy platform.
pub trait PharmacyTransport: Send + Sync {
    /// Send `body` (if any) to `path` and return the decoded JSON body.
    /// Empty 2xx bodies decode to `Value::Null`; non-JSON 2xx bodies are
    /// returned as `Value::String`.
    fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, PharmacyError>;
}

impl<T: PharmacyTransport + ?Sized> PharmacyTransport for Arc<T> {
    fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, PharmacyError> {
        (**self).send(method, path, query, body)
    }
}

/// reqwest-backed transport with the platform's fixed header set.
pub struct HttpTransport {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpTransport {
    pub fn new(config: &PharmacyConfig) -> Result<Self, PharmacyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers(config)?)
            .build()
            .map_err(|e| PharmacyError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn default_headers(config: &PharmacyConfig) -> Result<HeaderMap, PharmacyError> {
    let invalid = |what: &str| PharmacyError::Validation(format!("Invalid {what} header value"));

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        REFERER,
        HeaderValue::from_str(&config.referer).map_err(|_| invalid("referer"))?,
    );

    let key_name = HeaderName::from_bytes(config.key_header.as_bytes()).map_err(|_| invalid("API key name"))?;
    let mut key_value = HeaderValue::from_str(&config.api_key).map_err(|_| invalid("API key"))?;
    key_value.set_sensitive(true);
    headers.insert(key_name, key_value);

    Ok(headers)
}

impl PharmacyTransport for HttpTransport {
    fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, PharmacyError> {
        let url = self.url(path);
        let request = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        let request = if query.is_empty() {
            request
        } else {
            request.query(query)
        };
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                PharmacyError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                PharmacyError::Connection(self.base_url.clone())
            } else {
                PharmacyError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| PharmacyError::HttpClient(format!("Cannot read response body: {e}")))?;
        classify_response(status, &text)
    }
}

/// Map a raw status + body to the error taxonomy.
pub fn classify_response(status: u16, body: &str) -> Result<Value, PharmacyError> {
    if status == 401 {
        return Err(PharmacyError::Authentication(error_message(body)));
    }
    if !(200..300).contains(&status) {
        return Err(PharmacyError::Http {
            status,
            body: error_message(body),
        });
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string())))
}

/// Pull a readable message out of a JSON or plain-text error body.
fn error_message(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
        for key in ["message", "error", "detail"] {
            if let Some(msg) = json.get(key).and_then(Value::as_str) {
                return msg.to_string();
            }
        }
    }
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.to_string()
    }
}

/// A request seen by `MockTransport`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Scripted transport for tests: replies in order and records every call.
/// Once the script runs out, every further call fails with HTTP 500.
pub struct MockTransport {
    replies: Mutex<VecDeque<Result<Value, PharmacyError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, value: Value) -> Self {
        self.push(Ok(value))
    }

    pub fn fail(self, error: PharmacyError) -> Self {
        self.push(Err(error))
    }

    fn push(mut self, reply: Result<Value, PharmacyError>) -> Self {
        if let Ok(replies) = self.replies.get_mut() {
            replies.push_back(reply);
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.path).collect()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl PharmacyTransport for MockTransport {
    fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, PharmacyError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                method,
                path: path.to_string(),
                query: query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                body: body.cloned(),
            });
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| {
                Err(PharmacyError::Http {
                    status: 500,
                    body: "no scripted reply".into(),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::State;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;

    /// Serve `router` on an ephemeral port from a background runtime so the
    /// blocking client can be exercised from a plain test thread.
    fn spawn_stub(router: Router) -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, router).await.unwrap();
            });
        });
        addr
    }

    fn transport_for(addr: SocketAddr) -> HttpTransport {
        let mut config = PharmacyConfig::new(&format!("http://{addr}"), "test-key");
        config.timeout_secs = 5;
        HttpTransport::new(&config).unwrap()
    }

    #[test]
    fn classify_success_parses_json() {
        let value = classify_response(201, r#"{"id": 42}"#).unwrap();
        assert_eq!(value["id"], 42);
    }

    #[test]
    fn classify_empty_success_is_null() {
        assert_eq!(classify_response(204, "").unwrap(), Value::Null);
    }

    #[test]
    fn classify_plain_text_success_is_string() {
        assert_eq!(classify_response(200, "created").unwrap(), json!("created"));
    }

    #[test]
    fn classify_401_is_authentication_error() {
        let err = classify_response(401, r#"{"message": "bad key"}"#).unwrap_err();
        match err {
            PharmacyError::Authentication(msg) => assert_eq!(msg, "bad key"),
            other => panic!("expected Authentication, got {other:?}"),
        }
    }

    #[test]
    fn classify_500_keeps_plain_text_body() {
        let err = classify_response(500, "upstream exploded").unwrap_err();
        match err {
            PharmacyError::Http { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("expected Http, got {other:?}"),
        }
    }

    #[test]
    fn http_transport_sends_fixed_headers() {
        async fn echo_headers(headers: AxumHeaders) -> Json<Value> {
            let get = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            };
            Json(json!({
                "key": get("x-api-key"),
                "accept": get("accept"),
                "content_type": get("content-type"),
                "referer": get("referer"),
            }))
        }

        let addr = spawn_stub(Router::new().route("/patients", post(echo_headers)));
        let transport = transport_for(addr);
        let value = transport
            .send(Method::Post, "/patients", &[], Some(&json!({"patient": {}})))
            .unwrap();

        assert_eq!(value["key"], "test-key");
        assert_eq!(value["accept"], "application/json");
        assert_eq!(value["content_type"], "application/json");
        assert_eq!(value["referer"], crate::config::DEFAULT_REFERER);
    }

    #[test]
    fn http_transport_maps_401_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/patient/getall",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::UNAUTHORIZED, "invalid key")
                }),
            )
            .with_state(hits.clone());

        let addr = spawn_stub(router);
        let err = transport_for(addr)
            .send(Method::Get, "patient/getall", &[], None)
            .unwrap_err();

        assert!(matches!(err, PharmacyError::Authentication(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn http_500_is_retried_with_doubling_waits() {
        use std::time::Duration;

        use crate::pharmacy::client::PharmacyClient;
        use crate::pharmacy::retry::RetryPolicy;

        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/patient/getall",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::INTERNAL_SERVER_ERROR, r#"{"message": "database offline"}"#)
                }),
            )
            .with_state(hits.clone());
        let addr = spawn_stub(router);

        let waits = Arc::new(Mutex::new(Vec::new()));
        let sink = waits.clone();
        let retry = RetryPolicy::new(3, Duration::from_millis(100))
            .with_sleeper(Arc::new(move |d| sink.lock().unwrap().push(d)));
        let client = PharmacyClient::new(Box::new(transport_for(addr)), retry);

        let err = client.list_patients().unwrap_err();

        match err {
            PharmacyError::Http { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "database offline");
            }
            other => panic!("expected Http, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(
            *waits.lock().unwrap(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[test]
    fn truncated_body_is_a_client_error() {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nContent-Type: application/json\r\n\r\n{\"id\"")
                .unwrap();
        });

        let err = transport_for(addr)
            .send(Method::Get, "patient/getall", &[], None)
            .unwrap_err();
        assert!(matches!(err, PharmacyError::HttpClient(_)), "got {err:?}");
    }

    #[test]
    fn http_transport_reports_connection_failure() {
        // Bind then drop to get a port nobody listens on.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let err = transport_for(addr)
            .send(Method::Get, "patient/getall", &[], None)
            .unwrap_err();
        assert!(matches!(
            err,
            PharmacyError::Connection(_) | PharmacyError::HttpClient(_)
        ));
    }

    #[test]
    fn mock_transport_replays_in_order_and_records() {
        let mock = MockTransport::new()
            .reply(json!({"id": 1}))
            .fail(PharmacyError::Timeout(30));

        assert_eq!(mock.send(Method::Post, "patients", &[], None).unwrap()["id"], 1);
        assert!(matches!(
            mock.send(Method::Get, "patient/getall", &[], None),
            Err(PharmacyError::Timeout(30))
        ));
        assert!(matches!(
            mock.send(Method::Get, "prescription/getall", &[("patientId", "77")], None),
            Err(PharmacyError::Http { status: 500, .. })
        ));
        assert_eq!(mock.paths(), vec!["patients", "patient/getall", "prescription/getall"]);
        assert_eq!(mock.calls()[2].query, vec![("patientId".to_string(), "77".to_string())]);
    }
}
