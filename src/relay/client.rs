//! Upstream chat-completion client
//!
//! Wraps a pooled `reqwest::Client` carrying the credential and the
//! provider's descriptive headers. Every call is a single attempt bounded by
//! the configured timeout; the whole response body is buffered.

use hyper::body::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Url};
use secrecy::ExposeSecret;
use serde::de::IgnoredAny;
use std::time::Duration;

use super::error::RelayError;
use super::types::UpstreamPayload;
use crate::config::UpstreamConfig;
use crate::logger;

pub struct UpstreamClient {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, RelayError> {
        let url = Url::parse(&config.url)
            .map_err(|e| RelayError::ClientBuild(format!("invalid upstream url: {e}")))?;

        let mut headers = HeaderMap::new();
        let mut bearer =
            HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
                .map_err(|_| RelayError::ClientBuild("invalid credential format".into()))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            HeaderName::from_static("http-referer"),
            HeaderValue::from_str(&config.referer)
                .map_err(|e| RelayError::ClientBuild(format!("invalid referer header: {e}")))?,
        );
        headers.insert(
            HeaderName::from_static("x-title"),
            HeaderValue::from_str(&config.title)
                .map_err(|e| RelayError::ClientBuild(format!("invalid title header: {e}")))?,
        );

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    pub const fn url(&self) -> &Url {
        &self.url
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one chat-completion request and return the upstream JSON body untouched.
    pub async fn send(&self, payload: &UpstreamPayload<'_>) -> Result<Bytes, RelayError> {
        logger::log_debug(&format!(
            "[Relay] POST {} model={}",
            self.url, payload.model
        ));

        let response = self
            .client
            .post(self.url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| RelayError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| RelayError::from_transport(&e))?;
            return Err(RelayError::UpstreamRejected { status, body });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::from_transport(&e))?;

        // The body is forwarded byte-for-byte, but it has to be JSON
        serde_json::from_slice::<IgnoredAny>(&body).map_err(|e| {
            RelayError::UpstreamUnreachable(format!("invalid JSON in upstream response: {e}"))
        })?;

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::relay::types::ChatRequest;
    use hyper::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COMPLETIONS: &str = "/api/v1/chat/completions";

    fn config_for(url: &str, timeout_secs: u64) -> Config {
        Config::from_toml_str(&format!(
            r#"
            [upstream]
            api_key = "test-key"
            url = "{url}"
            timeout_secs = {timeout_secs}
            "#
        ))
        .unwrap()
    }

    fn hello() -> ChatRequest {
        ChatRequest {
            messages: json!([{"role": "user", "content": "hello"}]),
        }
    }

    #[tokio::test]
    async fn test_success_body_is_forwarded_verbatim() {
        let server = MockServer::start().await;
        // Key order and spacing must survive the relay
        let upstream_body = r#"{"id":"gen-1", "choices":[{"message":{"role":"assistant","content":"hi"}}],"object":"chat.completion"}"#;
        Mock::given(method("POST"))
            .and(path(COMPLETIONS))
            .respond_with(ResponseTemplate::new(200).set_body_string(upstream_body))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config_for(&format!("{}{COMPLETIONS}", server.uri()), 5);
        let client = UpstreamClient::new(&cfg.upstream).unwrap();
        let request = hello();
        let body = client
            .send(&UpstreamPayload::new(&cfg.upstream, &request))
            .await
            .unwrap();

        assert_eq!(body, Bytes::from(upstream_body));
    }

    #[tokio::test]
    async fn test_request_carries_credential_headers_and_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMPLETIONS))
            .and(header("authorization", "Bearer test-key"))
            .and(header("content-type", "application/json"))
            .and(header("http-referer", "http://localhost"))
            .and(header("x-title", "DeepSync"))
            .and(body_json(json!({
                "model": "deepseek/deepseek-r1",
                "messages": [{"role": "user", "content": "hello"}],
                "temperature": 0.7,
                "max_tokens": 500
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config_for(&format!("{}{COMPLETIONS}", server.uri()), 5);
        let client = UpstreamClient::new(&cfg.upstream).unwrap();
        let request = hello();
        client
            .send(&UpstreamPayload::new(&cfg.upstream, &request))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected_with_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string(r#"{"error":"bad key"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config_for(&format!("{}{COMPLETIONS}", server.uri()), 5);
        let client = UpstreamClient::new(&cfg.upstream).unwrap();
        let request = hello();
        let err = client
            .send(&UpstreamPayload::new(&cfg.upstream, &request))
            .await
            .unwrap_err();

        match err {
            RelayError::UpstreamRejected { status, body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(body, r#"{"error":"bad key"}"#);
            }
            other => panic!("expected UpstreamRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"late": true}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let cfg = config_for(&format!("{}{COMPLETIONS}", server.uri()), 1);
        let client = UpstreamClient::new(&cfg.upstream).unwrap();
        let request = hello();
        let err = client
            .send(&UpstreamPayload::new(&cfg.upstream, &request))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::UpstreamTimeout), "got {err:?}");
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        // Reserve a port, then release it so nothing is listening there
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let cfg = config_for(&format!("http://{addr}{COMPLETIONS}"), 5);
        let client = UpstreamClient::new(&cfg.upstream).unwrap();
        let request = hello();
        let err = client
            .send(&UpstreamPayload::new(&cfg.upstream, &request))
            .await
            .unwrap_err();

        match &err {
            RelayError::UpstreamUnreachable(description) => assert!(
                description.to_lowercase().contains("refused"),
                "cause missing from: {description}"
            ),
            other => panic!("expected UpstreamUnreachable, got {other:?}"),
        }
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_a_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let cfg = config_for(&format!("{}{COMPLETIONS}", server.uri()), 5);
        let client = UpstreamClient::new(&cfg.upstream).unwrap();
        let request = hello();
        let err = client
            .send(&UpstreamPayload::new(&cfg.upstream, &request))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::UpstreamUnreachable(_)), "got {err:?}");
    }
}
