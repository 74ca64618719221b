// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Session API.
//!
//! Provides [`SessionApiClient`] which handles request construction,
//! authentication, timeout bounds, and mapping of failures into
//! [`ConvoyError`] so the classifier can work from one shape.

use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use serde::de::DeserializeOwned;
use tracing::debug;

use convoy_config::ApiConfig;
use convoy_core::ConvoyError;
use convoy_core::types::SessionId;

use crate::types::{
    ConversationUpdate, HandoffAck, RequestHandoffBody, RequestHandoffResponse,
    SendMessageRequest, SendMessageResponse, StartConversationRequest,
    StartConversationResponse, WidgetEventBody,
};

/// HTTP client for Session API communication.
///
/// Every call carries a bounded timeout: the configured request timeout by
/// default, and the shorter poll timeout for the responsiveness-sensitive
/// message fetch.
#[derive(Debug, Clone)]
pub struct SessionApiClient {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    poll_timeout: Duration,
}

impl SessionApiClient {
    /// Creates a new Session API client from configuration.
    pub fn new(config: &ApiConfig) -> Result<Self, ConvoyError> {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("application/json"));
        headers.insert(
            "x-requested-with",
            HeaderValue::from_static("ConvoyWidget"),
        );
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                ConvoyError::Config(format!("invalid api key header value: {e}"))
            })?;
            headers.insert("authorization", value);
        }

        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ConvoyError::Network {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout,
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
        })
    }

    /// Creates a remote session. `POST /conversations/start`.
    pub async fn start_conversation(
        &self,
        request: &StartConversationRequest,
    ) -> Result<StartConversationResponse, ConvoyError> {
        let url = format!("{}/conversations/start", self.base_url);
        let response = self.client.post(&url).json(request).send().await;
        self.handle(response, self.request_timeout).await
    }

    /// Transmits one message. `POST /conversations/messages/send`.
    pub async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<SendMessageResponse, ConvoyError> {
        let url = format!("{}/conversations/messages/send", self.base_url);
        let response = self.client.post(&url).json(request).send().await;
        self.handle(response, self.request_timeout).await
    }

    /// Requests a transfer to a human operator. `POST /conversations/handoff/request`.
    pub async fn request_handoff(
        &self,
        request: &RequestHandoffBody,
    ) -> Result<HandoffAck, ConvoyError> {
        let url = format!("{}/conversations/handoff/request", self.base_url);
        let response = self.client.post(&url).json(request).send().await;
        let resp: RequestHandoffResponse = self.handle(response, self.request_timeout).await?;
        Ok(resp.handoff_request)
    }

    /// Fetches messages newer than `since` plus the session snapshot.
    /// `GET /conversations/{session_id}/messages`.
    ///
    /// Uses the shorter poll timeout. A 404 means the session was deleted
    /// server-side and surfaces as `ConvoyError::Api { status: 404, .. }`.
    pub async fn fetch_messages(
        &self,
        session_id: &SessionId,
        since: Option<chrono::DateTime<Utc>>,
    ) -> Result<ConversationUpdate, ConvoyError> {
        let url = format!("{}/conversations/{}/messages", self.base_url, session_id);
        let mut req = self.client.get(&url).timeout(self.poll_timeout);
        if let Some(since) = since {
            req = req.query(&[("since", since.to_rfc3339())]);
        }
        let response = req.send().await;
        self.handle(response, self.poll_timeout).await
    }

    /// Lightweight liveness probe. `HEAD /health`.
    pub async fn probe_health(&self) -> Result<(), ConvoyError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .head(&url)
            .timeout(self.poll_timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.poll_timeout))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ConvoyError::Api {
                status: status.as_u16(),
                message: "health probe failed".to_string(),
                retry_after_ms: None,
            })
        }
    }

    /// Reports an analytics event. `POST /widget/events`.
    ///
    /// Best-effort: callers are expected to log and drop the error.
    pub async fn track_event(&self, event: &WidgetEventBody) -> Result<(), ConvoyError> {
        let url = format!("{}/widget/events", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(event)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.request_timeout))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ConvoyError::Api {
                status: status.as_u16(),
                message: "event rejected".to_string(),
                retry_after_ms: None,
            })
        }
    }

    /// Maps a reqwest outcome into a typed response or [`ConvoyError`].
    async fn handle<T: DeserializeOwned>(
        &self,
        response: Result<reqwest::Response, reqwest::Error>,
        timeout: Duration,
    ) -> Result<T, ConvoyError> {
        let response = response.map_err(|e| map_transport_error(e, timeout))?;
        let status = response.status();
        debug!(status = %status, "session api response received");

        if status.is_success() {
            let body = response.text().await.map_err(|e| ConvoyError::Network {
                message: format!("failed to read response body: {e}"),
                source: Some(Box::new(e)),
            })?;
            return serde_json::from_str(&body).map_err(|e| ConvoyError::Internal(format!(
                "failed to parse api response: {e}"
            )));
        }

        let retry_after_ms = extract_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(json) => json
                .get("error")
                .and_then(|e| e.as_str())
                .map(str::to_string)
                .unwrap_or(body),
            Err(_) => body,
        };
        Err(ConvoyError::Api {
            status: status.as_u16(),
            message,
            retry_after_ms,
        })
    }
}

/// Maps reqwest transport failures: timeouts become `Timeout`, the rest
/// become `Network`.
fn map_transport_error(e: reqwest::Error, timeout: Duration) -> ConvoyError {
    if e.is_timeout() {
        ConvoyError::Timeout { duration: timeout }
    } else {
        ConvoyError::Network {
            message: format!("request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

/// Extracts the `Retry-After` header as milliseconds.
///
/// The header may carry either a delay in seconds or an HTTP date.
fn extract_retry_after(headers: &HeaderMap) -> Option<u64> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(seconds * 1_000);
    }

    let date = chrono::DateTime::parse_from_rfc2822(raw).ok()?;
    let delta = date.with_timezone(&Utc) - Utc::now();
    Some(delta.num_milliseconds().max(0) as u64)
}

/// Convenience for constructing a not-found check at call sites.
pub fn is_not_found(err: &ConvoyError) -> bool {
    matches!(err, ConvoyError::Api { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_core::HandoffStatus;
    use convoy_core::types::{ContentType, HandoffPriority, HandoffTrigger, SenderType};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> SessionApiClient {
        let config = ApiConfig {
            base_url: base_url.to_string(),
            api_key: Some("wk-test".to_string()),
            request_timeout_secs: 5,
            poll_timeout_secs: 2,
        };
        SessionApiClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn start_conversation_success() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "session": {"session_id": "sess-1", "handoff_status": "bot_only"}
        });

        Mock::given(method("POST"))
            .and(path("/conversations/start"))
            .and(header("authorization", "Bearer wk-test"))
            .respond_with(ResponseTemplate::new(201).set_body_json(&body))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let resp = client
            .start_conversation(&StartConversationRequest {
                tenant_id: 1,
                widget_config_id: 2,
                channel: "widget".into(),
                user_agent: None,
                referrer_url: None,
            })
            .await
            .unwrap();

        assert_eq!(resp.session.session_id.0, "sess-1");
        assert_eq!(resp.session.handoff_status, HandoffStatus::BotOnly);
    }

    #[tokio::test]
    async fn send_message_returns_created_message() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "message": {
                "id": 11,
                "session_id": "sess-1",
                "sender_type": "user",
                "content": "hello",
                "sent_at": "2026-03-01T10:00:00Z"
            }
        });

        Mock::given(method("POST"))
            .and(path("/conversations/messages/send"))
            .respond_with(ResponseTemplate::new(201).set_body_json(&body))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let resp = client
            .send_message(&SendMessageRequest {
                session_id: SessionId("sess-1".into()),
                content: "hello".into(),
                sender_type: SenderType::User,
                content_type: ContentType::Text,
            })
            .await
            .unwrap();

        assert_eq!(resp.message.id.0, 11);
        assert_eq!(resp.message.content, "hello");
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/conversations/messages/send"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "30")
                    .set_body_json(serde_json::json!({"error": "Too many requests"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .send_message(&SendMessageRequest {
                session_id: SessionId("sess-1".into()),
                content: "hi".into(),
                sender_type: SenderType::User,
                content_type: ContentType::Text,
            })
            .await
            .unwrap_err();

        match err {
            ConvoyError::Api {
                status,
                retry_after_ms,
                ..
            } => {
                assert_eq!(status, 429);
                assert_eq!(retry_after_ms, Some(30_000));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_messages_passes_since_cursor() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "conversation": {"session_id": "sess-1", "handoff_status": "handoff_active"},
            "messages": []
        });

        Mock::given(method("GET"))
            .and(path("/conversations/sess-1/messages"))
            .and(query_param("since", "2026-03-01T10:00:00+00:00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let since = chrono::DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let update = client
            .fetch_messages(&SessionId("sess-1".into()), Some(since))
            .await
            .unwrap();

        assert_eq!(
            update.conversation.handoff_status,
            HandoffStatus::HandoffActive
        );
        assert!(update.messages.is_empty());
    }

    #[tokio::test]
    async fn fetch_messages_404_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/conversations/gone/messages"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"error": "Session not found"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .fetch_messages(&SessionId("gone".into()), None)
            .await
            .unwrap_err();

        assert!(is_not_found(&err), "got: {err:?}");
    }

    #[tokio::test]
    async fn request_handoff_returns_ack() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "handoff_request": {"id": 5, "status": "pending"}
        });

        Mock::given(method("POST"))
            .and(path("/conversations/handoff/request"))
            .respond_with(ResponseTemplate::new(201).set_body_json(&body))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let ack = client
            .request_handoff(&RequestHandoffBody {
                session_id: SessionId("sess-1".into()),
                trigger_type: HandoffTrigger::UserRequest,
                reason: Some("user_request".into()),
                priority: HandoffPriority::Normal,
            })
            .await
            .unwrap();

        assert_eq!(ack.id, 5);
    }

    #[tokio::test]
    async fn health_probe_succeeds_on_200() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.probe_health().await.is_ok());
    }

    #[tokio::test]
    async fn network_error_maps_to_network_variant() {
        // Point at a closed port; connection is refused immediately.
        let client = test_client("http://127.0.0.1:1");
        let err = client.probe_health().await.unwrap_err();
        assert!(
            matches!(err, ConvoyError::Network { .. }),
            "got: {err:?}"
        );
    }

    #[test]
    fn retry_after_parses_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("45"));
        assert_eq!(extract_retry_after(&headers), Some(45_000));
    }

    #[test]
    fn retry_after_parses_http_date() {
        let future = (Utc::now() + chrono::Duration::seconds(60)).to_rfc2822();
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(&future).unwrap());
        let ms = extract_retry_after(&headers).unwrap();
        assert!(ms > 50_000 && ms <= 60_000, "got: {ms}");
    }

    #[test]
    fn retry_after_absent_is_none() {
        assert_eq!(extract_retry_after(&HeaderMap::new()), None);
    }
}
