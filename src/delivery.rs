//! Delivery of accepted fixes to the remote gateway.
//!
//! This module provides single-attempt location reporting with:
//! - Credential-header authentication (X-Token / X-Server / X-Medsoft-Token)
//! - Outcome classification for the caller to escalate on
//! - A transport seam so tests run without a network
//!
//! Retry policy deliberately lives with the caller: the periodic stream of
//! fixes is the natural retry for a failed report.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;

use crate::credentials::Credentials;
use crate::error::{TrackerError, TrackerResult};
use crate::{PositionFix, TrackerConfig};

/// Default gateway endpoint receiving position reports.
pub const DEFAULT_GATEWAY_URL: &str = "https://runner-api-v2.medsoft.care/api/gateway/location";

/// Session token header.
pub const HEADER_SESSION_TOKEN: &str = "X-Token";
/// Server identifier header.
pub const HEADER_SERVER_ID: &str = "X-Server";
/// Secondary token header.
pub const HEADER_SECONDARY_TOKEN: &str = "X-Medsoft-Token";

const HEADER_CONTENT_TYPE: &str = "Content-Type";
const CONTENT_TYPE_JSON: &str = "application/json";

/// Classified result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The gateway accepted the report (any 2xx).
    Success,
    /// Network-level failure or a non-auth error status. Not acted upon
    /// beyond logging unless the caller has retries configured.
    TransientFailure(String),
    /// 400, 401 or 403. The gateway conflates bad requests with bad tokens
    /// under these codes, so all three invalidate the credentials.
    AuthFailure(u16),
}

/// Wire-level POST abstraction.
///
/// The real transport is a shared reqwest client; tests substitute a
/// recording mock and assert on call counts.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `url` with the given headers. `Ok` carries the HTTP
    /// status code, `Err` a network-level failure description.
    async fn post(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: String,
    ) -> Result<u16, String>;
}

/// Transport backed by a pooled reqwest client with a bounded timeout.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> TrackerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::HttpClient {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: String,
    ) -> Result<u16, String> {
        let mut request = self.client.post(url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let response = request.body(body).send().await.map_err(|e| e.to_string())?;
        Ok(response.status().as_u16())
    }
}

/// Posts accepted fixes to the gateway and classifies the outcome.
pub struct DeliveryClient {
    gateway_url: String,
    transport: Arc<dyn Transport>,
}

impl DeliveryClient {
    /// Create a client with the real HTTP transport from `config`.
    pub fn new(config: &TrackerConfig) -> TrackerResult<Self> {
        let transport = HttpTransport::new(config.request_timeout)?;
        Ok(Self::with_transport(
            config.gateway_url.clone(),
            Arc::new(transport),
        ))
    }

    /// Create a client over any transport (tests inject a mock here).
    pub fn with_transport(gateway_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            transport,
        }
    }

    /// POST one fix with the credential triple as headers.
    ///
    /// Requires a complete triple and fails with
    /// [`TrackerError::CredentialsMissing`] before touching the network
    /// otherwise. Performs exactly one attempt and never mutates credentials
    /// or tracker state.
    pub async fn deliver(
        &self,
        fix: &PositionFix,
        credentials: &Credentials,
    ) -> TrackerResult<DeliveryOutcome> {
        let (token, server, secondary) = credentials
            .triple()
            .ok_or(TrackerError::CredentialsMissing)?;

        let body = serde_json::json!({ "lat": fix.latitude, "lng": fix.longitude }).to_string();
        let headers = [
            (HEADER_SESSION_TOKEN, token.to_string()),
            (HEADER_SERVER_ID, server.to_string()),
            (HEADER_SECONDARY_TOKEN, secondary.to_string()),
            (HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON.to_string()),
        ];

        let outcome = match self.transport.post(&self.gateway_url, &headers, body).await {
            Ok(status) => Self::classify(status),
            Err(reason) => DeliveryOutcome::TransientFailure(reason),
        };

        match &outcome {
            DeliveryOutcome::Success => {
                debug!(
                    "[Delivery] Successfully sent location ({:.6}, {:.6})",
                    fix.latitude, fix.longitude
                );
            }
            DeliveryOutcome::TransientFailure(reason) => {
                warn!("[Delivery] Failed to send location: {}", reason);
            }
            DeliveryOutcome::AuthFailure(status) => {
                warn!(
                    "[Delivery] Failed to send location: HTTP {} (re-authentication required)",
                    status
                );
            }
        }

        Ok(outcome)
    }

    fn classify(status: u16) -> DeliveryOutcome {
        match status {
            200..=299 => DeliveryOutcome::Success,
            400 | 401 | 403 => DeliveryOutcome::AuthFailure(status),
            _ => DeliveryOutcome::TransientFailure(format!("HTTP {}", status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockTransport {
        response: Mutex<Result<u16, String>>,
        calls: AtomicUsize,
        seen_url: Mutex<Option<String>>,
        seen_headers: Mutex<Vec<(&'static str, String)>>,
        seen_body: Mutex<Option<String>>,
    }

    impl MockTransport {
        fn returning(status: u16) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Ok(status)),
                calls: AtomicUsize::new(0),
                seen_url: Mutex::new(None),
                seen_headers: Mutex::new(Vec::new()),
                seen_body: Mutex::new(None),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            let mock = Self::returning(0);
            *mock.response.lock().unwrap() = Err(reason.to_string());
            mock
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn post(
            &self,
            url: &str,
            headers: &[(&'static str, String)],
            body: String,
        ) -> Result<u16, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_url.lock().unwrap() = Some(url.to_string());
            *self.seen_headers.lock().unwrap() = headers.to_vec();
            *self.seen_body.lock().unwrap() = Some(body);
            self.response.lock().unwrap().clone()
        }
    }

    fn full_credentials() -> Credentials {
        Credentials {
            session_token: Some("token-1".to_string()),
            server_id: Some("server-1".to_string()),
            secondary_token: Some("secondary-1".to_string()),
        }
    }

    fn client_over(mock: &Arc<MockTransport>) -> DeliveryClient {
        DeliveryClient::with_transport(
            DEFAULT_GATEWAY_URL,
            Arc::clone(mock) as Arc<dyn Transport>,
        )
    }

    #[tokio::test]
    async fn test_2xx_is_success() {
        let mock = MockTransport::returning(200);
        let client = client_over(&mock);
        let fix = PositionFix::new(47.918, 106.917);

        let outcome = client.deliver(&fix, &full_credentials()).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Success);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_auth_statuses_invalidate_credentials() {
        for status in [400u16, 401, 403] {
            let mock = MockTransport::returning(status);
            let client = client_over(&mock);
            let fix = PositionFix::new(47.918, 106.917);

            let outcome = client.deliver(&fix, &full_credentials()).await.unwrap();
            assert_eq!(outcome, DeliveryOutcome::AuthFailure(status));
        }
    }

    #[tokio::test]
    async fn test_other_statuses_are_transient() {
        for status in [404u16, 429, 500, 503] {
            let mock = MockTransport::returning(status);
            let client = client_over(&mock);
            let fix = PositionFix::new(47.918, 106.917);

            match client.deliver(&fix, &full_credentials()).await.unwrap() {
                DeliveryOutcome::TransientFailure(reason) => {
                    assert!(reason.contains(&status.to_string()));
                }
                other => panic!("expected transient failure, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_network_error_is_transient() {
        let mock = MockTransport::failing("connection refused");
        let client = client_over(&mock);
        let fix = PositionFix::new(47.918, 106.917);

        match client.deliver(&fix, &full_credentials()).await.unwrap() {
            DeliveryOutcome::TransientFailure(reason) => {
                assert!(reason.contains("connection refused"));
            }
            other => panic!("expected transient failure, got {:?}", other),
        }
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_credentials_skip_the_network() {
        let mock = MockTransport::returning(200);
        let client = client_over(&mock);
        let fix = PositionFix::new(47.918, 106.917);

        let partial = Credentials {
            session_token: Some("token-1".to_string()),
            ..Credentials::default()
        };

        for credentials in [Credentials::default(), partial] {
            let err = client.deliver(&fix, &credentials).await.unwrap_err();
            assert!(matches!(err, TrackerError::CredentialsMissing));
        }
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_wire_format() {
        let mock = MockTransport::returning(204);
        let client = client_over(&mock);
        let fix = PositionFix::new(47.918, 106.917);

        client.deliver(&fix, &full_credentials()).await.unwrap();

        assert_eq!(
            mock.seen_url.lock().unwrap().as_deref(),
            Some(DEFAULT_GATEWAY_URL)
        );
        assert_eq!(
            mock.seen_body.lock().unwrap().as_deref(),
            Some(r#"{"lat":47.918,"lng":106.917}"#)
        );

        let headers = mock.seen_headers.lock().unwrap().clone();
        assert!(headers.contains(&(HEADER_SESSION_TOKEN, "token-1".to_string())));
        assert!(headers.contains(&(HEADER_SERVER_ID, "server-1".to_string())));
        assert!(headers.contains(&(HEADER_SECONDARY_TOKEN, "secondary-1".to_string())));
        assert!(headers.contains(&(HEADER_CONTENT_TYPE, "application/json".to_string())));
    }
}
