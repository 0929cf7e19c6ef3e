/// HTTP client for the partner registry API
use std::time::Duration;

use async_trait::async_trait;
use cohortsync_core::{PartnerWriter, StatusFeedClient};
use cohortsync_domain::{
    ChangeType, CohortSyncError, PartnerConfig, PendingChange, Result, WriteMethod,
};
use reqwest::{Method, Response};
use tracing::{debug, error, warn};
use url::Url;

use super::errors::PartnerError;
use crate::http::HttpClient;

const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;
const USER_AGENT: &str = concat!("cohortsync/", env!("CARGO_PKG_VERSION"));

/// Partner registry client.
///
/// Reads the genomics status feed and sends participant and order writes.
/// Transient failures are retried inside a single call by [`HttpClient`];
/// whatever still fails is returned so the caller can queue it.
pub struct PartnerClient {
    base_url: Url,
    feed_path: String,
    api_token: Option<String>,
    http_client: HttpClient,
}

impl PartnerClient {
    /// Build a client from configuration.
    pub fn new(config: &PartnerConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .max_attempts(config.max_attempts)
            .user_agent(USER_AGENT)
            .build()?;

        Self::with_http_client(config, http_client)
    }

    /// Build a client around a preconfigured [`HttpClient`].
    pub fn with_http_client(config: &PartnerConfig, http_client: HttpClient) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim()).map_err(|err| {
            CohortSyncError::Config(format!("invalid partner.base_url '{}': {err}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CohortSyncError::Config(format!(
                "partner.base_url '{}' cannot be used as a base URL",
                config.base_url
            )));
        }

        Ok(Self {
            base_url,
            feed_path: config.feed_path.trim_matches('/').to_string(),
            api_token: config.api_token.clone().filter(|token| !token.trim().is_empty()),
            http_client,
        })
    }

    /// Whether the partner answers `HEAD /health` with a success status.
    pub async fn check_health(&self) -> Result<bool> {
        let endpoint = self.endpoint(&["health"])?;
        let health_client = HttpClient::builder()
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .max_attempts(1)
            .build()?;

        match health_client.send(health_client.request(Method::HEAD, endpoint)).await {
            Ok(response) => Ok(response.status().is_success()),
            Err(CohortSyncError::Network(message)) => {
                warn!(error = %message, "partner health check failed");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Resolve the write endpoint for a change.
    fn write_target(&self, change: &PendingChange) -> Result<(Method, Url)> {
        let target = change.target_id.trim();
        if target.is_empty() {
            return Err(CohortSyncError::InvalidInput(format!(
                "{} change for subject {} has no partner target",
                change.change_type, change.subject_id
            )));
        }

        match change.change_type {
            ChangeType::AccountProfile | ChangeType::ContactInfo => {
                Ok((Method::PUT, self.endpoint(&["participants", target])?))
            }
            ChangeType::OrderTracking => {
                let method = match change.method {
                    WriteMethod::Post => Method::POST,
                    WriteMethod::Put => Method::PUT,
                };
                Ok((method, self.endpoint(&["orders", target, "tracking"])?))
            }
        }
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                CohortSyncError::Config("partner.base_url cannot be used as a base URL".into())
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn feed_url(&self, cursor: &str) -> Result<Url> {
        let segments: Vec<&str> = self.feed_path.split('/').filter(|s| !s.is_empty()).collect();
        let mut url = self.endpoint(&segments)?;
        url.query_pairs_mut().append_pair("start_date", cursor);
        Ok(url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and turn non-success statuses into classified errors.
    async fn execute(&self, builder: reqwest::RequestBuilder) -> std::result::Result<Response, PartnerError> {
        let response = self
            .http_client
            .send(self.authorize(builder))
            .await
            .map_err(|err| PartnerError::transport(&err))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(PartnerError::from_status(status, &body))
    }
}

#[async_trait]
impl StatusFeedClient for PartnerClient {
    async fn fetch_status_feed(&self, cursor: &str) -> Result<String> {
        let url = self.feed_url(cursor)?;
        debug!(%url, "fetching genomics status feed");

        let response = self.execute(self.http_client.request(Method::GET, url)).await.map_err(|err| {
            warn!(category = %err.category(), error = %err, "status feed request failed");
            CohortSyncError::from(err)
        })?;

        response
            .text()
            .await
            .map_err(|err| CohortSyncError::Network(format!("failed to read feed body: {err}")))
    }
}

#[async_trait]
impl PartnerWriter for PartnerClient {
    async fn write(&self, change: &PendingChange) -> Result<()> {
        let (method, url) = self.write_target(change)?;
        debug!(
            subject_id = %change.subject_id,
            change_type = %change.change_type,
            %method,
            %url,
            "sending partner write"
        );

        let builder = self.http_client.request(method, url).json(&change.body);
        match self.execute(builder).await {
            Ok(_) => Ok(()),
            Err(err) => {
                if err.should_retry() {
                    warn!(
                        subject_id = %change.subject_id,
                        change_type = %change.change_type,
                        category = %err.category(),
                        error = %err,
                        "partner write failed"
                    );
                } else {
                    error!(
                        subject_id = %change.subject_id,
                        change_type = %change.change_type,
                        category = %err.category(),
                        error = %err,
                        "partner refused write"
                    );
                }
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(base_url: &str) -> PartnerConfig {
        PartnerConfig {
            base_url: base_url.to_string(),
            feed_path: "/genomics/status".into(),
            timeout_secs: 5,
            max_attempts: 1,
            api_token: Some("token-123".into()),
        }
    }

    fn change(change_type: ChangeType, method: WriteMethod, target: &str) -> PendingChange {
        PendingChange {
            subject_id: "S-1".into(),
            change_type,
            method,
            target_id: target.into(),
            body: json!({"status": "DELIVERED"}),
        }
    }

    #[tokio::test]
    async fn feed_request_carries_cursor_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/genomics/status"))
            .and(query_param("start_date", "2024-05-01T00:00:00Z"))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":[]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = PartnerClient::new(&config(&server.uri())).unwrap();
        let body = client.fetch_status_feed("2024-05-01T00:00:00Z").await.unwrap();

        assert_eq!(body, r#"{"data":[]}"#);
    }

    #[tokio::test]
    async fn feed_error_status_is_returned_as_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = PartnerClient::new(&config(&server.uri())).unwrap();
        let result = client.fetch_status_feed("1970-01-01T00:00:00-00:00").await;

        assert!(matches!(result, Err(CohortSyncError::Network(_))));
    }

    #[tokio::test]
    async fn account_changes_put_to_participant() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/participants/PX-77"))
            .and(body_json(json!({"status": "DELIVERED"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = PartnerClient::new(&config(&server.uri())).unwrap();
        client.write(&change(ChangeType::ContactInfo, WriteMethod::Post, "PX-77")).await.unwrap();
    }

    #[tokio::test]
    async fn order_tracking_follows_change_method() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders/ORD-1/tracking"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/orders/ORD-1/tracking"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = PartnerClient::new(&config(&server.uri())).unwrap();
        client.write(&change(ChangeType::OrderTracking, WriteMethod::Post, "ORD-1")).await.unwrap();
        client.write(&change(ChangeType::OrderTracking, WriteMethod::Put, "ORD-1")).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_write_maps_to_invalid_input() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(422).set_body_string("unknown field"))
            .mount(&server)
            .await;

        let client = PartnerClient::new(&config(&server.uri())).unwrap();
        let result = client.write(&change(ChangeType::AccountProfile, WriteMethod::Put, "PX-1")).await;

        match result {
            Err(CohortSyncError::InvalidInput(message)) => assert!(message.contains("unknown field")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_target_is_refused_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("PUT")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let client = PartnerClient::new(&config(&server.uri())).unwrap();
        let result = client.write(&change(ChangeType::AccountProfile, WriteMethod::Put, " ")).await;

        assert!(matches!(result, Err(CohortSyncError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn health_check_reports_unreachable_partner() {
        let client = PartnerClient::new(&config("http://127.0.0.1:9")).unwrap();
        assert!(!client.check_health().await.unwrap());
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let result = PartnerClient::new(&config("not a url"));
        assert!(matches!(result, Err(CohortSyncError::Config(_))));
    }
}
