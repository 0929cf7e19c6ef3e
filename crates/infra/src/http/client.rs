use std::time::Duration;

use cohortsync_domain::{CohortSyncError, Result};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::errors::InfraError;

/// How many times one call is attempted and how long to wait in between.
///
/// The delay doubles per retry and is capped at `max_backoff`. This only
/// covers a single call; the durable retry queue handles everything after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << exponent).min(self.max_backoff)
    }
}

/// What to do after one attempt.
enum Verdict {
    Done(Response),
    /// Transient failure; the raw outcome is kept for the final attempt.
    Retry(reqwest::Result<Response>),
    Fail(CohortSyncError),
}

fn judge(result: reqwest::Result<Response>) -> Verdict {
    match result {
        Ok(response)
            if response.status().is_server_error()
                || response.status() == StatusCode::TOO_MANY_REQUESTS =>
        {
            Verdict::Retry(Ok(response))
        }
        Ok(response) => Verdict::Done(response),
        Err(err) if err.is_timeout() || err.is_connect() || err.is_request() => {
            Verdict::Retry(Err(err))
        }
        Err(err) => Verdict::Fail(InfraError::from(err).into()),
    }
}

fn describe(outcome: &reqwest::Result<Response>) -> String {
    match outcome {
        Ok(response) => format!("HTTP {}", response.status()),
        Err(err) => err.to_string(),
    }
}

/// reqwest wrapper used by the partner integration.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    policy: RetryPolicy,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Send the request, retrying throttling, 5xx and transport failures.
    ///
    /// Once attempts run out the last response is returned as-is, so callers
    /// still see the partner's status and body.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let request = builder
                .try_clone()
                .ok_or_else(|| CohortSyncError::Internal("streaming bodies cannot be retried".into()))?
                .build()
                .map_err(|err| CohortSyncError::from(InfraError::from(err)))?;
            let method = request.method().clone();
            let url = request.url().clone();

            match judge(self.client.execute(request).await) {
                Verdict::Done(response) => {
                    debug!(%method, %url, attempt, status = %response.status(), "partner responded");
                    return Ok(response);
                }
                Verdict::Fail(err) => return Err(err),
                Verdict::Retry(outcome) if attempt >= attempts => {
                    debug!(%method, %url, attempt, reason = %describe(&outcome), "partner call out of attempts");
                    return outcome.map_err(|err| InfraError::from(err).into());
                }
                Verdict::Retry(outcome) => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        %method,
                        %url,
                        attempt,
                        delay_ms = delay.as_millis(),
                        reason = %describe(&outcome),
                        "retrying partner call"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug, Default)]
pub struct HttpClientBuilder {
    timeout: Option<Duration>,
    policy: RetryPolicy,
    user_agent: Option<String>,
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Total attempts per call, including the first.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts.max(1);
        self
    }

    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.policy.initial_backoff = initial;
        self.policy.max_backoff = max;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let mut builder = ReqwestClient::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(30)))
            .no_proxy();
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(|err| CohortSyncError::from(InfraError::from(err)))?;
        Ok(HttpClient { client, policy: self.policy })
    }
}
