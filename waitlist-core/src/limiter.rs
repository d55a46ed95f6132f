//! Bounded-wait quota gate over the external rate-limit authority
//!
//! Issues at most one outbound quota check per incoming request and substitutes a
//! deterministic fail-closed decision whenever the authority is slow or unreachable.

use crate::{metrics::Metrics, Error, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Path of the authority's limit-check operation
const LIMIT_ENDPOINT: &str = "/v1/ratelimits.limit";

/// Rate limiter gate configuration
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Namespace isolating this gate's quota bucket within the authority
    pub namespace: String,
    /// Window duration over which request counts are bounded
    pub window: Duration,
    /// Maximum requests per identifier per window
    pub max_requests: u64,
    /// Bounded wait for the authority's answer
    pub timeout: Duration,
}

/// Decision returned by the quota authority, or substituted on fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Whether the identifier is currently under quota
    pub allowed: bool,
    /// The authority's configured limit for the window
    pub limit: u64,
    /// Requests left in the current window
    pub remaining: u64,
    /// Milliseconds until the current window resets (relative, not wall-clock)
    #[serde(rename = "resetMillis")]
    pub reset_ms: u64,
}

impl RateLimitDecision {
    /// Deterministic fail-closed decision used when the authority cannot answer
    pub fn fallback() -> Self {
        Self {
            allowed: false,
            limit: 0,
            remaining: 0,
            reset_ms: 0,
        }
    }
}

/// Outbound body of one limit check
#[derive(Debug, Serialize)]
struct QuotaCheckRequest<'a> {
    namespace: &'a str,
    identifier: &'a str,
    limit: u64,
    duration: u64,
}

/// HTTP client for the quota authority
///
/// Constructed once at process start and shared by reference; holds the root
/// credential and the pooled connection.
pub struct QuotaClient {
    client: Client,
    base_url: Url,
    root_key: String,
}

impl QuotaClient {
    pub fn new(base_url: Url, root_key: String) -> Result<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .use_rustls_tls()
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            client,
            base_url,
            root_key,
        })
    }

    /// Issue one limit check without retry
    async fn check_quota(&self, request: &QuotaCheckRequest<'_>) -> Result<RateLimitDecision> {
        let url = self.limit_url()?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.root_key)
            .json(request)
            .send()
            .await
            .map_err(Error::Network)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Authority(format!("HTTP {}: {}", status, body)));
        }

        let decision = response
            .json::<RateLimitDecision>()
            .await
            .map_err(Error::Network)?;

        debug!(
            allowed = decision.allowed,
            remaining = decision.remaining,
            "Quota authority answered"
        );
        Ok(decision)
    }

    fn limit_url(&self) -> Result<Url> {
        self.base_url
            .join(LIMIT_ENDPOINT)
            .map_err(|e| Error::Authority(format!("Invalid limit endpoint: {}", e)))
    }
}

/// Contract between the admission flow and the rate limiter
///
/// Implementations never fail: uncertainty about quota state denies.
#[async_trait]
pub trait RateLimit: Send + Sync {
    /// Check quota for one identifier, returning the decision to enforce
    async fn check(&self, identifier: &str) -> RateLimitDecision;
}

/// Quota gate enforcing the bounded wait and the fail-closed fallback
pub struct RateLimiterGate {
    client: Arc<QuotaClient>,
    config: LimiterConfig,
    metrics: Metrics,
}

impl RateLimiterGate {
    pub fn new(client: Arc<QuotaClient>, config: LimiterConfig, metrics: Metrics) -> Self {
        Self {
            client,
            config,
            metrics,
        }
    }

    async fn check_once(&self, identifier: &str) -> Result<RateLimitDecision> {
        let request = QuotaCheckRequest {
            namespace: &self.config.namespace,
            identifier,
            limit: self.config.max_requests,
            duration: self.config.window.as_millis() as u64,
        };

        // The abandoned call is dropped on expiry; the fallback stands regardless
        // of what the authority would eventually have answered.
        match tokio::time::timeout(self.config.timeout, self.client.check_quota(&request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        }
    }
}

#[async_trait]
impl RateLimit for RateLimiterGate {
    async fn check(&self, identifier: &str) -> RateLimitDecision {
        self.metrics.record_limiter_check();

        match self.check_once(identifier).await {
            Ok(decision) => {
                self.metrics.record_limiter_success();
                decision
            }
            Err(Error::Timeout) => {
                self.metrics.record_limiter_timeout();
                warn!(
                    identifier,
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Quota check timed out, denying"
                );
                RateLimitDecision::fallback()
            }
            Err(e) => {
                self.metrics.record_limiter_error();
                warn!(identifier, error = %e, "Quota check failed, denying");
                RateLimitDecision::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(timeout: Duration) -> LimiterConfig {
        LimiterConfig {
            namespace: "waitlist".to_string(),
            window: Duration::from_secs(3600),
            max_requests: 3,
            timeout,
        }
    }

    fn gate_for(url: &str, timeout: Duration) -> RateLimiterGate {
        let client = QuotaClient::new(Url::parse(url).unwrap(), "root-key".to_string()).unwrap();
        RateLimiterGate::new(Arc::new(client), test_config(timeout), Metrics::new())
    }

    #[test]
    fn test_fallback_decision_shape() {
        let fallback = RateLimitDecision::fallback();
        assert!(!fallback.allowed);
        assert_eq!(fallback.limit, 0);
        assert_eq!(fallback.remaining, 0);
        assert_eq!(fallback.reset_ms, 0);
    }

    #[test]
    fn test_decision_wire_format() {
        let decision: RateLimitDecision = serde_json::from_str(
            r#"{"allowed":true,"limit":3,"remaining":2,"resetMillis":120000}"#,
        )
        .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.limit, 3);
        assert_eq!(decision.remaining, 2);
        assert_eq!(decision.reset_ms, 120_000);
    }

    #[tokio::test]
    async fn test_authority_answer_returned_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", LIMIT_ENDPOINT)
            .match_header("authorization", "Bearer root-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"allowed":true,"limit":3,"remaining":2,"resetMillis":42000}"#)
            .create_async()
            .await;

        let gate = gate_for(&server.url(), Duration::from_secs(2));
        let decision = gate.check("thumb-1").await;

        mock.assert_async().await;
        assert!(decision.allowed);
        assert_eq!(decision.limit, 3);
        assert_eq!(decision.remaining, 2);
        assert_eq!(decision.reset_ms, 42_000);
    }

    #[tokio::test]
    async fn test_window_exhaustion_sequence() {
        let mut server = mockito::Server::new_async().await;
        let gate = gate_for(&server.url(), Duration::from_secs(2));

        let bodies = [
            r#"{"allowed":true,"limit":3,"remaining":2,"resetMillis":3600000}"#,
            r#"{"allowed":true,"limit":3,"remaining":1,"resetMillis":3500000}"#,
            r#"{"allowed":true,"limit":3,"remaining":0,"resetMillis":3400000}"#,
            r#"{"allowed":false,"limit":3,"remaining":0,"resetMillis":3300000}"#,
        ];

        let mut remaining_seen = Vec::new();
        for body in bodies {
            let mock = server
                .mock("POST", LIMIT_ENDPOINT)
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(body)
                .expect(1)
                .create_async()
                .await;

            let decision = gate.check("thumb-1").await;
            remaining_seen.push((decision.allowed, decision.remaining));
            mock.assert_async().await;
            mock.remove_async().await;
        }

        assert_eq!(
            remaining_seen,
            vec![(true, 2), (true, 1), (true, 0), (false, 0)]
        );
    }

    #[tokio::test]
    async fn test_authority_error_denies() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", LIMIT_ENDPOINT)
            .with_status(500)
            .with_body("internal")
            .create_async()
            .await;

        let gate = gate_for(&server.url(), Duration::from_secs(2));
        let decision = gate.check("thumb-1").await;
        assert_eq!(decision, RateLimitDecision::fallback());
    }

    #[tokio::test]
    async fn test_connection_refused_denies() {
        // Nothing listens on this port
        let gate = gate_for("http://127.0.0.1:9", Duration::from_secs(2));
        let decision = gate.check("thumb-1").await;
        assert_eq!(decision, RateLimitDecision::fallback());
    }

    #[tokio::test]
    async fn test_silent_authority_times_out_and_denies() {
        // Bound a socket that accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    held.push(socket);
                }
            }
        });

        let gate = gate_for(&format!("http://{}", addr), Duration::from_millis(100));
        let start = std::time::Instant::now();
        let decision = gate.check("thumb-1").await;

        assert_eq!(decision, RateLimitDecision::fallback());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_timeout_recorded_in_metrics() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    held.push(socket);
                }
            }
        });

        let metrics = Metrics::new();
        let client =
            QuotaClient::new(Url::parse(&format!("http://{}", addr)).unwrap(), "k".to_string())
                .unwrap();
        let gate = RateLimiterGate::new(
            Arc::new(client),
            test_config(Duration::from_millis(100)),
            metrics.clone(),
        );

        gate.check("thumb-1").await;
        assert_eq!(metrics.limiter_checks(), 1);
        assert_eq!(metrics.limiter_timeouts(), 1);
        assert_eq!(metrics.limiter_errors(), 0);
    }
}
