// SPDX-License-Identifier: MIT
//
// Waitlist Gate: Fingerprint-Verified Signup Admission Control
// Copyright (c) 2025 Valer Bocan, PhD, CSSLP
// Email: valer.bocan@upt.ro
//
// Department of Computer and Information Technology
// Politehnica University of Timisoara
//
// https://github.com/vbocan/waitlist-gate

//! Waitlist Gateway - Public HTTP surface for the Waitlist Gate
//!
//! Accepts signup submissions and runs each through the admission pipeline:
//! input validation, fingerprint plausibility, then a bounded-wait quota check
//! against the external rate-limit authority.
//!
//! # Features
//!
//! - REST API for waitlist signups
//! - Device-fingerprint keyed rate limiting with fail-closed fallback
//! - Quota authority health monitoring
//! - Prometheus metrics

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;
use waitlist_core::{
    admission::{AdmissionGate, AdmissionOutcome, RejectReason, SignupRequest},
    config::GatewayConfig,
    limiter::{LimiterConfig, QuotaClient, RateLimiterGate},
    metrics::Metrics,
    protocol::{GatewayStatus, HealthStatus, SignupAccepted, SignupRateLimited, SignupRejected},
    sink::LogSink,
    LIMITER_UNHEALTHY_THRESHOLD, MAX_BODY_SIZE,
};

#[derive(Parser, Debug)]
#[command(name = "waitlist-gateway")]
#[command(about = "Waitlist Gateway - Guards signup submissions with fingerprint-keyed rate limiting", long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    config: GatewayConfig,
    admission: Arc<AdmissionGate>,
    metrics: Metrics,
    start_time: Instant,
}

/// POST /waitlist - Admit or reject one signup submission
async fn submit_signup(State(state): State<AppState>, body: Bytes) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("signup", %request_id);

    async move {
        // Unparseable bodies are stage-1 input failures, not transport errors
        let request: SignupRequest = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "Unparseable signup body");
                state.metrics.record_rejection(RejectReason::InvalidInput);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(SignupRejected::new("missing required fields")),
                )
                    .into_response();
            }
        };

        let outcome = state.admission.admit(&request).await;
        state
            .metrics
            .record_request_latency(start.elapsed().as_micros() as u64);

        match outcome {
            AdmissionOutcome::Accepted { remaining, limit } => {
                (StatusCode::OK, Json(SignupAccepted::new(remaining, limit))).into_response()
            }
            AdmissionOutcome::InvalidInput { error } => {
                (StatusCode::BAD_REQUEST, Json(SignupRejected::new(error))).into_response()
            }
            AdmissionOutcome::InvalidFingerprint { errors } => {
                let error = "Invalid or suspicious device fingerprint";
                let body = if state.config.expose_validation_details {
                    SignupRejected::with_details(
                        error,
                        errors.iter().map(|e| e.to_string()).collect(),
                    )
                } else {
                    SignupRejected::new(error)
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            AdmissionOutcome::RateLimited { decision } => {
                let reset_time = Utc::now() + chrono::Duration::milliseconds(decision.reset_ms as i64);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(SignupRateLimited::new(
                        reset_time,
                        decision.remaining,
                        decision.limit,
                    )),
                )
                    .into_response()
            }
            AdmissionOutcome::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SignupRejected::new("Internal server error")),
            )
                .into_response(),
        }
    }
    .instrument(span)
    .await
}

/// GET /api/status - System status
async fn get_status(State(state): State<AppState>) -> Json<GatewayStatus> {
    let authority_down =
        state.metrics.consecutive_limiter_failures() >= LIMITER_UNHEALTHY_THRESHOLD;

    let status = if authority_down {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let mut warnings = Vec::new();
    if authority_down {
        warnings.push("Quota authority unreachable; submissions are being denied".to_string());
    }

    Json(GatewayStatus {
        status,
        uptime_seconds: state.start_time.elapsed().as_secs(),
        signups_accepted: state.metrics.signups_accepted(),
        signups_rejected: state.metrics.rejections_total(),
        limiter_checks: state.metrics.limiter_checks(),
        limiter_timeouts: state.metrics.limiter_timeouts(),
        limiter_errors: state.metrics.limiter_errors(),
        requests_per_second: state.metrics.requests_per_second(),
        warnings,
    })
}

/// GET /health - Simple health check
async fn health_check(State(state): State<AppState>) -> StatusCode {
    if state.metrics.consecutive_limiter_failures() < LIMITER_UNHEALTHY_THRESHOLD {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /metrics - Prometheus metrics
async fn get_metrics(State(state): State<AppState>) -> String {
    state.metrics.prometheus_format()
}

/// Normalize panics to the opaque 500 body; nothing internal leaves the gate
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(SignupRejected::new("Internal server error")),
    )
        .into_response()
}

fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/waitlist", post(submit_signup))
        .route("/api/status", get(get_status))
        .route("/health", get(health_check));

    if state.config.metrics_enabled {
        router = router.route("/metrics", get(get_metrics));
    }

    router
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize tracing
    let log_level = args
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .json()
        .init();

    info!("Waitlist Gateway v{}", waitlist_core::VERSION);

    // Load configuration
    let config = GatewayConfig::from_env().context("Failed to load configuration from environment")?;

    info!("Listen address: {}", config.listen_address);
    info!(
        "Rate limit: {} submissions per {}ms window, {}ms authority timeout",
        config.max_per_window, config.window_ms, config.limiter_timeout_ms
    );

    // One quota client per process, injected into the gate
    let quota_client = QuotaClient::new(
        config.quota_api_url.parse().context("Invalid quota_api_url")?,
        config.quota_root_key.clone(),
    )
    .context("Failed to initialize quota client")?;

    let metrics = Metrics::new();

    let limiter = RateLimiterGate::new(
        Arc::new(quota_client),
        LimiterConfig {
            namespace: config.quota_namespace.clone(),
            window: config.window(),
            max_requests: config.max_per_window,
            timeout: config.limiter_timeout(),
        },
        metrics.clone(),
    );

    let admission = AdmissionGate::new(Arc::new(limiter), Arc::new(LogSink), metrics.clone())
        .context("Failed to initialize admission gate")?;

    let state = AppState {
        config: config.clone(),
        admission: Arc::new(admission),
        metrics,
        start_time: Instant::now(),
    };

    let app = build_router(state);

    // Parse listen address
    let addr: std::net::SocketAddr = config
        .listen_address
        .parse()
        .context("Invalid listen address")?;

    info!("Starting server on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU64, Ordering};
    use tower::ServiceExt;
    use waitlist_core::limiter::{RateLimit, RateLimitDecision};

    /// Stub authority counting a three-per-window quota
    struct StubLimiter {
        calls: AtomicU64,
    }

    impl StubLimiter {
        fn new() -> Self {
            Self {
                calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl RateLimit for StubLimiter {
        async fn check(&self, _identifier: &str) -> RateLimitDecision {
            let used = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
            if used <= 3 {
                RateLimitDecision {
                    allowed: true,
                    limit: 3,
                    remaining: 3 - used,
                    reset_ms: 3_600_000,
                }
            } else {
                RateLimitDecision {
                    allowed: false,
                    limit: 3,
                    remaining: 0,
                    reset_ms: 3_600_000,
                }
            }
        }
    }

    fn test_config(expose_details: bool) -> GatewayConfig {
        GatewayConfig {
            listen_address: "127.0.0.1:0".to_string(),
            quota_api_url: "https://api.unkey.dev".to_string(),
            quota_root_key: "unkey_root_test".to_string(),
            quota_namespace: "waitlist".to_string(),
            window_ms: 3_600_000,
            max_per_window: 3,
            limiter_timeout_ms: 3_000,
            expose_validation_details: expose_details,
            metrics_enabled: true,
        }
    }

    fn test_router(expose_details: bool) -> Router {
        let metrics = Metrics::new();
        let admission = AdmissionGate::new(
            Arc::new(StubLimiter::new()),
            Arc::new(LogSink),
            metrics.clone(),
        )
        .unwrap();

        build_router(AppState {
            config: test_config(expose_details),
            admission: Arc::new(admission),
            metrics,
            start_time: Instant::now(),
        })
    }

    fn signup_body() -> String {
        json!({
            "email": "a@b.co",
            "fingerprintData": {
                "thumbmark": "a1b2c3d4",
                "screenWidth": 2560,
                "screenHeight": 1440,
                "timezone": "Europe/Bucharest",
                "platform": "MacIntel"
            }
        })
        .to_string()
    }

    async fn post_signup(router: &Router, body: String) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/waitlist")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_signup_flow_end_to_end() {
        let router = test_router(false);

        for expected_remaining in [2, 1, 0] {
            let (status, body) = post_signup(&router, signup_body()).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            assert_eq!(body["remaining"], expected_remaining);
            assert_eq!(body["limit"], 3);
        }

        // Fourth submission within the window is rejected
        let (status, body) = post_signup(&router, signup_body()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["success"], false);
        assert_eq!(body["rateLimited"], true);
        let reset_time: chrono::DateTime<Utc> =
            body["resetTime"].as_str().unwrap().parse().unwrap();
        assert!(reset_time > Utc::now());
    }

    #[tokio::test]
    async fn test_missing_fields_rejected() {
        let router = test_router(false);
        let (status, body) = post_signup(&router, json!({ "email": "a@b.co" }).to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing required fields");
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let router = test_router(false);
        let mut request: Value = serde_json::from_str(&signup_body()).unwrap();
        request["email"] = json!("a@b");
        let (status, body) = post_signup(&router, request.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid email format");
    }

    #[tokio::test]
    async fn test_malformed_json_rejected() {
        let router = test_router(false);
        let (status, body) = post_signup(&router, "{not json".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_validation_details_suppressed_by_default() {
        let router = test_router(false);
        let mut request: Value = serde_json::from_str(&signup_body()).unwrap();
        request["fingerprintData"] = json!({ "platform": "HeadlessChrome" });

        let (status, body) = post_signup(&router, request.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid or suspicious device fingerprint");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_validation_details_exposed_when_configured() {
        let router = test_router(true);
        let mut request: Value = serde_json::from_str(&signup_body()).unwrap();
        request["fingerprintData"] = json!({ "platform": "HeadlessChrome" });

        let (_, body) = post_signup(&router, request.to_string()).await;
        let details = body["details"].as_array().unwrap();
        assert!(details
            .iter()
            .any(|d| d == "missing required field: thumbmark"));
        assert!(details.iter().any(|d| d == "implausible signal: platform"));
    }

    #[tokio::test]
    async fn test_health_and_status() {
        let router = test_router(false);

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let status: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(status["status"], "healthy");
    }

    #[tokio::test]
    async fn test_metrics_endpoint_reports_outcomes() {
        let router = test_router(false);
        post_signup(&router, signup_body()).await;

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("waitlist_signups_accepted 1"));
    }
}
