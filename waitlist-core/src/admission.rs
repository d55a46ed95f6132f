//! Admission orchestration for signup requests
//!
//! Sequences input-shape validation, the email pre-filter, fingerprint
//! plausibility, and the quota check, ordered cheapest to most expensive and
//! short-circuiting at the first rejection so malformed input never pays the
//! network cost of the quota call.

use crate::{
    fingerprint::{validate_fingerprint, FingerprintPayload, ValidationError},
    limiter::{RateLimit, RateLimitDecision},
    metrics::Metrics,
    sink::{AcceptanceSink, AcceptedSignup},
    Error, Result,
};
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error};

/// Heuristic pre-filter: one `@`, no whitespace, at least one `.` after the `@`.
/// Not a full RFC 5322 validator.
const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Raw signup submission
///
/// Both fields are optional on the wire so that absence is reported by the
/// orchestrator's first stage rather than as a body decode failure.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "fingerprintData")]
    pub fingerprint_data: Option<FingerprintPayload>,
}

/// Rejection taxonomy, keyed into metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InvalidInput,
    InvalidFingerprint,
    RateLimited,
    Internal,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::InvalidInput => "invalid_input",
            RejectReason::InvalidFingerprint => "invalid_fingerprint",
            RejectReason::RateLimited => "rate_limited",
            RejectReason::Internal => "internal",
        }
    }
}

/// Outcome of admitting one signup request
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionOutcome {
    /// All stages passed and the acceptance sink recorded the signup
    Accepted { remaining: u64, limit: u64 },
    /// Missing fields or malformed email; resubmit corrected input
    InvalidInput { error: &'static str },
    /// Structural or plausibility violation in the fingerprint
    InvalidFingerprint { errors: Vec<ValidationError> },
    /// Quota exhausted, or the fail-closed fallback fired
    RateLimited { decision: RateLimitDecision },
    /// Unanticipated fault; no internal detail leaves the gate
    InternalError,
}

/// The admission gate
///
/// Holds the compiled email pre-filter and shared references to the rate
/// limiter and the acceptance sink; no per-request state survives `admit`.
pub struct AdmissionGate {
    email_filter: Regex,
    limiter: Arc<dyn RateLimit>,
    sink: Arc<dyn AcceptanceSink>,
    metrics: Metrics,
}

impl AdmissionGate {
    pub fn new(
        limiter: Arc<dyn RateLimit>,
        sink: Arc<dyn AcceptanceSink>,
        metrics: Metrics,
    ) -> Result<Self> {
        let email_filter = Regex::new(EMAIL_PATTERN)
            .map_err(|e| Error::Internal(format!("email pattern failed to compile: {}", e)))?;

        Ok(Self {
            email_filter,
            limiter,
            sink,
            metrics,
        })
    }

    /// Run one signup request through the admission pipeline
    pub async fn admit(&self, request: &SignupRequest) -> AdmissionOutcome {
        // Stage 1: input shape
        let (email, fingerprint) = match (&request.email, &request.fingerprint_data) {
            (Some(email), Some(fingerprint)) if !email.is_empty() => (email, fingerprint),
            _ => {
                self.metrics.record_rejection(RejectReason::InvalidInput);
                return AdmissionOutcome::InvalidInput {
                    error: "missing required fields",
                };
            }
        };

        // Stage 2: email syntax
        if !self.email_filter.is_match(email) {
            self.metrics.record_rejection(RejectReason::InvalidInput);
            return AdmissionOutcome::InvalidInput {
                error: "invalid email format",
            };
        }

        // Stage 3: fingerprint plausibility, no network cost
        let validation = validate_fingerprint(fingerprint);
        if !validation.is_valid() {
            debug!(errors = ?validation.errors(), "Rejected implausible fingerprint");
            self.metrics.record_rejection(RejectReason::InvalidFingerprint);
            return AdmissionOutcome::InvalidFingerprint {
                errors: validation.errors().to_vec(),
            };
        }

        // Stage 4: quota consultation, keyed by the validated thumbmark.
        // The validator guarantees a non-empty thumbmark past stage 3.
        let thumbmark = fingerprint.thumbmark.as_deref().unwrap_or_default();
        let decision = self.limiter.check(thumbmark).await;
        if !decision.allowed {
            self.metrics.record_rejection(RejectReason::RateLimited);
            return AdmissionOutcome::RateLimited { decision };
        }

        // Stage 5: acceptance action
        let accepted = AcceptedSignup {
            email: email.clone(),
            thumbmark: thumbmark.to_string(),
            accepted_at: Utc::now(),
        };
        if let Err(e) = self.sink.record(&accepted).await {
            error!(error = %e, "Acceptance sink failed");
            self.metrics.record_rejection(RejectReason::Internal);
            return AdmissionOutcome::InternalError;
        }

        self.metrics.record_acceptance();
        AdmissionOutcome::Accepted {
            remaining: decision.remaining,
            limit: decision.limit,
        }
    }
}
