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

//! Wire types for the gateway HTTP surface
//!
//! Response bodies follow the public JSON contract: camelCase field names and a
//! `success` discriminator on every body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health status for system monitoring
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// 200 body: the signup was accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupAccepted {
    pub success: bool,
    pub message: String,
    pub remaining: u64,
    pub limit: u64,
}

impl SignupAccepted {
    pub fn new(remaining: u64, limit: u64) -> Self {
        Self {
            success: true,
            message: "Successfully added to waitlist!".to_string(),
            remaining,
            limit,
        }
    }
}

/// 400/500 body: the signup was rejected
///
/// `details` carries fingerprint validation errors and is only populated in
/// non-production configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRejected {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl SignupRejected {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: Vec<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            details: Some(details),
        }
    }
}

/// 429 body: quota exhausted or fallback denial
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRateLimited {
    pub success: bool,
    pub error: String,
    pub rate_limited: bool,
    /// Wall-clock time when the current window resets
    pub reset_time: DateTime<Utc>,
    pub remaining: u64,
    pub limit: u64,
}

impl SignupRateLimited {
    pub fn new(reset_time: DateTime<Utc>, remaining: u64, limit: u64) -> Self {
        Self {
            success: false,
            error: "Rate limit exceeded. Please try again later.".to_string(),
            rate_limited: true,
            reset_time,
            remaining,
            limit,
        }
    }
}

/// Gateway status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStatus {
    /// Overall health status
    pub status: HealthStatus,

    /// Service uptime in seconds
    pub uptime_seconds: u64,

    /// Total accepted signups
    pub signups_accepted: u64,

    /// Total rejected signups across all reasons
    pub signups_rejected: u64,

    /// Total quota authority consultations
    pub limiter_checks: u64,

    /// Quota checks abandoned after the bounded wait
    pub limiter_timeouts: u64,

    /// Quota checks failed on transport or protocol errors
    pub limiter_errors: u64,

    /// Current requests per second
    pub requests_per_second: f64,

    /// Any warnings or issues
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_body_omits_empty_details() {
        let body = serde_json::to_value(SignupRejected::new("Invalid email format")).unwrap();
        assert_eq!(body["success"], false);
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_rate_limited_body_wire_names() {
        let reset = Utc::now();
        let body = serde_json::to_value(SignupRateLimited::new(reset, 0, 3)).unwrap();
        assert_eq!(body["rateLimited"], true);
        assert!(body.get("resetTime").is_some());
        assert_eq!(body["limit"], 3);
    }
}
