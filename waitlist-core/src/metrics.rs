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

//! Metrics collection and reporting

use crate::admission::RejectReason;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Global metrics collector
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    start_time: Instant,

    // Admission outcomes
    signups_accepted: AtomicU64,
    rejected_invalid_input: AtomicU64,
    rejected_invalid_fingerprint: AtomicU64,
    rejected_rate_limited: AtomicU64,
    rejected_internal: AtomicU64,

    // Quota authority health
    limiter_checks: AtomicU64,
    limiter_timeouts: AtomicU64,
    limiter_errors: AtomicU64,
    consecutive_limiter_failures: AtomicU64,

    // Latency tracking (microseconds)
    request_latencies: RwLock<Vec<u64>>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                start_time: Instant::now(),
                signups_accepted: AtomicU64::new(0),
                rejected_invalid_input: AtomicU64::new(0),
                rejected_invalid_fingerprint: AtomicU64::new(0),
                rejected_rate_limited: AtomicU64::new(0),
                rejected_internal: AtomicU64::new(0),
                limiter_checks: AtomicU64::new(0),
                limiter_timeouts: AtomicU64::new(0),
                limiter_errors: AtomicU64::new(0),
                consecutive_limiter_failures: AtomicU64::new(0),
                request_latencies: RwLock::new(Vec::with_capacity(10000)),
            }),
        }
    }

    // Admission outcomes
    pub fn record_acceptance(&self) {
        self.inner.signups_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, reason: RejectReason) {
        self.rejection_counter(reason).fetch_add(1, Ordering::Relaxed);
    }

    pub fn signups_accepted(&self) -> u64 {
        self.inner.signups_accepted.load(Ordering::Relaxed)
    }

    pub fn rejections(&self, reason: RejectReason) -> u64 {
        self.rejection_counter(reason).load(Ordering::Relaxed)
    }

    pub fn rejections_total(&self) -> u64 {
        [
            RejectReason::InvalidInput,
            RejectReason::InvalidFingerprint,
            RejectReason::RateLimited,
            RejectReason::Internal,
        ]
        .iter()
        .map(|r| self.rejections(*r))
        .sum()
    }

    fn rejection_counter(&self, reason: RejectReason) -> &AtomicU64 {
        match reason {
            RejectReason::InvalidInput => &self.inner.rejected_invalid_input,
            RejectReason::InvalidFingerprint => &self.inner.rejected_invalid_fingerprint,
            RejectReason::RateLimited => &self.inner.rejected_rate_limited,
            RejectReason::Internal => &self.inner.rejected_internal,
        }
    }

    // Quota authority health
    pub fn record_limiter_check(&self) {
        self.inner.limiter_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_limiter_success(&self) {
        self.inner
            .consecutive_limiter_failures
            .store(0, Ordering::Relaxed);
    }

    pub fn record_limiter_timeout(&self) {
        self.inner.limiter_timeouts.fetch_add(1, Ordering::Relaxed);
        self.inner
            .consecutive_limiter_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_limiter_error(&self) {
        self.inner.limiter_errors.fetch_add(1, Ordering::Relaxed);
        self.inner
            .consecutive_limiter_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn limiter_checks(&self) -> u64 {
        self.inner.limiter_checks.load(Ordering::Relaxed)
    }

    pub fn limiter_timeouts(&self) -> u64 {
        self.inner.limiter_timeouts.load(Ordering::Relaxed)
    }

    pub fn limiter_errors(&self) -> u64 {
        self.inner.limiter_errors.load(Ordering::Relaxed)
    }

    pub fn consecutive_limiter_failures(&self) -> u64 {
        self.inner.consecutive_limiter_failures.load(Ordering::Relaxed)
    }

    // Latency
    pub fn record_request_latency(&self, latency_micros: u64) {
        let mut latencies = self.inner.request_latencies.write();
        latencies.push(latency_micros);
        if latencies.len() > 10000 {
            latencies.drain(0..5000);
        }
    }

    // Derived metrics
    pub fn uptime_seconds(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    pub fn requests_per_second(&self) -> f64 {
        let uptime = self.inner.start_time.elapsed().as_secs_f64();
        if uptime > 0.0 {
            (self.signups_accepted() + self.rejections_total()) as f64 / uptime
        } else {
            0.0
        }
    }

    pub fn latency_percentile(&self, percentile: f64) -> Option<u64> {
        let latencies = self.inner.request_latencies.read();
        if latencies.is_empty() {
            return None;
        }

        let mut sorted = latencies.clone();
        sorted.sort_unstable();
        let index = ((sorted.len() as f64 * percentile).ceil() as usize).min(sorted.len() - 1);
        Some(sorted[index])
    }

    pub fn latency_p50(&self) -> Option<u64> {
        self.latency_percentile(0.50)
    }

    pub fn latency_p95(&self) -> Option<u64> {
        self.latency_percentile(0.95)
    }

    pub fn latency_p99(&self) -> Option<u64> {
        self.latency_percentile(0.99)
    }

    /// Generate Prometheus-compatible metrics output
    pub fn prometheus_format(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP waitlist_signups_accepted Total accepted signups\n");
        output.push_str("# TYPE waitlist_signups_accepted counter\n");
        output.push_str(&format!(
            "waitlist_signups_accepted {}\n",
            self.signups_accepted()
        ));

        output.push_str("# HELP waitlist_signups_rejected Total rejected signups by reason\n");
        output.push_str("# TYPE waitlist_signups_rejected counter\n");
        for reason in [
            RejectReason::InvalidInput,
            RejectReason::InvalidFingerprint,
            RejectReason::RateLimited,
            RejectReason::Internal,
        ] {
            output.push_str(&format!(
                "waitlist_signups_rejected{{reason=\"{}\"}} {}\n",
                reason.as_str(),
                self.rejections(reason)
            ));
        }

        output.push_str("# HELP waitlist_limiter_checks Total quota authority consultations\n");
        output.push_str("# TYPE waitlist_limiter_checks counter\n");
        output.push_str(&format!(
            "waitlist_limiter_checks {}\n",
            self.limiter_checks()
        ));

        output.push_str("# HELP waitlist_limiter_timeouts Quota checks abandoned after the bounded wait\n");
        output.push_str("# TYPE waitlist_limiter_timeouts counter\n");
        output.push_str(&format!(
            "waitlist_limiter_timeouts {}\n",
            self.limiter_timeouts()
        ));

        output.push_str("# HELP waitlist_limiter_errors Quota checks failed on transport or protocol errors\n");
        output.push_str("# TYPE waitlist_limiter_errors counter\n");
        output.push_str(&format!(
            "waitlist_limiter_errors {}\n",
            self.limiter_errors()
        ));

        output.push_str("# HELP waitlist_uptime_seconds Service uptime in seconds\n");
        output.push_str("# TYPE waitlist_uptime_seconds gauge\n");
        output.push_str(&format!("waitlist_uptime_seconds {}\n", self.uptime_seconds()));

        if let Some(p50) = self.latency_p50() {
            output.push_str("# HELP waitlist_latency_p50_microseconds Request latency 50th percentile\n");
            output.push_str("# TYPE waitlist_latency_p50_microseconds gauge\n");
            output.push_str(&format!("waitlist_latency_p50_microseconds {}\n", p50));
        }

        if let Some(p99) = self.latency_p99() {
            output.push_str("# HELP waitlist_latency_p99_microseconds Request latency 99th percentile\n");
            output.push_str("# TYPE waitlist_latency_p99_microseconds gauge\n");
            output.push_str(&format!("waitlist_latency_p99_microseconds {}\n", p99));
        }

        output
    }
}
