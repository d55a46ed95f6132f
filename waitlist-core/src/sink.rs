//! Acceptance sink for admitted signups
//!
//! Durable storage is an embedder concern; implementations plug in through the
//! [`AcceptanceSink`] trait. The gateway ships with a log-only sink matching the
//! current deployment, which records signups for observability and drops them.

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// An accepted signup, ready for append-only storage
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedSignup {
    pub email: String,
    pub thumbmark: String,
    pub accepted_at: DateTime<Utc>,
}

/// Append-only store for accepted signups
#[async_trait]
pub trait AcceptanceSink: Send + Sync {
    /// Record one accepted signup
    async fn record(&self, signup: &AcceptedSignup) -> Result<()>;
}

/// Observability-only sink
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl AcceptanceSink for LogSink {
    async fn record(&self, signup: &AcceptedSignup) -> Result<()> {
        info!(
            email = %signup.email,
            thumbmark = %signup.thumbmark,
            accepted_at = %signup.accepted_at,
            "New waitlist signup"
        );
        Ok(())
    }
}
