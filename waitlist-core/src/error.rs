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

//! Error types for the waitlist gate
//!
//! Provides a unified error taxonomy using `thiserror` for ergonomic error handling.

pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for waitlist gate operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network communication with the quota authority failed
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The quota authority answered with a protocol-level failure
    #[error("Quota authority error: {0}")]
    Authority(String),

    /// The quota authority did not answer within the bounded wait
    #[error("Quota check timed out")]
    Timeout,

    /// The acceptance sink rejected an admitted signup
    #[error("Acceptance sink error: {0}")]
    Sink(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(e.to_string())
    }
}
