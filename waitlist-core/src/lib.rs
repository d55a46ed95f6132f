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

//! Waitlist Core Library
//!
//! This crate provides the foundational types and logic for the Waitlist Gate system.
//! It guards a public signup endpoint against automated and repeated abuse by
//! validating client-supplied device fingerprints and consulting an external quota
//! authority before any submission is accepted.
//!
//! # Architecture
//!
//! The library is organized into modules representing core concerns:
//! - `fingerprint`: Device fingerprint plausibility validation
//! - `limiter`: Bounded-wait quota gate over the external rate-limit authority
//! - `admission`: Orchestration of the admission pipeline
//! - `sink`: Pluggable append-only store for accepted signups
//! - `protocol`: Wire types for the HTTP surface
//! - `config`: Configuration management with validation
//! - `metrics`: Counters and latency tracking for observability
//! - `error`: Unified error types
//!
//! # Design Principles
//!
//! 1. **Fail closed**: uncertainty about quota state denies, never allows
//! 2. **Cheapest check first**: no network cost is paid for malformed input
//! 3. **Type safety**: every admission outcome is a typed variant, not an exception
//! 4. **Testability**: trait seams and dependency injection, no global state

pub mod admission;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod limiter;
pub mod metrics;
pub mod protocol;
pub mod sink;

pub use error::{Error, Result};

/// Library version for status reporting
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum accepted request body size to prevent OOM
pub const MAX_BODY_SIZE: usize = 65_536; // 64 KiB

/// Consecutive quota-authority failures before health reporting degrades
pub const LIMITER_UNHEALTHY_THRESHOLD: u64 = 5;
