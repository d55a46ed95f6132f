//! Device fingerprint validation
//!
//! Validates client-supplied fingerprint payloads for structural correctness and
//! spoofing plausibility. Pure and deterministic: identical input always yields
//! identical output, and no rule performs I/O.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Maximum accepted thumbmark length
pub const MAX_THUMBMARK_LEN: usize = 256;

/// Digests produced by automation tooling hashing a blank canvas/audio surface
const PLACEHOLDER_HASHES: &[&str] = &[
    "0000000000000000",
    "d41d8cd98f00b204e9800998ecf8427e",
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
];

/// Platform strings reported by headless/automation runtimes
const AUTOMATION_PLATFORMS: &[&str] = &["HeadlessChrome", "PhantomJS", "Electron"];

/// Default viewport of headless browsers launched without window sizing
const HEADLESS_VIEWPORT: (i64, i64) = (800, 600);

/// Client-supplied device fingerprint
///
/// The `thumbmark` is the composite device hash used as the rate-limiter
/// identifier. The remaining signal fields stay loosely typed so that a type
/// mismatch surfaces as a per-field validation error instead of a body
/// deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintPayload {
    #[serde(default)]
    pub thumbmark: Option<String>,

    /// Named raw signal fields (screen metrics, timezone, canvas/audio hashes, ...)
    #[serde(flatten)]
    pub signals: BTreeMap<String, Value>,
}

/// A single violated validation rule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field is absent or empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present but has the wrong type or an out-of-bounds value
    #[error("malformed field: {0}")]
    MalformedField(&'static str),

    /// A signal indicates a forged or headless client
    #[error("implausible signal: {0}")]
    ImplausibleSignal(&'static str),
}

/// Result of validating one fingerprint payload
///
/// Holds the ordered list of violated rules; valid iff the list is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Human-readable rule names for the HTTP debug surface
    pub fn error_strings(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

/// Expected shape of one known signal field
enum SignalKind {
    Integer { min: i64, max: i64 },
    Text { max_len: usize },
}

impl SignalKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            SignalKind::Integer { min, max } => {
                value.as_i64().is_some_and(|n| (*min..=*max).contains(&n))
            }
            SignalKind::Text { max_len } => {
                value.as_str().is_some_and(|s| !s.is_empty() && s.len() <= *max_len)
            }
        }
    }
}

/// Known signal fields with their expected types and bounds
const KNOWN_SIGNALS: &[(&str, SignalKind)] = &[
    ("screenWidth", SignalKind::Integer { min: 1, max: 16_384 }),
    ("screenHeight", SignalKind::Integer { min: 1, max: 16_384 }),
    ("colorDepth", SignalKind::Integer { min: 1, max: 64 }),
    ("timezone", SignalKind::Text { max_len: 64 }),
    ("language", SignalKind::Text { max_len: 32 }),
    ("platform", SignalKind::Text { max_len: 64 }),
    ("canvasHash", SignalKind::Text { max_len: 128 }),
    ("audioHash", SignalKind::Text { max_len: 128 }),
];

/// Validate a fingerprint payload
///
/// All rules are evaluated; every violated rule contributes one error, in rule
/// order. Unknown extra signal fields are ignored.
pub fn validate_fingerprint(payload: &FingerprintPayload) -> ValidationResult {
    let mut errors = Vec::new();

    // Rule 1: the thumbmark is the sole rate-limiting identity and must exist
    match payload.thumbmark.as_deref() {
        None | Some("") => errors.push(ValidationError::MissingField("thumbmark")),
        Some(t) if t.len() > MAX_THUMBMARK_LEN => {
            errors.push(ValidationError::MalformedField("thumbmark"));
        }
        Some(_) => {}
    }

    // Rule 2: every known signal present must match its expected type and bounds
    let mut present = 0usize;
    for (name, kind) in KNOWN_SIGNALS {
        let Some(value) = payload.signals.get(*name) else {
            continue;
        };
        present += 1;
        if !kind.matches(value) {
            errors.push(ValidationError::MalformedField(*name));
        }
    }

    // Rule 3: plausibility heuristics against forged or headless clients
    if present == 0 {
        errors.push(ValidationError::ImplausibleSignal("signals"));
    }

    if let Some(platform) = text_signal(payload, "platform") {
        if AUTOMATION_PLATFORMS.iter().any(|m| platform.contains(m)) {
            errors.push(ValidationError::ImplausibleSignal("platform"));
        }
    }

    if text_signal(payload, "canvasHash").is_some_and(is_placeholder_hash) {
        errors.push(ValidationError::ImplausibleSignal("canvasHash"));
    }
    if text_signal(payload, "audioHash").is_some_and(is_placeholder_hash) {
        errors.push(ValidationError::ImplausibleSignal("audioHash"));
    }

    if int_signal(payload, "screenWidth") == Some(HEADLESS_VIEWPORT.0)
        && int_signal(payload, "screenHeight") == Some(HEADLESS_VIEWPORT.1)
    {
        errors.push(ValidationError::ImplausibleSignal("screen"));
    }

    ValidationResult { errors }
}

fn text_signal<'a>(payload: &'a FingerprintPayload, name: &str) -> Option<&'a str> {
    payload.signals.get(name).and_then(Value::as_str)
}

fn int_signal(payload: &FingerprintPayload, name: &str) -> Option<i64> {
    payload.signals.get(name).and_then(Value::as_i64)
}

fn is_placeholder_hash(hash: &str) -> bool {
    PLACEHOLDER_HASHES.contains(&hash)
}
