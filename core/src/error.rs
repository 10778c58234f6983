//! Error types for the Outline management API client.
//!
//! # Design
//! The set of failure kinds is closed: every public operation either returns
//! a validated value or exactly one of the three `ApiError` variants below.
//! Transport-level failures (`RequestFailed`, `HttpStatus`) are kept apart
//! from schema failures (`ValidationFailed`) so callers can tell "the server
//! could not be reached / refused" from "the server answered with garbage".

use std::fmt;

use thiserror::Error;

/// A single field-level schema violation.
///
/// `path` uses the wire field names, dotted for nesting and indexed for
/// sequences (`accessKeys[1].password`). Body-level failures use `$`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors returned by `OutlineClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response: connection refused, DNS,
    /// timeout, TLS handshake or certificate pin mismatch.
    #[error("request to {url} failed: {cause}")]
    RequestFailed { url: String, cause: String },

    /// The server answered with a status code the operation does not document
    /// as success.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// A request or response body did not satisfy its schema.
    #[error("{schema} failed validation: {}", join_violations(.violations))]
    ValidationFailed {
        schema: &'static str,
        violations: Vec<Violation>,
    },
}

impl ApiError {
    pub(crate) fn request_failed(url: impl Into<String>, cause: impl fmt::Display) -> Self {
        ApiError::RequestFailed {
            url: url.into(),
            cause: cause.to_string(),
        }
    }

    /// The HTTP status code carried by an `HttpStatus` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the server refused a port change because the port is taken.
    pub fn is_port_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// The violations carried by a `ValidationFailed` error, empty otherwise.
    pub fn violations(&self) -> &[Violation] {
        match self {
            ApiError::ValidationFailed { violations, .. } => violations,
            _ => &[],
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
