//! Client construction parameters.

use std::time::Duration;

use crate::error::{ApiError, Violation};
use crate::schema::{Schema, Violations};

/// Per-request timeout applied by the transport. There are no retries.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const FINGERPRINT_FORMAT: &str = "must be 64 hex digits (a SHA-256 digest)";

pub const ENV_API_URL: &str = "OUTLINE_API_URL";
pub const ENV_CERT_SHA256: &str = "OUTLINE_CERT_SHA256";
pub const ENV_VERIFY_TLS: &str = "OUTLINE_VERIFY_TLS";
pub const ENV_OUTPUT: &str = "OUTLINE_OUTPUT";

/// How validated records are handed back to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// The typed record.
    #[default]
    Structured,
    /// Compact canonical JSON text of the validated record.
    Json,
}

/// Everything needed to build an `OutlineClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineConfig {
    pub api_url: String,
    /// Hex SHA-256 of the server certificate; case and `:` separators are ignored.
    pub cert_sha256: String,
    pub verify_tls: bool,
    pub output: OutputFormat,
}

impl OutlineConfig {
    pub fn new(api_url: impl Into<String>, cert_sha256: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            cert_sha256: cert_sha256.into(),
            verify_tls: true,
            output: OutputFormat::Structured,
        }
    }

    pub fn verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    pub fn output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    /// Read the configuration from `OUTLINE_*` environment variables.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup and validate it.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let mut v = Violations::default();

        let mut config = Self::new(
            lookup(ENV_API_URL).unwrap_or_default(),
            lookup(ENV_CERT_SHA256).unwrap_or_default(),
        );

        if let Some(raw) = lookup(ENV_VERIFY_TLS) {
            match parse_flag(&raw) {
                Some(flag) => config.verify_tls = flag,
                None => v.push(ENV_VERIFY_TLS, format!("expected a boolean, got {raw:?}")),
            }
        }

        if let Some(raw) = lookup(ENV_OUTPUT) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "structured" => config.output = OutputFormat::Structured,
                "json" => config.output = OutputFormat::Json,
                _ => v.push(ENV_OUTPUT, format!("expected structured or json, got {raw:?}")),
            }
        }

        config.check(&mut v);
        v.into_result(Self::NAME)?;
        Ok(config)
    }

    /// The configured fingerprint as raw bytes.
    pub fn fingerprint(&self) -> Result<[u8; 32], ApiError> {
        decode_fingerprint(&self.cert_sha256).ok_or_else(|| ApiError::ValidationFailed {
            schema: Self::NAME,
            violations: vec![Violation::new("certSha256", FINGERPRINT_FORMAT)],
        })
    }
}

impl Schema for OutlineConfig {
    const NAME: &'static str = "OutlineConfig";

    fn check(&self, v: &mut Violations) {
        v.non_empty("apiUrl", &self.api_url);
        if !self.api_url.is_empty()
            && !self.api_url.starts_with("https://")
            && !self.api_url.starts_with("http://")
        {
            v.push("apiUrl", "must start with https:// or http://");
        }

        v.non_empty("certSha256", &self.cert_sha256);
        if !self.cert_sha256.is_empty() && decode_fingerprint(&self.cert_sha256).is_none() {
            v.push("certSha256", FINGERPRINT_FORMAT);
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

pub(crate) fn decode_fingerprint(raw: &str) -> Option<[u8; 32]> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ':').collect();
    let bytes = hex::decode(cleaned).ok()?;
    bytes.try_into().ok()
}
