//! Field-level constraints shared by every wire shape.
//!
//! # Design
//! Shape (field set, required vs optional, JSON types) is declared by each
//! type's serde derive; value constraints (ranges, non-empty strings) are
//! declared by its `Schema::check`, which records every violation rather
//! than stopping at the first. Extra fields in a response are ignored unless
//! the type is declared strict with `#[serde(deny_unknown_fields)]`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ApiError, Violation};

/// A wire shape with value constraints.
pub trait Schema {
    /// Name reported in `ApiError::ValidationFailed`.
    const NAME: &'static str;

    /// Record every constraint this value breaks.
    fn check(&self, v: &mut Violations);

    fn validate(&self) -> Result<(), ApiError> {
        let mut v = Violations::default();
        self.check(&mut v);
        v.into_result(Self::NAME)
    }
}

/// Collects violations while a value is checked.
#[derive(Debug, Default)]
pub struct Violations {
    prefix: String,
    items: Vec<Violation>,
}

impl Violations {
    fn path(&self, field: &str) -> String {
        if self.prefix.is_empty() {
            field.to_string()
        } else if field.is_empty() || field.starts_with('[') {
            format!("{}{field}", self.prefix)
        } else {
            format!("{}.{field}", self.prefix)
        }
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        let path = self.path(field);
        self.items.push(Violation::new(path, message));
    }

    pub fn non_empty(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            self.push(field, "must not be empty");
        }
    }

    pub fn non_negative(&mut self, field: &str, value: i64) {
        if value < 0 {
            self.push(field, format!("must be non-negative, got {value}"));
        }
    }

    pub fn in_range(&mut self, field: &str, value: i64, min: i64, max: i64) {
        if value < min || value > max {
            self.push(field, format!("must be between {min} and {max}, got {value}"));
        }
    }

    /// A listening port: 0 is not a valid port to connect to.
    pub fn port(&mut self, field: &str, value: u16) {
        self.in_range(field, i64::from(value), 1, 65535);
    }

    /// Check a nested value with its violations reported under `field`.
    pub fn nested(&mut self, field: &str, f: impl FnOnce(&mut Violations)) {
        let saved = self.prefix.len();
        self.prefix = self.path(field);
        f(self);
        self.prefix.truncate(saved);
    }

    pub fn into_result(self, schema: &'static str) -> Result<(), ApiError> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationFailed {
                schema,
                violations: self.items,
            })
        }
    }
}

/// Fixed rendering of a secret outside of `expose_secret`.
pub const SECRET_MASK: &str = "**********";

/// A sensitive string (access key password, access URL).
///
/// Deserializes from a plain JSON string. `Debug` and `Serialize` never emit
/// the plaintext; only `expose_secret` does.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({SECRET_MASK})")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(SECRET_MASK)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Secret)
    }
}
