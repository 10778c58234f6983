//! Response validation and output rendering.
//!
//! `parse` turns a raw body into a schema-checked record; `render` turns a
//! checked record into the client's output form. The facade composes the
//! two in that order.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::config::OutputFormat;
use crate::error::{ApiError, Violation};
use crate::schema::Schema;

/// A validated record, or its canonical JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output<T> {
    Record(T),
    Text(String),
}

impl<T> Output<T> {
    pub fn record(self) -> Option<T> {
        match self {
            Output::Record(value) => Some(value),
            Output::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Output::Record(_) => None,
            Output::Text(text) => Some(text),
        }
    }
}

/// Parse `body` as `T` and check its constraints.
///
/// Malformed JSON, a wrong JSON type or a missing required field is reported
/// at path `$`; constraint failures are reported per field.
pub fn parse<T: Schema + DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let value: T = serde_json::from_str(body).map_err(|e| {
        warn!(schema = T::NAME, error = %e, "response body does not match schema");
        ApiError::ValidationFailed {
            schema: T::NAME,
            violations: vec![Violation::new("$", e.to_string())],
        }
    })?;

    if let Err(err) = value.validate() {
        warn!(
            schema = T::NAME,
            violations = err.violations().len(),
            "response failed validation"
        );
        return Err(err);
    }
    Ok(value)
}

/// Compact JSON of an already validated record. Secrets render masked.
pub fn canonical_text<T: Schema + Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::ValidationFailed {
        schema: T::NAME,
        violations: vec![Violation::new("$", e.to_string())],
    })
}

pub fn render<T: Schema + Serialize>(value: T, format: OutputFormat) -> Result<Output<T>, ApiError> {
    match format {
        OutputFormat::Structured => Ok(Output::Record(value)),
        OutputFormat::Json => canonical_text(&value).map(Output::Text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccessKey, ServerInfo, TransferMetrics};

    const SERVER: &str = r#"{
        "name": "Test Server",
        "serverId": "12345",
        "metricsEnabled": true,
        "createdTimestampMs": 1609459200000,
        "portForNewAccessKeys": 8080,
        "version": "1.7.0"
    }"#;

    #[test]
    fn parses_server_info_ignoring_extra_fields() {
        let info: ServerInfo = parse(SERVER).unwrap();
        assert_eq!(info.name, "Test Server");
        assert_eq!(info.server_id, "12345");
        assert!(info.metrics_enabled);
        assert_eq!(info.created_timestamp_ms, 1609459200000);
        assert_eq!(info.port_for_new_access_keys, 8080);
    }

    #[test]
    fn port_out_of_u16_range_fails() {
        let body = SERVER.replace("8080", "70000");
        let err = parse::<ServerInfo>(&body).unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed { schema: "ServerInfo", .. }));
    }

    #[test]
    fn missing_field_fails() {
        let err = parse::<ServerInfo>(r#"{"unexpectedField": "unexpectedValue"}"#).unwrap_err();
        assert_eq!(err.violations()[0].path, "$");
        assert!(err.violations()[0].message.contains("missing field"));
    }

    #[test]
    fn non_json_fails() {
        let err = parse::<TransferMetrics>("<html>").unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed { schema: "TransferMetrics", .. }));
    }

    #[test]
    fn negative_metric_fails_after_parse() {
        let err = parse::<TransferMetrics>(r#"{"bytesTransferredByUserId": {"user1": -100}}"#)
            .unwrap_err();
        assert_eq!(err.violations()[0].path, r#"bytesTransferredByUserId["user1"]"#);
    }

    #[test]
    fn canonical_text_masks_secrets_and_sorts_metrics() {
        let key: AccessKey = parse(
            r#"{"id":"1","name":"k","password":"pw","port":443,"method":"m","accessUrl":"ss://x"}"#,
        )
        .unwrap();
        let text = render(key, OutputFormat::Json).unwrap();
        assert_eq!(
            text.text().unwrap(),
            r#"{"id":"1","name":"k","password":"**********","port":443,"method":"m","accessUrl":"**********"}"#
        );

        let metrics: TransferMetrics =
            parse(r#"{"bytesTransferredByUserId": {"b": 2, "a": 1}}"#).unwrap();
        let text = render(metrics, OutputFormat::Json).unwrap();
        assert_eq!(
            text.text().unwrap(),
            r#"{"bytesTransferredByUserId":{"a":1,"b":2}}"#
        );
    }

    #[test]
    fn structured_output_keeps_the_record() {
        let info: ServerInfo = parse(SERVER).unwrap();
        let out = render(info.clone(), OutputFormat::Structured).unwrap();
        assert_eq!(out.text(), None);
        assert_eq!(out.record(), Some(info));
    }
}
