//! Request composition and dispatch.
//!
//! # Design
//! The dispatcher joins the base URL with an endpoint path, validates and
//! serializes an optional typed body, and hands the result to a `Transport`.
//! It never looks at status codes: the facade knows which code means success
//! for each operation.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, Violation};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::schema::Schema;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    base_url: String,
}

impl Dispatcher {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Build a request without a body.
    pub fn build(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest {
            method,
            url: self.url(path),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Build a request carrying `payload` once it passes its schema.
    ///
    /// Unset optional fields are left out of the body, and a payload that
    /// serializes to an empty object produces no body at all.
    pub fn build_with<S: Schema + Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        payload: &S,
    ) -> Result<HttpRequest, ApiError> {
        payload.validate()?;

        let mut request = self.build(method, path);
        if let Some(body) = encode_body::<S>(payload)? {
            request
                .headers
                .push(("content-type".to_string(), "application/json".to_string()));
            request.body = Some(body);
        }
        Ok(request)
    }

    pub fn dispatch<T: Transport>(
        &self,
        transport: &T,
        request: &HttpRequest,
    ) -> Result<HttpResponse, ApiError> {
        debug!(
            "Making {} request to {} (body: {})",
            request.method,
            request.url,
            request.body.is_some()
        );
        let response = transport.send(request)?;
        debug!("Response from {}: {}", request.url, response.status);
        Ok(response)
    }
}

fn encode_body<S: Schema + Serialize>(payload: &S) -> Result<Option<String>, ApiError> {
    let encode_failed = |e: serde_json::Error| ApiError::ValidationFailed {
        schema: S::NAME,
        violations: vec![Violation::new("$", e.to_string())],
    };

    let value = serde_json::to_value(payload).map_err(encode_failed)?;
    let value = match value {
        Value::Object(fields) => {
            let fields: serde_json::Map<String, Value> =
                fields.into_iter().filter(|(_, v)| !v.is_null()).collect();
            if fields.is_empty() {
                return Ok(None);
            }
            Value::Object(fields)
        }
        Value::Null => return Ok(None),
        other => other,
    };
    serde_json::to_string(&value).map(Some).map_err(encode_failed)
}
