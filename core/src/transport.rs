//! The network seam: one blocking HTTP round trip per call.
//!
//! # Design
//! `Transport` is the only place I/O happens. `PinnedTransport` owns a
//! single reusable `reqwest` blocking client whose TLS configuration trusts
//! exactly the configured certificate fingerprint. It is built once with the
//! client and never mutated afterwards. Any status code is returned as data;
//! interpreting it is the caller's job.

use std::error::Error as StdError;
use std::sync::Arc;

use reqwest::blocking::Client;
use reqwest::redirect::Policy;

use crate::config::{OutlineConfig, REQUEST_TIMEOUT};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::pin::FingerprintVerifier;
use crate::schema::Schema;

/// Executes an `HttpRequest`.
///
/// Implementations must report every failure to obtain a response as
/// `ApiError::RequestFailed` and must not treat any status code as an error.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).send(request)
    }
}

/// Certificate-pinned HTTPS transport scoped to one base URL.
#[derive(Debug, Clone)]
pub struct PinnedTransport {
    base_url: String,
    http: Client,
}

impl PinnedTransport {
    pub fn new(config: &OutlineConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let fingerprint = config.fingerprint()?;
        let base_url = config.api_url.trim_end_matches('/').to_string();

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = FingerprintVerifier::new(fingerprint, provider.clone(), config.verify_tls)
            .map_err(|e| ApiError::request_failed(&base_url, e))?;
        let tls = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| ApiError::request_failed(&base_url, e))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();

        let http = Client::builder()
            .use_preconfigured_tls(tls)
            .timeout(REQUEST_TIMEOUT)
            .redirect(Policy::none())
            .build()
            .map_err(|e| ApiError::request_failed(&base_url, describe(&e)))?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The base URL itself or a path below it; `https://h:1` does not cover `https://h:10`.
    fn in_scope(&self, url: &str) -> bool {
        url.strip_prefix(&self.base_url)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

impl Transport for PinnedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        if !self.in_scope(&request.url) {
            return Err(ApiError::request_failed(
                &request.url,
                format!("outside the pinned base URL {}", self.base_url),
            ));
        }

        let mut builder = self.http.request(request.method.into(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .map_err(|e| ApiError::request_failed(&request.url, describe(&e)))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| ApiError::request_failed(&request.url, describe(&e)))?;

        Ok(HttpResponse { status, body })
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// `reqwest` errors keep the useful part (refused, timed out, bad
/// certificate) in their source chain.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
