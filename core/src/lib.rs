//! Validating client for the Outline VPN server management API.
//!
//! # Overview
//! `OutlineClient` issues certificate-pinned HTTPS requests to one server
//! and turns every JSON response into a schema-checked record, or fails with
//! an `ApiError`. Nothing is swallowed: no retries, no default values.
//!
//! # Design
//! - `transport` owns the only I/O: a reusable blocking client whose TLS
//!   trusts exactly the configured certificate fingerprint (`pin`).
//! - `dispatch` composes URL, method and optional validated body.
//! - `types` declares every wire shape; `schema` carries the constraint
//!   vocabulary they use.
//! - `validate` parses responses against a shape and renders the result in
//!   the output format chosen at construction.
//! - `client` is the facade: one `build_*` / `parse_*` pair and one
//!   round-trip method per remote operation.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod pin;
pub mod schema;
pub mod transport;
pub mod types;
pub mod validate;

pub use client::OutlineClient;
pub use config::{OutlineConfig, OutputFormat, REQUEST_TIMEOUT};
pub use error::{ApiError, Violation};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use schema::{Schema, Secret};
pub use transport::{PinnedTransport, Transport};
pub use types::{
    AccessKey, AccessKeyCreateRequest, AccessKeyList, DataLimit, MetricsEnabledFlag, ServerInfo,
    ServerPortUpdate, TransferMetrics,
};
pub use validate::Output;
