//! One method per remote operation of the Outline management API.
//!
//! # Design
//! Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`; the
//! public operation sends one through the client's `Transport` and feeds the
//! answer to the other. The status code is checked before the body is
//! trusted: anything but the documented success code is an error, even when
//! the body would parse.

use serde::Serialize;

use crate::config::{OutlineConfig, OutputFormat};
use crate::dispatch::Dispatcher;
use crate::error::{ApiError, Violation};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::schema::Schema;
use crate::transport::{PinnedTransport, Transport};
use crate::types::{
    AccessKey, AccessKeyCreateRequest, AccessKeyList, DataLimit, MetricsEnabledFlag, ServerInfo,
    ServerPortUpdate, TransferMetrics,
};
use crate::validate::{self, Output};

const PORT_IN_USE: &str = "port already in use";

/// Synchronous client for one Outline server.
///
/// Every operation performs exactly one blocking round trip. The client is
/// safe to reuse for sequential calls; give each thread its own client.
#[derive(Debug, Clone)]
pub struct OutlineClient<T = PinnedTransport> {
    dispatcher: Dispatcher,
    transport: T,
    output: OutputFormat,
}

impl OutlineClient<PinnedTransport> {
    /// Validate `config` and open the pinned transport.
    pub fn new(config: OutlineConfig) -> Result<Self, ApiError> {
        let transport = PinnedTransport::new(&config)?;
        Ok(Self::with_transport(&config.api_url, config.output, transport))
    }
}

impl<T: Transport> OutlineClient<T> {
    pub fn with_transport(api_url: &str, output: OutputFormat, transport: T) -> Self {
        Self {
            dispatcher: Dispatcher::new(api_url),
            transport,
            output,
        }
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.dispatcher.dispatch(&self.transport, &request)
    }

    fn finish<R: Schema + Serialize>(&self, record: R) -> Result<Output<R>, ApiError> {
        validate::render(record, self.output)
    }

    // --- server ---

    pub fn build_get_server_info(&self) -> HttpRequest {
        self.dispatcher.build(HttpMethod::Get, "server")
    }

    pub fn parse_get_server_info(&self, response: HttpResponse) -> Result<ServerInfo, ApiError> {
        check_status(&response, 200)?;
        validate::parse(&response.body)
    }

    pub fn get_server_info(&self) -> Result<Output<ServerInfo>, ApiError> {
        let response = self.send(self.build_get_server_info())?;
        let info = self.parse_get_server_info(response)?;
        self.finish(info)
    }

    pub fn build_set_server_port(&self, port: u16) -> Result<HttpRequest, ApiError> {
        self.dispatcher.build_with(
            HttpMethod::Put,
            "server/port-for-new-access-keys",
            &ServerPortUpdate { port },
        )
    }

    /// A 409 means another process already listens on the port.
    pub fn parse_set_server_port(&self, response: HttpResponse) -> Result<(), ApiError> {
        if response.status == 409 {
            return Err(ApiError::HttpStatus {
                status: 409,
                message: PORT_IN_USE.to_string(),
            });
        }
        check_status(&response, 204)
    }

    /// Change the port used by access keys created from now on.
    pub fn set_server_port(&self, port: u16) -> Result<(), ApiError> {
        let response = self.send(self.build_set_server_port(port)?)?;
        self.parse_set_server_port(response)
    }

    pub fn build_set_metrics_enabled(&self, enabled: bool) -> Result<HttpRequest, ApiError> {
        self.dispatcher.build_with(
            HttpMethod::Put,
            "server/metrics/enabled",
            &MetricsEnabledFlag { enabled },
        )
    }

    /// 204 echoes the requested flag; 200 carries the server's view of it.
    pub fn parse_set_metrics_enabled(
        &self,
        enabled: bool,
        response: HttpResponse,
    ) -> Result<MetricsEnabledFlag, ApiError> {
        if response.status == 204 {
            return Ok(MetricsEnabledFlag { enabled });
        }
        check_status(&response, 200)?;
        validate::parse(&response.body)
    }

    pub fn set_metrics_enabled(&self, enabled: bool) -> Result<Output<MetricsEnabledFlag>, ApiError> {
        let response = self.send(self.build_set_metrics_enabled(enabled)?)?;
        let flag = self.parse_set_metrics_enabled(enabled, response)?;
        self.finish(flag)
    }

    pub fn build_get_transfer_metrics(&self) -> HttpRequest {
        self.dispatcher.build(HttpMethod::Get, "metrics/transfer")
    }

    pub fn parse_get_transfer_metrics(
        &self,
        response: HttpResponse,
    ) -> Result<TransferMetrics, ApiError> {
        check_status(&response, 200)?;
        validate::parse(&response.body)
    }

    pub fn get_transfer_metrics(&self) -> Result<Output<TransferMetrics>, ApiError> {
        let response = self.send(self.build_get_transfer_metrics())?;
        let metrics = self.parse_get_transfer_metrics(response)?;
        self.finish(metrics)
    }

    // --- access keys ---

    pub fn build_create_access_key(
        &self,
        request: &AccessKeyCreateRequest,
    ) -> Result<HttpRequest, ApiError> {
        self.dispatcher
            .build_with(HttpMethod::Post, "access-keys", request)
    }

    pub fn parse_create_access_key(&self, response: HttpResponse) -> Result<AccessKey, ApiError> {
        check_status(&response, 201)?;
        validate::parse(&response.body)
    }

    /// Create a key; with an empty request the server picks every field.
    pub fn create_access_key(
        &self,
        request: &AccessKeyCreateRequest,
    ) -> Result<Output<AccessKey>, ApiError> {
        let response = self.send(self.build_create_access_key(request)?)?;
        let key = self.parse_create_access_key(response)?;
        self.finish(key)
    }

    pub fn build_list_access_keys(&self) -> HttpRequest {
        self.dispatcher.build(HttpMethod::Get, "access-keys")
    }

    pub fn parse_list_access_keys(&self, response: HttpResponse) -> Result<AccessKeyList, ApiError> {
        check_status(&response, 200)?;
        validate::parse(&response.body)
    }

    pub fn list_access_keys(&self) -> Result<Output<AccessKeyList>, ApiError> {
        let response = self.send(self.build_list_access_keys())?;
        let keys = self.parse_list_access_keys(response)?;
        self.finish(keys)
    }

    pub fn build_delete_access_key(&self, id: &str) -> Result<HttpRequest, ApiError> {
        let path = key_path(id, "")?;
        Ok(self.dispatcher.build(HttpMethod::Delete, &path))
    }

    pub fn parse_delete_access_key(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, 204)
    }

    pub fn delete_access_key(&self, id: &str) -> Result<(), ApiError> {
        let response = self.send(self.build_delete_access_key(id)?)?;
        self.parse_delete_access_key(response)
    }

    pub fn build_set_access_key_data_limit(
        &self,
        id: &str,
        bytes: i64,
    ) -> Result<HttpRequest, ApiError> {
        let path = key_path(id, "/data-limit")?;
        self.dispatcher
            .build_with(HttpMethod::Put, &path, &DataLimit { bytes })
    }

    pub fn parse_set_access_key_data_limit(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, 204)
    }

    pub fn set_access_key_data_limit(&self, id: &str, bytes: i64) -> Result<(), ApiError> {
        let response = self.send(self.build_set_access_key_data_limit(id, bytes)?)?;
        self.parse_set_access_key_data_limit(response)
    }

    pub fn build_remove_access_key_data_limit(&self, id: &str) -> Result<HttpRequest, ApiError> {
        let path = key_path(id, "/data-limit")?;
        Ok(self.dispatcher.build(HttpMethod::Delete, &path))
    }

    pub fn parse_remove_access_key_data_limit(
        &self,
        response: HttpResponse,
    ) -> Result<(), ApiError> {
        check_status(&response, 204)
    }

    pub fn remove_access_key_data_limit(&self, id: &str) -> Result<(), ApiError> {
        let response = self.send(self.build_remove_access_key_data_limit(id)?)?;
        self.parse_remove_access_key_data_limit(response)
    }
}

/// Access key ids are substituted into the path verbatim.
fn key_path(id: &str, suffix: &str) -> Result<String, ApiError> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '?', '#']) {
        return Err(ApiError::ValidationFailed {
            schema: "AccessKeyId",
            violations: vec![Violation::new(
                "id",
                format!("must be a non-empty path segment, got {id:?}"),
            )],
        });
    }
    Ok(format!("access-keys/{id}{suffix}"))
}

/// Map any status other than `expected` to `ApiError::HttpStatus`.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }
    Err(ApiError::HttpStatus {
        status: response.status,
        message: error_message(&response.body),
    })
}

/// The server reports errors as `{"code": ..., "message": ...}`.
fn error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: String,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "unexpected status".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    const KEY: &str = r#"{"id":"0","name":"Test Key","password":"secret_password","port":1234,"method":"chacha20-ietf-poly1305","accessUrl":"ss://example"}"#;

    /// Replays canned responses and records what was sent.
    struct Canned {
        response: RefCell<Option<Result<HttpResponse, ApiError>>>,
        sent: RefCell<Vec<HttpRequest>>,
    }

    impl Canned {
        fn new(status: u16, body: &str) -> Self {
            Self {
                response: RefCell::new(Some(Ok(HttpResponse::new(status, body)))),
                sent: RefCell::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                response: RefCell::new(Some(Err(ApiError::request_failed(
                    "http://vpn.example/api/server",
                    "connection refused",
                )))),
                sent: RefCell::new(Vec::new()),
            }
        }

        fn last(&self) -> HttpRequest {
            self.sent.borrow().last().cloned().unwrap()
        }
    }

    impl Transport for Canned {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            self.sent.borrow_mut().push(request.clone());
            self.response.borrow_mut().take().expect("one request per test")
        }
    }

    fn client(transport: &Canned) -> OutlineClient<&Canned> {
        OutlineClient::with_transport("http://vpn.example/api", OutputFormat::Structured, transport)
    }

    #[test]
    fn create_without_arguments_sends_no_body() {
        let transport = Canned::new(201, KEY);
        let key = client(&transport)
            .create_access_key(&AccessKeyCreateRequest::default())
            .unwrap()
            .record()
            .unwrap();
        assert_eq!(key.id, "0");
        assert_eq!(key.password.expose_secret(), "secret_password");
        assert_eq!(key.access_url.expose_secret(), "ss://example");

        let sent = transport.last();
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.url, "http://vpn.example/api/access-keys");
        assert!(sent.body.is_none());
    }

    #[test]
    fn create_missing_access_url_is_a_validation_failure() {
        let body = KEY.replace(r#","accessUrl":"ss://example""#, "");
        let transport = Canned::new(201, &body);
        let err = client(&transport)
            .create_access_key(&AccessKeyCreateRequest::default())
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed { schema: "AccessKey", .. }));
    }

    #[test]
    fn create_with_wrong_success_code_is_an_http_error() {
        let transport = Canned::new(200, KEY);
        let err = client(&transport)
            .create_access_key(&AccessKeyCreateRequest::default())
            .unwrap_err();
        assert_eq!(err.status(), Some(200));
    }

    #[test]
    fn delete_204_succeeds_and_404_fails() {
        let transport = Canned::new(204, "");
        client(&transport).delete_access_key("7").unwrap();
        assert_eq!(transport.last().method, HttpMethod::Delete);
        assert_eq!(transport.last().url, "http://vpn.example/api/access-keys/7");

        let transport = Canned::new(404, r#"{"code":"NotFound","message":"Access key \"7\" not found"}"#);
        let err = client(&transport).delete_access_key("7").unwrap_err();
        match err {
            ApiError::HttpStatus { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Access key \"7\" not found");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[test]
    fn set_port_conflict_is_distinct_from_transport_failure() {
        let transport = Canned::new(409, "");
        let err = client(&transport).set_server_port(8080).unwrap_err();
        assert!(err.is_port_conflict());
        assert_eq!(err.to_string(), "HTTP 409: port already in use");

        let body: serde_json::Value =
            serde_json::from_str(transport.last().body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"port": 8080}));
    }

    #[test]
    fn set_port_zero_never_reaches_transport() {
        let transport = Canned::new(204, "");
        let err = client(&transport).set_server_port(0).unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed { .. }));
        assert!(transport.sent.borrow().is_empty());
    }

    #[test]
    fn data_limit_round_trip() {
        let transport = Canned::new(204, "");
        client(&transport).set_access_key_data_limit("3", 1_000_000).unwrap();
        let sent = transport.last();
        assert_eq!(sent.method, HttpMethod::Put);
        assert_eq!(sent.url, "http://vpn.example/api/access-keys/3/data-limit");
        assert_eq!(sent.body.as_deref(), Some(r#"{"bytes":1000000}"#));

        let transport = Canned::new(204, "");
        client(&transport).remove_access_key_data_limit("3").unwrap();
        assert_eq!(transport.last().method, HttpMethod::Delete);
        assert!(transport.last().body.is_none());
    }

    #[test]
    fn metrics_enabled_accepts_204_and_200() {
        let transport = Canned::new(204, "");
        let flag = client(&transport).set_metrics_enabled(true).unwrap();
        assert_eq!(flag, Output::Record(MetricsEnabledFlag { enabled: true }));

        let transport = Canned::new(200, r#"{"enabled": false}"#);
        let flag = client(&transport).set_metrics_enabled(false).unwrap();
        assert_eq!(flag, Output::Record(MetricsEnabledFlag { enabled: false }));

        let transport = Canned::new(500, "boom");
        let err = client(&transport).set_metrics_enabled(true).unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500: boom");
    }

    #[test]
    fn connection_failure_is_request_failed() {
        let transport = Canned::failing();
        let err = client(&transport).get_server_info().unwrap_err();
        assert!(matches!(err, ApiError::RequestFailed { .. }));
    }

    #[test]
    fn bad_key_id_is_rejected() {
        let transport = Canned::new(204, "");
        let err = client(&transport).delete_access_key("../server").unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed { schema: "AccessKeyId", .. }));
        let err = client(&transport).delete_access_key("").unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed { .. }));
        let err = client(&transport).delete_access_key("..").unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed { schema: "AccessKeyId", .. }));
        let err = client(&transport).set_access_key_data_limit(".", 1).unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed { schema: "AccessKeyId", .. }));
        assert!(transport.sent.borrow().is_empty());
    }

    #[test]
    fn json_output_renders_canonical_text() {
        let transport = Canned::new(200, r#"{"bytesTransferredByUserId":{"1":20,"0":10}}"#);
        let client =
            OutlineClient::with_transport("http://vpn.example/api", OutputFormat::Json, &transport);
        let out = client.get_transfer_metrics().unwrap();
        assert_eq!(out.text(), Some(r#"{"bytesTransferredByUserId":{"0":10,"1":20}}"#));
    }

    #[test]
    fn list_preserves_server_order() {
        let body = format!(
            r#"{{"accessKeys":[{},{}]}}"#,
            KEY.replace(r#""id":"0""#, r#""id":"9""#),
            KEY
        );
        let transport = Canned::new(200, &body);
        let list = client(&transport).list_access_keys().unwrap().record().unwrap();
        let ids: Vec<&str> = list.access_keys.iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, ["9", "0"]);
    }
}
