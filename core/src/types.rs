//! Request and response shapes of the Outline management API.
//!
//! # Design
//! Each type is a serde mirror of one wire shape plus a `Schema` impl
//! carrying its value constraints. Integer fields that the API documents as
//! non-negative 64-bit counts are `i64` so an out-of-range value is reported
//! as a named violation; ports are `u16` with 0 rejected by `check`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{Schema, Secret, Violations};

/// `GET /server`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    pub server_id: String,
    pub metrics_enabled: bool,
    pub created_timestamp_ms: i64,
    pub port_for_new_access_keys: u16,
}

impl Schema for ServerInfo {
    const NAME: &'static str = "ServerInfo";

    fn check(&self, v: &mut Violations) {
        v.non_negative("createdTimestampMs", self.created_timestamp_ms);
        v.port("portForNewAccessKeys", self.port_for_new_access_keys);
    }
}

/// A single access key as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKey {
    pub id: String,
    pub name: String,
    pub password: Secret,
    pub port: u16,
    pub method: String,
    pub access_url: Secret,
}

impl Schema for AccessKey {
    const NAME: &'static str = "AccessKey";

    fn check(&self, v: &mut Violations) {
        v.non_empty("password", self.password.expose_secret());
        v.port("port", self.port);
        v.non_empty("accessUrl", self.access_url.expose_secret());
    }
}

/// `GET /access-keys`. Order is the server's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKeyList {
    pub access_keys: Vec<AccessKey>,
}

impl Schema for AccessKeyList {
    const NAME: &'static str = "AccessKeyList";

    fn check(&self, v: &mut Violations) {
        v.nested("accessKeys", |v| {
            for (i, key) in self.access_keys.iter().enumerate() {
                v.nested(&format!("[{i}]"), |v| key.check(v));
            }
        });
    }
}

/// `POST /access-keys` body. Every field is optional; unset fields are
/// omitted from the body and an empty request sends no body at all.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeyCreateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl AccessKeyCreateRequest {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.password.is_none() && self.port.is_none()
    }
}

impl fmt::Debug for AccessKeyCreateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKeyCreateRequest")
            .field("name", &self.name)
            .field("password", &self.password.as_ref().map(|_| crate::schema::SECRET_MASK))
            .field("port", &self.port)
            .finish()
    }
}

impl Schema for AccessKeyCreateRequest {
    const NAME: &'static str = "AccessKeyCreateRequest";

    fn check(&self, _v: &mut Violations) {}
}

/// `PUT /server/port-for-new-access-keys` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPortUpdate {
    pub port: u16,
}

impl Schema for ServerPortUpdate {
    const NAME: &'static str = "ServerPortUpdate";

    fn check(&self, v: &mut Violations) {
        v.port("port", self.port);
    }
}

/// `PUT /access-keys/{id}/data-limit` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLimit {
    pub bytes: i64,
}

impl Schema for DataLimit {
    const NAME: &'static str = "DataLimit";

    fn check(&self, v: &mut Violations) {
        v.non_negative("bytes", self.bytes);
    }
}

/// `PUT /server/metrics/enabled` body and response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsEnabledFlag {
    pub enabled: bool,
}

impl Schema for MetricsEnabledFlag {
    const NAME: &'static str = "MetricsEnabledFlag";

    fn check(&self, _v: &mut Violations) {}
}

/// `GET /metrics/transfer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMetrics {
    pub bytes_transferred_by_user_id: BTreeMap<String, i64>,
}

impl Schema for TransferMetrics {
    const NAME: &'static str = "TransferMetrics";

    fn check(&self, v: &mut Violations) {
        v.nested("bytesTransferredByUserId", |v| {
            for (user_id, bytes) in &self.bytes_transferred_by_user_id {
                if user_id.is_empty() {
                    v.push("", "user id must not be empty");
                }
                v.non_negative(&format!("[{user_id:?}]"), *bytes);
            }
        });
    }
}
