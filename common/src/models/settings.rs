//! Connection settings persisted by the host for each datasource instance.
//!
//! Plain options (`jsonData`) are stored as-is; the password lives in the
//! secure part and is only ever written by the configuration form, never read
//! back in plaintext.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::{AppError, AppResult};

/// Default port of the SQL engine.
pub const DEFAULT_PORT: u16 = 6875;
/// Default user of the SQL engine.
pub const DEFAULT_USERNAME: &str = "materialize";
/// Key of the password in the secure settings.
pub const PASSWORD_KEY: &str = "password";

/// Plain options configured for each datasource instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "host must not be empty"))]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Secure options configured for each datasource instance.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecureOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl std::fmt::Debug for SecureOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureOptions")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The settings object edited by the configuration form and persisted by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceSettings {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub json_data: DataSourceOptions,
    /// Only present while the user has typed a new secret that is not saved yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_json_data: Option<SecureOptions>,
    /// Which secure keys already hold a stored value.
    #[serde(default)]
    pub secure_json_fields: BTreeMap<String, bool>,
}

impl DataSourceSettings {
    pub fn is_password_configured(&self) -> bool {
        self.secure_json_fields
            .get(PASSWORD_KEY)
            .copied()
            .unwrap_or(false)
    }
}

/// The settings the host hands to a datasource instance at runtime, with the
/// secure part already decrypted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceInstanceSettings {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "uid must be 1-100 characters"))]
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    #[validate(nested)]
    pub json_data: DataSourceOptions,
    #[serde(default)]
    pub decrypted_secure_json_data: SecureOptions,
}

/// Fully resolved connection parameters with defaults applied.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
}

impl ConnectionParams {
    pub fn from_instance(settings: &DataSourceInstanceSettings) -> AppResult<Self> {
        let host = settings
            .json_data
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::InvalidDatasourceSettings("host is required".into()))?;
        Ok(Self {
            host: host.to_string(),
            port: settings.json_data.port.unwrap_or(DEFAULT_PORT),
            username: settings
                .json_data
                .username
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            password: settings
                .decrypted_secure_json_data
                .password
                .clone()
                .filter(|p| !p.is_empty()),
        })
    }
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
