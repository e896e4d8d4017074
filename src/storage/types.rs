use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use uuid::Uuid;

/// Opaque tenant identifier.
///
/// Ids written by the provisioning side are kept verbatim; ids minted here
/// are UUID v4 strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TenantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tenant record as held by the directory.
///
/// Several tenants may carry the same MQTT credential pair; the tenant name
/// in the topic decides which of them a request belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub mqtt_username: String,
    pub mqtt_password: String,
    /// Unknown when the provisioning side stored something other than RFC 3339
    pub created_at: Option<DateTime<Utc>>,
}

impl Tenant {
    pub fn has_credentials(&self, username: &str, password: &str) -> bool {
        self.mqtt_username == username && self.mqtt_password == password
    }
}

/// Provisioning input for a tenant
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewTenant {
    pub name: String,
    pub mqtt_username: String,
    pub mqtt_password: String,
}

impl NewTenant {
    pub fn new(
        name: impl Into<String>,
        mqtt_username: impl Into<String>,
        mqtt_password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mqtt_username: mqtt_username.into(),
            mqtt_password: mqtt_password.into(),
        }
    }

    pub(crate) fn into_tenant(self) -> Tenant {
        Tenant {
            id: TenantId::new(),
            name: self.name,
            mqtt_username: self.mqtt_username,
            mqtt_password: self.mqtt_password,
            created_at: Some(Utc::now()),
        }
    }
}
