use async_trait::async_trait;
use thiserror::Error;

use crate::storage::types::{NewTenant, Tenant};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Tenant '{0}' already exists")]
    DuplicateTenant(String),
    #[error("Failed to read tenants file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse tenants file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Read access to the tenant records owned by the provisioning side.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Find a tenant whose MQTT username and password both match exactly.
    async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> DirectoryResult<Option<Tenant>>;

    /// Find every tenant configured with this MQTT username.
    async fn find_by_username(&self, username: &str) -> DirectoryResult<Vec<Tenant>>;

    /// Provision a tenant. Names are unique across the directory.
    async fn insert_tenant(&self, tenant: NewTenant) -> DirectoryResult<Tenant>;
}
