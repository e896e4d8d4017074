use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Deserialize;
use std::path::Path;

use crate::storage::traits::{DirectoryError, DirectoryResult, TenantDirectory};
use crate::storage::types::{NewTenant, Tenant, TenantId};

/// In-memory tenant directory
/// Records are indexed by MQTT username and lost on restart
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    by_username: DashMap<String, Vec<Tenant>>, // mqtt_username -> tenants, insertion order
    names: DashMap<String, TenantId>,          // name -> id, uniqueness guard
}

#[derive(Debug, Deserialize)]
struct TenantsFile {
    #[serde(default)]
    tenants: Vec<NewTenant>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a directory seeded from a TOML file of `[[tenants]]` tables.
    pub fn from_file(path: &Path) -> DirectoryResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let file: TenantsFile = toml::from_str(&contents)?;

        let directory = Self::new();
        for tenant in file.tenants {
            directory.insert(tenant)?;
        }
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn insert(&self, new_tenant: NewTenant) -> DirectoryResult<Tenant> {
        let tenant = new_tenant.into_tenant();

        match self.names.entry(tenant.name.clone()) {
            Entry::Occupied(_) => Err(DirectoryError::DuplicateTenant(tenant.name)),
            Entry::Vacant(slot) => {
                slot.insert(tenant.id.clone());
                self.by_username
                    .entry(tenant.mqtt_username.clone())
                    .or_default()
                    .push(tenant.clone());
                Ok(tenant)
            }
        }
    }
}

#[async_trait]
impl TenantDirectory for InMemoryDirectory {
    async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> DirectoryResult<Option<Tenant>> {
        Ok(self.by_username.get(username).and_then(|tenants| {
            tenants
                .iter()
                .find(|t| t.has_credentials(username, password))
                .cloned()
        }))
    }

    async fn find_by_username(&self, username: &str) -> DirectoryResult<Vec<Tenant>> {
        Ok(self
            .by_username
            .get(username)
            .map(|tenants| tenants.clone())
            .unwrap_or_default())
    }

    async fn insert_tenant(&self, tenant: NewTenant) -> DirectoryResult<Tenant> {
        self.insert(tenant)
    }
}
