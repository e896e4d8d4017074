use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::storage::traits::{DirectoryError, DirectoryResult, TenantDirectory};
use crate::storage::types::{NewTenant, Tenant, TenantId};

/// SQLite-backed tenant directory
pub struct SqliteDirectory {
    conn: Arc<Mutex<Connection>>,
}

/// Rows may come from an outside provisioning process, so `id` is read as
/// whatever SQLite holds and an unparseable `created_at` becomes `None`.
fn tenant_from_row(row: &Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: TenantId::from(opaque_id(row.get_ref(0)?)),
        name: row.get(1)?,
        mqtt_username: row.get(2)?,
        mqtt_password: row.get(3)?,
        created_at: parse_created_at(row.get_ref(4)?),
    })
}

fn opaque_id(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Text(text) => String::from_utf8_lossy(text).into_owned(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Blob(bytes) => bytes.iter().map(|b| format!("{b:02x}")).collect(),
        ValueRef::Null => String::new(),
    }
}

fn parse_created_at(value: ValueRef<'_>) -> Option<DateTime<Utc>> {
    let text = value.as_str().ok()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

const SELECT_TENANT: &str =
    "SELECT id, name, mqtt_username, mqtt_password, created_at FROM tenants";

impl SqliteDirectory {
    /// Open (or create) the database at `path`.
    /// `busy_timeout` bounds how long a query waits on a locked database.
    pub fn new<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> DirectoryResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory SQLite directory (useful for testing)
    pub fn in_memory() -> DirectoryResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> DirectoryResult<Self> {
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize_schema(conn: &Connection) -> DirectoryResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                mqtt_username TEXT NOT NULL,
                mqtt_password TEXT NOT NULL,
                created_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tenants_mqtt_username
                ON tenants(mqtt_username);
            "#,
        )?;
        Ok(())
    }

    /// Run a blocking query off the async runtime.
    async fn run<T, F>(&self, query: F) -> DirectoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> DirectoryResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| {
                DirectoryError::Unavailable("connection lock poisoned".to_string())
            })?;
            query(&mut *conn)
        })
        .await
        .map_err(|e| DirectoryError::Unavailable(format!("query task failed: {e}")))?
    }
}

#[async_trait]
impl TenantDirectory for SqliteDirectory {
    async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> DirectoryResult<Option<Tenant>> {
        let username = username.to_string();
        let password = password.to_string();

        self.run(move |conn| {
            let tenant = conn
                .query_row(
                    &format!(
                        "{SELECT_TENANT} WHERE mqtt_username = ?1 AND mqtt_password = ?2 \
                         ORDER BY rowid LIMIT 1"
                    ),
                    params![username, password],
                    tenant_from_row,
                )
                .optional()?;
            Ok(tenant)
        })
        .await
    }

    async fn find_by_username(&self, username: &str) -> DirectoryResult<Vec<Tenant>> {
        let username = username.to_string();

        self.run(move |conn| {
            let mut stmt =
                conn.prepare(&format!("{SELECT_TENANT} WHERE mqtt_username = ?1 ORDER BY rowid"))?;
            let tenants = stmt
                .query_map(params![username], tenant_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tenants)
        })
        .await
    }

    async fn insert_tenant(&self, tenant: NewTenant) -> DirectoryResult<Tenant> {
        let tenant = tenant.into_tenant();

        self.run(move |conn| {
            let result = conn.execute(
                r#"
                INSERT INTO tenants (id, name, mqtt_username, mqtt_password, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    tenant.id.as_str(),
                    tenant.name,
                    tenant.mqtt_username,
                    tenant.mqtt_password,
                    tenant.created_at.map(|t| t.to_rfc3339()),
                ],
            );

            match result {
                Ok(_) => Ok(tenant),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    Err(DirectoryError::DuplicateTenant(tenant.name))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}
