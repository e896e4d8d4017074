pub mod memory;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use memory::InMemoryDirectory;
pub use sqlite::SqliteDirectory;
pub use traits::*;
pub use types::*;

use crate::config::{DirectoryBackend, DirectoryConfig};
use std::sync::Arc;
use tracing::info;

/// Open the tenant directory selected by the configuration
pub fn new(config: &DirectoryConfig) -> DirectoryResult<Arc<dyn TenantDirectory>> {
    match config.backend {
        DirectoryBackend::Memory => {
            let directory = match &config.tenants_file {
                Some(path) => InMemoryDirectory::from_file(path)?,
                None => InMemoryDirectory::new(),
            };
            info!("Using in-memory tenant directory with {} tenants", directory.len());
            Ok(Arc::new(directory))
        }
        DirectoryBackend::Sqlite => {
            info!(
                "Using SQLite tenant directory at {}",
                config.database_path.display()
            );
            Ok(Arc::new(SqliteDirectory::new(
                &config.database_path,
                config.busy_timeout(),
            )?))
        }
    }
}
