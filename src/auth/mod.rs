pub mod decision;
pub mod identity;
pub mod types;

pub use decision::Gatekeeper;
pub use identity::{StaticIdentities, StaticIdentity, TopicRule};
pub use types::*;

use crate::config::Config;
use crate::storage::{self, DirectoryResult};
use tracing::info;

/// Create the decision engine from configuration
pub fn new(config: &Config) -> DirectoryResult<Gatekeeper> {
    let identities = StaticIdentities::from_config(&config.identities);
    info!("Loaded {} static identities", identities.len());

    let directory = storage::new(&config.directory)?;
    Ok(Gatekeeper::new(identities, directory))
}
