use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::auth::identity::StaticIdentities;
use crate::auth::types::{AccessType, AuthDecision};
use crate::storage::{DirectoryResult, TenantDirectory};
use crate::topic::tenant_segment;

/// Decision engine for broker authentication and ACL checks.
///
/// Holds no mutable state; clones share the identity table and directory.
#[derive(Clone)]
pub struct Gatekeeper {
    identities: Arc<StaticIdentities>,
    directory: Arc<dyn TenantDirectory>,
}

impl Gatekeeper {
    pub fn new(identities: StaticIdentities, directory: Arc<dyn TenantDirectory>) -> Self {
        Self {
            identities: Arc::new(identities),
            directory,
        }
    }

    pub fn identities(&self) -> &StaticIdentities {
        &self.identities
    }

    pub fn directory(&self) -> &Arc<dyn TenantDirectory> {
        &self.directory
    }

    /// Check a username/password pair.
    ///
    /// Reserved names are decided by the static table alone. Everything else
    /// needs a tenant with exactly this credential pair; directory failures
    /// deny.
    pub async fn authenticate(&self, username: &str, password: &str) -> AuthDecision {
        if let Some(identity) = self.identities.lookup(username) {
            if identity.check_password(password) {
                debug!("User <{}> authenticated as static", username);
                return AuthDecision::allow(format!("static identity <{username}>"));
            }
            warn!("Static user <{}> authentication failed", username);
            return AuthDecision::deny(format!(
                "User identified as <{username}> does not exist or provided credentials are wrong."
            ));
        }

        match self.directory.find_by_credentials(username, password).await {
            Ok(Some(tenant)) => {
                debug!(
                    "Authentication for credentials <{}> passed (tenant {})",
                    username, tenant.name
                );
                AuthDecision::allow(format!("tenant credentials <{username}>"))
            }
            Ok(None) => {
                debug!("No tenant with credentials <{}>", username);
                AuthDecision::deny(format!(
                    "Mqtt credentials identified as <{username}> do not exist or password does not match."
                ))
            }
            Err(e) => {
                error!("Directory lookup failed while authenticating <{}>: {e}", username);
                AuthDecision::deny(format!(
                    "Mqtt credentials identified as <{username}> could not be verified."
                ))
            }
        }
    }

    /// Check whether `username` may use `topic`.
    ///
    /// A directory failure is returned as `Err` so callers can tell it apart
    /// from a deny; it must still be treated as a deny.
    pub async fn authorize(
        &self,
        username: &str,
        topic: &str,
        access: AccessType,
    ) -> DirectoryResult<AuthDecision> {
        if let Some(identity) = self.identities.lookup(username) {
            if identity.permits(topic, access) {
                debug!(
                    "Authorization passed for static user <{}> and topic <{}>",
                    username, topic
                );
                return Ok(AuthDecision::allow(format!(
                    "static identity <{username}> owns topic <{topic}>"
                )));
            }
            warn!(
                "Authorization rejected for static user <{}> and topic <{}> ({})",
                username, topic, access
            );
            return Ok(AuthDecision::deny(format!(
                "Authorization rejected for static user <{username}> and topic <{topic}>"
            )));
        }

        let tenant_name = tenant_segment(topic);
        if tenant_name.is_empty() {
            debug!("Rejecting empty tenant name for topic <{}>", topic);
            return Ok(AuthDecision::deny(format!(
                "empty tenant name not accepted for this topic (topic: {topic})"
            )));
        }

        // One credential pair may be configured on several tenants, so every
        // tenant with this username is a candidate.
        let tenants = self.directory.find_by_username(username).await?;
        if tenants.iter().any(|tenant| tenant.name == tenant_name) {
            debug!(
                "Topic <{}> matches tenant mqtt user <{}>, authorization passed",
                topic, username
            );
            return Ok(AuthDecision::allow(format!(
                "tenant <{tenant_name}> owns topic <{topic}>"
            )));
        }

        debug!(
            "No tenant mqtt user <{}> matching topic <{}> ({} candidates)",
            username,
            topic,
            tenants.len()
        );
        Ok(AuthDecision::deny(format!(
            "No valid mqtt credentials found for tenant {tenant_name}"
        )))
    }

    /// Superuser access is never granted.
    pub fn authorize_superuser(&self, username: &str) -> AuthDecision {
        debug!("Superuser check for <{}> rejected", username);
        AuthDecision::deny(format!("superuser access is not granted to <{username}>"))
    }
}
