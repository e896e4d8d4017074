use crate::auth::types::AccessType;
use crate::config::IdentityConfig;
use crate::topic::root_segment;

/// Topic predicate owned by a static identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRule {
    root: String,
    read_only: bool,
}

impl TopicRule {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn permits(&self, topic: &str, access: AccessType) -> bool {
        if self.read_only && !access.is_read_only() {
            return false;
        }
        root_segment(topic) == self.root
    }
}

/// Reserved, non-tenant account configured at deploy time
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    name: String,
    secret: Option<String>,
    rule: TopicRule,
}

impl StaticIdentity {
    pub fn new(name: impl Into<String>, secret: Option<String>, rule: TopicRule) -> Self {
        Self {
            name: name.into(),
            secret,
            rule,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// An unset or empty secret never matches.
    pub fn check_password(&self, password: &str) -> bool {
        matches!(&self.secret, Some(secret) if !secret.is_empty() && secret == password)
    }

    pub fn permits(&self, topic: &str, access: AccessType) -> bool {
        self.rule.permits(topic, access)
    }
}

/// Fixed table of static identities, looked up by username
#[derive(Debug, Clone, Default)]
pub struct StaticIdentities {
    entries: Vec<StaticIdentity>,
}

impl StaticIdentities {
    pub fn new(entries: Vec<StaticIdentity>) -> Self {
        Self { entries }
    }

    /// Build the table from configuration, resolving secrets from the process
    /// environment once.
    pub fn from_config(configs: &[IdentityConfig]) -> Self {
        Self::from_config_with(configs, |key| std::env::var(key).ok())
    }

    pub fn from_config_with<F>(configs: &[IdentityConfig], env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let entries = configs
            .iter()
            .map(|config| {
                let secret = config
                    .password
                    .clone()
                    .or_else(|| config.password_env.as_deref().and_then(&env));
                let mut rule = TopicRule::new(config.root.clone());
                if config.read_only {
                    rule = rule.read_only();
                }
                StaticIdentity::new(config.name.clone(), secret, rule)
            })
            .collect();
        Self { entries }
    }

    pub fn lookup(&self, username: &str) -> Option<&StaticIdentity> {
        self.entries.iter().find(|identity| identity.name == username)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
