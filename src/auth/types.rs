use std::fmt;

/// Access requested by the broker, as the plugin's `acc` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Read,
    Write,
    ReadWrite,
    Subscribe,
    Other(i64),
}

impl AccessType {
    /// Read and subscribe never let a client put data on the topic.
    pub fn is_read_only(self) -> bool {
        matches!(self, AccessType::Read | AccessType::Subscribe)
    }
}

impl From<i64> for AccessType {
    fn from(value: i64) -> Self {
        match value {
            1 => AccessType::Read,
            2 => AccessType::Write,
            3 => AccessType::ReadWrite,
            4 => AccessType::Subscribe,
            other => AccessType::Other(other),
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessType::Read => f.write_str("read"),
            AccessType::Write => f.write_str("write"),
            AccessType::ReadWrite => f.write_str("readwrite"),
            AccessType::Subscribe => f.write_str("subscribe"),
            AccessType::Other(value) => write!(f, "acc={value}"),
        }
    }
}

/// Outcome of an authentication or authorization check.
///
/// `reason` is for logs and the response body only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDecision {
    pub allowed: bool,
    pub reason: String,
}

impl AuthDecision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}
