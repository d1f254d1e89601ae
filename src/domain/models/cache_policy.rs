//! Cache policy descriptors attached to relation declarations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How long a memoized relation is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    /// Shared across every record resolved within one request scope,
    /// keyed by repository and resolved params.
    Request,
    /// Reserved. Resolving a relation with this scope fails.
    Instance,
    /// Memoized on the owning record only.
    Field,
}

impl CacheScope {
    /// Parse a scope name, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "request" => Some(Self::Request),
            "instance" => Some(Self::Instance),
            "field" => Some(Self::Field),
            _ => None,
        }
    }
}

impl fmt::Display for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "REQUEST"),
            Self::Instance => write!(f, "INSTANCE"),
            Self::Field => write!(f, "FIELD"),
        }
    }
}

/// Which of the two independent cache namespaces a policy lives in.
///
/// Soft and hard caches resolve the same way; they never share entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    Soft,
    Hard,
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Soft => write!(f, "SoftCache"),
            Self::Hard => write!(f, "HardCache"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parse() {
        assert_eq!(CacheScope::parse("request"), Some(CacheScope::Request));
        assert_eq!(CacheScope::parse("FIELD"), Some(CacheScope::Field));
        assert_eq!(CacheScope::parse("Instance"), Some(CacheScope::Instance));
        assert_eq!(CacheScope::parse("global"), None);
    }

    #[test]
    fn test_scope_serde_lowercase() {
        let scope: CacheScope = serde_json::from_str("\"request\"").unwrap();
        assert_eq!(scope, CacheScope::Request);
        assert_eq!(serde_json::to_string(&CacheKind::Hard).unwrap(), "\"hard\"");
    }
}
