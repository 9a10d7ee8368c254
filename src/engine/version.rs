//! Engine version parsing and compatibility checks.

use std::fmt;

use crate::engine::adapter::AdaptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EngineVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl EngineVersion {
    /// Parses `v2.7.6`, `2.7.6-beta.1 h1:...` or `2.7`.
    pub fn parse(raw: &str) -> Option<Self> {
        let token = raw.split_whitespace().next()?;
        let token = token.strip_prefix('v').unwrap_or(token);
        let core = token.split(['-', '+']).next()?;
        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { major, minor, patch })
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Checks a reported engine version against the configured minimum.
pub fn check_compatibility(reported: &str, minimum: &str) -> Result<EngineVersion, AdaptError> {
    let found = EngineVersion::parse(reported)
        .ok_or_else(|| AdaptError::UnknownVersion(reported.to_string()))?;
    let required = EngineVersion::parse(minimum)
        .ok_or_else(|| AdaptError::UnknownVersion(minimum.to_string()))?;
    if found < required {
        return Err(AdaptError::Incompatible {
            found: found.to_string(),
            minimum: required.to_string(),
        });
    }
    Ok(found)
}
