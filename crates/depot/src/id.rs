//! Artifact identifiers.
//!
//! An id is a v4 UUID (122 random bits) rendered as 32 lowercase hex
//! characters without dashes.
//! Hex only, so an id is always safe as a file name, URL path segment, or
//! query value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Length of an id in hex characters.
pub const ID_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid id length: expected {ID_LEN}, got {0}")]
    InvalidLength(usize),

    #[error("invalid id: contains non-hex characters")]
    InvalidHex,
}

/// Identifier of one uploaded artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Mint a fresh random id.
    pub fn mint() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validate an externally supplied id. Uppercase hex is normalized.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.len() != ID_LEN {
            return Err(IdError::InvalidLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IdError::InvalidHex);
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ArtifactId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.0
    }
}

impl AsRef<str> for ArtifactId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_mint_format() {
        let id = ArtifactId::mint();
        assert_eq!(id.as_str().len(), ID_LEN);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_mint_is_simple_v4_uuid() {
        let id = ArtifactId::mint();
        let uuid = Uuid::parse_str(id.as_str()).unwrap();
        assert_eq!(uuid.get_version_num(), 4);
        assert_eq!(uuid.simple().to_string(), id.as_str());
    }

    #[test]
    fn test_mint_unique() {
        let ids: HashSet<ArtifactId> = (0..10_000).map(|_| ArtifactId::mint()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_parse_valid() {
        let id = ArtifactId::parse("5c735d76fe3537a0f35cf4a4eb14a532").unwrap();
        assert_eq!(id.as_str(), "5c735d76fe3537a0f35cf4a4eb14a532");
    }

    #[test]
    fn test_parse_normalizes_uppercase() {
        let id: ArtifactId = "5C735D76FE3537A0F35CF4A4EB14A532".parse().unwrap();
        assert_eq!(id.as_str(), "5c735d76fe3537a0f35cf4a4eb14a532");
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        assert_eq!(ArtifactId::parse("abc"), Err(IdError::InvalidLength(3)));
        assert_eq!(ArtifactId::parse(""), Err(IdError::InvalidLength(0)));
    }

    #[test]
    fn test_parse_rejects_traversal() {
        let sneaky = "../../../../etc/passwd0000000000";
        assert_eq!(sneaky.len(), ID_LEN);
        assert_eq!(ArtifactId::parse(sneaky), Err(IdError::InvalidHex));
    }

    #[test]
    fn test_serde_transparent() {
        let id = ArtifactId::mint();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: ArtifactId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<ArtifactId>("\"nope\"").is_err());
    }
}
