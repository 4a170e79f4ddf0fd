use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

const GENERATION_PREFIX: &str = "gen_";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GenerationIdError {
    #[error("generation id must start with `gen_`: {0}")]
    MissingPrefix(String),
    #[error("generation id is not valid hex: {0}")]
    InvalidHex(String),
}

/// Externally visible identifier of one ledger record.
///
/// The wire form is `gen_` followed by the 32 lowercase hex digits of the
/// underlying ledger UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationId(Uuid);

impl GenerationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_ledger_id(id: Uuid) -> Self {
        Self(id)
    }

    pub fn ledger_id(&self) -> Uuid {
        self.0
    }
}

impl Default for GenerationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{GENERATION_PREFIX}{}", self.0.simple())
    }
}

impl FromStr for GenerationId {
    type Err = GenerationIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let hex = value
            .strip_prefix(GENERATION_PREFIX)
            .ok_or_else(|| GenerationIdError::MissingPrefix(value.to_string()))?;
        let id = Uuid::try_parse(hex)
            .map_err(|_| GenerationIdError::InvalidHex(value.to_string()))?;
        Ok(Self(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_form() {
        let id = GenerationId::new();
        let wire = id.to_string();
        assert!(wire.starts_with("gen_"));
        assert_eq!(wire.len(), 4 + 32);
        assert_eq!(wire.parse::<GenerationId>().unwrap(), id);
    }

    #[test]
    fn rejects_missing_prefix() {
        let err = "cmpl_0123".parse::<GenerationId>().unwrap_err();
        assert!(matches!(err, GenerationIdError::MissingPrefix(_)));
    }

    #[test]
    fn rejects_non_hex_payload() {
        let err = "gen_not-a-uuid".parse::<GenerationId>().unwrap_err();
        assert!(matches!(err, GenerationIdError::InvalidHex(_)));
    }
}
