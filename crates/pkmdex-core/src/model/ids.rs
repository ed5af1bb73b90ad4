use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Global card identifier: `<set_id>-<card_number>` (e.g. `me01-136`).
///
/// The set part never contains a dash in TCGdex ids, so the identifier is
/// split on the first `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardId(String);

impl CardId {
    /// Build an id from its two halves.
    ///
    /// # Errors
    /// Returns `Error::Input` when either half is empty or the set id
    /// contains a dash.
    pub fn new(set_id: &str, card_number: &str) -> Result<Self> {
        let set_id = set_id.trim();
        let card_number = card_number.trim();
        if set_id.is_empty() || card_number.is_empty() || set_id.contains('-') {
            return Err(Error::Input(format!(
                "invalid card reference: set '{set_id}', number '{card_number}'"
            )));
        }
        Ok(Self(format!("{set_id}-{card_number}")))
    }

    /// Parse a full id such as `me01-136`.
    pub fn parse(id: &str) -> Result<Self> {
        let (set_id, card_number) = id.split_once('-').ok_or_else(|| {
            Error::Input(format!(
                "invalid card id: {id} (expected <set_id>-<card_number>)"
            ))
        })?;
        Self::new(set_id, card_number)
    }

    #[must_use]
    pub fn set_id(&self) -> &str {
        self.0.split_once('-').map_or(self.0.as_str(), |(set, _)| set)
    }

    #[must_use]
    pub fn card_number(&self) -> &str {
        self.0.split_once('-').map_or("", |(_, number)| number)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CardId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CardId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CardId> for String {
    fn from(id: CardId) -> Self {
        id.0
    }
}

impl AsRef<str> for CardId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_id_from_parts() {
        let id = CardId::new("me01", "136").unwrap();
        assert_eq!(id.as_str(), "me01-136");
        assert_eq!(id.set_id(), "me01");
        assert_eq!(id.card_number(), "136");
    }

    #[test]
    fn test_card_id_parse_keeps_number_suffix() {
        let id = CardId::parse("swsh3-TG01").unwrap();
        assert_eq!(id.set_id(), "swsh3");
        assert_eq!(id.card_number(), "TG01");
    }

    #[test]
    fn test_card_id_rejects_malformed() {
        assert!(CardId::parse("me01").is_err());
        assert!(CardId::parse("-136").is_err());
        assert!(CardId::parse("me01-").is_err());
        assert!(CardId::new("me-01", "1").is_err());
    }

    #[test]
    fn test_card_id_serde_is_plain_string() {
        let id = CardId::parse("me01-136").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"me01-136\"");
        let back: CardId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<CardId>("\"nodash\"").is_err());
    }
}
