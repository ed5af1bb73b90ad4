use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A physical printing style of a card.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Variant {
    #[default]
    Normal,
    Reverse,
    Holo,
    FirstEdition,
}

impl Variant {
    pub const ALL: [Self; 4] = [Self::FirstEdition, Self::Holo, Self::Normal, Self::Reverse];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Reverse => "reverse",
            Self::Holo => "holo",
            Self::FirstEdition => "firstEdition",
        }
    }

    #[must_use]
    pub fn valid_names() -> String {
        Self::ALL.map(Self::as_str).join(", ")
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|variant| variant.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                Error::Input(format!(
                    "invalid variant: {name}\nValid variants: {}",
                    Self::valid_names()
                ))
            })
    }
}

impl TryFrom<String> for Variant {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Variant> for String {
    fn from(variant: Variant) -> Self {
        variant.as_str().to_string()
    }
}

/// Which variants the catalog lists as printed for a card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardVariants {
    #[serde(default)]
    pub normal: bool,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub holo: bool,
    #[serde(default)]
    pub first_edition: bool,
}

impl CardVariants {
    #[must_use]
    pub const fn is_available(&self, variant: Variant) -> bool {
        match variant {
            Variant::Normal => self.normal,
            Variant::Reverse => self.reverse,
            Variant::Holo => self.holo,
            Variant::FirstEdition => self.first_edition,
        }
    }

    /// True when the catalog gave no availability data at all.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        !(self.normal || self.reverse || self.holo || self.first_edition)
    }

    #[must_use]
    pub fn available(&self) -> Vec<Variant> {
        Variant::ALL
            .into_iter()
            .filter(|v| self.is_available(*v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_parse() {
        assert_eq!("holo".parse::<Variant>().unwrap(), Variant::Holo);
        assert_eq!(
            "firstedition".parse::<Variant>().unwrap(),
            Variant::FirstEdition
        );
        assert!("shiny".parse::<Variant>().is_err());
    }

    #[test]
    fn test_variant_serializes_with_catalog_casing() {
        let json = serde_json::to_string(&Variant::FirstEdition).unwrap();
        assert_eq!(json, "\"firstEdition\"");
    }

    #[test]
    fn test_card_variants_availability() {
        let variants = CardVariants {
            normal: true,
            holo: true,
            ..CardVariants::default()
        };
        assert!(variants.is_available(Variant::Holo));
        assert!(!variants.is_available(Variant::Reverse));
        assert_eq!(variants.available(), vec![Variant::Holo, Variant::Normal]);
        assert!(!variants.is_unknown());
        assert!(CardVariants::default().is_unknown());
    }

    #[test]
    fn test_card_variants_deserialize_catalog_shape() {
        let json = r#"{"normal": false, "reverse": true, "holo": true, "firstEdition": false, "wPromo": false}"#;
        let variants: CardVariants = serde_json::from_str(json).unwrap();
        assert!(variants.reverse);
        assert!(!variants.first_edition);
    }
}
