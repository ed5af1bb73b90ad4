use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A card language supported by TCGdex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    German,
    English,
    French,
    Spanish,
    Italian,
    Portuguese,
    Japanese,
    Korean,
    TraditionalChinese,
    Thai,
    Indonesian,
}

impl Language {
    /// All supported languages, sorted by code.
    pub const ALL: [Self; 11] = [
        Self::German,
        Self::English,
        Self::Spanish,
        Self::French,
        Self::Indonesian,
        Self::Italian,
        Self::Japanese,
        Self::Korean,
        Self::Portuguese,
        Self::Thai,
        Self::TraditionalChinese,
    ];

    /// The language every canonical card row is stored in.
    pub const CANONICAL: Self = Self::English;

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::German => "de",
            Self::English => "en",
            Self::French => "fr",
            Self::Spanish => "es",
            Self::Italian => "it",
            Self::Portuguese => "pt",
            Self::Japanese => "ja",
            Self::Korean => "ko",
            Self::TraditionalChinese => "zh-tw",
            Self::Thai => "th",
            Self::Indonesian => "id",
        }
    }

    #[must_use]
    pub const fn is_canonical(self) -> bool {
        matches!(self, Self::English)
    }

    /// Comma-separated list of valid codes, for error messages.
    #[must_use]
    pub fn valid_codes() -> String {
        Self::ALL.map(Self::code).join(", ")
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim();
        Self::ALL
            .into_iter()
            .find(|lang| lang.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| {
                Error::Input(format!(
                    "invalid language: {code}\nValid languages: {}",
                    Self::valid_codes()
                ))
            })
    }
}

impl TryFrom<String> for Language {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(lang: Language) -> Self {
        lang.code().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parse_is_case_insensitive() {
        assert_eq!("de".parse::<Language>().unwrap(), Language::German);
        assert_eq!("EN".parse::<Language>().unwrap(), Language::English);
        assert_eq!(
            "Zh-TW".parse::<Language>().unwrap(),
            Language::TraditionalChinese
        );
    }

    #[test]
    fn test_language_rejects_unknown_code() {
        let err = "xx".parse::<Language>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("xx"));
        assert!(message.contains("zh-tw"));
    }

    #[test]
    fn test_all_languages_round_trip_through_code() {
        assert_eq!(Language::ALL.len(), 11);
        for lang in Language::ALL {
            assert_eq!(lang.code().parse::<Language>().unwrap(), lang);
        }
    }

    #[test]
    fn test_only_english_is_canonical() {
        assert!(Language::English.is_canonical());
        assert!(!Language::German.is_canonical());
        assert_eq!(Language::CANONICAL, Language::English);
    }
}
