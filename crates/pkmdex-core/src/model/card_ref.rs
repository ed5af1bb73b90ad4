use std::fmt;

use crate::error::{Error, Result};
use crate::model::{CardId, Language, Variant};

/// Language used when the short `set:number` form omits it.
pub const DEFAULT_LANGUAGE: Language = Language::German;

/// A user-supplied card reference: `lang:set_id:card_number[:variant]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRef {
    pub language: Language,
    pub card_id: CardId,
    /// `None` when the reference did not name a variant.
    pub variant: Option<Variant>,
}

impl CardRef {
    /// Parse `lang:set:number[:variant]`.
    ///
    /// # Errors
    /// Returns `Error::Input` for a wrong number of parts or an unknown
    /// language or variant.
    pub fn parse(input: &str) -> Result<Self> {
        let parts: Vec<&str> = input.split(':').collect();
        match parts.as_slice() {
            [lang, set, number] => Self::from_parts(lang, set, number, None),
            [lang, set, number, variant] => Self::from_parts(lang, set, number, Some(*variant)),
            _ => Err(Self::format_error(input)),
        }
    }

    /// Like [`parse`](Self::parse), but also accepts the short `set:number`
    /// form, which implies [`DEFAULT_LANGUAGE`].
    pub fn parse_lenient(input: &str) -> Result<Self> {
        match input.split(':').collect::<Vec<_>>().as_slice() {
            [set, number] => {
                Self::from_parts(DEFAULT_LANGUAGE.code(), set, number, None)
            }
            _ => Self::parse(input),
        }
    }

    fn from_parts(lang: &str, set: &str, number: &str, variant: Option<&str>) -> Result<Self> {
        let language: Language = lang.parse()?;
        let card_id = CardId::new(&set.trim().to_lowercase(), number.trim())?;
        let variant = variant.map(str::parse::<Variant>).transpose()?;
        Ok(Self {
            language,
            card_id,
            variant,
        })
    }

    fn format_error(input: &str) -> Error {
        Error::Input(format!(
            "invalid format: {input}\n\
             Expected: <lang>:<set_id>:<card_number>[:<variant>]\n\
             Examples:\n  de:me01:136:normal\n  de:me01:136          (defaults to normal variant)\n  en:swsh3:136:holo"
        ))
    }

    /// The named variant, or `normal` when none was given.
    #[must_use]
    pub fn variant_or_default(&self) -> Variant {
        self.variant.unwrap_or_default()
    }
}

impl fmt::Display for CardRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.language,
            self.card_id.set_id(),
            self.card_id.card_number()
        )?;
        if let Some(variant) = self.variant {
            write!(f, ":{variant}")?;
        }
        Ok(())
    }
}
