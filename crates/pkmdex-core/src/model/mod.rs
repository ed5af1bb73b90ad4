pub mod card;
pub mod card_ref;
pub mod ids;
pub mod language;
pub mod owned;
pub mod set;
pub mod variant;

pub use card::{CanonicalCard, Category, LocalizedName};
pub use card_ref::{CardRef, DEFAULT_LANGUAGE};
pub use ids::CardId;
pub use language::Language;
pub use owned::{OwnedCardView, OwnedEntry, OwnedFilter, RemoveOutcome};
pub use set::{SetCacheStats, SetInfo};
pub use variant::{CardVariants, Variant};
