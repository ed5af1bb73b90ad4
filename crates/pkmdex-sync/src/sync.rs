//! Keeps canonical cards and localized names in step with the catalog.

use chrono::{DateTime, Duration, Utc};

use pkmdex_core::model::{CanonicalCard, CardId, Language, LocalizedName};
use pkmdex_core::schema::StaleCard;
use pkmdex_core::Database;

use crate::catalog::CardCatalog;
use crate::error::{SyncError, SyncResult};

/// Result of [`SyncEngine::ensure_card`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnsuredCard {
    pub card: CanonicalCard,
    /// Name in the requested language.
    pub display_name: String,
    /// The English card was fetched (missing or stale).
    pub fetched_canonical: bool,
    /// The localized name was fetched.
    pub fetched_localized: bool,
}

/// One field that changed during a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardChange {
    pub card_id: CardId,
    pub name: String,
    pub fields: Vec<FieldChange>,
}

#[derive(Debug)]
pub struct SyncFailure {
    pub card_id: CardId,
    pub error: SyncError,
}

/// Outcome of a [`SyncEngine::sync_stale`] run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub candidates: usize,
    pub synced: usize,
    pub changes: Vec<CardChange>,
    pub failures: Vec<SyncFailure>,
}

/// Sequential sync of canonical card data.
pub struct SyncEngine<'a> {
    db: &'a Database,
    catalog: &'a dyn CardCatalog,
    staleness: Duration,
}

impl std::fmt::Debug for SyncEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("staleness", &self.staleness)
            .finish_non_exhaustive()
    }
}

impl<'a> SyncEngine<'a> {
    pub fn new(db: &'a Database, catalog: &'a dyn CardCatalog, staleness_days: u32) -> Self {
        Self {
            db,
            catalog,
            staleness: Duration::days(i64::from(staleness_days)),
        }
    }

    /// Make sure the canonical card and the name in `language` are stored.
    ///
    /// English data is fetched when the canonical row is missing or older
    /// than the staleness threshold. The localized name is fetched only
    /// when missing; the English name never needs a request.
    pub async fn ensure_card(
        &self,
        card_id: &CardId,
        language: Language,
    ) -> SyncResult<EnsuredCard> {
        let now = Utc::now();
        let (card, fetched_canonical) = match self.db.get_canonical_card(card_id)? {
            Some(card) if !card.is_stale(self.staleness, now) => (card, false),
            _ => {
                log::info!("Fetching {} from the catalog", card_id);
                let fetched = self.catalog.fetch_card(Language::English, card_id).await?;
                let english = fetched.localized_name();
                let card = fetched.into_canonical(now);
                self.db.save_card_bundle(&card, &[english], &[])?;
                (card, true)
            }
        };

        let stored = self.db.get_localized_name(card_id, language)?;
        let (display_name, fetched_localized) = match stored {
            Some(name) => (name, false),
            None if language.is_canonical() => {
                self.db.upsert_localized_name(&LocalizedName::new(
                    card_id.clone(),
                    language,
                    card.name.clone(),
                ))?;
                (card.name.clone(), false)
            }
            None => {
                log::info!("Fetching {} name for {}", language, card_id);
                let localized = self.catalog.fetch_card(language, card_id).await?;
                self.db.upsert_localized_name(&localized.localized_name())?;
                (localized.name, true)
            }
        };

        Ok(EnsuredCard {
            card,
            display_name,
            fetched_canonical,
            fetched_localized,
        })
    }

    /// Refresh every owned card older than `staleness_days` (0 = all).
    ///
    /// Cards are processed one at a time, oldest first. A card whose fetch
    /// or validation fails is skipped without a partial write and recorded
    /// in the report.
    pub async fn sync_stale(
        &self,
        staleness_days: u32,
        show_changes: bool,
    ) -> SyncResult<SyncReport> {
        let cutoff: Option<DateTime<Utc>> = (staleness_days > 0)
            .then(|| Utc::now() - Duration::days(i64::from(staleness_days)));
        let stale = self.db.stale_owned_cards(cutoff)?;

        let mut report = SyncReport {
            candidates: stale.len(),
            ..SyncReport::default()
        };
        log::info!("{} card(s) need syncing", stale.len());

        for (idx, candidate) in stale.iter().enumerate() {
            log::info!("[{}/{}] {}", idx + 1, stale.len(), candidate.card_id);
            match self.sync_card(candidate).await {
                Ok((previous, current)) => {
                    report.synced += 1;
                    if show_changes {
                        if let Some(change) = previous.and_then(|old| diff_cards(&old, &current))
                        {
                            report.changes.push(change);
                        }
                    }
                }
                Err(error) => {
                    log::warn!("Failed to sync {}: {}", candidate.card_id, error);
                    report.failures.push(SyncFailure {
                        card_id: candidate.card_id.clone(),
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    async fn sync_card(
        &self,
        candidate: &StaleCard,
    ) -> SyncResult<(Option<CanonicalCard>, CanonicalCard)> {
        let card_id = &candidate.card_id;
        let previous = self.db.get_canonical_card(card_id)?;

        let fetched = self.catalog.fetch_card(Language::English, card_id).await?;
        let mut names = vec![fetched.localized_name()];

        for &language in candidate.languages.iter().filter(|l| !l.is_canonical()) {
            match self.catalog.fetch_card(language, card_id).await {
                Ok(localized) => names.push(localized.localized_name()),
                Err(e) if e.is_not_found() => {
                    log::warn!(
                        "No {} data for {}; keeping the stored name",
                        language,
                        card_id
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let card = fetched.into_canonical(Utc::now());
        self.db.save_card_bundle(&card, &names, &[])?;
        Ok((previous, card))
    }
}

fn format_price(price: Option<f64>) -> String {
    price.map_or_else(|| "-".to_string(), |p| format!("{p:.2}"))
}

/// Price and legality differences between two versions of a card.
pub fn diff_cards(old: &CanonicalCard, new: &CanonicalCard) -> Option<CardChange> {
    let mut fields = Vec::new();
    if format_price(old.price_eur) != format_price(new.price_eur) {
        fields.push(FieldChange {
            field: "price_eur",
            old: format_price(old.price_eur),
            new: format_price(new.price_eur),
        });
    }
    if format_price(old.price_usd) != format_price(new.price_usd) {
        fields.push(FieldChange {
            field: "price_usd",
            old: format_price(old.price_usd),
            new: format_price(new.price_usd),
        });
    }
    if old.legal_standard != new.legal_standard {
        fields.push(FieldChange {
            field: "legal_standard",
            old: old.legal_standard.to_string(),
            new: new.legal_standard.to_string(),
        });
    }
    if old.legal_expanded != new.legal_expanded {
        fields.push(FieldChange {
            field: "legal_expanded",
            old: old.legal_expanded.to_string(),
            new: new.legal_expanded.to_string(),
        });
    }

    (!fields.is_empty()).then(|| CardChange {
        card_id: new.card_id.clone(),
        name: new.name.clone(),
        fields,
    })
}
