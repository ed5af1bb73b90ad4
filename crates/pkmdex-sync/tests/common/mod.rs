//! Shared fixtures: an in-memory card catalog that counts its fetches.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use pkmdex_core::model::{CardId, Language, SetInfo};
use pkmdex_sync::{CardCatalog, CatalogCard, SyncError, SyncResult};

/// A card document in TCGdex shape.
pub fn card_doc(id: &str, name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "category": "Pokemon",
        "rarity": "Common",
        "types": ["Grass"],
        "hp": 70,
        "stage": "Basic",
        "illustrator": "Ken Sugimori",
        "regulationMark": "I",
        "image": format!("https://assets.tcgdex.net/en/me/me01/{id}"),
        "variants": {"normal": true, "reverse": true, "holo": true, "firstEdition": false},
        "legal": {"standard": true, "expanded": true},
        "pricing": {"cardmarket": {"trend": 0.25}}
    })
}

#[derive(Default)]
pub struct StubCatalog {
    cards: Mutex<HashMap<(Language, String), serde_json::Value>>,
    failing: Mutex<Vec<String>>,
    fetches: AtomicUsize,
}

impl StubCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_card(self, language: Language, id: &str, name: &str) -> Self {
        self.put(language, id, card_doc(id, name));
        self
    }

    pub fn put(&self, language: Language, id: &str, doc: serde_json::Value) {
        self.cards
            .lock()
            .unwrap()
            .insert((language, id.to_string()), doc);
    }

    /// Change one field of a stored document.
    pub fn patch(&self, language: Language, id: &str, pointer: &str, value: serde_json::Value) {
        let mut cards = self.cards.lock().unwrap();
        let doc = cards.get_mut(&(language, id.to_string())).unwrap();
        *doc.pointer_mut(pointer).unwrap() = value;
    }

    /// Make every fetch of `id` fail with a server error.
    pub fn fail(&self, id: &str) {
        self.failing.lock().unwrap().push(id.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) {
        self.fetches.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl CardCatalog for StubCatalog {
    async fn fetch_card(&self, language: Language, card_id: &CardId) -> SyncResult<CatalogCard> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&card_id.to_string()) {
            return Err(SyncError::Http {
                source_name: "stub".to_string(),
                status: 500,
                message: "boom".to_string(),
            });
        }
        let doc = self
            .cards
            .lock()
            .unwrap()
            .get(&(language, card_id.to_string()))
            .cloned();
        match doc {
            Some(doc) => CatalogCard::from_json("stub", &doc.to_string(), language, Some(card_id)),
            None => Err(SyncError::NotFound {
                entity: format!("card {card_id} ({language})"),
                source_name: "stub".to_string(),
            }),
        }
    }

    async fn list_sets(&self, _language: Language) -> SyncResult<Vec<SetInfo>> {
        Ok(Vec::new())
    }

    async fn fetch_set(&self, _language: Language, set_id: &str) -> SyncResult<SetInfo> {
        Err(SyncError::NotFound {
            entity: format!("set {set_id}"),
            source_name: "stub".to_string(),
        })
    }
}
