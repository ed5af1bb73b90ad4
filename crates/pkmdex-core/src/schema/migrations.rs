/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r"
-- Canonical English card data (one row per unique card)
CREATE TABLE IF NOT EXISTS cards (
    card_id TEXT PRIMARY KEY,
    set_id TEXT NOT NULL,
    card_number TEXT NOT NULL,
    name TEXT NOT NULL,
    rarity TEXT,
    types TEXT NOT NULL DEFAULT '[]',
    hp INTEGER CHECK (hp IS NULL OR hp >= 0),
    stage TEXT,
    category TEXT NOT NULL,
    illustrator TEXT,
    regulation_mark TEXT,
    image_url TEXT,
    variants TEXT NOT NULL DEFAULT '{}',
    price_eur REAL,
    price_usd REAL,
    legal_standard INTEGER NOT NULL DEFAULT 0,
    legal_expanded INTEGER NOT NULL DEFAULT 0,
    last_synced TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cards_set_id ON cards(set_id);
CREATE INDEX IF NOT EXISTS idx_cards_last_synced ON cards(last_synced);

-- Localized display names
CREATE TABLE IF NOT EXISTS card_names (
    card_id TEXT NOT NULL REFERENCES cards(card_id) ON DELETE CASCADE,
    language TEXT NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (card_id, language)
);

-- Ownership (what the user actually has)
CREATE TABLE IF NOT EXISTS owned_cards (
    card_id TEXT NOT NULL REFERENCES cards(card_id) ON DELETE CASCADE,
    variant TEXT NOT NULL,
    language TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity >= 1),
    added_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (card_id, variant, language)
);

CREATE INDEX IF NOT EXISTS idx_owned_cards_language ON owned_cards(language);

-- Set discovery cache
CREATE TABLE IF NOT EXISTS set_cache (
    set_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    card_count INTEGER NOT NULL DEFAULT 0,
    release_date TEXT,
    serie_id TEXT,
    serie_name TEXT,
    cached_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_set_cache_name ON set_cache(name);
";

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "collection_v2",
    sql: MIGRATION_001,
}];
