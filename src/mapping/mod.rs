//! Card mapping resolution: CardID → ordered asset filenames.
//!
//! Mapping documents allow either a single filename or a list per card:
//!
//! ```toml
//! [cards]
//! "3800132D9B9D" = "demo_video.mp4"
//! "38001370E9B2" = ["intro.mp4", "poster.jpg"]
//! ```
//!
//! Both shapes are normalized into an ordered list here, once, so nothing
//! downstream deals with the single-or-list distinction.

mod file;

pub use file::FileResolver;

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use serde::Deserialize;

/// Normalized mapping: card id → ordered, non-empty asset list.
pub type CardMapping = BTreeMap<String, Vec<String>>;

/// Source of card → asset mappings.
///
/// Implementations must pick up changes to their backing source without a
/// restart and must never fail: problems are logged and degrade to "no
/// assets".
pub trait CardResolver: Send + Sync {
    /// Full normalized mapping as currently known.
    fn mapping(&self) -> CardMapping;

    /// Ordered assets for `card_id`, empty when unmapped.
    fn resolve(&self, card_id: &str) -> Vec<String> {
        self.mapping().remove(card_id).unwrap_or_default()
    }

    /// Whether `card_id` has at least one asset.
    fn is_mapped(&self, card_id: &str) -> bool {
        !self.resolve(card_id).is_empty()
    }

    /// Drop any cached state so the next lookup re-reads the source.
    fn invalidate(&self) {}
}

/// One card's entry as written by hand.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AssetSpec {
    One(String),
    Many(Vec<String>),
}

/// Raw mapping document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingDocument {
    #[serde(default)]
    cards: BTreeMap<String, AssetSpec>,
}

impl MappingDocument {
    /// Normalize into ordered lists, dropping blank names and cards left
    /// without any asset.
    pub fn normalize(self) -> CardMapping {
        self.cards
            .into_iter()
            .filter_map(|(card_id, spec)| {
                let assets: Vec<String> = match spec {
                    AssetSpec::One(name) => vec![name],
                    AssetSpec::Many(names) => names,
                }
                .into_iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect();
                let card_id = card_id.trim().to_string();
                (!assets.is_empty() && !card_id.is_empty()).then_some((card_id, assets))
            })
            .collect()
    }
}

/// In-memory resolver whose mapping can be swapped at runtime.
#[derive(Debug, Default)]
pub struct StaticResolver {
    mapping: RwLock<CardMapping>,
}

impl StaticResolver {
    pub fn new(mapping: CardMapping) -> Self {
        Self {
            mapping: RwLock::new(mapping),
        }
    }

    /// Build from `(card, [assets])` pairs.
    pub fn from_pairs<I, C, A, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, A)>,
        C: Into<String>,
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(card, assets)| (card.into(), assets.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }

    /// Replace the whole mapping.
    pub fn replace(&self, mapping: CardMapping) {
        *self.mapping.write().unwrap_or_else(PoisonError::into_inner) = mapping;
    }

    /// Map one card, replacing any previous entry.
    pub fn insert(&self, card_id: impl Into<String>, assets: Vec<String>) {
        self.mapping
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(card_id.into(), assets);
    }
}

impl CardResolver for StaticResolver {
    fn mapping(&self) -> CardMapping {
        self.mapping
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn resolve(&self, card_id: &str) -> Vec<String> {
        self.mapping
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(card_id)
            .cloned()
            .unwrap_or_default()
    }
}
