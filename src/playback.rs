//! Playback state machine.
//!
//! Tracks which card is on the reader, where each card is in its asset list,
//! and the last state-changing event. No I/O happens here: storage checks and
//! event fan-out are done by the [`Orchestrator`](crate::orchestrator::Orchestrator)
//! around these calls.
//!
//! ```text
//! Idle ──play──▶ Playing(card, i) ──navigate──▶ Playing(card, i±1 mod n)
//!   ▲                  │
//!   └──────remove──────┘   (position is kept for the next play)
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, TagplayError};
use crate::events::{AssetInfo, Direction, PlaybackEvent};

/// Coarse state, derived from [`PlaybackState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    /// Splash screen, no card active.
    Idle,
    /// A card is on the reader.
    Playing {
        /// Card on the reader.
        card_id: String,
        /// Position in that card's asset list.
        asset_index: usize,
    },
}

/// Per-card positions and the asset lists captured when each card was played.
#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    current_card: Option<String>,
    index: HashMap<String, usize>,
    snapshot: HashMap<String, Vec<String>>,
    last_event: Option<PlaybackEvent>,
    removed_at: Option<DateTime<Utc>>,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a play request without touching state.
    pub fn validate_play(asset_files: &[String], index: Option<usize>) -> Result<()> {
        if asset_files.is_empty() {
            return Err(TagplayError::InvalidArgument(
                "asset list must not be empty".to_string(),
            ));
        }
        match index {
            Some(index) if index >= asset_files.len() => Err(TagplayError::InvalidArgument(format!(
                "asset index {index} out of range (0-{})",
                asset_files.len() - 1
            ))),
            _ => Ok(()),
        }
    }

    /// Index a play without an explicit index starts at: the card's last
    /// position if it still fits `len`, otherwise 0.
    pub fn resume_index(&self, card_id: &str, len: usize) -> usize {
        self.index
            .get(card_id)
            .copied()
            .filter(|&i| i < len)
            .unwrap_or(0)
    }

    /// Make `card_id` current, showing `asset_files[index]`.
    ///
    /// Without an explicit index the card resumes where it left off. State is
    /// untouched on error.
    pub fn play(
        &mut self,
        card_id: &str,
        asset_files: Vec<String>,
        index: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<AssetInfo> {
        Self::validate_play(&asset_files, index)?;
        let index = index.unwrap_or_else(|| self.resume_index(card_id, asset_files.len()));

        let info = AssetInfo::new(card_id, &asset_files, index);
        self.snapshot.insert(card_id.to_string(), asset_files);
        self.index.insert(card_id.to_string(), index);
        self.current_card = Some(card_id.to_string());
        self.last_event = Some(PlaybackEvent::Played {
            asset: info.clone(),
            timestamp: now,
        });

        info!(
            card_id,
            asset_file = %info.asset_file,
            asset_index = index,
            total_assets = info.total_assets,
            "Asset triggered"
        );
        Ok(info)
    }

    /// Step through the card's captured asset list, wrapping at both ends.
    pub fn navigate(
        &mut self,
        card_id: &str,
        direction: Direction,
        now: DateTime<Utc>,
    ) -> Result<AssetInfo> {
        let assets = self
            .snapshot
            .get(card_id)
            .ok_or_else(|| TagplayError::NotFound {
                what: format!("Playback snapshot for card '{card_id}'"),
            })?;

        let len = assets.len();
        if len <= 1 {
            return Err(TagplayError::Conflict(format!(
                "card '{card_id}' has {len} asset(s), navigation needs at least 2"
            )));
        }

        let current = self.index.get(card_id).copied().unwrap_or(0);
        let next = match direction {
            Direction::Next => (current + 1) % len,
            Direction::Prev => (current + len - 1) % len,
        };

        let info = AssetInfo::new(card_id, assets, next);
        self.index.insert(card_id.to_string(), next);
        self.current_card = Some(card_id.to_string());
        self.last_event = Some(PlaybackEvent::Navigated {
            asset: info.clone(),
            direction,
            timestamp: now,
        });

        info!(
            card_id,
            direction = direction.as_str(),
            asset_file = %info.asset_file,
            asset_index = next,
            "Navigated card assets"
        );
        Ok(info)
    }

    /// Return to the splash state.
    ///
    /// The card's snapshot and position are kept so placing it again resumes.
    pub fn remove(&mut self, card_id: &str, now: DateTime<Utc>) -> PlaybackEvent {
        if self.current_card.as_deref() != Some(card_id) {
            debug!(
                card_id,
                current = ?self.current_card,
                "Removed card was not the current card"
            );
        }
        self.current_card = None;
        self.removed_at = Some(now);
        let event = PlaybackEvent::Removed {
            card_id: card_id.to_string(),
            timestamp: now,
        };
        self.last_event = Some(event.clone());
        info!(card_id, "Card removed, returning to splash screen");
        event
    }

    pub fn current_card(&self) -> Option<&str> {
        self.current_card.as_deref()
    }

    pub fn last_event(&self) -> Option<&PlaybackEvent> {
        self.last_event.as_ref()
    }

    pub const fn removed_at(&self) -> Option<DateTime<Utc>> {
        self.removed_at
    }

    pub fn position(&self, card_id: &str) -> Option<usize> {
        self.index.get(card_id).copied()
    }

    pub fn snapshot(&self, card_id: &str) -> Option<&[String]> {
        self.snapshot.get(card_id).map(Vec::as_slice)
    }

    pub fn phase(&self) -> Phase {
        match &self.current_card {
            None => Phase::Idle,
            Some(card_id) => Phase::Playing {
                card_id: card_id.clone(),
                asset_index: self.position(card_id).unwrap_or(0),
            },
        }
    }
}
