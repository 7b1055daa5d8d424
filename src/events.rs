//! Playback events and the frames pushed to live subscribers.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assets::AssetKind;
use crate::error::TagplayError;

/// Navigation direction through a card's asset list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Next,
    Prev,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Prev => "prev",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = TagplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "next" => Ok(Self::Next),
            "prev" => Ok(Self::Prev),
            other => Err(TagplayError::InvalidArgument(format!(
                "Invalid direction '{other}' (must be \"next\" or \"prev\")"
            ))),
        }
    }
}

/// The asset a card currently points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetInfo {
    /// Card that selected the asset.
    pub card_id: String,
    /// Filename relative to the assets folder.
    pub asset_file: String,
    /// Video or image, from the file extension.
    pub asset_type: AssetKind,
    /// Zero-based position in the card's asset list.
    pub asset_index: usize,
    /// Length of the card's asset list.
    pub total_assets: usize,
}

impl AssetInfo {
    pub fn new(card_id: &str, assets: &[String], index: usize) -> Self {
        let asset_file = assets[index].clone();
        Self {
            card_id: card_id.to_string(),
            asset_type: AssetKind::from_filename(&asset_file),
            asset_file,
            asset_index: index,
            total_assets: assets.len(),
        }
    }
}

/// Result of the most recent state-changing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// A card was placed and its asset started.
    Played {
        /// Asset now showing.
        #[serde(flatten)]
        asset: AssetInfo,
        /// When the play happened.
        timestamp: DateTime<Utc>,
    },
    /// The current card stepped through its list.
    Navigated {
        /// Asset now showing.
        #[serde(flatten)]
        asset: AssetInfo,
        /// Which way the position moved.
        direction: Direction,
        /// When the step happened.
        timestamp: DateTime<Utc>,
    },
    /// A card was lifted; the display returns to the splash screen.
    #[serde(rename = "card_removed")]
    Removed {
        /// Card reported as removed.
        card_id: String,
        /// When the removal was reported.
        timestamp: DateTime<Utc>,
    },
}

impl PlaybackEvent {
    pub fn card_id(&self) -> &str {
        match self {
            Self::Played { asset, .. } | Self::Navigated { asset, .. } => &asset.card_id,
            Self::Removed { card_id, .. } => card_id,
        }
    }

    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Played { timestamp, .. }
            | Self::Navigated { timestamp, .. }
            | Self::Removed { timestamp, .. } => *timestamp,
        }
    }

    /// Asset shown after this event, if any.
    pub const fn asset(&self) -> Option<&AssetInfo> {
        match self {
            Self::Played { asset, .. } | Self::Navigated { asset, .. } => Some(asset),
            Self::Removed { .. } => None,
        }
    }
}

/// Aggregate counters carried by status frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounters {
    /// Successful plays since startup.
    pub assets_played: u64,
    /// Live push subscribers.
    pub subscribers: usize,
    /// Distinct cards ever scanned.
    pub scanned_cards: usize,
    /// Scanned cards with no mapping.
    pub unknown_cards: usize,
}

/// Counters written under the state lock and read lock-free by status frames.
#[derive(Debug, Default)]
pub struct SharedCounters {
    assets_played: AtomicU64,
    scanned_cards: AtomicUsize,
    unknown_cards: AtomicUsize,
}

impl SharedCounters {
    pub fn record_play(&self) -> u64 {
        self.assets_played.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn set_history_sizes(&self, scanned: usize, unknown: usize) {
        self.scanned_cards.store(scanned, Ordering::Relaxed);
        self.unknown_cards.store(unknown, Ordering::Relaxed);
    }

    pub fn assets_played(&self) -> u64 {
        self.assets_played.load(Ordering::Relaxed)
    }

    /// Snapshot with the subscriber count filled in by the caller.
    pub fn snapshot(&self, subscribers: usize) -> StatusCounters {
        StatusCounters {
            assets_played: self.assets_played(),
            subscribers,
            scanned_cards: self.scanned_cards.load(Ordering::Relaxed),
            unknown_cards: self.unknown_cards.load(Ordering::Relaxed),
        }
    }
}

/// Payload of a push frame, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum FramePayload {
    /// First frame on every stream.
    Connection {
        /// Id assigned to the new subscriber.
        subscriber_id: u64,
    },
    AssetPlay(AssetInfo),
    Navigation {
        /// Asset reached by the step.
        #[serde(flatten)]
        asset: AssetInfo,
        /// Which way the position moved.
        direction: Direction,
    },
    CardRemoved {
        /// Card lifted off the reader.
        card_id: String,
    },
    /// Keep-alive with no content.
    Heartbeat,
    StatusUpdate(StatusCounters),
}

impl FramePayload {
    /// Event name used by the SSE binding.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::AssetPlay(_) => "asset_play",
            Self::Navigation { .. } => "navigation",
            Self::CardRemoved { .. } => "card_removed",
            Self::Heartbeat => "heartbeat",
            Self::StatusUpdate(_) => "status_update",
        }
    }
}

/// One frame on a subscriber's push stream.
///
/// State-change frames carry the sequence number assigned when the mutation
/// happened; keep-alive frames do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// What happened, tagged by `type`.
    #[serde(flatten)]
    pub payload: FramePayload,
    /// Mutation order; `None` for keep-alive frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    /// When the frame was produced.
    pub timestamp: DateTime<Utc>,
}

impl Frame {
    pub fn connection(subscriber_id: u64) -> Self {
        Self::unsequenced(FramePayload::Connection { subscriber_id })
    }

    pub fn heartbeat() -> Self {
        Self::unsequenced(FramePayload::Heartbeat)
    }

    pub fn status(counters: StatusCounters) -> Self {
        Self::unsequenced(FramePayload::StatusUpdate(counters))
    }

    fn unsequenced(payload: FramePayload) -> Self {
        Self {
            payload,
            seq: None,
            timestamp: Utc::now(),
        }
    }

    /// Frame announcing a playback event.
    pub fn from_event(event: &PlaybackEvent, seq: u64) -> Self {
        let payload = match event {
            PlaybackEvent::Played { asset, .. } => FramePayload::AssetPlay(asset.clone()),
            PlaybackEvent::Navigated {
                asset, direction, ..
            } => FramePayload::Navigation {
                asset: asset.clone(),
                direction: *direction,
            },
            PlaybackEvent::Removed { card_id, .. } => FramePayload::CardRemoved {
                card_id: card_id.clone(),
            },
        };
        Self {
            payload,
            seq: Some(seq),
            timestamp: event.timestamp(),
        }
    }

    pub const fn name(&self) -> &'static str {
        self.payload.name()
    }
}
