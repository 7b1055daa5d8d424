//! The orchestrator: one instance owns all playback, history and subscriber
//! state for a server.
//!
//! Playback state and scan history share a single lock. It is held only for
//! the in-memory mutation; storage checks happen before it is taken and the
//! resulting event is published after it is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::assets::{AssetRef, AssetRegistry, validate_filename};
use crate::broadcast::{BroadcastConfig, Broadcaster, Subscription};
use crate::error::{Result, TagplayError};
use crate::events::{AssetInfo, Direction, Frame, PlaybackEvent, SharedCounters, StatusCounters};
use crate::history::{CardHistory, RefreshReport, ScanHistory};
use crate::mapping::{CardMapping, CardResolver};
use crate::media::{ByteRange, DEFAULT_CHUNK_SIZE, MediaDelivery, MediaResponse};
use crate::playback::{Phase, PlaybackState};
use crate::storage::AssetStorage;

/// Result of a card scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The card resolved and its asset is now current.
    Played(AssetInfo),
    /// The card has no assets; it was recorded as unknown.
    Unmapped,
}

/// Aggregate server status.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    /// Counters also carried by status frames.
    #[serde(flatten)]
    pub counters: StatusCounters,
    /// Card on the reader, if any.
    pub current_card: Option<String>,
    pub phase: Phase,
    /// Same snapshot GET_CURRENT returns.
    pub last_event: Option<PlaybackEvent>,
    /// Resolved assets folder.
    pub assets_folder: String,
}

#[derive(Debug, Default)]
struct Core {
    playback: PlaybackState,
    history: CardHistory,
}

/// Builder-style options for [`Orchestrator::new`].
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Subscriber cadence and queue sizes.
    pub broadcast: BroadcastConfig,
    /// Upper bound on one media body chunk, in bytes.
    pub chunk_size: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            broadcast: BroadcastConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

pub struct Orchestrator {
    resolver: Arc<dyn CardResolver>,
    storage: Arc<dyn AssetStorage>,
    registry: AssetRegistry,
    media: MediaDelivery,
    core: Mutex<Core>,
    counters: Arc<SharedCounters>,
    broadcaster: Broadcaster,
}

impl Orchestrator {
    pub fn new(
        resolver: Arc<dyn CardResolver>,
        storage: Arc<dyn AssetStorage>,
        options: OrchestratorOptions,
    ) -> Self {
        let counters = Arc::new(SharedCounters::default());
        Self {
            registry: AssetRegistry::new(Arc::clone(&storage)),
            media: MediaDelivery::new(Arc::clone(&storage), options.chunk_size),
            broadcaster: Broadcaster::new(options.broadcast, Arc::clone(&counters)),
            resolver,
            storage,
            core: Mutex::new(Core::default()),
            counters,
        }
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sync_history_counters(&self, core: &Core) {
        self.counters
            .set_history_sizes(core.history.scanned_len(), core.history.unknown_len());
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn resolver(&self) -> &Arc<dyn CardResolver> {
        &self.resolver
    }

    /// Resolve `card_id` through the mapping and play it.
    ///
    /// An unmapped card is recorded as unknown rather than failing.
    pub fn scan(&self, card_id: &str, index: Option<usize>) -> Result<ScanOutcome> {
        let card_id = require_card_id(card_id)?;
        let assets = self.resolver.resolve(card_id);
        if assets.is_empty() {
            warn!(card_id, "No assets found for card, recording as unknown");
            self.mark_unknown(card_id)?;
            return Ok(ScanOutcome::Unmapped);
        }
        self.play(card_id, assets, index).map(ScanOutcome::Played)
    }

    /// PLAY: make `card_id` current with an explicit asset list.
    pub fn play(
        &self,
        card_id: &str,
        asset_files: Vec<String>,
        index: Option<usize>,
    ) -> Result<AssetInfo> {
        let card_id = require_card_id(card_id)?;
        PlaybackState::validate_play(&asset_files, index)?;

        let target = match index {
            Some(index) => index,
            None => self
                .core()
                .playback
                .resume_index(card_id, asset_files.len()),
        };
        let filename = &asset_files[target];
        validate_filename(filename)?;
        if !self.storage.exists(filename) {
            warn!(card_id, filename = %filename, "Asset file not found");
            return Err(TagplayError::asset_not_found(filename));
        }

        let (info, frame) = {
            let mut core = self.core();
            let now = Utc::now();
            let info = core.playback.play(card_id, asset_files, Some(target), now)?;
            core.history.record_scan(card_id, true, now);
            self.counters.record_play();
            self.sync_history_counters(&core);
            let frame = core
                .playback
                .last_event()
                .map(|event| Frame::from_event(event, self.broadcaster.reserve_seq()));
            (info, frame)
        };

        if let Some(frame) = frame {
            self.broadcaster.publish(frame);
        }
        Ok(info)
    }

    /// NAVIGATE: step through the card's captured asset list.
    pub fn navigate(&self, card_id: &str, direction: Direction) -> Result<AssetInfo> {
        let card_id = require_card_id(card_id)?;
        let (info, frame) = {
            let mut core = self.core();
            let info = core.playback.navigate(card_id, direction, Utc::now())?;
            let frame = core
                .playback
                .last_event()
                .map(|event| Frame::from_event(event, self.broadcaster.reserve_seq()));
            (info, frame)
        };

        if let Some(frame) = frame {
            self.broadcaster.publish(frame);
        }
        Ok(info)
    }

    /// REMOVE: card lifted off the reader.
    pub fn remove(&self, card_id: &str) -> Result<PlaybackEvent> {
        let card_id = require_card_id(card_id)?;
        let (event, frame) = {
            let mut core = self.core();
            let event = core.playback.remove(card_id, Utc::now());
            let frame = Frame::from_event(&event, self.broadcaster.reserve_seq());
            (event, frame)
        };
        self.broadcaster.publish(frame);
        Ok(event)
    }

    /// MARK_UNKNOWN: record a sighting of a card with no mapping.
    pub fn mark_unknown(&self, card_id: &str) -> Result<()> {
        let card_id = require_card_id(card_id)?;
        let mut core = self.core();
        core.history.record_scan(card_id, false, Utc::now());
        self.sync_history_counters(&core);
        info!(card_id, "Unknown card scanned");
        Ok(())
    }

    /// Re-read the mapping source and recompute `mapped` for every card.
    pub fn refresh_mapping_status(&self) -> RefreshReport {
        self.resolver.invalidate();
        let mapping = self.resolver.mapping();
        let mut core = self.core();
        let report = core
            .history
            .refresh_mapping_status(|card_id| mapping.get(card_id).is_some_and(|assets| !assets.is_empty()));
        self.sync_history_counters(&core);
        report
    }

    /// Forget one card's scan records. Returns whether it was tracked.
    pub fn forget_card(&self, card_id: &str) -> bool {
        let mut core = self.core();
        let removed = core.history.forget(card_id);
        self.sync_history_counters(&core);
        removed
    }

    /// Drop all scan records.
    pub fn clear_history(&self) {
        let mut core = self.core();
        core.history.clear();
        self.sync_history_counters(&core);
    }

    /// GET_CURRENT: the last state-changing event, if any.
    pub fn current(&self) -> Option<PlaybackEvent> {
        self.core().playback.last_event().cloned()
    }

    pub fn phase(&self) -> Phase {
        self.core().playback.phase()
    }

    /// Position `card_id` would resume at, if it has been played.
    pub fn position(&self, card_id: &str) -> Option<usize> {
        self.core().playback.position(card_id)
    }

    /// GET_SCAN_HISTORY.
    pub fn scan_history(&self) -> ScanHistory {
        self.core().history.snapshot()
    }

    /// SUBSCRIBE: open a push stream for a client at `origin`.
    pub fn subscribe(&self, origin: impl Into<String>) -> Subscription {
        self.broadcaster.subscribe(origin)
    }

    /// GET_ASSET_BYTES.
    pub fn asset_bytes(&self, filename: &str, range: Option<ByteRange>) -> Result<MediaResponse> {
        self.media.serve(filename, range)
    }

    pub fn list_assets(&self) -> Vec<AssetRef> {
        self.registry.list()
    }

    pub fn card_mapping(&self) -> CardMapping {
        self.resolver.mapping()
    }

    pub fn assets_played(&self) -> u64 {
        self.counters.assets_played()
    }

    pub fn status(&self) -> Status {
        let (current_card, phase, last_event) = {
            let core = self.core();
            (
                core.playback.current_card().map(str::to_string),
                core.playback.phase(),
                core.playback.last_event().cloned(),
            )
        };
        Status {
            counters: self.broadcaster.status(),
            current_card,
            phase,
            last_event,
            assets_folder: self.storage.location(),
        }
    }
}

fn require_card_id(card_id: &str) -> Result<&str> {
    let trimmed = card_id.trim();
    if trimmed.is_empty() {
        return Err(TagplayError::InvalidArgument("card_id is required".to_string()));
    }
    Ok(trimmed)
}
