//! Fan-out of playback events to live subscribers.
//!
//! Every subscriber owns a bounded queue. Publishing never waits: a
//! subscriber whose queue is closed or full counts as a failed write and is
//! dropped on the spot, leaving everyone else untouched. The subscriber set
//! sits behind its own lock, separate from playback state.
//!
//! State-change frames carry a sequence number reserved while the playback
//! lock was held. Publishing may race, so frames are released strictly in
//! sequence order, which gives each subscriber the mutation order.

mod subscriber;

pub use subscriber::{SubscriberInfo, Subscription};

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::EventsConfig;
use crate::events::{Frame, SharedCounters, StatusCounters};
use subscriber::SubscriberEntry;

/// Out-of-order frames held back before a gap is given up on.
const MAX_PENDING: usize = 256;

/// Floor for timer periods; tokio intervals reject a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Cadence and buffering for subscriber streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Period of `heartbeat` frames on each subscriber stream.
    pub heartbeat_interval: Duration,
    /// Period of `status_update` frames on each subscriber stream.
    pub status_interval: Duration,
    /// Frames a subscriber may have queued before it counts as too slow.
    pub channel_capacity: usize,
}

impl BroadcastConfig {
    /// Raise zero periods and capacity to the smallest usable values.
    pub fn normalized(self) -> Self {
        Self {
            heartbeat_interval: self.heartbeat_interval.max(MIN_INTERVAL),
            status_interval: self.status_interval.max(MIN_INTERVAL),
            channel_capacity: self.channel_capacity.max(1),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self::from(&EventsConfig::default())
    }
}

impl From<&EventsConfig> for BroadcastConfig {
    fn from(events: &EventsConfig) -> Self {
        Self {
            heartbeat_interval: events.heartbeat_interval(),
            status_interval: events.status_interval(),
            channel_capacity: events.channel_capacity,
        }
    }
}

/// What a reaper pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    /// Subscribers already marked disconnected.
    pub purged: usize,
    /// Older connections from a shared origin that failed a probe.
    pub stale_duplicates: usize,
    /// Subscribers left after the pass.
    pub remaining: usize,
}

#[derive(Debug, Default)]
struct Registry {
    entries: Vec<SubscriberEntry>,
    pending: BTreeMap<u64, Frame>,
    next_seq: u64,
}

impl Registry {
    /// Push `frame` to every subscriber, dropping the ones that fail.
    fn deliver(&mut self, frame: &Frame) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| {
            if !entry.is_alive() {
                debug!(subscriber_id = entry.info.id, "Dropping disconnected subscriber");
                return false;
            }
            match entry.tx.try_send(frame.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        subscriber_id = entry.info.id,
                        origin = %entry.info.origin,
                        "Subscriber queue full, dropping slow subscriber"
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber_id = entry.info.id, "Subscriber closed, removing");
                    false
                }
            }
        });
        let removed = before - self.entries.len();
        trace!(
            frame = frame.name(),
            delivered = self.entries.len(),
            removed,
            "Broadcast frame"
        );
        removed
    }
}

pub(crate) struct Shared {
    registry: Mutex<Registry>,
    config: BroadcastConfig,
    counters: Arc<SharedCounters>,
    next_id: AtomicU64,
    issued_seq: AtomicU64,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn status(&self) -> StatusCounters {
        let subscribers = self.registry().entries.len();
        self.counters.snapshot(subscribers)
    }
}

/// Subscriber set plus the publish path.
#[derive(Clone)]
pub struct Broadcaster {
    shared: Arc<Shared>,
}

impl Broadcaster {
    pub fn new(config: BroadcastConfig, counters: Arc<SharedCounters>) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                config: config.normalized(),
                counters,
                next_id: AtomicU64::new(1),
                issued_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.shared.config
    }

    /// Register a new subscriber from `origin`.
    ///
    /// The first frame it receives is its `connection` frame. Nothing
    /// published earlier is replayed.
    pub fn subscribe(&self, origin: impl Into<String>) -> Subscription {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let info = SubscriberInfo {
            id,
            origin: origin.into(),
            connected_at: Utc::now(),
        };
        let (tx, rx) = mpsc::channel(self.shared.config.channel_capacity);
        // Queue is empty and sized at least 1, so this cannot fail.
        let _ = tx.try_send(Frame::connection(id));

        let alive = Arc::new(AtomicBool::new(true));
        let entry = SubscriberEntry {
            info: info.clone(),
            tx,
            alive: Arc::clone(&alive),
        };

        let total = {
            let mut registry = self.shared.registry();
            registry.entries.push(entry);
            registry.entries.len()
        };
        info!(subscriber_id = id, origin = %info.origin, total, "Subscriber connected");

        Subscription::new(info, rx, alive, Arc::clone(&self.shared))
    }

    /// Reserve the next sequence number. Call while the state lock is held
    /// and always follow with [`publish`](Self::publish).
    pub fn reserve_seq(&self) -> u64 {
        self.shared.issued_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a frame to every live subscriber without waiting.
    ///
    /// Sequenced frames are held until all earlier ones have gone out.
    pub fn publish(&self, frame: Frame) {
        let mut guard = self.shared.registry();
        let registry = &mut *guard;

        let Some(seq) = frame.seq else {
            registry.deliver(&frame);
            return;
        };

        if seq < registry.next_seq {
            warn!(seq, next = registry.next_seq, "Dropping frame with stale sequence number");
            return;
        }
        registry.pending.insert(seq, frame);

        if registry.pending.len() > MAX_PENDING {
            let first = registry.pending.keys().next().copied();
            if let Some(first) = first {
                warn!(
                    missing_from = registry.next_seq,
                    resume_at = first,
                    "Sequence gap never filled, skipping ahead"
                );
                registry.next_seq = first;
            }
        }

        loop {
            let next = registry.next_seq;
            let Some(frame) = registry.pending.remove(&next) else {
                break;
            };
            registry.deliver(&frame);
            registry.next_seq = next + 1;
        }
    }

    /// Send one frame to all subscribers right now.
    pub fn heartbeat(&self) {
        self.publish(Frame::heartbeat());
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.registry().entries.len()
    }

    pub fn subscribers(&self) -> Vec<SubscriberInfo> {
        self.shared
            .registry()
            .entries
            .iter()
            .map(|entry| entry.info.clone())
            .collect()
    }

    /// Aggregate counters, including the live subscriber count.
    pub fn status(&self) -> StatusCounters {
        self.shared.status()
    }

    /// Remove dead subscribers.
    ///
    /// Entries already marked disconnected are purged. When several
    /// subscribers share an origin, the most recent connection is kept and
    /// each older one is probed with a heartbeat; those that cannot take it
    /// are discarded.
    pub fn reap(&self) -> ReapReport {
        let mut guard = self.shared.registry();
        let registry = &mut *guard;
        let mut report = ReapReport::default();

        let before = registry.entries.len();
        registry.entries.retain(SubscriberEntry::is_alive);
        report.purged = before - registry.entries.len();

        let mut newest: HashMap<&str, u64> = HashMap::new();
        for entry in &registry.entries {
            let slot = newest.entry(entry.info.origin.as_str()).or_insert(entry.info.id);
            *slot = (*slot).max(entry.info.id);
        }
        let newest: HashMap<String, u64> = newest
            .into_iter()
            .map(|(origin, id)| (origin.to_string(), id))
            .collect();

        let before = registry.entries.len();
        registry.entries.retain(|entry| {
            if newest.get(&entry.info.origin) == Some(&entry.info.id) {
                return true;
            }
            let keep = entry.tx.try_send(Frame::heartbeat()).is_ok();
            if !keep {
                debug!(
                    subscriber_id = entry.info.id,
                    origin = %entry.info.origin,
                    "Discarding stale duplicate subscriber"
                );
            }
            keep
        });
        report.stale_duplicates = before - registry.entries.len();
        report.remaining = registry.entries.len();
        report
    }

    /// Run [`reap`](Self::reap) every `period` until the runtime shuts down.
    pub fn spawn_reaper(&self, period: Duration) -> JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let report = broadcaster.reap();
                if report.purged > 0 || report.stale_duplicates > 0 {
                    info!(
                        purged = report.purged,
                        stale_duplicates = report.stale_duplicates,
                        remaining = report.remaining,
                        "Reaped subscribers"
                    );
                }
            }
        })
    }
}
