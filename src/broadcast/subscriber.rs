//! One live push connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::debug;

use super::Shared;
use crate::events::Frame;

/// Identity of a subscriber: where it came from and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberInfo {
    /// Unique for the life of the broadcaster.
    pub id: u64,
    /// Client address, or `unknown`.
    pub origin: String,
    pub connected_at: DateTime<Utc>,
}

/// Registry-side handle used to push frames to a subscriber.
#[derive(Debug)]
pub(super) struct SubscriberEntry {
    pub(super) info: SubscriberInfo,
    pub(super) tx: mpsc::Sender<Frame>,
    pub(super) alive: Arc<AtomicBool>,
}

impl SubscriberEntry {
    /// False once the connection side dropped or was marked disconnected.
    pub(super) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}

struct Timers {
    heartbeat: Interval,
    status: Interval,
}

/// Connection-side end of a subscription.
///
/// Yields state-change frames in mutation order, interleaved with heartbeat
/// and status frames on their own cadence. Dropping it marks the subscriber
/// disconnected; the next broadcast or reaper pass removes it.
pub struct Subscription {
    info: SubscriberInfo,
    rx: mpsc::Receiver<Frame>,
    alive: Arc<AtomicBool>,
    shared: Arc<Shared>,
    timers: Option<Timers>,
}

impl Subscription {
    pub(super) fn new(
        info: SubscriberInfo,
        rx: mpsc::Receiver<Frame>,
        alive: Arc<AtomicBool>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            info,
            rx,
            alive,
            shared,
            timers: None,
        }
    }

    pub const fn info(&self) -> &SubscriberInfo {
        &self.info
    }

    pub fn id(&self) -> u64 {
        self.info.id
    }

    /// Wait for the next frame.
    ///
    /// Returns `None` once the broadcaster has dropped this subscriber.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        let config = &self.shared.config;
        let timers = self.timers.get_or_insert_with(|| {
            let mut heartbeat = interval_at(
                Instant::now() + config.heartbeat_interval,
                config.heartbeat_interval,
            );
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut status = interval_at(
                Instant::now() + config.status_interval,
                config.status_interval,
            );
            status.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Timers { heartbeat, status }
        });

        tokio::select! {
            biased;
            frame = self.rx.recv() => frame,
            _ = timers.heartbeat.tick() => Some(Frame::heartbeat()),
            _ = timers.status.tick() => Some(Frame::status(self.shared.status())),
        }
    }

    /// Drain frames already queued without waiting.
    pub fn try_next_frame(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
        debug!(
            subscriber_id = self.info.id,
            origin = %self.info.origin,
            "Subscriber disconnected"
        );
    }
}
