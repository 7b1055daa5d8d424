//! Card scan history, partitioned into mapped and unknown cards.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, trace};

/// Sightings of one card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRecord {
    pub card_id: String,
    /// First time the card was seen.
    pub first_seen: DateTime<Utc>,
    /// Most recent sighting.
    pub last_seen: DateTime<Utc>,
    /// Sightings, mapped or not.
    pub scan_count: u64,
    /// Whether the card resolved to at least one asset when last checked.
    pub mapped: bool,
}

impl ScanRecord {
    fn new(card_id: &str, mapped: bool, now: DateTime<Utc>) -> Self {
        Self {
            card_id: card_id.to_string(),
            first_seen: now,
            last_seen: now,
            scan_count: 1,
            mapped,
        }
    }

    fn touch(&mut self, mapped: bool, now: DateTime<Utc>) {
        self.last_seen = now;
        self.scan_count += 1;
        self.mapped = mapped;
    }
}

/// Serializable view of the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanHistory {
    /// Every card ever seen.
    pub scanned_cards: BTreeMap<String, ScanRecord>,
    /// Cards currently without a mapping.
    pub unknown_cards: BTreeMap<String, ScanRecord>,
    pub total_scanned: usize,
    pub total_unknown: usize,
}

/// Outcome of [`CardHistory::refresh_mapping_status`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Cards examined.
    pub tracked: usize,
    /// Cards found mapped after the refresh.
    pub mapped: usize,
    /// Cards that left the unknown partition during this refresh.
    pub newly_mapped: Vec<String>,
}

/// Scan records for every card ever seen, plus the unknown partition.
///
/// A card recorded as mapped never appears in the unknown partition.
#[derive(Debug, Clone, Default)]
pub struct CardHistory {
    scanned: BTreeMap<String, ScanRecord>,
    unknown: BTreeMap<String, ScanRecord>,
}

impl CardHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sighting of `card_id`.
    pub fn record_scan(&mut self, card_id: &str, mapped: bool, now: DateTime<Utc>) {
        self.scanned
            .entry(card_id.to_string())
            .and_modify(|record| record.touch(mapped, now))
            .or_insert_with(|| ScanRecord::new(card_id, mapped, now));

        if mapped {
            if self.unknown.remove(card_id).is_some() {
                debug!(card_id, "Card left unknown partition on mapped scan");
            }
        } else {
            self.unknown
                .entry(card_id.to_string())
                .and_modify(|record| record.touch(false, now))
                .or_insert_with(|| ScanRecord::new(card_id, false, now));
        }

        trace!(card_id, mapped, "Recorded card scan");
    }

    /// Recompute `mapped` for every tracked card.
    ///
    /// Cards that became mapped leave the unknown partition; scan counts are
    /// left untouched.
    pub fn refresh_mapping_status<F>(&mut self, is_mapped: F) -> RefreshReport
    where
        F: Fn(&str) -> bool,
    {
        let mut report = RefreshReport {
            tracked: self.scanned.len(),
            ..RefreshReport::default()
        };

        for (card_id, record) in &mut self.scanned {
            record.mapped = is_mapped(card_id);
            if record.mapped {
                report.mapped += 1;
                if self.unknown.remove(card_id).is_some() {
                    report.newly_mapped.push(card_id.clone());
                }
            }
        }

        info!(
            tracked = report.tracked,
            mapped = report.mapped,
            newly_mapped = report.newly_mapped.len(),
            "Updated card mapping status"
        );
        report
    }

    pub fn get(&self, card_id: &str) -> Option<&ScanRecord> {
        self.scanned.get(card_id)
    }

    pub fn unknown(&self, card_id: &str) -> Option<&ScanRecord> {
        self.unknown.get(card_id)
    }

    pub fn scanned_len(&self) -> usize {
        self.scanned.len()
    }

    pub fn unknown_len(&self) -> usize {
        self.unknown.len()
    }

    /// Remove every trace of one card. Returns whether it was tracked.
    pub fn forget(&mut self, card_id: &str) -> bool {
        let unknown = self.unknown.remove(card_id).is_some();
        self.scanned.remove(card_id).is_some() || unknown
    }

    /// Drop all records.
    pub fn clear(&mut self) {
        info!(cards = self.scanned.len(), "Scan history cleared");
        self.scanned.clear();
        self.unknown.clear();
    }

    pub fn snapshot(&self) -> ScanHistory {
        ScanHistory {
            scanned_cards: self.scanned.clone(),
            unknown_cards: self.unknown.clone(),
            total_scanned: self.scanned.len(),
            total_unknown: self.unknown.len(),
        }
    }
}
