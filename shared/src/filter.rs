//! Dedup and throttle gate between the poller and the presenter.
//!
//! An id is suppressed for the rest of the session once it appears in any of
//! the in-memory processed set, the two persisted id lists, or the
//! `last_alert_id` slot. Accepted alerts are spaced by the cooldown: a
//! throttled alert is not dropped, its verdict carries the instant it may be
//! shown.

use std::collections::{HashSet, VecDeque};

use lru::LruCache;
use tracing::debug;

use crate::api::{Alert, AlertId};
use crate::{UnixTimeMs, PERSISTED_ID_CAP, PROCESSED_SWEEP_KEEP, PROCESSED_SWEEP_THRESHOLD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    Accept,
    AlreadyProcessed,
    SameAsLast,
    PersistedProcessed,
    Throttled { ready_at: UnixTimeMs },
}

impl FilterVerdict {
    #[must_use]
    pub fn is_accept(self) -> bool {
        matches!(self, Self::Accept)
    }

    /// Instant the alert may be shown, or `None` when it is suppressed.
    #[must_use]
    pub fn display_slot(self, now: UnixTimeMs) -> Option<UnixTimeMs> {
        match self {
            Self::Accept => Some(now),
            Self::Throttled { ready_at } => Some(ready_at),
            Self::AlreadyProcessed | Self::SameAsLast | Self::PersistedProcessed => None,
        }
    }

    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::AlreadyProcessed => "already_processed",
            Self::SameAsLast => "same_as_last",
            Self::PersistedProcessed => "persisted_processed",
            Self::Throttled { .. } => "throttled",
        }
    }
}

/// Insertion-ordered id list capped at a fixed length, oldest dropped first.
#[derive(Debug, Clone, Default)]
pub struct PersistedIds {
    order: VecDeque<AlertId>,
    members: HashSet<AlertId>,
    cap: usize,
}

impl PersistedIds {
    #[must_use]
    pub fn with_cap(cap: usize) -> Self {
        Self {
            order: VecDeque::new(),
            members: HashSet::new(),
            cap: cap.max(1),
        }
    }

    #[must_use]
    pub fn contains(&self, id: &AlertId) -> bool {
        self.members.contains(id)
    }

    /// Returns `false` when the id was already present.
    pub fn insert(&mut self, id: AlertId) -> bool {
        if !self.members.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);
        self.enforce_cap();
        true
    }

    /// Merges a list read back from storage. Stored ids are older than
    /// anything recorded since mount.
    pub fn merge_older(&mut self, stored: impl IntoIterator<Item = AlertId>) {
        let mut merged: VecDeque<AlertId> = VecDeque::new();
        for id in stored {
            if self.members.insert(id.clone()) {
                merged.push_back(id);
            }
        }
        merged.extend(self.order.drain(..));
        self.order = merged;
        self.enforce_cap();
    }

    fn enforce_cap(&mut self) {
        while self.order.len() > self.cap {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<AlertId> {
        self.order.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

pub struct DedupFilter {
    cooldown_ms: u64,
    processed: LruCache<AlertId, ()>,
    reviewed: PersistedIds,
    shown: PersistedIds,
    last_alert_id: Option<AlertId>,
    last_alert_at: Option<UnixTimeMs>,
}

impl std::fmt::Debug for DedupFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupFilter")
            .field("cooldown_ms", &self.cooldown_ms)
            .field("processed", &self.processed.len())
            .field("reviewed", &self.reviewed.len())
            .field("shown", &self.shown.len())
            .field("last_alert_id", &self.last_alert_id)
            .field("last_alert_at", &self.last_alert_at)
            .finish()
    }
}

impl Default for DedupFilter {
    fn default() -> Self {
        Self::new(crate::ALERT_COOLDOWN_MS)
    }
}

impl DedupFilter {
    #[must_use]
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms,
            processed: LruCache::unbounded(),
            reviewed: PersistedIds::with_cap(PERSISTED_ID_CAP),
            shown: PersistedIds::with_cap(PERSISTED_ID_CAP),
            last_alert_id: None,
            last_alert_at: None,
        }
    }

    /// Full check. A hit in a persisted list is copied into the in-memory set.
    pub fn evaluate(&mut self, alert: &Alert, now: UnixTimeMs) -> FilterVerdict {
        let id = &alert.id;
        let verdict = if self.processed.contains(id) {
            FilterVerdict::AlreadyProcessed
        } else if self.last_alert_id.as_ref() == Some(id) {
            FilterVerdict::SameAsLast
        } else if self.reviewed.contains(id) || self.shown.contains(id) {
            self.processed.put(id.clone(), ());
            FilterVerdict::PersistedProcessed
        } else {
            match self.last_alert_at {
                Some(last) if now.is_before(last.add_millis(self.cooldown_ms)) => {
                    FilterVerdict::Throttled {
                        ready_at: last.add_millis(self.cooldown_ms),
                    }
                }
                _ => FilterVerdict::Accept,
            }
        };

        debug!(alert_id = %id, verdict = verdict.reason(), "filter verdict");
        verdict
    }

    pub fn should_process(&mut self, alert: &Alert, now: UnixTimeMs) -> bool {
        self.evaluate(alert, now).is_accept()
    }

    /// Side-effect free dedup check; the cooldown is not consulted.
    #[must_use]
    pub fn is_known(&self, id: &AlertId) -> bool {
        self.processed.contains(id)
            || self.last_alert_id.as_ref() == Some(id)
            || self.reviewed.contains(id)
            || self.shown.contains(id)
    }

    pub fn record_processed(&mut self, id: &AlertId) {
        self.processed.put(id.clone(), ());
    }

    /// Records an alert handed to the queue. `slot` is when it will be shown,
    /// which becomes the reference point for the next cooldown.
    pub fn mark_accepted(&mut self, id: &AlertId, slot: UnixTimeMs) {
        self.record_processed(id);
        self.last_alert_id = Some(id.clone());
        self.last_alert_at = Some(self.last_alert_at.map_or(slot, |last| last.max(slot)));
    }

    /// Recorded during the suppression window: never shown, but remembered.
    pub fn record_suppressed(&mut self, id: &AlertId) {
        self.record_processed(id);
        self.last_alert_id = Some(id.clone());
    }

    pub fn record_shown(&mut self, id: &AlertId) -> bool {
        self.shown.insert(id.clone())
    }

    pub fn record_reviewed(&mut self, id: &AlertId) -> bool {
        self.record_processed(id);
        self.reviewed.insert(id.clone())
    }

    pub fn restore_reviewed(&mut self, ids: Vec<AlertId>) {
        self.reviewed.merge_older(ids);
    }

    pub fn restore_shown(&mut self, ids: Vec<AlertId>) {
        self.shown.merge_older(ids);
    }

    /// Values written by an earlier mount never override ones set since.
    pub fn restore_last(&mut self, id: Option<AlertId>, at: Option<UnixTimeMs>) {
        if self.last_alert_id.is_none() {
            self.last_alert_id = id;
        }
        self.last_alert_at = match (self.last_alert_at, at) {
            (Some(current), Some(stored)) => Some(current.max(stored)),
            (current, stored) => current.or(stored),
        };
    }

    /// Capacity eviction: above the threshold, keep only the most recently
    /// recorded ids. Returns how many were evicted.
    pub fn sweep(&mut self) -> usize {
        if self.processed.len() <= PROCESSED_SWEEP_THRESHOLD {
            return 0;
        }
        let mut evicted = 0;
        while self.processed.len() > PROCESSED_SWEEP_KEEP {
            if self.processed.pop_lru().is_none() {
                break;
            }
            evicted += 1;
        }
        debug!(evicted, kept = self.processed.len(), "processed set swept");
        evicted
    }

    #[must_use]
    pub fn processed_len(&self) -> usize {
        self.processed.len()
    }

    #[must_use]
    pub fn last_alert_id(&self) -> Option<&AlertId> {
        self.last_alert_id.as_ref()
    }

    #[must_use]
    pub fn last_alert_at(&self) -> Option<UnixTimeMs> {
        self.last_alert_at
    }

    #[must_use]
    pub fn reviewed_ids(&self) -> Vec<AlertId> {
        self.reviewed.to_vec()
    }

    #[must_use]
    pub fn shown_ids(&self) -> Vec<AlertId> {
        self.shown.to_vec()
    }
}
