//! Per-subscription sequence tracking.
//!
//! SIDs are unique only within one connection, so the tracking key is
//! `(connection_id, sid)`. Entries for a failed connection are purged on the
//! reconnect path; a new connection's subscriptions start fresh.

use dashmap::DashMap;

/// Outcome of observing one sequenced message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqObservation {
    pub gap: bool,
    /// Number of missed messages when `gap` is set.
    pub gap_size: i64,
}

#[derive(Default)]
pub struct SequenceTracker {
    last_seen: DashMap<(u64, u64), i64>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `seq` for `(connection_id, sid)` and report whether it left a
    /// gap. The first message for a key never gaps. `last_seen` advances to
    /// the observed value either way, so one gap is reported once.
    pub fn observe(&self, connection_id: u64, sid: u64, seq: i64) -> SeqObservation {
        let key = (connection_id, sid);
        let mut observation = SeqObservation {
            gap: false,
            gap_size: 0,
        };

        self.last_seen
            .entry(key)
            .and_modify(|last| {
                if seq != *last + 1 {
                    observation.gap = true;
                    observation.gap_size = (seq - *last - 1).abs();
                }
                *last = seq;
            })
            .or_insert(seq);

        observation
    }

    /// Drop all entries for a connection; called when it fails so a new
    /// incarnation's SIDs don't inherit stale counters.
    pub fn purge_connection(&self, connection_id: u64) {
        self.last_seen.retain(|(conn, _), _| *conn != connection_id);
    }

    pub fn tracked_keys(&self) -> usize {
        self.last_seen.len()
    }

    /// True when any entry for this connection remains (test support).
    pub fn has_connection(&self, connection_id: u64) -> bool {
        self.last_seen
            .iter()
            .any(|entry| entry.key().0 == connection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_never_gaps() {
        let tracker = SequenceTracker::new();
        let obs = tracker.observe(1, 10, 5);
        assert!(!obs.gap);
    }

    #[test]
    fn contiguous_sequence_is_clean() {
        let tracker = SequenceTracker::new();
        tracker.observe(1, 10, 1);
        assert!(!tracker.observe(1, 10, 2).gap);
        assert!(!tracker.observe(1, 10, 3).gap);
    }

    #[test]
    fn missing_seq_flags_gap_with_size() {
        let tracker = SequenceTracker::new();
        tracker.observe(1, 10, 1);
        tracker.observe(1, 10, 2);
        tracker.observe(1, 10, 3);

        let obs = tracker.observe(1, 10, 5);
        assert!(obs.gap);
        assert_eq!(obs.gap_size, 1);

        // Tracker advanced to the observed value; the next message is clean.
        assert!(!tracker.observe(1, 10, 6).gap);
    }

    #[test]
    fn sids_collide_across_connections_but_keys_do_not() {
        let tracker = SequenceTracker::new();
        tracker.observe(1, 10, 1);
        // Same SID on another connection is a separate stream.
        assert!(!tracker.observe(2, 10, 7).gap);
        assert!(tracker.observe(1, 10, 3).gap);
    }

    #[test]
    fn purge_removes_only_that_connection() {
        let tracker = SequenceTracker::new();
        tracker.observe(1, 10, 1);
        tracker.observe(1, 11, 1);
        tracker.observe(2, 10, 1);

        tracker.purge_connection(1);
        assert!(!tracker.has_connection(1));
        assert!(tracker.has_connection(2));
        assert_eq!(tracker.tracked_keys(), 1);
    }
}
