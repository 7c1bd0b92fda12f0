//! Frame-buffer accounting for the active stream session

use std::collections::HashSet;

use evs_core::BufferId;
use tracing::warn;

/// Tracks the in-flight buffer identifiers handed to the current consumer.
///
/// Every recorded id leaves the ledger exactly once: through an explicit
/// return from the consumer, or through the bulk drain at session teardown.
/// Whoever removes an id owns releasing it back to the camera HAL.
#[derive(Debug, Default)]
pub(crate) struct BufferLedger {
    in_flight: HashSet<BufferId>,
}

impl BufferLedger {
    /// Record a buffer handed to the consumer. Returns false when the id
    /// was already in flight.
    pub fn record(&mut self, id: BufferId) -> bool {
        let inserted = self.in_flight.insert(id);
        if !inserted {
            warn!(buffer_id = id, "Frame buffer id handed out twice");
        }
        inserted
    }

    /// Remove a returned buffer. An unknown id is a no-op; the caller must
    /// not release it to the HAL a second time.
    pub fn release(&mut self, id: BufferId) -> bool {
        let known = self.in_flight.remove(&id);
        if !known {
            warn!(buffer_id = id, "Ignoring return of unknown frame buffer");
        }
        known
    }

    /// Empty the ledger, yielding every id that still needs a HAL release.
    pub fn drain(&mut self) -> Vec<BufferId> {
        self.in_flight.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_release() {
        let mut ledger = BufferLedger::default();
        assert!(ledger.record(1));
        assert!(ledger.record(2));
        assert_eq!(ledger.len(), 2);

        assert!(ledger.release(1));
        assert!(!ledger.release(1));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn unknown_release_is_a_no_op() {
        let mut ledger = BufferLedger::default();
        assert!(!ledger.release(42));
        assert!(ledger.is_empty());
    }

    #[test]
    fn drain_empties_the_ledger() {
        let mut ledger = BufferLedger::default();
        ledger.record(1);
        ledger.record(2);
        ledger.record(3);

        let mut drained = ledger.drain();
        drained.sort_unstable();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(ledger.is_empty());
    }

    #[test]
    fn duplicate_record_is_flagged() {
        let mut ledger = BufferLedger::default();
        assert!(ledger.record(7));
        assert!(!ledger.record(7));
        assert_eq!(ledger.len(), 1);
    }
}
