use crate::types::{ButtonMask, ContactEvent, KeyCoord, Point, SequenceId};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);

/// State of a single click or touch sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSequence {
    pub id: SequenceId,
    pub point: Point,
    pub root_point: Point,
    /// Platform event timestamp (ms) of the latest event.
    pub time: u64,
    pub state: ButtonMask,
    pub hover_key: Option<KeyCoord>,
    /// First of the concurrently active sequences.
    pub primary: bool,
    /// Begin has been handed to the view and resolver.
    pub delivered: bool,
    /// Wall clock of the latest event, used by the sweep.
    pub updated: Instant,
}

impl InputSequence {
    pub fn from_event(ev: &ContactEvent) -> Self {
        Self {
            id: ev.id,
            point: ev.point,
            root_point: ev.root_point,
            time: ev.time,
            state: ev.state,
            hover_key: None,
            primary: false,
            delivered: false,
            updated: ev.t,
        }
    }
}

/// Set of in-flight sequences keyed by contact id.
#[derive(Debug)]
pub struct InputSequenceTracker {
    sequences: HashMap<SequenceId, InputSequence>,
    stale_after: Duration,
}

impl Default for InputSequenceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER)
    }
}

impl InputSequenceTracker {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            sequences: HashMap::new(),
            stale_after,
        }
    }

    /// Stores a new sequence, marking it primary if nothing else is active.
    /// Returns false (and changes nothing) if the id is already tracked.
    pub fn begin(&mut self, mut sequence: InputSequence) -> bool {
        if self.sequences.contains_key(&sequence.id) {
            debug!("begin for already active sequence {}", sequence.id);
            return false;
        }
        sequence.primary = self.sequences.is_empty();
        self.sequences.insert(sequence.id, sequence);
        true
    }

    pub fn update(
        &mut self,
        id: SequenceId,
        point: Point,
        root_point: Point,
        time: u64,
        now: Instant,
    ) -> Option<&mut InputSequence> {
        let Some(seq) = self.sequences.get_mut(&id) else {
            debug!("update for unknown sequence {}", id);
            return None;
        };
        seq.point = point;
        seq.root_point = root_point;
        seq.time = seq.time.max(time);
        seq.updated = now;
        Some(seq)
    }

    pub fn end(&mut self, id: SequenceId, time: u64) -> Option<InputSequence> {
        let Some(mut seq) = self.sequences.remove(&id) else {
            debug!("end for unknown sequence {}", id);
            return None;
        };
        seq.time = seq.time.max(time);
        Some(seq)
    }

    /// Discards sequences without an update for longer than the stale
    /// threshold. Begin/update/end are not guaranteed to balance on every
    /// input stack; a lost end would otherwise leave a key held forever.
    pub fn sweep(&mut self, now: Instant) -> Vec<InputSequence> {
        let stale_after = self.stale_after;
        let mut expired: Vec<SequenceId> = self
            .sequences
            .values()
            .filter(|s| now.saturating_duration_since(s.updated) > stale_after)
            .map(|s| s.id)
            .collect();
        expired.sort();
        expired
            .into_iter()
            .filter_map(|id| {
                warn!("discarding expired input sequence {}", id);
                self.sequences.remove(&id)
            })
            .collect()
    }

    pub fn get(&self, id: SequenceId) -> Option<&InputSequence> {
        self.sequences.get(&id)
    }

    pub fn get_mut(&mut self, id: SequenceId) -> Option<&mut InputSequence> {
        self.sequences.get_mut(&id)
    }

    pub fn contains(&self, id: SequenceId) -> bool {
        self.sequences.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn ids(&self) -> Vec<SequenceId> {
        let mut ids: Vec<SequenceId> = self.sequences.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputSequence> {
        self.sequences.values()
    }

    /// Whether any active, delivered sequence currently hovers `key`.
    pub fn is_key_active(&self, key: KeyCoord) -> bool {
        self.sequences
            .values()
            .any(|s| s.delivered && s.hover_key == Some(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;

    fn seq(id: u64, t: Instant) -> InputSequence {
        let ev = ContactEvent::touch(id, Phase::Begin, Point::new(1.0, 2.0), 10, t);
        InputSequence::from_event(&ev)
    }

    #[test]
    fn test_begin_marks_first_primary() {
        let t0 = Instant::now();
        let mut tracker = InputSequenceTracker::default();
        assert!(tracker.begin(seq(1, t0)));
        assert!(tracker.begin(seq(2, t0)));
        assert!(tracker.get(SequenceId::Touch(1)).unwrap().primary);
        assert!(!tracker.get(SequenceId::Touch(2)).unwrap().primary);
    }

    #[test]
    fn test_duplicate_begin_is_ignored() {
        let t0 = Instant::now();
        let mut tracker = InputSequenceTracker::default();
        assert!(tracker.begin(seq(1, t0)));
        let mut dup = seq(1, t0);
        dup.point = Point::new(99.0, 99.0);
        assert!(!tracker.begin(dup));
        assert_eq!(tracker.len(), 1);
        assert_eq!(
            tracker.get(SequenceId::Touch(1)).unwrap().point,
            Point::new(1.0, 2.0)
        );
    }

    #[test]
    fn test_update_and_end_unknown_are_noops() {
        let t0 = Instant::now();
        let mut tracker = InputSequenceTracker::default();
        let id = SequenceId::Touch(7);
        assert!(tracker
            .update(id, Point::default(), Point::default(), 5, t0)
            .is_none());
        assert!(tracker.end(id, 5).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_end_twice_has_no_further_effect() {
        let t0 = Instant::now();
        let mut tracker = InputSequenceTracker::default();
        tracker.begin(seq(1, t0));
        tracker.begin(seq(2, t0));
        assert!(tracker.end(SequenceId::Touch(1), 20).is_some());
        assert!(tracker.end(SequenceId::Touch(1), 21).is_none());
        assert_eq!(tracker.ids(), vec![SequenceId::Touch(2)]);
    }

    #[test]
    fn test_active_set_matches_unended_ids() {
        let t0 = Instant::now();
        let mut tracker = InputSequenceTracker::default();
        for id in 1..=5 {
            tracker.begin(seq(id, t0));
        }
        tracker.update(SequenceId::Touch(3), Point::new(5.0, 5.0), Point::new(5.0, 5.0), 11, t0);
        tracker.end(SequenceId::Touch(2), 12);
        tracker.end(SequenceId::Touch(4), 13);
        assert_eq!(
            tracker.ids(),
            vec![SequenceId::Touch(1), SequenceId::Touch(3), SequenceId::Touch(5)]
        );
    }

    #[test]
    fn test_time_is_monotonic() {
        let t0 = Instant::now();
        let mut tracker = InputSequenceTracker::default();
        tracker.begin(seq(1, t0));
        let s = tracker
            .update(SequenceId::Touch(1), Point::default(), Point::default(), 3, t0)
            .unwrap();
        assert_eq!(s.time, 10);
    }

    #[test]
    fn test_sweep_removes_stale_only() {
        let t0 = Instant::now();
        let mut tracker = InputSequenceTracker::default();
        tracker.begin(seq(1, t0));
        tracker.begin(seq(2, t0));
        let later = t0 + Duration::from_secs(20);
        tracker.update(SequenceId::Touch(2), Point::default(), Point::default(), 50, later);

        assert!(tracker.sweep(t0 + Duration::from_secs(30)).is_empty());

        let removed = tracker.sweep(t0 + Duration::from_secs(31));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, SequenceId::Touch(1));
        assert_eq!(tracker.ids(), vec![SequenceId::Touch(2)]);

        // Already gone, nothing reported twice.
        assert!(tracker.sweep(t0 + Duration::from_secs(32)).is_empty());
    }
}
