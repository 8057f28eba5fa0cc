//! Delayed delivery of the first contact after a quiet period.
//!
//! A lone tap that starts a burst of input is held back for a short span so a
//! second, near-simultaneous contact can arrive first. The held begin is
//! delivered when the timer fires, or earlier through [`GestureGate::flush`],
//! which the engine calls before processing any newer event so that every
//! contact still sees begin, then updates, then end.
//!
//! Drag/tap/flick classification is not performed; only the delayed begin is.

use crate::timer::{TimerKind, TimerQueue, TimerToken};
use crate::types::{Point, SequenceId};
use std::time::{Duration, Instant};
use tracing::trace;

pub const GESTURE_DETECTION_SPAN: Duration = Duration::from_millis(100);
pub const GESTURE_DELAY_PAUSE_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingBegin {
    id: SequenceId,
    point: Point,
    token: TimerToken,
}

/// Begin that must now be handed to the consumer, with the point it began at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeldBegin {
    pub id: SequenceId,
    pub point: Point,
}

#[derive(Debug)]
pub struct GestureGate {
    enabled: bool,
    span: Duration,
    pause_ms: u64,
    last_sequence_time: Option<u64>,
    pending: Option<PendingBegin>,
}

impl GestureGate {
    pub fn new(enabled: bool, span: Duration, pause_ms: u64) -> Self {
        Self {
            enabled,
            span,
            pause_ms,
            last_sequence_time: None,
            pending: None,
        }
    }

    /// Whether a begin at `time` should be held back.
    pub fn should_delay(&self, first_sequence: bool, multi_touch: bool, time: u64) -> bool {
        if !(self.enabled && first_sequence && multi_touch) || self.pending.is_some() {
            return false;
        }
        match self.last_sequence_time {
            None => true,
            Some(last) => time.saturating_sub(last) > self.pause_ms,
        }
    }

    /// Holds back the begin of `id`, remembering its original point.
    /// Returns false if the delay could not be scheduled; the caller then
    /// delivers the begin right away.
    pub fn defer(
        &mut self,
        id: SequenceId,
        point: Point,
        now: Instant,
        timers: &mut TimerQueue,
    ) -> bool {
        let Some(token) = timers.schedule_in(TimerKind::GestureDelay, now, self.span) else {
            return false;
        };
        trace!("delaying begin of {} by {:?}", id, self.span);
        self.pending = Some(PendingBegin { id, point, token });
        true
    }

    /// Stops the pending timer and hands back its begin for immediate
    /// delivery. Safe to call when nothing is pending.
    pub fn flush(&mut self, timers: &mut TimerQueue) -> Option<HeldBegin> {
        let pending = self.pending.take()?;
        timers.cancel(pending.token);
        Some(HeldBegin {
            id: pending.id,
            point: pending.point,
        })
    }

    /// The gesture delay elapsed.
    pub fn on_timer(&mut self, token: TimerToken) -> Option<HeldBegin> {
        match self.pending {
            Some(p) if p.token == token => {
                self.pending = None;
                Some(HeldBegin {
                    id: p.id,
                    point: p.point,
                })
            }
            _ => None,
        }
    }

    /// Drops a pending begin for a sequence that disappeared without an end.
    pub fn discard(&mut self, id: SequenceId, timers: &mut TimerQueue) {
        if self.pending.is_some_and(|p| p.id == id) {
            if let Some(p) = self.pending.take() {
                timers.cancel(p.token);
            }
        }
    }

    pub fn note_sequence_time(&mut self, time: u64) {
        self.last_sequence_time = Some(time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> GestureGate {
        GestureGate::new(true, GESTURE_DETECTION_SPAN, GESTURE_DELAY_PAUSE_MS)
    }

    #[test]
    fn test_delay_only_after_quiet_period() {
        let mut g = gate();
        assert!(g.should_delay(true, true, 100));
        g.note_sequence_time(100);
        assert!(!g.should_delay(true, true, 2000));
        assert!(g.should_delay(true, true, 3101));
    }

    #[test]
    fn test_no_delay_when_disabled_or_single_touch() {
        let g = gate();
        assert!(!g.should_delay(true, false, 100));
        assert!(!g.should_delay(false, true, 100));
        let off = GestureGate::new(false, GESTURE_DETECTION_SPAN, GESTURE_DELAY_PAUSE_MS);
        assert!(!off.should_delay(true, true, 100));
    }

    #[test]
    fn test_timer_delivers_original_point_once() {
        let t0 = Instant::now();
        let mut timers = TimerQueue::new();
        let mut g = gate();
        let id = SequenceId::Touch(1);
        assert!(g.defer(id, Point::new(3.0, 4.0), t0, &mut timers));
        assert!(g.pending.is_some());

        let due = timers.take_due(t0 + GESTURE_DETECTION_SPAN);
        assert_eq!(due.len(), 1);
        let released = g.on_timer(due[0].0);
        assert_eq!(
            released,
            Some(HeldBegin {
                id,
                point: Point::new(3.0, 4.0)
            })
        );
        assert_eq!(g.on_timer(due[0].0), None);
        assert!(g.flush(&mut timers).is_none());
    }

    #[test]
    fn test_flush_cancels_timer() {
        let t0 = Instant::now();
        let mut timers = TimerQueue::new();
        let mut g = gate();
        assert!(g.defer(SequenceId::Touch(1), Point::default(), t0, &mut timers));
        assert!(g.flush(&mut timers).is_some());
        assert!(timers.is_empty());
        assert!(g.flush(&mut timers).is_none());
    }

    #[test]
    fn test_discard_only_matching_id() {
        let t0 = Instant::now();
        let mut timers = TimerQueue::new();
        let mut g = gate();
        assert!(g.defer(SequenceId::Touch(1), Point::default(), t0, &mut timers));
        g.discard(SequenceId::Touch(2), &mut timers);
        assert_eq!(g.pending.map(|p| p.id), Some(SequenceId::Touch(1)));
        g.discard(SequenceId::Touch(1), &mut timers);
        assert!(g.pending.is_none());
        assert!(timers.is_empty());
    }
}
