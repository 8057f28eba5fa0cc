use std::time::{Duration, Instant};
use tracing::warn;

/// Handle for a scheduled task; cancelling it is always safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Deliver a held-back sequence begin.
    GestureDelay,
    /// Drop contacts that never received an end.
    Sweep,
    /// Release sticky modifiers after inactivity.
    AutoRelease,
    /// Process queued touch ends.
    DelayedRelease,
}

#[derive(Debug, Clone)]
struct Scheduled {
    token: TimerToken,
    kind: TimerKind,
    deadline: Instant,
}

/// Deadlines for the engine's deferred work. The host's event loop asks for
/// `next_deadline()` and calls back into the engine once it has passed;
/// nothing here runs on its own.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    entries: Vec<Scheduled>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn schedule(&mut self, kind: TimerKind, deadline: Instant) -> TimerToken {
        self.next_id += 1;
        let token = TimerToken(self.next_id);
        self.entries.push(Scheduled {
            token,
            kind,
            deadline,
        });
        token
    }

    /// Returns false if the token already fired or was cancelled.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.token != token);
        self.entries.len() != before
    }

    /// Schedules `kind` at `now + delay`. A deadline `Instant` cannot
    /// represent would never fire, so nothing is scheduled.
    pub fn schedule_in(
        &mut self,
        kind: TimerKind,
        now: Instant,
        delay: Duration,
    ) -> Option<TimerToken> {
        match now.checked_add(delay) {
            Some(deadline) => Some(self.schedule(kind, deadline)),
            None => {
                warn!("{:?} delay of {:?} is out of range, not scheduled", kind, delay);
                None
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|e| e.deadline).min()
    }

    /// Removes and returns every entry due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(TimerToken, TimerKind)> {
        let mut due: Vec<Scheduled> = Vec::new();
        self.entries.retain(|e| {
            if e.deadline <= now {
                due.push(e.clone());
                false
            } else {
                true
            }
        });
        due.sort_by_key(|e| (e.deadline, e.token.0));
        due.into_iter().map(|e| (e.token, e.kind)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_due_in_deadline_order() {
        let t0 = Instant::now();
        let mut q = TimerQueue::new();
        let late = q.schedule(TimerKind::Sweep, t0 + Duration::from_millis(200));
        let early = q.schedule(TimerKind::GestureDelay, t0 + Duration::from_millis(100));
        q.schedule(TimerKind::AutoRelease, t0 + Duration::from_secs(5));

        assert!(q.take_due(t0).is_empty());
        let due = q.take_due(t0 + Duration::from_millis(250));
        assert_eq!(
            due,
            vec![(early, TimerKind::GestureDelay), (late, TimerKind::Sweep)]
        );
        assert_eq!(q.next_deadline(), Some(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let t0 = Instant::now();
        let mut q = TimerQueue::new();
        let token = q.schedule(TimerKind::GestureDelay, t0);
        assert!(!q.is_empty());
        assert!(q.cancel(token));
        assert!(!q.cancel(token));
        assert!(q.take_due(t0 + Duration::from_secs(1)).is_empty());
        assert!(q.is_empty());
    }

    #[test]
    fn test_schedule_in_out_of_range() {
        let t0 = Instant::now();
        let mut q = TimerQueue::new();
        assert!(q
            .schedule_in(TimerKind::Sweep, t0, Duration::from_secs(u64::MAX))
            .is_none());
        assert!(q.is_empty());

        let token = q
            .schedule_in(TimerKind::Sweep, t0, Duration::from_secs(5))
            .unwrap();
        assert_eq!(q.next_deadline(), Some(t0 + Duration::from_secs(5)));
        assert_eq!(
            q.take_due(t0 + Duration::from_secs(5)),
            vec![(token, TimerKind::Sweep)]
        );
    }
}
