use crate::chord::{ChordMapping, ChordMode, ChordResolver, Release};
use crate::config::{EngineConfig, EventHandling};
use crate::dispatch::ActionDispatcher;
use crate::gesture::GestureGate;
use crate::grid::SpatialGrid;
use crate::modifiers::ModifierState;
use crate::sequence::{InputSequence, InputSequenceTracker};
use crate::synth::KeySynth;
use crate::timer::{TimerKind, TimerQueue, TimerToken};
use crate::types::{ContactEvent, KeyCoord, Outcome, Phase, Point, Rect, SequenceId, Source};
use crate::view::{KeyboardView, NullView};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

/// Engine handle shared between the event thread and timer callbacks.
pub type SharedEngine = Arc<Mutex<ChordKeyboardEngine>>;

/// Touch end held back so a late-reported begin can overtake it.
#[derive(Debug, Clone, Copy)]
struct QueuedEnd {
    id: SequenceId,
    point: Point,
    time: u64,
}

/// Turns raw contact events into chord dispatches.
///
/// Everything runs on the caller's thread: feed events through
/// [`on_event`](Self::on_event) and call [`on_timers`](Self::on_timers) once
/// [`next_deadline`](Self::next_deadline) has passed.
pub struct ChordKeyboardEngine {
    config: EngineConfig,
    grid: SpatialGrid,
    tracker: InputSequenceTracker,
    gate: GestureGate,
    timers: TimerQueue,
    resolver: ChordResolver,
    mapping: ChordMapping,
    dispatcher: ActionDispatcher,
    view: Box<dyn KeyboardView + Send>,
    queued_ends: Vec<QueuedEnd>,
    sweep_timer: Option<TimerToken>,
    auto_release_timer: Option<TimerToken>,
    release_timer: Option<TimerToken>,
}

impl ChordKeyboardEngine {
    pub fn new(config: EngineConfig, mapping: ChordMapping) -> Self {
        info!(
            "engine ready: {:?} touch, {} chords",
            config.touch_input,
            mapping.len()
        );
        Self {
            grid: SpatialGrid::default(),
            tracker: InputSequenceTracker::new(config.stale_after()),
            gate: GestureGate::new(
                config.delay_sequence_begin,
                config.gesture_span(),
                config.gesture_delay_pause_ms,
            ),
            timers: TimerQueue::new(),
            resolver: ChordResolver::new(config.chord_mode()),
            mapping,
            dispatcher: ActionDispatcher::default(),
            view: Box::new(NullView),
            queued_ends: Vec::new(),
            sweep_timer: None,
            auto_release_timer: None,
            release_timer: None,
            config,
        }
    }

    pub fn with_synth(mut self, synth: impl KeySynth + Send + 'static) -> Self {
        self.dispatcher.set_synth(Some(Box::new(synth)));
        self
    }

    pub fn with_view(mut self, view: impl KeyboardView + Send + 'static) -> Self {
        self.view = Box::new(view);
        self
    }

    pub fn into_shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn mapping(&self) -> &ChordMapping {
        &self.mapping
    }

    pub fn modifiers(&self) -> &ModifierState {
        self.dispatcher.modifiers()
    }

    /// Keys released so far in the chord being built.
    pub fn waiting(&self) -> &[KeyCoord] {
        self.resolver.waiting()
    }

    pub fn active_sequences(&self) -> Vec<SequenceId> {
        self.tracker.ids()
    }

    pub fn sequence(&self, id: SequenceId) -> Option<&InputSequence> {
        self.tracker.get(id)
    }

    pub fn is_key_active(&self, key: KeyCoord) -> bool {
        self.tracker.is_key_active(key)
    }

    /// Label the key would produce if released now.
    pub fn label_for(&self, key: KeyCoord) -> Option<&str> {
        self.resolver.label_for(key, &self.mapping)
    }

    pub fn set_synth(&mut self, synth: Option<Box<dyn KeySynth + Send>>) {
        self.dispatcher.set_synth(synth);
    }

    /// Replaces the chord table. A half-built chord refers to the old
    /// table and is dropped.
    pub fn set_mapping(&mut self, mapping: ChordMapping) {
        debug!("switching to layout {:?}", mapping.name());
        self.mapping = mapping;
        self.resolver.reset();
        self.view.redraw(None);
    }

    /// Lays the panes out inside the widget rectangle.
    pub fn resize(&mut self, rect: Rect) {
        self.grid.calculate_layout(rect, &self.config.dimensions);
        self.view.redraw(None);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn on_event(&mut self, ev: ContactEvent) -> Vec<Outcome> {
        let mut out = Vec::new();
        if !self.accepts(&ev) {
            trace!("ignoring {:?} of {} from {:?}", ev.phase, ev.id, ev.source);
            return out;
        }
        match ev.phase {
            Phase::Begin => self.sequence_begin(&ev, &mut out),
            Phase::Update => self.sequence_update(&ev),
            Phase::End => self.sequence_end(&ev, &mut out),
        }
        out
    }

    /// Runs every timer due at `now`.
    pub fn on_timers(&mut self, now: Instant) -> Vec<Outcome> {
        let mut out = Vec::new();
        for (token, kind) in self.timers.take_due(now) {
            // An earlier handler in this batch may have superseded it.
            let current = match kind {
                TimerKind::GestureDelay => true,
                TimerKind::Sweep => self.sweep_timer == Some(token),
                TimerKind::AutoRelease => self.auto_release_timer == Some(token),
                TimerKind::DelayedRelease => self.release_timer == Some(token),
            };
            if !current {
                continue;
            }
            match kind {
                TimerKind::GestureDelay => {
                    if let Some(held) = self.gate.on_timer(token) {
                        self.deliver_begin(held.id, held.point);
                    }
                }
                TimerKind::Sweep => {
                    self.sweep_timer = None;
                    self.sweep(now);
                    self.ensure_sweep(now);
                }
                TimerKind::AutoRelease => {
                    self.auto_release_timer = None;
                    let released = self.dispatcher.release_all_modifiers();
                    if !released.is_empty() {
                        debug!("auto-released modifiers {:?}", released);
                        self.view.redraw(None);
                    }
                }
                TimerKind::DelayedRelease => {
                    self.release_timer = None;
                    self.process_queued_ends(None, now, &mut out);
                }
            }
        }
        out
    }

    fn accepts(&self, ev: &ContactEvent) -> bool {
        let touch_enabled = self.config.touch_enabled();
        match ev.id {
            // Pointer emulated from touch would double every contact.
            SequenceId::Pointer if touch_enabled && ev.source == Source::Touchscreen => {
                return false;
            }
            SequenceId::Touch(_) if !touch_enabled || ev.source != Source::Touchscreen => {
                return false;
            }
            _ => {}
        }
        // Raw device events arrive for the whole screen.
        if self.config.event_handling == EventHandling::XInput
            && ev.phase == Phase::Begin
            && self.tracker.is_empty()
            && !ev.window_hit
        {
            return false;
        }
        true
    }

    fn sequence_begin(&mut self, ev: &ContactEvent, out: &mut Vec<Outcome>) {
        // Ends that happened before this begin but were held back go first.
        self.process_queued_ends(Some(ev.time), ev.t, out);

        let first = self.tracker.is_empty();
        let multi_touch = self.config.multi_touch();
        if first || multi_touch {
            if self.tracker.begin(InputSequence::from_event(ev)) {
                self.flush_gate();
                let deferred = self.gate.should_delay(first, multi_touch, ev.time)
                    && self.gate.defer(ev.id, ev.point, ev.t, &mut self.timers);
                if !deferred {
                    self.deliver_begin(ev.id, ev.point);
                }
                self.ensure_sweep(ev.t);
            }
        } else {
            debug!("{} ignored, single touch already active", ev.id);
        }
        self.gate.note_sequence_time(ev.time);
    }

    fn sequence_update(&mut self, ev: &ContactEvent) {
        if !self.tracker.contains(ev.id) {
            trace!("update for untracked {}", ev.id);
            return;
        }
        // The held begin must reach the view ahead of this update.
        self.flush_gate();
        if let Some(seq) = self
            .tracker
            .update(ev.id, ev.point, ev.root_point, ev.time, ev.t)
        {
            seq.state = ev.state;
        }
        self.deliver_update(ev.id);
    }

    fn sequence_end(&mut self, ev: &ContactEvent, out: &mut Vec<Outcome>) {
        if ev.id.is_touch() && self.tracker.contains(ev.id) {
            if let Some(delay) = self.config.touch_release_delay() {
                if self.release_timer.is_none() {
                    self.release_timer =
                        self.timers
                            .schedule_in(TimerKind::DelayedRelease, ev.t, delay);
                }
                if self.release_timer.is_some() {
                    self.queued_ends.push(QueuedEnd {
                        id: ev.id,
                        point: ev.point,
                        time: ev.time,
                    });
                    return;
                }
            }
        }
        self.process_end(ev.id, ev.point, ev.time, ev.t, out);
    }

    fn process_queued_ends(&mut self, before: Option<u64>, now: Instant, out: &mut Vec<Outcome>) {
        if self.queued_ends.is_empty() {
            return;
        }
        let (due, rest): (Vec<QueuedEnd>, Vec<QueuedEnd>) = self
            .queued_ends
            .drain(..)
            .partition(|q| before.map_or(true, |t| q.time < t));
        self.queued_ends = rest;
        for q in due {
            self.process_end(q.id, q.point, q.time, now, out);
        }
        if self.queued_ends.is_empty() {
            if let Some(token) = self.release_timer.take() {
                self.timers.cancel(token);
            }
        }
    }

    fn process_end(
        &mut self,
        id: SequenceId,
        point: Point,
        time: u64,
        now: Instant,
        out: &mut Vec<Outcome>,
    ) {
        self.flush_gate();

        if let Some(mut seq) = self.tracker.end(id, time) {
            if seq.delivered {
                seq.point = point;
                let key = self.grid.find_key(point);
                if key != seq.hover_key {
                    self.view.redraw(seq.hover_key);
                    seq.hover_key = key;
                }
                self.view.on_sequence_end(&seq);
                self.view.redraw(seq.hover_key);

                let others_active = !self.tracker.is_empty();
                match self.resolver.release(seq.hover_key, others_active, &self.mapping) {
                    Release::Waiting => {}
                    Release::Cancelled => {
                        debug!("chord cancelled by release outside the panes");
                        out.push(Outcome::Cancelled);
                    }
                    Release::Resolved(keys) => out.push(self.commit(keys)),
                }
            }
        }

        if self.tracker.is_empty() {
            if let Some(token) = self.sweep_timer.take() {
                self.timers.cancel(token);
            }
            self.arm_auto_release(now);
        } else {
            self.sweep(now);
        }
        self.gate.note_sequence_time(time);
    }

    fn commit(&mut self, keys: Vec<KeyCoord>) -> Outcome {
        match self.mapping.lookup(&keys) {
            Some(action) => {
                let label = action.label().to_string();
                self.dispatcher.dispatch(Some(action.as_ref()));
                // Modifier state changes the labels on every key.
                self.view.redraw(None);
                Outcome::Dispatched { keys, label }
            }
            None => {
                debug!("no action for chord {:?}", keys);
                Outcome::Unresolved(keys)
            }
        }
    }

    fn flush_gate(&mut self) {
        if let Some(held) = self.gate.flush(&mut self.timers) {
            self.deliver_begin(held.id, held.point);
        }
    }

    fn deliver_begin(&mut self, id: SequenceId, point: Point) {
        let Some(seq) = self.tracker.get_mut(id) else {
            return;
        };
        seq.point = point;
        seq.hover_key = self.grid.find_key(point);
        seq.delivered = true;
        trace!("begin {} over {:?}", id, seq.hover_key);
        self.view.on_sequence_begin(seq);
        self.view.redraw(seq.hover_key);

        if let Some(token) = self.auto_release_timer.take() {
            self.timers.cancel(token);
        }
    }

    fn deliver_update(&mut self, id: SequenceId) {
        let Some(seq) = self.tracker.get_mut(id) else {
            return;
        };
        if !seq.delivered {
            return;
        }
        let key = self.grid.find_key(seq.point);
        if key != seq.hover_key {
            self.view.redraw(seq.hover_key);
            self.view.redraw(key);
            seq.hover_key = key;
        }
        self.view.on_sequence_update(seq);
    }

    fn ensure_sweep(&mut self, now: Instant) {
        if self.sweep_timer.is_none() && !self.tracker.is_empty() {
            self.sweep_timer =
                self.timers
                    .schedule_in(TimerKind::Sweep, now, self.config.sweep_interval());
        }
    }

    fn sweep(&mut self, now: Instant) {
        let removed = self.tracker.sweep(now);
        if removed.is_empty() {
            return;
        }
        for seq in &removed {
            self.gate.discard(seq.id, &mut self.timers);
            if seq.delivered {
                self.view.redraw(seq.hover_key);
            }
        }
        if self.tracker.is_empty() {
            // Nobody is left to finish the chord.
            if self.config.chord_mode() == ChordMode::Concurrent {
                self.resolver.reset();
            }
            if let Some(token) = self.sweep_timer.take() {
                self.timers.cancel(token);
            }
            self.arm_auto_release(now);
        }
    }

    fn arm_auto_release(&mut self, now: Instant) {
        let Some(delay) = self.config.sticky_release_delay() else {
            return;
        };
        if self.dispatcher.modifiers().is_empty() {
            return;
        }
        if let Some(token) = self.auto_release_timer.take() {
            self.timers.cancel(token);
        }
        self.auto_release_timer = self.timers.schedule_in(TimerKind::AutoRelease, now, delay);
    }
}
