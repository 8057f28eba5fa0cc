use crate::sequence::InputSequence;
use crate::types::KeyCoord;

/// Consumer of delivered sequences, normally the keyboard widget.
/// Every method defaults to doing nothing.
pub trait KeyboardView {
    fn on_sequence_begin(&mut self, _sequence: &InputSequence) {}

    fn on_sequence_update(&mut self, _sequence: &InputSequence) {}

    fn on_sequence_end(&mut self, _sequence: &InputSequence) {}

    /// Repaint `key`, or the whole keyboard for `None`.
    fn redraw(&mut self, _key: Option<KeyCoord>) {}
}

/// View for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl KeyboardView for NullView {}
